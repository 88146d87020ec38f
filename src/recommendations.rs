//! Recommendation generation
//!
//! At most two recommendations per run:
//! - improvement on the weakest signal, when it is below the weak threshold
//! - a routine recommendation, when consistency is below its threshold

use chrono::{DateTime, Duration, Utc};

use crate::config::RecommendationConfig;
use crate::models::{NewRecommendation, RecommendationPriority};
use crate::signals::{find_signal, Signal, SignalName};

/// ---------------------------------------------------------------------------
/// Action Items
/// ---------------------------------------------------------------------------

const CONSISTENCY_ROUTINE_ITEMS: [&str; 3] = [
  "Schedule workouts in advance",
  "Set weekly mileage goals",
  "Track rest days",
];

/// Canned action items for improving one signal
pub fn action_items_for(name: SignalName) -> Vec<String> {
  let items: &[&str] = match name {
    SignalName::Performance => &[
      "Incorporate interval training",
      "Focus on tempo runs",
      "Gradually increase weekly mileage",
    ],
    SignalName::Consistency => &[
      "Set a weekly training schedule",
      "Use a training app to track workouts",
      "Join group runs for accountability",
    ],
    SignalName::DataIntegrity => &[
      "Use a GPS watch for accurate tracking",
      "Sync all activities from Strava",
      "Record heart rate data",
    ],
    SignalName::Progression => &[
      "Follow a structured training plan",
      "Progressively increase distance",
      "Track your PR times",
    ],
    SignalName::Engagement => &[
      "Try different types of workouts",
      "Join the community on events",
      "Set new personal goals",
    ],
  };

  items.iter().map(|s| s.to_string()).collect()
}

/// ---------------------------------------------------------------------------
/// Generation
/// ---------------------------------------------------------------------------

/// Weakest signal, first one wins on ties
fn weakest(signals: &[Signal]) -> Option<&Signal> {
  signals
    .iter()
    .fold(None, |min: Option<&Signal>, s| match min {
      Some(m) if m.value <= s.value => Some(m),
      _ => Some(s),
    })
}

pub fn generate_recommendations(
  signals: &[Signal],
  config: &RecommendationConfig,
  now: DateTime<Utc>,
) -> Vec<NewRecommendation> {
  let mut recommendations = Vec::new();

  if let Some(signal) = weakest(signals).filter(|s| s.value < config.weak_signal_threshold) {
    recommendations.push(NewRecommendation {
      recommendation_type: "improvement".to_string(),
      priority: RecommendationPriority::High,
      title: format!("Improve your {}", signal.name),
      description: format!(
        "Your {} score is {:.0}%. Focus on this area to boost your Elite Score.",
        signal.name,
        signal.value * 100.0
      ),
      action_items: action_items_for(signal.name),
      expires_at: now + Duration::days(config.improvement_expiry_days),
    });
  }

  if let Some(consistency) = find_signal(signals, SignalName::Consistency) {
    if consistency.value < config.consistency_threshold {
      recommendations.push(NewRecommendation {
        recommendation_type: "consistency".to_string(),
        priority: RecommendationPriority::Medium,
        title: "Build a more consistent routine".to_string(),
        description: "Try to maintain a regular training schedule to improve your consistency score."
          .to_string(),
        action_items: CONSISTENCY_ROUTINE_ITEMS.iter().map(|s| s.to_string()).collect(),
        expires_at: now + Duration::days(config.consistency_expiry_days),
      });
    }
  }

  recommendations
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{mock_signal, test_now};

  fn signals(values: [f64; 5]) -> Vec<Signal> {
    SignalName::ALL
      .into_iter()
      .zip(values)
      .map(|(name, value)| mock_signal(name, value, 1.0, 0.9))
      .collect()
  }

  #[test]
  fn test_weak_signal_yields_one_high_recommendation() {
    // performance, consistency, dataIntegrity, progression, engagement
    let signals = signals([0.7, 0.9, 0.55, 0.8, 0.65]);
    let now = test_now();

    let recs = generate_recommendations(&signals, &RecommendationConfig::default(), now);

    assert_eq!(recs.len(), 1);
    let rec = &recs[0];
    assert_eq!(rec.priority, RecommendationPriority::High);
    assert_eq!(rec.recommendation_type, "improvement");
    assert_eq!(rec.title, "Improve your dataIntegrity");
    assert!(rec.description.contains("55%"));
    assert_eq!(rec.expires_at - now, Duration::days(7));
    assert_eq!(rec.action_items, action_items_for(SignalName::DataIntegrity));
    assert!(rec.action_items.iter().any(|item| item == "Sync all activities from Strava"));
  }

  #[test]
  fn test_low_consistency_adds_routine_recommendation() {
    let signals = signals([0.7, 0.75, 0.55, 0.8, 0.65]);
    let now = test_now();

    let recs = generate_recommendations(&signals, &RecommendationConfig::default(), now);

    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].priority, RecommendationPriority::High);
    assert_eq!(recs[1].priority, RecommendationPriority::Medium);
    assert_eq!(recs[1].recommendation_type, "consistency");
    assert_eq!(recs[1].expires_at - now, Duration::days(14));
    assert_eq!(recs[1].action_items.len(), 3);
  }

  #[test]
  fn test_strong_signals_yield_nothing() {
    let recs = generate_recommendations(
      &signals([0.9, 0.85, 0.8, 0.7, 0.6]),
      &RecommendationConfig::default(),
      test_now(),
    );
    assert!(recs.is_empty());
  }

  #[test]
  fn test_weak_consistency_can_be_both() {
    let recs = generate_recommendations(
      &signals([0.9, 0.3, 0.8, 0.7, 0.9]),
      &RecommendationConfig::default(),
      test_now(),
    );
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].title, "Improve your consistency");
    assert_eq!(recs[1].title, "Build a more consistent routine");
  }

  #[test]
  fn test_ties_pick_first_weakest() {
    let recs = generate_recommendations(
      &signals([0.4, 0.9, 0.4, 0.9, 0.9]),
      &RecommendationConfig::default(),
      test_now(),
    );
    assert_eq!(recs[0].title, "Improve your performance");
  }

  #[test]
  fn test_every_signal_has_action_items() {
    for name in SignalName::ALL {
      let items = action_items_for(name);
      assert!((3..=5).contains(&items.len()), "{} has {} items", name, items.len());
    }
  }
}
