//! Signal generation
//!
//! Five named sub-scores are derived from the aggregated metrics and the raw
//! activity window. Each carries its configured weight, a confidence, and an
//! evidence map kept for transparency.
//!
//! The divisor and clamp constants below define what "elite" means:
//! - pace: 180 s/km scores 1.0, 360 s/km scores 0.0
//! - volume: 100 km per window scores 1.0
//! - load: 500 load units per window scores 1.0
//! - engagement: 20 activities per window scores 1.0

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::EliteScoreConfig;
use crate::metrics::{distance_km, mean, positive_pace, weekly_variance, TrainingMetrics};
use crate::models::Activity;

/// ---------------------------------------------------------------------------
/// Constants
/// ---------------------------------------------------------------------------

const ELITE_PACE: f64 = 180.0;
const PACE_RANGE: f64 = 180.0;
const ELITE_VOLUME_METERS: f64 = 100_000.0;
const ELITE_TRAINING_LOAD: f64 = 500.0;
const ELITE_ACTIVITY_COUNT: f64 = 20.0;
const VARIETY_TYPES: f64 = 4.0;
const WEEKS_PER_WINDOW: f64 = 4.0;
const MIN_PROGRESSION_ACTIVITIES: usize = 4;

const ANOMALY_MIN_DISTANCE_KM: f64 = 5.0;
const ANOMALY_MAX_PACE: f64 = 120.0;
const MIN_PLAUSIBLE_HR: i64 = 40;
const MAX_PLAUSIBLE_HR: i64 = 220;
const HIGH_COMPLETENESS: f64 = 0.8;
const HIGH_INTEGRITY_CONFIDENCE: f64 = 0.9;
const LOW_INTEGRITY_CONFIDENCE: f64 = 0.7;

pub type Evidence = Map<String, Value>;

/// ---------------------------------------------------------------------------
/// Signal Names
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalName {
  Performance,
  Consistency,
  DataIntegrity,
  Progression,
  Engagement,
}

impl SignalName {
  pub const ALL: [SignalName; 5] = [
    SignalName::Performance,
    SignalName::Consistency,
    SignalName::DataIntegrity,
    SignalName::Progression,
    SignalName::Engagement,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Performance => "performance",
      Self::Consistency => "consistency",
      Self::DataIntegrity => "dataIntegrity",
      Self::Progression => "progression",
      Self::Engagement => "engagement",
    }
  }
}

impl std::fmt::Display for SignalName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for SignalName {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|name| name.as_str() == s)
      .ok_or_else(|| format!("Unknown signal: {}", s))
  }
}

/// ---------------------------------------------------------------------------
/// Signal
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
  pub name: SignalName,
  pub value: f64,
  pub weight: f64,
  pub confidence: f64,
  pub evidence: Evidence,
}

impl Signal {
  fn new(name: SignalName, value: f64, confidence: f64, evidence: Value, config: &EliteScoreConfig) -> Self {
    Self {
      name,
      value,
      weight: config.signals.get(name).weight,
      confidence,
      evidence: into_evidence(evidence),
    }
  }
}

fn into_evidence(value: Value) -> Evidence {
  match value {
    Value::Object(map) => map,
    _ => Map::new(),
  }
}

fn clamp01(value: f64) -> f64 {
  value.clamp(0.0, 1.0)
}

/// Find a signal by name
pub fn find_signal(signals: &[Signal], name: SignalName) -> Option<&Signal> {
  signals.iter().find(|s| s.name == name)
}

/// Generate the five signals, in `SignalName::ALL` order
pub fn generate_signals(
  metrics: &TrainingMetrics,
  activities: &[Activity],
  config: &EliteScoreConfig,
) -> Vec<Signal> {
  SignalName::ALL
    .into_iter()
    .map(|name| match name {
      SignalName::Performance => performance_signal(metrics, config),
      SignalName::Consistency => consistency_signal(metrics, config),
      SignalName::DataIntegrity => data_integrity_signal(activities, config),
      SignalName::Progression => progression_signal(activities, config),
      SignalName::Engagement => engagement_signal(activities, config),
    })
    .collect()
}

/// ---------------------------------------------------------------------------
/// Performance
/// ---------------------------------------------------------------------------

pub fn performance_score(metrics: &TrainingMetrics) -> f64 {
  let pace_factor = clamp01(1.0 - (metrics.average_pace - ELITE_PACE) / PACE_RANGE);
  let volume_factor = (metrics.total_distance / ELITE_VOLUME_METERS).min(1.0);
  let load_factor = (metrics.training_load / ELITE_TRAINING_LOAD).min(1.0);

  pace_factor * 0.4 + volume_factor * 0.3 + load_factor * 0.3
}

fn performance_signal(metrics: &TrainingMetrics, config: &EliteScoreConfig) -> Signal {
  Signal::new(
    SignalName::Performance,
    performance_score(metrics),
    config.signals.performance.base_confidence,
    json!({
      "averagePace": metrics.average_pace,
      "longestRun": metrics.longest_run,
      "trainingLoad": metrics.training_load,
      "totalDistance": metrics.total_distance,
    }),
    config,
  )
}

/// ---------------------------------------------------------------------------
/// Consistency
/// ---------------------------------------------------------------------------

pub fn consistency_score(metrics: &TrainingMetrics) -> f64 {
  if metrics.workouts_planned > 0 {
    (metrics.workouts_completed as f64 / metrics.workouts_planned as f64).min(1.0)
  } else {
    0.5
  }
}

fn consistency_signal(metrics: &TrainingMetrics, config: &EliteScoreConfig) -> Signal {
  let score = consistency_score(metrics);
  Signal::new(
    SignalName::Consistency,
    score,
    config.signals.consistency.base_confidence,
    json!({
      "workoutsCompleted": metrics.workouts_completed,
      "workoutsPlanned": metrics.workouts_planned,
      "completionRate": score,
      "weeklyVariance": weekly_variance(&metrics.weekly_mileage),
    }),
    config,
  )
}

/// ---------------------------------------------------------------------------
/// Data Integrity
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DataIntegrity {
  pub score: f64,
  pub confidence: f64,
  pub completeness: f64,
  pub enhancement: f64,
  pub anomalies: usize,
}

fn is_present(value: Option<f64>) -> bool {
  value.is_some_and(|v| v != 0.0)
}

fn is_anomalous(activity: &Activity) -> bool {
  let impossible_pace = activity.distance_km.is_some_and(|d| d > ANOMALY_MIN_DISTANCE_KM)
    && activity.average_pace.is_some_and(|p| p != 0.0 && p < ANOMALY_MAX_PACE);
  let impossible_hr = activity
    .heart_rate_avg
    .is_some_and(|hr| hr != 0 && !(MIN_PLAUSIBLE_HR..=MAX_PLAUSIBLE_HR).contains(&hr));
  impossible_pace || impossible_hr
}

pub fn data_integrity(activities: &[Activity]) -> DataIntegrity {
  if activities.is_empty() {
    return DataIntegrity {
      score: 0.5,
      confidence: 0.5,
      completeness: 0.0,
      enhancement: 0.0,
      anomalies: 0,
    };
  }

  let total = activities.len() as f64;

  // activity_date is always present on a stored activity
  let complete = activities
    .iter()
    .filter(|a| is_present(a.distance_km) && is_present(a.duration_minutes))
    .count();
  let enhanced = activities
    .iter()
    .filter(|a| {
      is_present(a.average_pace)
        || a.heart_rate_avg.is_some_and(|hr| hr != 0)
        || is_present(a.elevation_gain)
    })
    .count();
  let anomalies = activities.iter().filter(|a| is_anomalous(a)).count();

  let completeness = complete as f64 / total;
  let enhancement = enhanced as f64 / total;
  let anomaly_score = 1.0 - anomalies as f64 / total;

  DataIntegrity {
    score: completeness * 0.5 + enhancement * 0.3 + anomaly_score * 0.2,
    confidence: if completeness > HIGH_COMPLETENESS {
      HIGH_INTEGRITY_CONFIDENCE
    } else {
      LOW_INTEGRITY_CONFIDENCE
    },
    completeness,
    enhancement,
    anomalies,
  }
}

fn data_integrity_signal(activities: &[Activity], config: &EliteScoreConfig) -> Signal {
  let integrity = data_integrity(activities);
  Signal::new(
    SignalName::DataIntegrity,
    integrity.score,
    integrity.confidence,
    json!({
      "completeness": integrity.completeness,
      "enhancement": integrity.enhancement,
      "anomalies": integrity.anomalies,
      "totalActivities": activities.len(),
    }),
    config,
  )
}

/// ---------------------------------------------------------------------------
/// Progression
/// ---------------------------------------------------------------------------

/// Compare the newer half of a newest-first window against the older half
pub fn progression_score(activities: &[Activity]) -> (f64, Value) {
  if activities.len() < MIN_PROGRESSION_ACTIVITIES {
    return (0.5, json!({ "reason": "Insufficient data" }));
  }

  let midpoint = activities.len() / 2;
  let (recent, older) = activities.split_at(midpoint);

  let recent_pace = mean(recent.iter().filter_map(positive_pace));
  let older_pace = mean(older.iter().filter_map(positive_pace));
  let pace_improvement = match (recent_pace, older_pace) {
    (Some(recent), Some(older)) if older > 0.0 => (older - recent) / older,
    _ => 0.0,
  };

  let recent_distance = recent.iter().map(distance_km).sum::<f64>() / recent.len() as f64;
  let older_distance = older.iter().map(distance_km).sum::<f64>() / older.len() as f64;
  let distance_improvement = if older_distance > 0.0 {
    (recent_distance - older_distance) / older_distance
  } else {
    0.0
  };

  let score = clamp01(0.5 + pace_improvement * 2.0 + distance_improvement * 0.5);

  (
    score,
    json!({
      "paceImprovement": pace_improvement,
      "distanceImprovement": distance_improvement,
      "recentActivitiesCount": recent.len(),
      "olderActivitiesCount": older.len(),
    }),
  )
}

fn progression_signal(activities: &[Activity], config: &EliteScoreConfig) -> Signal {
  let (score, evidence) = progression_score(activities);
  Signal::new(
    SignalName::Progression,
    score,
    config.signals.progression.base_confidence,
    evidence,
    config,
  )
}

/// ---------------------------------------------------------------------------
/// Engagement
/// ---------------------------------------------------------------------------

pub fn variety_score(activities: &[Activity]) -> f64 {
  let types: HashSet<_> = activities.iter().map(|a| a.activity_type).collect();
  (types.len() as f64 / VARIETY_TYPES).min(1.0)
}

fn engagement_signal(activities: &[Activity], config: &EliteScoreConfig) -> Signal {
  let count = activities.len() as f64;
  Signal::new(
    SignalName::Engagement,
    (count / ELITE_ACTIVITY_COUNT).min(1.0),
    config.signals.engagement.base_confidence,
    json!({
      "activitiesCount": activities.len(),
      "activitiesPerWeek": count / WEEKS_PER_WINDOW,
      "varietyScore": variety_score(activities),
    }),
    config,
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
