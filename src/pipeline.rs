//! The Elite Score pipeline
//!
//! One invocation scores one user:
//! fetch -> metrics -> signals -> validate -> combine -> level & percentile
//! -> persist score -> badges -> recommendations
//!
//! The engine holds no per-user state between runs. Everything a run needs
//! from earlier runs (previous temporal score, held badges) is read from the
//! database.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::badges::award_badges;
use crate::config::{EliteScoreConfig, Settings};
use crate::error::EliteScoreError;
use crate::metrics::TrainingMetrics;
use crate::models::{Badge, EliteScore, NewEliteScore, NewRecommendation, ScoreMetadata};
use crate::recommendations::generate_recommendations;
use crate::scoring::{instant_score, resolve_level, temporal_score, EliteLevel};
use crate::signals::generate_signals;
use crate::store;
use crate::validator::{self, SignalValidator, ValidatorError};

const DEFAULT_PERCENTILE: f64 = 50.0;

/// Result of one scoring run
#[derive(Debug, Clone, Serialize)]
pub struct EliteScoreOutcome {
  pub score: EliteScore,
  pub level: EliteLevel,
  /// Badges newly awarded by this run
  pub badges: Vec<Badge>,
  pub recommendations: Vec<NewRecommendation>,
  pub activities_analyzed: usize,
}

/// The looked-up percentile, or the median when the lookup failed
fn percentile_or_default(lookup: Result<f64, EliteScoreError>) -> f64 {
  match lookup {
    Ok(p) => p,
    Err(e) => {
      warn!(error = %e, "Percentile lookup failed, defaulting to median");
      DEFAULT_PERCENTILE
    }
  }
}

pub struct EliteScoreEngine {
  config: EliteScoreConfig,
  validator: Box<dyn SignalValidator>,
}

impl EliteScoreEngine {
  pub fn new(config: EliteScoreConfig, validator: Box<dyn SignalValidator>) -> Self {
    Self { config, validator }
  }

  /// Engine with the validator selected from runtime settings
  pub fn from_settings(config: EliteScoreConfig, settings: &Settings) -> Result<Self, ValidatorError> {
    let validator = validator::from_settings(settings.validator.as_ref(), &config)?;
    Ok(Self::new(config, validator))
  }

  pub fn config(&self) -> &EliteScoreConfig {
    &self.config
  }

  /// Score `user_id` from the activities of the trailing evaluation window
  pub async fn calculate(
    &self,
    pool: &SqlitePool,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<EliteScoreOutcome, EliteScoreError> {
    let config = &self.config;
    let today = now.date_naive();
    let since = today - Duration::days(config.evaluation_window_days);

    info!(%user_id, %since, "Calculating Elite Score");

    let activities = store::fetch_recent_activities(pool, user_id, since).await?;
    if activities.is_empty() {
      info!(%user_id, "No activities in evaluation window");
      return Err(EliteScoreError::NoActivities);
    }
    info!(count = activities.len(), "Fetched activities");

    // Metrics & signals
    let metrics = TrainingMetrics::compute(&activities, today);
    info!(
      total_distance = metrics.total_distance,
      average_pace = metrics.average_pace,
      training_load = metrics.training_load,
      "Computed training metrics"
    );

    let signals = generate_signals(&metrics, &activities, config);
    let signals = self.validator.validate(signals).await;
    for signal in &signals {
      info!(signal = %signal.name, value = signal.value, confidence = signal.confidence, "Validated signal");
    }

    // Scores
    let instant = instant_score(&signals, config.min_confidence);
    let previous = store::latest_temporal_score(pool, user_id).await?;
    let temporal = temporal_score(instant, previous, config.alpha);
    let level = resolve_level(temporal, config);
    info!(instant, temporal, level = %level.tier, "Combined scores");

    let percentile = percentile_or_default(store::calculate_percentile(pool, temporal).await);
    info!(percentile, "Resolved percentile");

    let new_score = NewEliteScore {
      user_id,
      instant_score: instant,
      temporal_score: temporal,
      percentile,
      level: level.tier,
      level_label: level.label.clone(),
      calculated_at: now,
      next_evaluation: now + Duration::hours(config.next_evaluation_hours),
      metadata: ScoreMetadata {
        version: config.version.clone(),
        activities_analyzed: activities.len(),
        calculation_date: now,
      },
    };
    let score = store::insert_score(pool, &new_score, &signals).await?;
    info!(score_id = score.id, "Stored score");

    // Reading the catalog is fatal; failed award and recommendation writes are not
    let badges = award_badges(pool, user_id, score.id, &metrics, &signals, config, now).await?;
    info!(awarded = badges.len(), "Evaluated badges");

    let recommendations = generate_recommendations(&signals, &config.recommendations, now);
    if !recommendations.is_empty() {
      if let Err(e) = store::insert_recommendations(pool, score.id, user_id, &recommendations, now).await {
        warn!(error = %e, "Failed to store recommendations");
      }
    }
    info!(count = recommendations.len(), "Generated recommendations");

    Ok(EliteScoreOutcome {
      score,
      level,
      badges,
      recommendations,
      activities_analyzed: activities.len(),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_approx_eq;
  use crate::models::BadgeRequirements;
  use crate::scoring::LevelTier;
  use crate::signals::Signal;
  use crate::test_utils::{
    reset_badge_catalog, seed_scores, seed_test_activities, setup_test_db, teardown_test_db, test_now,
    test_user,
  };
  use crate::validator::{scale_confidence, FallbackValidator};
  use async_trait::async_trait;

  /// Multiplies confidence by a fixed factor, like the evaluation service would
  struct FixedAggregate(f64);

  #[async_trait]
  impl SignalValidator for FixedAggregate {
    async fn validate(&self, signals: Vec<Signal>) -> Vec<Signal> {
      scale_confidence(signals, self.0)
    }
  }

  fn engine() -> EliteScoreEngine {
    EliteScoreEngine::new(EliteScoreConfig::default(), Box::new(FallbackValidator::new(0.95)))
  }

  #[tokio::test]
  async fn test_no_activities_is_rejected() {
    let pool = setup_test_db().await;

    let result = engine().calculate(&pool, test_user(1), test_now()).await;

    assert!(matches!(result, Err(EliteScoreError::NoActivities)));
    let scores: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM elite_scores")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(scores, 0, "nothing is stored for an empty window");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_full_run_persists_score_and_awards() {
    // Arrange
    let pool = setup_test_db().await;
    let user = test_user(1);
    let now = test_now();
    seed_test_activities(&pool, user, 6).await;

    // Act
    let outcome = engine().calculate(&pool, user, now).await.expect("run should succeed");

    // Assert
    assert_eq!(outcome.activities_analyzed, 6);
    assert_eq!(outcome.score.signals.len(), 5);
    assert!((0.0..=1.0).contains(&outcome.score.instant_score));
    assert_eq!(outcome.score.temporal_score, outcome.score.instant_score, "cold start");
    assert_eq!(outcome.score.percentile, 100.0, "first score in an empty population");
    assert_eq!(outcome.score.next_evaluation - now, Duration::hours(24));
    assert_eq!(outcome.level.tier, outcome.score.level);

    let stored = store::load_latest_score(&pool, user).await.unwrap().expect("score stored");
    assert_eq!(stored.id, outcome.score.id);
    assert_eq!(stored.signals, outcome.score.signals);
    assert_eq!(stored.metadata.activities_analyzed, 6);

    // 6 activities satisfy "First Steps" only
    let names: Vec<&str> = outcome.badges.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["First Steps"]);

    let stored_recs = store::load_recommendations(&pool, user, true).await.unwrap();
    assert_eq!(stored_recs.len(), outcome.recommendations.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_second_run_smooths_and_never_duplicates_badges() {
    let pool = setup_test_db().await;
    let user = test_user(1);
    let now = test_now();
    seed_test_activities(&pool, user, 6).await;
    let engine = engine();

    let first = engine.calculate(&pool, user, now).await.unwrap();
    let second = engine.calculate(&pool, user, now + Duration::hours(1)).await.unwrap();

    assert!(!first.badges.is_empty());
    assert!(second.badges.is_empty());
    let first_steps: i64 = sqlx::query_scalar(
      "SELECT COUNT(*) FROM user_badges ub JOIN elite_badges b ON b.id = ub.badge_id WHERE b.name = 'First Steps'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(first_steps, 1);

    // Same data gives the same instant score, so the blend returns it unchanged
    assert_approx_eq!(second.score.temporal_score, first.score.instant_score, 1e-12);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_prior_temporal_score_is_blended() {
    let pool = setup_test_db().await;
    let user = test_user(1);
    let now = test_now();
    seed_test_activities(&pool, user, 6).await;
    seed_scores(&pool, &[(user, 0.2, now - Duration::days(1))]).await;

    let outcome = engine().calculate(&pool, user, now).await.unwrap();

    let expected = 0.6 * outcome.score.instant_score + 0.4 * 0.2;
    assert_approx_eq!(outcome.score.temporal_score, expected, 1e-12);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_low_validator_aggregate_zeroes_instant_score() {
    let pool = setup_test_db().await;
    let user = test_user(1);
    seed_test_activities(&pool, user, 6).await;
    let engine = EliteScoreEngine::new(EliteScoreConfig::default(), Box::new(FixedAggregate(0.5)));

    let outcome = engine.calculate(&pool, user, test_now()).await.unwrap();

    // Every confidence ends at or below 0.45, under the 0.7 floor
    assert_eq!(outcome.score.instant_score, 0.0);
    assert_eq!(outcome.level.tier, LevelTier::Foundation);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_activities_outside_window_are_ignored() {
    let pool = setup_test_db().await;
    let user = test_user(1);
    let now = test_now();
    seed_test_activities(&pool, user, 3).await;

    // Scoring 40 days later leaves the window empty
    let result = engine().calculate(&pool, user, now + Duration::days(40)).await;

    assert!(matches!(result, Err(EliteScoreError::NoActivities)));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_badge_or_semantics_end_to_end() {
    let pool = setup_test_db().await;
    let user = test_user(1);
    seed_test_activities(&pool, user, 6).await;
    reset_badge_catalog(
      &pool,
      &[(
        "Either",
        BadgeRequirements {
          activities_count: Some(5),
          total_distance_km: Some(1000.0),
          ..Default::default()
        },
      )],
    )
    .await;

    let outcome = engine().calculate(&pool, user, test_now()).await.unwrap();

    assert_eq!(outcome.badges.len(), 1);
    assert_eq!(outcome.badges[0].name, "Either");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_unreadable_held_badges_fail_the_run() {
    let pool = setup_test_db().await;
    let user = test_user(1);
    seed_test_activities(&pool, user, 6).await;
    sqlx::query("DROP TABLE user_badges").execute(&pool).await.unwrap();

    let result = engine().calculate(&pool, user, test_now()).await;

    assert!(matches!(result, Err(EliteScoreError::Database(_))));

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_failed_percentile_lookup_defaults_to_median() {
    let failed = Err(EliteScoreError::Database(sqlx::Error::PoolClosed));
    assert_eq!(percentile_or_default(failed), 50.0);
    assert_eq!(percentile_or_default(Ok(87.5)), 87.5);
  }
}
