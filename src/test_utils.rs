//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Fixed clocks so date bucketing is deterministic
//! - Helper assertions

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::EliteScoreConfig;
use crate::metrics::TrainingMetrics;
use crate::models::{Activity, ActivityType, BadgeRequirements, NewActivity, NewEliteScore, ScoreMetadata};
use crate::scoring::resolve_level;
use crate::signals::{Evidence, Signal, SignalName};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations (including the starter badge catalog) and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Seed `count` runs of 5 km, one per day counting back from today
/// Returns the IDs of created activities
pub async fn seed_test_activities(pool: &SqlitePool, user_id: Uuid, count: usize) -> Vec<i64> {
  let mut ids = Vec::with_capacity(count);

  for i in 0..count {
    let mut activity = mock_new_activity(ActivityType::Running, i as i64, Some(5.0));
    activity.average_pace = Some(300.0);
    activity.heart_rate_avg = Some(150);

    let id = crate::store::insert_activity(pool, user_id, &activity)
      .await
      .expect("Failed to insert test activity");
    ids.push(id);
  }

  ids
}

/// Replace the seeded catalog with the given badges
/// Returns the IDs in input order
pub async fn reset_badge_catalog(pool: &SqlitePool, badges: &[(&str, BadgeRequirements)]) -> Vec<i64> {
  sqlx::query("DELETE FROM elite_badges")
    .execute(pool)
    .await
    .expect("Failed to clear badge catalog");

  let mut ids = Vec::with_capacity(badges.len());
  for (name, requirements) in badges {
    let id = crate::store::insert_badge(pool, name, "test badge", "🏅", "test", 10, "common", requirements)
      .await
      .expect("Failed to insert test badge");
    ids.push(id);
  }
  ids
}

/// Insert bare score rows for (user, temporal score, calculated at)
pub async fn seed_scores(pool: &SqlitePool, rows: &[(Uuid, f64, DateTime<Utc>)]) {
  for (user_id, temporal, at) in rows {
    crate::store::insert_score(pool, &mock_new_score(*user_id, *temporal, *at), &[])
      .await
      .expect("Failed to seed score");
  }
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

/// Fixed "now" for tests
pub fn test_now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// Calendar day of `test_now()`
pub fn test_today() -> NaiveDate {
  test_now().date_naive()
}

/// Deterministic user ids: test_user(1), test_user(2), ...
pub fn test_user(n: u128) -> Uuid {
  Uuid::from_u128(n)
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A 30 minute activity `days_ago` days before `test_today()`, without pace,
/// heart rate or elevation
pub fn mock_activity(activity_type: ActivityType, days_ago: i64, distance_km: Option<f64>) -> Activity {
  Activity {
    id: 0,
    user_id: test_user(1),
    activity_type,
    duration_minutes: Some(30.0),
    distance_km,
    calories: None,
    activity_date: test_today() - Duration::days(days_ago),
    average_pace: None,
    elevation_gain: None,
    heart_rate_avg: None,
    heart_rate_max: None,
    external_source_id: None,
  }
}

pub fn mock_new_activity(activity_type: ActivityType, days_ago: i64, distance_km: Option<f64>) -> NewActivity {
  NewActivity {
    activity_type,
    duration_minutes: Some(30.0),
    distance_km,
    calories: None,
    activity_date: test_today() - Duration::days(days_ago),
    average_pace: None,
    elevation_gain: None,
    heart_rate_avg: None,
    heart_rate_max: None,
    external_source_id: None,
  }
}

/// Metrics of a modest four-week block
pub fn mock_metrics() -> TrainingMetrics {
  TrainingMetrics {
    total_distance: 40_000.0,
    weekly_mileage: vec![6.0, 6.5, 5.5, 6.8],
    average_pace: 330.0,
    workouts_completed: 8,
    workouts_planned: 9,
    longest_run: 10_000.0,
    elevation_gain: 300.0,
    training_load: 200.0,
    recovery_score: 30.0,
  }
}

/// A signal with empty evidence
pub fn mock_signal(name: SignalName, value: f64, weight: f64, confidence: f64) -> Signal {
  Signal {
    name,
    value,
    weight,
    confidence,
    evidence: Evidence::new(),
  }
}

/// A score row whose instant and temporal score are both `temporal`
pub fn mock_new_score(user_id: Uuid, temporal: f64, calculated_at: DateTime<Utc>) -> NewEliteScore {
  let config = EliteScoreConfig::default();
  let level = resolve_level(temporal, &config);
  NewEliteScore {
    user_id,
    instant_score: temporal,
    temporal_score: temporal,
    percentile: 50.0,
    level: level.tier,
    level_label: level.label,
    calculated_at,
    next_evaluation: calculated_at + Duration::hours(config.next_evaluation_hours),
    metadata: ScoreMetadata {
      version: config.version.clone(),
      activities_analyzed: 0,
      calculation_date: calculated_at,
    },
  }
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN \
       ('activities', 'elite_scores', 'elite_score_signals', 'elite_badges', 'user_badges', 'elite_recommendations')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 6, "Expected 6 tables, got {}", tables.len());

    let badges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM elite_badges")
      .fetch_one(&pool)
      .await
      .expect("Failed to count badges");
    assert_eq!(badges, 5, "starter catalog should be seeded");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_activities_returns_correct_count() {
    let pool = setup_test_db().await;

    let ids = seed_test_activities(&pool, test_user(1), 5).await;
    assert_eq!(ids.len(), 5);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
      .fetch_one(&pool)
      .await
      .expect("Failed to count activities");
    assert_eq!(count, 5);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_reset_badge_catalog_replaces_seed() {
    let pool = setup_test_db().await;

    let ids = reset_badge_catalog(&pool, &[("Only", BadgeRequirements::default())]).await;
    assert_eq!(ids.len(), 1);

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM elite_badges")
      .fetch_all(&pool)
      .await
      .expect("Failed to list badges");
    assert_eq!(names, vec!["Only".to_string()]);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let activity = mock_activity(ActivityType::Running, 3, Some(5.0));
    assert_eq!((test_today() - activity.activity_date).num_days(), 3);
    assert!(activity.average_pace.is_none());

    let score = mock_new_score(test_user(2), 0.95, test_now());
    assert_eq!(score.level, crate::scoring::LevelTier::Professional);
    assert_eq!(score.next_evaluation - score.calculated_at, Duration::hours(24));

    assert_ne!(test_user(1), test_user(2));
  }
}
