//! Database operations for activities, scores, badges and recommendations
//!
//! Every scoring write is an insert keyed by a fresh score id. The only
//! contested write is a badge award, made safe by UNIQUE(user_id, badge_id).

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::error::EliteScoreError;
use crate::models::{
  Activity, Badge, BadgeRequirements, EliteScore, NewActivity, NewEliteScore, NewRecommendation,
  Recommendation, ScoreMetadata, UserBadge,
};
use crate::signals::{Evidence, Signal};

type StoreResult<T> = Result<T, EliteScoreError>;

fn parse_user_id(raw: &str) -> StoreResult<Uuid> {
  Uuid::parse_str(raw).map_err(|e| EliteScoreError::InvalidRecord(format!("user id {}: {}", raw, e)))
}

fn parse_field<T: std::str::FromStr<Err = String>>(raw: &str) -> StoreResult<T> {
  raw.parse().map_err(EliteScoreError::InvalidRecord)
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ActivityRow {
  id: i64,
  user_id: String,
  activity_type: String,
  duration_minutes: Option<f64>,
  distance_km: Option<f64>,
  calories: Option<i64>,
  activity_date: NaiveDate,
  average_pace: Option<f64>,
  elevation_gain: Option<f64>,
  heart_rate_avg: Option<i64>,
  heart_rate_max: Option<i64>,
  external_source_id: Option<String>,
}

impl TryFrom<ActivityRow> for Activity {
  type Error = EliteScoreError;

  fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
    Ok(Activity {
      id: row.id,
      user_id: parse_user_id(&row.user_id)?,
      // Types added by newer clients score as "other"
      activity_type: row.activity_type.parse().unwrap_or_default(),
      duration_minutes: row.duration_minutes,
      distance_km: row.distance_km,
      calories: row.calories,
      activity_date: row.activity_date,
      average_pace: row.average_pace,
      elevation_gain: row.elevation_gain,
      heart_rate_avg: row.heart_rate_avg,
      heart_rate_max: row.heart_rate_max,
      external_source_id: row.external_source_id,
    })
  }
}

async fn insert_activity_with<'e, E: SqliteExecutor<'e>>(
  executor: E,
  user_id: Uuid,
  activity: &NewActivity,
) -> StoreResult<i64> {
  let result = sqlx::query(
    r#"
    INSERT INTO activities (
      user_id, activity_type, duration_minutes, distance_km, calories,
      activity_date, average_pace, elevation_gain, heart_rate_avg,
      heart_rate_max, external_source_id
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    "#,
  )
  .bind(user_id.to_string())
  .bind(activity.activity_type.as_str())
  .bind(activity.duration_minutes)
  .bind(activity.distance_km)
  .bind(activity.calories)
  .bind(activity.activity_date)
  .bind(activity.average_pace)
  .bind(activity.elevation_gain)
  .bind(activity.heart_rate_avg)
  .bind(activity.heart_rate_max)
  .bind(&activity.external_source_id)
  .execute(executor)
  .await?;

  Ok(result.last_insert_rowid())
}

/// Insert a logged activity, returning its id
pub async fn insert_activity(pool: &SqlitePool, user_id: Uuid, activity: &NewActivity) -> StoreResult<i64> {
  insert_activity_with(pool, user_id, activity).await
}

/// Insert a batch of activities in one transaction. Either all are stored or none.
pub async fn insert_activities(
  pool: &SqlitePool,
  user_id: Uuid,
  activities: &[NewActivity],
) -> StoreResult<Vec<i64>> {
  let mut tx = pool.begin().await?;
  let mut ids = Vec::with_capacity(activities.len());

  for activity in activities {
    ids.push(insert_activity_with(&mut *tx, user_id, activity).await?);
  }

  tx.commit().await?;
  Ok(ids)
}

/// Activities dated on or after `since`, newest first
pub async fn fetch_recent_activities(
  pool: &SqlitePool,
  user_id: Uuid,
  since: NaiveDate,
) -> StoreResult<Vec<Activity>> {
  let rows: Vec<ActivityRow> = sqlx::query_as(
    r#"
    SELECT
      id, user_id, activity_type, duration_minutes, distance_km, calories,
      activity_date, average_pace, elevation_gain, heart_rate_avg,
      heart_rate_max, external_source_id
    FROM activities
    WHERE user_id = ?1 AND activity_date >= ?2
    ORDER BY activity_date DESC, id DESC
    "#,
  )
  .bind(user_id.to_string())
  .bind(since)
  .fetch_all(pool)
  .await?;

  rows.into_iter().map(Activity::try_from).collect()
}

// ---------------------------------------------------------------------------
// Scores & Signals
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ScoreRow {
  id: i64,
  user_id: String,
  instant_score: f64,
  temporal_score: f64,
  percentile: f64,
  level: String,
  level_tier: String,
  calculated_at: DateTime<Utc>,
  next_evaluation: DateTime<Utc>,
  metadata_json: String,
}

impl ScoreRow {
  fn into_score(self, signals: Vec<Signal>) -> StoreResult<EliteScore> {
    Ok(EliteScore {
      id: self.id,
      user_id: parse_user_id(&self.user_id)?,
      instant_score: self.instant_score,
      temporal_score: self.temporal_score,
      percentile: self.percentile,
      level: parse_field(&self.level)?,
      level_label: self.level_tier,
      calculated_at: self.calculated_at,
      next_evaluation: self.next_evaluation,
      metadata: serde_json::from_str::<ScoreMetadata>(&self.metadata_json)?,
      signals,
    })
  }
}

#[derive(sqlx::FromRow)]
struct SignalRow {
  signal_name: String,
  signal_value: f64,
  weight: f64,
  confidence: f64,
  evidence_json: String,
}

impl TryFrom<SignalRow> for Signal {
  type Error = EliteScoreError;

  fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
    Ok(Signal {
      name: parse_field(&row.signal_name)?,
      value: row.signal_value,
      weight: row.weight,
      confidence: row.confidence,
      evidence: serde_json::from_str::<Evidence>(&row.evidence_json)?,
    })
  }
}

/// Most recent temporal score for a user, if any
pub async fn latest_temporal_score(pool: &SqlitePool, user_id: Uuid) -> StoreResult<Option<f64>> {
  let score: Option<f64> = sqlx::query_scalar(
    r#"
    SELECT temporal_score FROM elite_scores
    WHERE user_id = ?1
    ORDER BY calculated_at DESC, id DESC
    LIMIT 1
    "#,
  )
  .bind(user_id.to_string())
  .fetch_optional(pool)
  .await?;

  Ok(score)
}

/// Share (0-100) of users whose most recent temporal score is at or below
/// `score`. An empty population ranks the score at the top.
pub async fn calculate_percentile(pool: &SqlitePool, score: f64) -> StoreResult<f64> {
  let (total, at_or_below): (i64, i64) = sqlx::query_as(
    r#"
    WITH latest AS (
      SELECT temporal_score,
             ROW_NUMBER() OVER (PARTITION BY user_id ORDER BY calculated_at DESC, id DESC) AS rn
      FROM elite_scores
    )
    SELECT COUNT(*),
           COALESCE(SUM(CASE WHEN temporal_score <= ?1 THEN 1 ELSE 0 END), 0)
    FROM latest
    WHERE rn = 1
    "#,
  )
  .bind(score)
  .fetch_one(pool)
  .await?;

  if total == 0 {
    return Ok(100.0);
  }
  Ok(at_or_below as f64 / total as f64 * 100.0)
}

/// Insert a score row and its signals in one transaction
pub async fn insert_score(
  pool: &SqlitePool,
  score: &NewEliteScore,
  signals: &[Signal],
) -> StoreResult<EliteScore> {
  let metadata_json = serde_json::to_string(&score.metadata)?;
  let mut tx = pool.begin().await?;

  let result = sqlx::query(
    r#"
    INSERT INTO elite_scores (
      user_id, instant_score, temporal_score, percentile, level,
      level_tier, calculated_at, next_evaluation, metadata_json
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    "#,
  )
  .bind(score.user_id.to_string())
  .bind(score.instant_score)
  .bind(score.temporal_score)
  .bind(score.percentile)
  .bind(score.level.to_string())
  .bind(&score.level_label)
  .bind(score.calculated_at)
  .bind(score.next_evaluation)
  .bind(&metadata_json)
  .execute(&mut *tx)
  .await?;

  let score_id = result.last_insert_rowid();

  for signal in signals {
    let evidence_json = serde_json::to_string(&signal.evidence)?;
    sqlx::query(
      r#"
      INSERT INTO elite_score_signals (
        score_id, signal_name, signal_value, weight, confidence, evidence_json
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)
      "#,
    )
    .bind(score_id)
    .bind(signal.name.as_str())
    .bind(signal.value)
    .bind(signal.weight)
    .bind(signal.confidence)
    .bind(&evidence_json)
    .execute(&mut *tx)
    .await?;
  }

  tx.commit().await?;

  Ok(EliteScore {
    id: score_id,
    user_id: score.user_id,
    instant_score: score.instant_score,
    temporal_score: score.temporal_score,
    percentile: score.percentile,
    level: score.level,
    level_label: score.level_label.clone(),
    calculated_at: score.calculated_at,
    next_evaluation: score.next_evaluation,
    metadata: score.metadata.clone(),
    signals: signals.to_vec(),
  })
}

/// Signals stored for a score, in insertion order
pub async fn load_signals(pool: &SqlitePool, score_id: i64) -> StoreResult<Vec<Signal>> {
  let rows: Vec<SignalRow> = sqlx::query_as(
    r#"
    SELECT signal_name, signal_value, weight, confidence, evidence_json
    FROM elite_score_signals
    WHERE score_id = ?1
    ORDER BY id
    "#,
  )
  .bind(score_id)
  .fetch_all(pool)
  .await?;

  rows.into_iter().map(Signal::try_from).collect()
}

const SCORE_COLUMNS: &str = "id, user_id, instant_score, temporal_score, percentile, level, \
  level_tier, calculated_at, next_evaluation, metadata_json";

/// The user's current score (most recent row) with its signals
pub async fn load_latest_score(pool: &SqlitePool, user_id: Uuid) -> StoreResult<Option<EliteScore>> {
  let row: Option<ScoreRow> = sqlx::query_as(&format!(
    "SELECT {} FROM elite_scores WHERE user_id = ?1 ORDER BY calculated_at DESC, id DESC LIMIT 1",
    SCORE_COLUMNS
  ))
  .bind(user_id.to_string())
  .fetch_optional(pool)
  .await?;

  match row {
    Some(row) => {
      let signals = load_signals(pool, row.id).await?;
      Ok(Some(row.into_score(signals)?))
    }
    None => Ok(None),
  }
}

/// Scores calculated at or after `since`, oldest first for charting.
/// Signals are not loaded.
pub async fn load_score_history(
  pool: &SqlitePool,
  user_id: Uuid,
  since: DateTime<Utc>,
) -> StoreResult<Vec<EliteScore>> {
  let rows: Vec<ScoreRow> = sqlx::query_as(&format!(
    "SELECT {} FROM elite_scores WHERE user_id = ?1 AND calculated_at >= ?2 ORDER BY calculated_at, id",
    SCORE_COLUMNS
  ))
  .bind(user_id.to_string())
  .bind(since)
  .fetch_all(pool)
  .await?;

  rows.into_iter().map(|row| row.into_score(Vec::new())).collect()
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct BadgeRow {
  id: i64,
  name: String,
  description: String,
  icon: String,
  category: String,
  points: i64,
  rarity: String,
  requirements_json: String,
}

impl TryFrom<BadgeRow> for Badge {
  type Error = EliteScoreError;

  fn try_from(row: BadgeRow) -> Result<Self, Self::Error> {
    Ok(Badge {
      id: row.id,
      name: row.name,
      description: row.description,
      icon: row.icon,
      category: row.category,
      points: row.points,
      rarity: row.rarity,
      requirements: serde_json::from_str::<BadgeRequirements>(&row.requirements_json)?,
    })
  }
}

/// The badge catalog, most points first. Badges with unreadable requirements
/// are skipped.
pub async fn load_badges(pool: &SqlitePool) -> StoreResult<Vec<Badge>> {
  let rows: Vec<BadgeRow> = sqlx::query_as(
    r#"
    SELECT id, name, description, icon, category, points, rarity, requirements_json
    FROM elite_badges
    ORDER BY points DESC, id
    "#,
  )
  .fetch_all(pool)
  .await?;

  let mut badges = Vec::with_capacity(rows.len());
  for row in rows {
    let name = row.name.clone();
    match Badge::try_from(row) {
      Ok(badge) => badges.push(badge),
      Err(e) => warn!(badge = %name, error = %e, "Skipping badge with invalid requirements"),
    }
  }
  Ok(badges)
}

/// Insert a badge definition (catalog administration and tests)
pub async fn insert_badge(
  pool: &SqlitePool,
  name: &str,
  description: &str,
  icon: &str,
  category: &str,
  points: i64,
  rarity: &str,
  requirements: &BadgeRequirements,
) -> StoreResult<i64> {
  let result = sqlx::query(
    r#"
    INSERT INTO elite_badges (name, description, icon, category, points, rarity, requirements_json)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    "#,
  )
  .bind(name)
  .bind(description)
  .bind(icon)
  .bind(category)
  .bind(points)
  .bind(rarity)
  .bind(serde_json::to_string(requirements)?)
  .execute(pool)
  .await?;

  Ok(result.last_insert_rowid())
}

pub async fn load_user_badge_ids(pool: &SqlitePool, user_id: Uuid) -> StoreResult<HashSet<i64>> {
  let ids: Vec<i64> = sqlx::query_scalar("SELECT badge_id FROM user_badges WHERE user_id = ?1")
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

  Ok(ids.into_iter().collect())
}

/// Record a badge award. Returns false when the user already held it.
pub async fn award_badge(
  pool: &SqlitePool,
  user_id: Uuid,
  badge_id: i64,
  score_id: i64,
  evidence: &serde_json::Value,
  earned_at: DateTime<Utc>,
) -> StoreResult<bool> {
  let result = sqlx::query(
    r#"
    INSERT INTO user_badges (user_id, badge_id, score_id, evidence_json, earned_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (user_id, badge_id) DO NOTHING
    "#,
  )
  .bind(user_id.to_string())
  .bind(badge_id)
  .bind(score_id)
  .bind(evidence.to_string())
  .bind(earned_at)
  .execute(pool)
  .await?;

  Ok(result.rows_affected() == 1)
}

#[derive(sqlx::FromRow)]
struct UserBadgeRow {
  user_badge_id: i64,
  user_id: String,
  score_id: i64,
  evidence_json: String,
  earned_at: DateTime<Utc>,
  #[sqlx(flatten)]
  badge: BadgeRow,
}

/// Badges a user has earned, newest first, with their definitions
pub async fn load_user_badges(pool: &SqlitePool, user_id: Uuid) -> StoreResult<Vec<UserBadge>> {
  let rows: Vec<UserBadgeRow> = sqlx::query_as(
    r#"
    SELECT
      ub.id AS user_badge_id, ub.user_id, ub.score_id, ub.evidence_json, ub.earned_at,
      b.id, b.name, b.description, b.icon, b.category, b.points, b.rarity, b.requirements_json
    FROM user_badges ub
    JOIN elite_badges b ON b.id = ub.badge_id
    WHERE ub.user_id = ?1
    ORDER BY ub.earned_at DESC, ub.id DESC
    "#,
  )
  .bind(user_id.to_string())
  .fetch_all(pool)
  .await?;

  rows
    .into_iter()
    .map(|row| -> StoreResult<UserBadge> {
      let badge = Badge::try_from(row.badge)?;
      Ok(UserBadge {
        id: row.user_badge_id,
        user_id: parse_user_id(&row.user_id)?,
        badge_id: badge.id,
        score_id: row.score_id,
        evidence: serde_json::from_str(&row.evidence_json)?,
        earned_at: row.earned_at,
        badge,
      })
    })
    .collect()
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct RecommendationRow {
  id: i64,
  score_id: i64,
  user_id: String,
  recommendation_type: String,
  priority: String,
  title: String,
  description: String,
  action_items_json: String,
  completed: bool,
  completed_at: Option<DateTime<Utc>>,
  expires_at: DateTime<Utc>,
  created_at: DateTime<Utc>,
}

impl TryFrom<RecommendationRow> for Recommendation {
  type Error = EliteScoreError;

  fn try_from(row: RecommendationRow) -> Result<Self, Self::Error> {
    Ok(Recommendation {
      id: row.id,
      score_id: row.score_id,
      user_id: parse_user_id(&row.user_id)?,
      recommendation_type: row.recommendation_type,
      priority: parse_field(&row.priority)?,
      title: row.title,
      description: row.description,
      action_items: serde_json::from_str(&row.action_items_json)?,
      completed: row.completed,
      completed_at: row.completed_at,
      expires_at: row.expires_at,
      created_at: row.created_at,
    })
  }
}

/// Store generated recommendations against a score, returning their ids
pub async fn insert_recommendations(
  pool: &SqlitePool,
  score_id: i64,
  user_id: Uuid,
  recommendations: &[NewRecommendation],
  created_at: DateTime<Utc>,
) -> StoreResult<Vec<i64>> {
  let mut tx = pool.begin().await?;
  let mut ids = Vec::with_capacity(recommendations.len());

  for rec in recommendations {
    let result = sqlx::query(
      r#"
      INSERT INTO elite_recommendations (
        score_id, user_id, recommendation_type, priority, title,
        description, action_items_json, expires_at, created_at
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
      "#,
    )
    .bind(score_id)
    .bind(user_id.to_string())
    .bind(&rec.recommendation_type)
    .bind(rec.priority.to_string())
    .bind(&rec.title)
    .bind(&rec.description)
    .bind(serde_json::to_string(&rec.action_items)?)
    .bind(rec.expires_at)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    ids.push(result.last_insert_rowid());
  }

  tx.commit().await?;
  Ok(ids)
}

/// A user's recommendations, newest first
pub async fn load_recommendations(
  pool: &SqlitePool,
  user_id: Uuid,
  include_completed: bool,
) -> StoreResult<Vec<Recommendation>> {
  let rows: Vec<RecommendationRow> = sqlx::query_as(
    r#"
    SELECT
      id, score_id, user_id, recommendation_type, priority, title, description,
      action_items_json, completed, completed_at, expires_at, created_at
    FROM elite_recommendations
    WHERE user_id = ?1 AND (?2 OR completed = 0)
    ORDER BY created_at DESC, id DESC
    "#,
  )
  .bind(user_id.to_string())
  .bind(include_completed)
  .fetch_all(pool)
  .await?;

  rows.into_iter().map(Recommendation::try_from).collect()
}

/// Mark a recommendation done. Returns false when no such recommendation exists.
pub async fn complete_recommendation(
  pool: &SqlitePool,
  recommendation_id: i64,
  completed_at: DateTime<Utc>,
) -> StoreResult<bool> {
  let result = sqlx::query(
    r#"
    UPDATE elite_recommendations
    SET completed = 1, completed_at = ?1
    WHERE id = ?2
    "#,
  )
  .bind(completed_at)
  .bind(recommendation_id)
  .execute(pool)
  .await?;

  Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
  Day,
  Week,
  Month,
  #[default]
  All,
}

impl Timeframe {
  /// Earliest calculation time included in the board
  pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match self {
      Self::Day => Some(now - Duration::days(1)),
      Self::Week => Some(now - Duration::days(7)),
      Self::Month => Some(now - Duration::days(30)),
      Self::All => None,
    }
  }
}

impl std::str::FromStr for Timeframe {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "day" => Ok(Self::Day),
      "week" => Ok(Self::Week),
      "month" => Ok(Self::Month),
      "all" => Ok(Self::All),
      _ => Err(format!("Unknown timeframe: {}", s)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  pub user_id: Uuid,
  pub temporal_score: f64,
  pub percentile: f64,
  pub level: String,
  pub level_tier: String,
  pub badge_count: i64,
  pub rank: i64,
}

#[derive(sqlx::FromRow)]
struct LeaderboardRow {
  user_id: String,
  temporal_score: f64,
  percentile: f64,
  level: String,
  level_tier: String,
  badge_count: i64,
}

/// Each user's latest score inside the timeframe, best first.
/// Ranks are 1-based and account for `offset`.
pub async fn get_leaderboard(
  pool: &SqlitePool,
  timeframe: Timeframe,
  limit: i64,
  offset: i64,
  now: DateTime<Utc>,
) -> StoreResult<Vec<LeaderboardEntry>> {
  let rows: Vec<LeaderboardRow> = sqlx::query_as(
    r#"
    WITH latest AS (
      SELECT user_id, temporal_score, percentile, level, level_tier,
             ROW_NUMBER() OVER (PARTITION BY user_id ORDER BY calculated_at DESC, id DESC) AS rn
      FROM elite_scores
      WHERE ?1 IS NULL OR calculated_at >= ?1
    )
    SELECT
      l.user_id, l.temporal_score, l.percentile, l.level, l.level_tier,
      (SELECT COUNT(*) FROM user_badges ub WHERE ub.user_id = l.user_id) AS badge_count
    FROM latest l
    WHERE l.rn = 1
    ORDER BY l.temporal_score DESC, l.user_id
    LIMIT ?2 OFFSET ?3
    "#,
  )
  .bind(timeframe.cutoff(now))
  .bind(limit)
  .bind(offset)
  .fetch_all(pool)
  .await?;

  rows
    .into_iter()
    .enumerate()
    .map(|(idx, row)| -> StoreResult<LeaderboardEntry> {
      Ok(LeaderboardEntry {
        user_id: parse_user_id(&row.user_id)?,
        temporal_score: row.temporal_score,
        percentile: row.percentile,
        level: row.level,
        level_tier: row.level_tier,
        badge_count: row.badge_count,
        rank: offset + idx as i64 + 1,
      })
    })
    .collect()
}

/// The user's (rank, total) on the all-time board
pub async fn get_user_rank(pool: &SqlitePool, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<(i64, i64)>> {
  let board = get_leaderboard(pool, Timeframe::All, i64::MAX, 0, now).await?;
  let total = board.len() as i64;
  Ok(board
    .iter()
    .find(|entry| entry.user_id == user_id)
    .map(|entry| (entry.rank, total)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
