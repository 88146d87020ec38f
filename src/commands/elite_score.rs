//! Elite Score commands

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use super::CommandResponse;
use crate::db::AppState;
use crate::error::EliteScoreError;
use crate::models::{Badge, EliteScore, NewActivity, NewRecommendation, Recommendation, UserBadge};
use crate::pipeline::EliteScoreOutcome;
use crate::scoring::EliteLevel;
use crate::signals::Signal;
use crate::store::{self, LeaderboardEntry, Timeframe};

/// ---------------------------------------------------------------------------
/// Calculate
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ScoreSummary {
  pub instant: f64,
  pub temporal: f64,
  pub percentile: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EliteScoreData {
  pub score: ScoreSummary,
  pub level: EliteLevel,
  pub signals: Vec<Signal>,
  pub badges: Vec<Badge>,
  pub recommendations: Vec<NewRecommendation>,
  pub next_evaluation: DateTime<Utc>,
  pub activities_analyzed: usize,
}

impl From<EliteScoreOutcome> for EliteScoreData {
  fn from(outcome: EliteScoreOutcome) -> Self {
    Self {
      score: ScoreSummary {
        instant: outcome.score.instant_score,
        temporal: outcome.score.temporal_score,
        percentile: outcome.score.percentile,
      },
      level: outcome.level,
      signals: outcome.score.signals,
      badges: outcome.badges,
      recommendations: outcome.recommendations,
      next_evaluation: outcome.score.next_evaluation,
      activities_analyzed: outcome.activities_analyzed,
    }
  }
}

/// Score the caller and wrap the result in the response envelope
pub async fn calculate_elite_score(state: &AppState, user_id: Uuid) -> CommandResponse {
  calculate_elite_score_at(state, user_id, Utc::now()).await
}

pub async fn calculate_elite_score_at(state: &AppState, user_id: Uuid, now: DateTime<Utc>) -> CommandResponse {
  let result = state.engine.calculate(&state.db, user_id, now).await;

  if let Err(e) = &result {
    if e.status_code() >= 500 {
      error!(%user_id, error = %e, "Elite Score calculation failed");
    }
  }

  result
    .and_then(|outcome| CommandResponse::ok(EliteScoreData::from(outcome)))
    .into()
}

/// ---------------------------------------------------------------------------
/// Scores
/// ---------------------------------------------------------------------------

pub async fn get_current_score(state: &AppState, user_id: Uuid) -> Result<EliteScore, EliteScoreError> {
  store::load_latest_score(&state.db, user_id)
    .await?
    .ok_or_else(|| EliteScoreError::NotFound(format!("no score for user {}", user_id)))
}

/// Scores from the last `days` days, oldest first
pub async fn get_score_history(
  state: &AppState,
  user_id: Uuid,
  days: u32,
  now: DateTime<Utc>,
) -> Result<Vec<EliteScore>, EliteScoreError> {
  let since = now - Duration::days(i64::from(days));
  store::load_score_history(&state.db, user_id, since).await
}

/// True when the user has no score yet or its next evaluation is due
pub async fn needs_recalculation(
  state: &AppState,
  user_id: Uuid,
  now: DateTime<Utc>,
) -> Result<bool, EliteScoreError> {
  let current = store::load_latest_score(&state.db, user_id).await?;
  Ok(current.map_or(true, |score| now >= score.next_evaluation))
}

/// ---------------------------------------------------------------------------
/// Leaderboard
/// ---------------------------------------------------------------------------

pub async fn get_leaderboard(
  state: &AppState,
  timeframe: Timeframe,
  limit: u32,
  offset: u32,
) -> Result<Vec<LeaderboardEntry>, EliteScoreError> {
  store::get_leaderboard(&state.db, timeframe, i64::from(limit), i64::from(offset), Utc::now()).await
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserRank {
  pub rank: i64,
  pub total: i64,
}

pub async fn get_user_rank(state: &AppState, user_id: Uuid) -> Result<Option<UserRank>, EliteScoreError> {
  let rank = store::get_user_rank(&state.db, user_id, Utc::now()).await?;
  Ok(rank.map(|(rank, total)| UserRank { rank, total }))
}

/// ---------------------------------------------------------------------------
/// Recommendations & Badges
/// ---------------------------------------------------------------------------

pub async fn get_recommendations(
  state: &AppState,
  user_id: Uuid,
  include_completed: bool,
) -> Result<Vec<Recommendation>, EliteScoreError> {
  store::load_recommendations(&state.db, user_id, include_completed).await
}

pub async fn complete_recommendation(state: &AppState, recommendation_id: i64) -> Result<(), EliteScoreError> {
  if store::complete_recommendation(&state.db, recommendation_id, Utc::now()).await? {
    Ok(())
  } else {
    Err(EliteScoreError::NotFound(format!("recommendation {}", recommendation_id)))
  }
}

pub async fn get_user_badges(state: &AppState, user_id: Uuid) -> Result<Vec<UserBadge>, EliteScoreError> {
  store::load_user_badges(&state.db, user_id).await
}

/// The full badge catalog, most points first
pub async fn get_all_badges(state: &AppState) -> Result<Vec<Badge>, EliteScoreError> {
  store::load_badges(&state.db).await
}

/// ---------------------------------------------------------------------------
/// Activities
/// ---------------------------------------------------------------------------

fn check_activity(activity: &NewActivity) -> Result<(), EliteScoreError> {
  let invalid = |v: Option<f64>| v.is_some_and(|v| v < 0.0 || !v.is_finite());
  if invalid(activity.distance_km) {
    return Err(EliteScoreError::InvalidActivity(
      "distance must be a finite, non-negative number".to_string(),
    ));
  }
  if invalid(activity.duration_minutes) {
    return Err(EliteScoreError::InvalidActivity(
      "duration must be a finite, non-negative number".to_string(),
    ));
  }
  Ok(())
}

/// Store a batch of activities. The whole batch is checked, then inserted in
/// one transaction.
pub async fn import_activities(
  state: &AppState,
  user_id: Uuid,
  activities: Vec<NewActivity>,
) -> Result<Vec<i64>, EliteScoreError> {
  for activity in &activities {
    check_activity(activity)?;
  }

  store::insert_activities(&state.db, user_id, &activities).await
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
