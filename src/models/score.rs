use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::LevelTier;
use crate::signals::Signal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
  pub version: String,
  pub activities_analyzed: usize,
  pub calculation_date: DateTime<Utc>,
}

/// A stored score row with its signals. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliteScore {
  pub id: i64,
  pub user_id: Uuid,
  pub instant_score: f64,
  pub temporal_score: f64,
  pub percentile: f64,
  pub level: LevelTier,
  pub level_label: String,
  pub calculated_at: DateTime<Utc>,
  pub next_evaluation: DateTime<Utc>,
  pub metadata: ScoreMetadata,
  pub signals: Vec<Signal>,
}

/// For inserting new scores (without id)
#[derive(Debug, Clone, PartialEq)]
pub struct NewEliteScore {
  pub user_id: Uuid,
  pub instant_score: f64,
  pub temporal_score: f64,
  pub percentile: f64,
  pub level: LevelTier,
  pub level_label: String,
  pub calculated_at: DateTime<Utc>,
  pub next_evaluation: DateTime<Utc>,
  pub metadata: ScoreMetadata,
}
