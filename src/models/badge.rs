use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::LevelTier;

/// Declarative unlock rules. Any one satisfied key earns the badge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BadgeRequirements {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activities_count: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_distance_km: Option<f64>,
  /// Slowest qualifying average pace in s/km
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub average_pace_max: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub elite_tier: Option<LevelTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
  pub id: i64,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub category: String,
  pub points: i64,
  pub rarity: String,
  pub requirements: BadgeRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadge {
  pub id: i64,
  pub user_id: Uuid,
  pub badge_id: i64,
  pub score_id: i64,
  pub evidence: serde_json::Value,
  pub earned_at: DateTime<Utc>,
  pub badge: Badge,
}
