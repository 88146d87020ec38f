use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
  Low,
  Medium,
  High,
  Critical,
}

impl std::fmt::Display for RecommendationPriority {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Low => write!(f, "low"),
      Self::Medium => write!(f, "medium"),
      Self::High => write!(f, "high"),
      Self::Critical => write!(f, "critical"),
    }
  }
}

impl std::str::FromStr for RecommendationPriority {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      "critical" => Ok(Self::Critical),
      _ => Err(format!("Unknown recommendation priority: {}", s)),
    }
  }
}

/// A generated recommendation, before it is stored against a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecommendation {
  #[serde(rename = "type")]
  pub recommendation_type: String,
  pub priority: RecommendationPriority,
  pub title: String,
  pub description: String,
  pub action_items: Vec<String>,
  pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
  pub id: i64,
  pub score_id: i64,
  pub user_id: Uuid,
  #[serde(rename = "type")]
  pub recommendation_type: String,
  pub priority: RecommendationPriority,
  pub title: String,
  pub description: String,
  pub action_items: Vec<String>,
  pub completed: bool,
  pub completed_at: Option<DateTime<Utc>>,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}
