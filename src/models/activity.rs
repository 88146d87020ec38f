use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
  Running,
  Cycling,
  Swimming,
  Hiit,
  Strength,
  Yoga,
  Walking,
  #[default]
  Other,
}

impl ActivityType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Running => "running",
      Self::Cycling => "cycling",
      Self::Swimming => "swimming",
      Self::Hiit => "hiit",
      Self::Strength => "strength",
      Self::Yoga => "yoga",
      Self::Walking => "walking",
      Self::Other => "other",
    }
  }
}

impl std::fmt::Display for ActivityType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for ActivityType {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "running" => Ok(Self::Running),
      "cycling" => Ok(Self::Cycling),
      "swimming" => Ok(Self::Swimming),
      "hiit" => Ok(Self::Hiit),
      "strength" => Ok(Self::Strength),
      "yoga" => Ok(Self::Yoga),
      "walking" => Ok(Self::Walking),
      "other" => Ok(Self::Other),
      _ => Err(format!("Unknown activity type: {}", s)),
    }
  }
}

/// A logged activity. Distance is kilometers, duration minutes, pace s/km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
  pub id: i64,
  pub user_id: Uuid,
  pub activity_type: ActivityType,
  pub duration_minutes: Option<f64>,
  pub distance_km: Option<f64>,
  pub calories: Option<i64>,
  pub activity_date: NaiveDate,
  pub average_pace: Option<f64>,
  pub elevation_gain: Option<f64>,
  pub heart_rate_avg: Option<i64>,
  pub heart_rate_max: Option<i64>,
  pub external_source_id: Option<String>,
}

/// For inserting new activities (without id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
  pub activity_type: ActivityType,
  pub duration_minutes: Option<f64>,
  pub distance_km: Option<f64>,
  #[serde(default)]
  pub calories: Option<i64>,
  pub activity_date: NaiveDate,
  #[serde(default)]
  pub average_pace: Option<f64>,
  #[serde(default)]
  pub elevation_gain: Option<f64>,
  #[serde(default)]
  pub heart_rate_avg: Option<i64>,
  #[serde(default)]
  pub heart_rate_max: Option<i64>,
  #[serde(default)]
  pub external_source_id: Option<String>,
}
