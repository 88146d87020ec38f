//! Deterministic aggregation of raw activities into training metrics
//!
//! Metrics are recomputed from the activity window on every scoring run and
//! are never stored on their own (they are snapshotted into badge evidence).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Activity, ActivityType};

/// ---------------------------------------------------------------------------
/// Constants
/// ---------------------------------------------------------------------------

const KM_TO_MILES: f64 = 0.621371;
const METERS_PER_KM: f64 = 1000.0;
const WEEKS_TRACKED: i64 = 4;
/// 5:00/km when no running pace was recorded
pub const DEFAULT_PACE_SECONDS_PER_KM: f64 = 300.0;
/// Fixed moderate intensity for activities without heart rate
const ASSUMED_INTENSITY: f64 = 0.7;
const INTENSITY_REFERENCE_HR: f64 = 180.0;
/// Completion rate assumed when estimating planned workouts
const PLANNED_WORKOUT_FACTOR: f64 = 1.1;
const RECOVERY_SAMPLE_SIZE: usize = 7;

/// ---------------------------------------------------------------------------
/// Training Metrics
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetrics {
  /// Meters
  pub total_distance: f64,
  /// Miles per trailing week, oldest first
  pub weekly_mileage: Vec<f64>,
  /// Seconds per km
  pub average_pace: f64,
  pub workouts_completed: usize,
  pub workouts_planned: usize,
  /// Meters
  pub longest_run: f64,
  /// Meters
  pub elevation_gain: f64,
  pub training_load: f64,
  pub recovery_score: f64,
}

impl TrainingMetrics {
  /// Aggregate a newest-first activity window, bucketing weeks against `today`
  pub fn compute(activities: &[Activity], today: NaiveDate) -> Self {
    let runs: Vec<&Activity> = activities
      .iter()
      .filter(|a| a.activity_type == ActivityType::Running)
      .collect();

    let total_distance = activities.iter().map(distance_km).sum::<f64>() * METERS_PER_KM;

    // Bucket i holds activities 7i..7i+7 days before today; reversed to oldest first
    let weekly_mileage = (0..WEEKS_TRACKED)
      .rev()
      .map(|week| {
        let km: f64 = activities
          .iter()
          .filter(|a| {
            let days_ago = (today - a.activity_date).num_days();
            days_ago >= week * 7 && days_ago < (week + 1) * 7
          })
          .map(distance_km)
          .sum();
        km * KM_TO_MILES
      })
      .collect();

    let average_pace = mean(runs.iter().filter_map(|a| positive_pace(a)))
      .unwrap_or(DEFAULT_PACE_SECONDS_PER_KM);

    let longest_run = runs
      .iter()
      .map(|a| distance_km(a) * METERS_PER_KM)
      .fold(0.0, f64::max);

    let elevation_gain = activities.iter().filter_map(|a| a.elevation_gain).sum();

    let training_load = activities
      .iter()
      .map(|a| {
        let intensity = match a.heart_rate_avg {
          Some(hr) if hr != 0 => hr as f64 / INTENSITY_REFERENCE_HR,
          _ => ASSUMED_INTENSITY,
        };
        a.duration_minutes.unwrap_or(0.0) * intensity
      })
      .sum();

    let recent = activities.len().min(RECOVERY_SAMPLE_SIZE);
    let recovery_score = (100.0 - recent as f64 * 10.0).max(0.0);

    let workouts_completed = activities.len();
    let workouts_planned = (workouts_completed as f64 * PLANNED_WORKOUT_FACTOR).ceil() as usize;

    Self {
      total_distance,
      weekly_mileage,
      average_pace,
      workouts_completed,
      workouts_planned,
      longest_run,
      elevation_gain,
      training_load,
      recovery_score,
    }
  }

  pub fn total_distance_km(&self) -> f64 {
    self.total_distance / METERS_PER_KM
  }
}

/// Population variance of the weekly mileage series
pub fn weekly_variance(weekly_mileage: &[f64]) -> f64 {
  if weekly_mileage.len() < 2 {
    return 0.0;
  }
  let n = weekly_mileage.len() as f64;
  let mean = weekly_mileage.iter().sum::<f64>() / n;
  weekly_mileage.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

pub(crate) fn distance_km(activity: &Activity) -> f64 {
  activity.distance_km.unwrap_or(0.0)
}

pub(crate) fn positive_pace(activity: &Activity) -> Option<f64> {
  activity.average_pace.filter(|p| *p > 0.0)
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
  let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
  if count > 0 {
    Some(sum / count as f64)
  } else {
    None
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
