//! Scoring configuration and runtime settings
//!
//! `EliteScoreConfig` holds every tuning constant of the scoring pipeline
//! (weights, confidence floor, smoothing factor, tier boundaries). It is built
//! once and handed to the engine, so tests can run alternate tunings.
//!
//! `Settings` is the process-level configuration read from the environment.

use std::env;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::scoring::{EliteLevel, LevelTier};
use crate::signals::SignalName;

/// ---------------------------------------------------------------------------
/// Environment Variables
/// ---------------------------------------------------------------------------

const DATABASE_URL_VAR: &str = "DATABASE_URL";
const VALIDATOR_URL_VAR: &str = "TRUTHSYNTAX_URL";
const VALIDATOR_KEY_VAR: &str = "TRUTHSYNTAX_API_KEY";
const VALIDATOR_TIMEOUT_VAR: &str = "TRUTHSYNTAX_TIMEOUT_SECS";

const DEFAULT_DATABASE_URL: &str = "sqlite://elite-score.db?mode=rwc";
const DEFAULT_VALIDATOR_TIMEOUT_SECS: u64 = 5;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {name}: {value}")]
  InvalidValue { name: String, value: String },

  #[error("At least one level must be configured")]
  NoLevels,
}

/// ---------------------------------------------------------------------------
/// Signal Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
  pub weight: f64,
  /// Confidence assigned before external validation. The data integrity
  /// signal computes its own and ignores this value.
  pub base_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
  pub performance: SignalConfig,
  pub consistency: SignalConfig,
  pub data_integrity: SignalConfig,
  pub progression: SignalConfig,
  pub engagement: SignalConfig,
}

impl SignalSet {
  pub fn get(&self, name: SignalName) -> &SignalConfig {
    match name {
      SignalName::Performance => &self.performance,
      SignalName::Consistency => &self.consistency,
      SignalName::DataIntegrity => &self.data_integrity,
      SignalName::Progression => &self.progression,
      SignalName::Engagement => &self.engagement,
    }
  }
}

impl Default for SignalSet {
  fn default() -> Self {
    Self {
      performance: SignalConfig { weight: 1.5, base_confidence: 0.85 },
      consistency: SignalConfig { weight: 1.2, base_confidence: 0.90 },
      data_integrity: SignalConfig { weight: 1.0, base_confidence: 0.7 },
      progression: SignalConfig { weight: 1.3, base_confidence: 0.82 },
      engagement: SignalConfig { weight: 0.8, base_confidence: 0.88 },
    }
  }
}

/// Thresholds forwarded to the external validator with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorThresholds {
  pub allow: f64,
  pub step_up: f64,
}

impl Default for ValidatorThresholds {
  fn default() -> Self {
    Self { allow: 0.75, step_up: 0.5 }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
  /// The weakest signal only earns a recommendation below this value
  pub weak_signal_threshold: f64,
  /// Consistency below this value earns the routine recommendation
  pub consistency_threshold: f64,
  pub improvement_expiry_days: i64,
  pub consistency_expiry_days: i64,
}

impl Default for RecommendationConfig {
  fn default() -> Self {
    Self {
      weak_signal_threshold: 0.6,
      consistency_threshold: 0.8,
      improvement_expiry_days: 7,
      consistency_expiry_days: 14,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Elite Score Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EliteScoreConfig {
  /// Smoothing factor of the temporal score
  pub alpha: f64,
  /// Signals below this (adjusted) confidence are left out of the instant score
  pub min_confidence: f64,
  pub evaluation_window_days: i64,
  pub signals: SignalSet,
  /// Confidence multiplier applied when the validator is absent or fails
  pub fallback_confidence_factor: f64,
  pub validator_thresholds: ValidatorThresholds,
  pub recommendations: RecommendationConfig,
  pub next_evaluation_hours: i64,
  pub version: String,
  levels: Vec<EliteLevel>,
}

impl Default for EliteScoreConfig {
  fn default() -> Self {
    Self {
      alpha: 0.6,
      min_confidence: 0.7,
      evaluation_window_days: 30,
      signals: SignalSet::default(),
      fallback_confidence_factor: 0.95,
      validator_thresholds: ValidatorThresholds::default(),
      recommendations: RecommendationConfig::default(),
      next_evaluation_hours: 24,
      version: "1.0.0".to_string(),
      levels: default_levels(),
    }
  }
}

impl EliteScoreConfig {
  /// Replace the tier table. Levels are kept sorted highest threshold first.
  pub fn with_levels(mut self, mut levels: Vec<EliteLevel>) -> Result<Self, ConfigError> {
    if levels.is_empty() {
      return Err(ConfigError::NoLevels);
    }
    levels.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
    self.levels = levels;
    Ok(self)
  }

  /// Tier table, highest threshold first
  pub fn levels(&self) -> &[EliteLevel] {
    &self.levels
  }
}

fn default_levels() -> Vec<EliteLevel> {
  vec![
    EliteLevel::new(LevelTier::Professional, "Elite Pro", "💎", 0.9),
    EliteLevel::new(LevelTier::Advanced, "Elite Advanced", "🥇", 0.75),
    EliteLevel::new(LevelTier::Emerging, "Elite Emerging", "🥈", 0.6),
    EliteLevel::new(LevelTier::Foundation, "Elite Foundation", "🥉", 0.0),
  ]
}

/// ---------------------------------------------------------------------------
/// Runtime Settings
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidatorSettings {
  pub base_url: String,
  pub api_key: String,
  pub timeout: StdDuration,
}

#[derive(Debug, Clone)]
pub struct Settings {
  pub database_url: String,
  /// Present only when both the validator URL and key are set
  pub validator: Option<ValidatorSettings>,
}

impl Settings {
  pub fn from_env() -> Result<Self, ConfigError> {
    let database_url = env::var(DATABASE_URL_VAR).unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    let timeout_secs = match env::var(VALIDATOR_TIMEOUT_VAR) {
      Ok(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        name: VALIDATOR_TIMEOUT_VAR.to_string(),
        value: raw.clone(),
      })?,
      Err(_) => DEFAULT_VALIDATOR_TIMEOUT_SECS,
    };

    let validator = match (non_empty_var(VALIDATOR_URL_VAR), non_empty_var(VALIDATOR_KEY_VAR)) {
      (Some(base_url), Some(api_key)) => Some(ValidatorSettings {
        base_url,
        api_key,
        timeout: StdDuration::from_secs(timeout_secs),
      }),
      _ => None,
    };

    Ok(Self {
      database_url,
      validator,
    })
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
