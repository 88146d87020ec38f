//! External signal validation
//!
//! The validator adjusts signal confidence before scoring. Two strategies:
//! - `TruthSyntaxValidator`: POSTs the signals to the evaluation service and
//!   scales every confidence by the returned aggregate
//! - `FallbackValidator`: used when the service is not configured
//!
//! Validation never fails a scoring run. Any error, timeout or non-2xx answer
//! degrades confidence by the configured fallback factor instead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::{EliteScoreConfig, ValidatorSettings, ValidatorThresholds};
use crate::signals::{Signal, SignalName};

const EVALUATE_PATH: &str = "evc/evaluate";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ValidatorError {
  #[error("Invalid validator URL: {0}")]
  InvalidUrl(String),

  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("API error: HTTP {0}")]
  Api(u16),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Strategy
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait SignalValidator: Send + Sync {
  /// Return the signals with adjusted confidence
  async fn validate(&self, signals: Vec<Signal>) -> Vec<Signal>;
}

/// Scale every confidence by `factor`, capped at 1
pub fn scale_confidence(signals: Vec<Signal>, factor: f64) -> Vec<Signal> {
  let factor = factor.max(0.0);
  signals
    .into_iter()
    .map(|mut s| {
      s.confidence = (s.confidence * factor).min(1.0);
      s
    })
    .collect()
}

/// Select the strategy from configuration presence
pub fn from_settings(
  settings: Option<&ValidatorSettings>,
  config: &EliteScoreConfig,
) -> Result<Box<dyn SignalValidator>, ValidatorError> {
  match settings {
    Some(settings) => Ok(Box::new(TruthSyntaxValidator::new(settings, config)?)),
    None => {
      warn!("Signal validator not configured, degrading confidence by fallback factor");
      Ok(Box::new(FallbackValidator::new(config.fallback_confidence_factor)))
    }
  }
}

/// ---------------------------------------------------------------------------
/// Fallback
/// ---------------------------------------------------------------------------

pub struct FallbackValidator {
  factor: f64,
}

impl FallbackValidator {
  pub fn new(factor: f64) -> Self {
    Self { factor }
  }
}

#[async_trait]
impl SignalValidator for FallbackValidator {
  async fn validate(&self, signals: Vec<Signal>) -> Vec<Signal> {
    scale_confidence(signals, self.factor)
  }
}

/// ---------------------------------------------------------------------------
/// TruthSyntax Evaluation Service
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EvaluateRequest {
  signals: Vec<EvaluateSignal>,
  alpha: f64,
  thresholds: ValidatorThresholds,
}

#[derive(Debug, Serialize)]
struct EvaluateSignal {
  name: SignalName,
  value: f64,
  weight: f64,
  /// Evidence is sent as an encoded JSON string
  evidence: String,
}

#[derive(Debug, Deserialize)]
struct EvaluateResponse {
  aggregate: f64,
}

pub struct TruthSyntaxValidator {
  client: Client,
  endpoint: Url,
  api_key: String,
  alpha: f64,
  thresholds: ValidatorThresholds,
  fallback_factor: f64,
}

impl TruthSyntaxValidator {
  pub fn new(settings: &ValidatorSettings, config: &EliteScoreConfig) -> Result<Self, ValidatorError> {
    let base = format!("{}/", settings.base_url.trim_end_matches('/'));
    let endpoint = Url::parse(&base)
      .and_then(|url| url.join(EVALUATE_PATH))
      .map_err(|e| ValidatorError::InvalidUrl(format!("{}: {}", settings.base_url, e)))?;

    let client = Client::builder().timeout(settings.timeout).build()?;

    Ok(Self {
      client,
      endpoint,
      api_key: settings.api_key.clone(),
      alpha: config.alpha,
      thresholds: config.validator_thresholds,
      fallback_factor: config.fallback_confidence_factor,
    })
  }

  /// Ask the service for its aggregate confidence multiplier
  async fn evaluate(&self, signals: &[Signal]) -> Result<f64, ValidatorError> {
    let request = EvaluateRequest {
      signals: signals
        .iter()
        .map(|s| EvaluateSignal {
          name: s.name,
          value: s.value,
          weight: s.weight,
          evidence: serde_json::Value::Object(s.evidence.clone()).to_string(),
        })
        .collect(),
      alpha: self.alpha,
      thresholds: self.thresholds,
    };

    let response = self
      .client
      .post(self.endpoint.clone())
      .bearer_auth(&self.api_key)
      .json(&request)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(ValidatorError::Api(status.as_u16()));
    }

    let body: EvaluateResponse = response
      .json()
      .await
      .map_err(|e| ValidatorError::Parse(e.to_string()))?;

    if !body.aggregate.is_finite() {
      return Err(ValidatorError::Parse(format!("non-finite aggregate {}", body.aggregate)));
    }

    Ok(body.aggregate)
  }
}

#[async_trait]
impl SignalValidator for TruthSyntaxValidator {
  async fn validate(&self, signals: Vec<Signal>) -> Vec<Signal> {
    match self.evaluate(&signals).await {
      Ok(aggregate) => {
        info!(aggregate, "Signal validation succeeded");
        scale_confidence(signals, aggregate)
      }
      Err(e) => {
        warn!(error = %e, "Signal validation failed, using fallback confidence");
        scale_confidence(signals, self.fallback_factor)
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
