pub mod elite_score;

use serde::Serialize;

use crate::error::EliteScoreError;

/// ---------------------------------------------------------------------------
/// Response Envelope
/// ---------------------------------------------------------------------------

/// JSON body plus its HTTP-equivalent status
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
  pub status: u16,
  pub body: serde_json::Value,
}

impl CommandResponse {
  pub fn ok<T: Serialize>(data: T) -> Result<Self, EliteScoreError> {
    let data = serde_json::to_value(data)?;
    Ok(Self {
      status: 200,
      body: serde_json::json!({ "success": true, "data": data }),
    })
  }

  /// `{error, message}` for user-facing failures, `{error, stack}` otherwise
  pub fn from_error(error: &EliteScoreError) -> Self {
    let status = error.status_code();
    let body = match error {
      EliteScoreError::NoActivities => serde_json::json!({
        "error": error.to_string(),
        "message": "You need at least one activity to calculate your Elite Score",
      }),
      EliteScoreError::NotFound(_) | EliteScoreError::InvalidActivity(_) => serde_json::json!({
        "error": error.to_string(),
        "message": error.to_string(),
      }),
      _ => serde_json::json!({
        "error": error.to_string(),
        "stack": format!("{:?}", error),
      }),
    };
    Self { status, body }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

impl From<Result<CommandResponse, EliteScoreError>> for CommandResponse {
  fn from(result: Result<CommandResponse, EliteScoreError>) -> Self {
    result.unwrap_or_else(|e| Self::from_error(&e))
  }
}
