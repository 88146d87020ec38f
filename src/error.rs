use serde::Serialize;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EliteScoreError {
  #[error("No activities found")]
  NoActivities,

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Invalid stored record: {0}")]
  InvalidRecord(String),

  #[error("Invalid activity: {0}")]
  InvalidActivity(String),

  #[error("Not found: {0}")]
  NotFound(String),
}

impl EliteScoreError {
  /// HTTP-equivalent status for the error envelope
  pub fn status_code(&self) -> u16 {
    match self {
      Self::NoActivities | Self::InvalidActivity(_) => 400,
      Self::NotFound(_) => 404,
      _ => 500,
    }
  }
}

impl Serialize for EliteScoreError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}
