pub mod badges;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod recommendations;
pub mod scoring;
pub mod signals;
pub mod store;
pub mod validator;

#[cfg(test)]
mod test_utils;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{EliteScoreConfig, Settings};
use db::AppState;
use pipeline::EliteScoreEngine;

/// Install the fmt subscriber (RUST_LOG, default `info`) on stderr
pub fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  // A second call (tests, embedding) keeps the first subscriber
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();
  init_logging();

  let cli = cli::Cli::parse();
  let mut settings = Settings::from_env()?;
  if let Some(url) = cli.database_url.clone() {
    settings.database_url = url;
  }

  let db = db::initialize_db(&settings.database_url).await?;
  let engine = EliteScoreEngine::from_settings(EliteScoreConfig::default(), &settings)?;
  let state = AppState { db, engine };
  info!("Database ready");

  let result = cli::dispatch(&state, cli.command).await;
  state.db.close().await;
  result
}
