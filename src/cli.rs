//! Command-line surface over the Elite Score commands
//!
//! Every subcommand prints JSON to stdout. Logs go to stderr.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::commands::elite_score;
use crate::db::AppState;
use crate::models::NewActivity;
use crate::store::Timeframe;

#[derive(Parser, Debug)]
#[command(
  name = "elite-score",
  about = "Elite Score engine",
  long_about = "Score training activity into an Elite Score, award badges and generate recommendations"
)]
pub struct Cli {
  /// Database URL override (defaults to DATABASE_URL)
  #[arg(long, global = true)]
  pub database_url: Option<String>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Run the scoring pipeline for a user
  Calculate {
    #[arg(long)]
    user: Uuid,
  },
  /// Import activities from a JSON array file
  Import {
    #[arg(long)]
    user: Uuid,
    #[arg(long)]
    file: PathBuf,
  },
  /// Show the user's current score
  Score {
    #[arg(long)]
    user: Uuid,
  },
  /// Show the user's score history, oldest first
  History {
    #[arg(long)]
    user: Uuid,
    /// Trailing window in days
    #[arg(long, default_value_t = 30)]
    days: u32,
  },
  /// Report whether the user's score is due for recalculation
  Due {
    #[arg(long)]
    user: Uuid,
  },
  /// Show the leaderboard
  Leaderboard {
    /// day, week, month or all
    #[arg(long, default_value = "all")]
    timeframe: Timeframe,
    #[arg(long, default_value_t = 50)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
  },
  /// Show the user's all-time rank
  Rank {
    #[arg(long)]
    user: Uuid,
  },
  /// List recommendations
  Recommendations {
    #[arg(long)]
    user: Uuid,
    /// Include completed recommendations
    #[arg(long)]
    all: bool,
  },
  /// Mark a recommendation completed
  Complete {
    #[arg(long)]
    id: i64,
  },
  /// List earned badges
  Badges {
    #[arg(long)]
    user: Uuid,
  },
  /// List the full badge catalog
  Catalog,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Execute one subcommand against the initialized state
pub async fn dispatch(state: &AppState, command: Command) -> Result<(), Box<dyn std::error::Error>> {
  match command {
    Command::Calculate { user } => {
      let response = elite_score::calculate_elite_score(state, user).await;
      print_json(&response.body)?;
      if !response.is_success() {
        return Err(format!("calculation failed with status {}", response.status).into());
      }
    }
    Command::Import { user, file } => {
      let raw = std::fs::read_to_string(&file)?;
      let activities: Vec<NewActivity> = serde_json::from_str(&raw)?;
      let ids = elite_score::import_activities(state, user, activities).await?;
      print_json(&ids)?;
    }
    Command::Score { user } => print_json(&elite_score::get_current_score(state, user).await?)?,
    Command::History { user, days } => {
      print_json(&elite_score::get_score_history(state, user, days, Utc::now()).await?)?
    }
    Command::Due { user } => {
      let due = elite_score::needs_recalculation(state, user, Utc::now()).await?;
      print_json(&serde_json::json!({ "needsRecalculation": due }))?;
    }
    Command::Leaderboard {
      timeframe,
      limit,
      offset,
    } => print_json(&elite_score::get_leaderboard(state, timeframe, limit, offset).await?)?,
    Command::Rank { user } => print_json(&elite_score::get_user_rank(state, user).await?)?,
    Command::Recommendations { user, all } => {
      print_json(&elite_score::get_recommendations(state, user, all).await?)?
    }
    Command::Complete { id } => {
      elite_score::complete_recommendation(state, id).await?;
      print_json(&serde_json::json!({ "completed": id }))?;
    }
    Command::Badges { user } => print_json(&elite_score::get_user_badges(state, user).await?)?,
    Command::Catalog => print_json(&elite_score::get_all_badges(state).await?)?,
  }
  Ok(())
}
