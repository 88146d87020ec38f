//! Badge evaluation
//!
//! A badge is earned when ANY of its present requirement keys is satisfied.
//! A key set to zero counts as absent, so `{"activities_count": 0}` never
//! unlocks anything on its own.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EliteScoreConfig;
use crate::error::EliteScoreError;
use crate::metrics::TrainingMetrics;
use crate::models::{Badge, BadgeRequirements};
use crate::scoring::resolve_performance_tier;
use crate::signals::Signal;
use crate::store;

// ---------------------------------------------------------------------------
/// Requirement Checks
// ---------------------------------------------------------------------------

pub fn requirements_met(
    requirements: &BadgeRequirements,
    metrics: &TrainingMetrics,
    signals: &[Signal],
    config: &EliteScoreConfig,
) -> bool {
    if let Some(count) = requirements.activities_count.filter(|c| *c > 0) {
        if metrics.workouts_completed >= count as usize {
            return true;
        }
    }

    if let Some(km) = requirements.total_distance_km.filter(|k| *k != 0.0) {
        if metrics.total_distance_km() >= km {
            return true;
        }
    }

    // Lower pace is faster; the requirement is the slowest pace that still counts
    if let Some(pace) = requirements.average_pace_max.filter(|p| *p != 0.0) {
        if metrics.average_pace <= pace {
            return true;
        }
    }

    if let Some(tier) = requirements.elite_tier {
        if resolve_performance_tier(signals, config) == tier {
            return true;
        }
    }

    false
}

/// Catalog badges the user does not hold yet and now qualifies for
pub fn eligible_badges<'a>(
    catalog: &'a [Badge],
    held: &std::collections::HashSet<i64>,
    metrics: &TrainingMetrics,
    signals: &[Signal],
    config: &EliteScoreConfig,
) -> Vec<&'a Badge> {
    catalog
        .iter()
        .filter(|badge| !held.contains(&badge.id))
        .filter(|badge| requirements_met(&badge.requirements, metrics, signals, config))
        .collect()
}

// ---------------------------------------------------------------------------
/// Awarding
// ---------------------------------------------------------------------------

/// Award every newly qualifying badge against `score_id`.
///
/// Reading the catalog or the held set can fail the run. A failed insert for
/// one badge is logged and skipped. A badge already written by a concurrent
/// run is not reported as newly awarded.
pub async fn award_badges(
    pool: &SqlitePool,
    user_id: Uuid,
    score_id: i64,
    metrics: &TrainingMetrics,
    signals: &[Signal],
    config: &EliteScoreConfig,
    now: DateTime<Utc>,
) -> Result<Vec<Badge>, EliteScoreError> {
    let catalog = store::load_badges(pool).await?;
    let held = store::load_user_badge_ids(pool, user_id).await?;

    let evidence = json!({
        "metrics": metrics,
        "signals": signals.iter().map(|s| s.name).collect::<Vec<_>>(),
    });

    let mut awarded = Vec::new();
    for badge in eligible_badges(&catalog, &held, metrics, signals, config) {
        match store::award_badge(pool, user_id, badge.id, score_id, &evidence, now).await {
            Ok(true) => {
                info!(badge = %badge.name, "Awarded badge");
                awarded.push(badge.clone());
            }
            Ok(false) => {}
            Err(e) => warn!(badge = %badge.name, error = %e, "Failed to award badge"),
        }
    }

    Ok(awarded)
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
