//! Score combination and tier resolution
//!
//! - instant score: confidence-gated weighted mean of this run's signals
//! - temporal score: first-order exponential moving average across runs
//! - level: tier lookup of the temporal score
//! - performance tier: the same lookup applied to the performance signal
//!   alone, used only by badge requirements

use serde::{Deserialize, Serialize};

use crate::config::EliteScoreConfig;
use crate::signals::{find_signal, Signal, SignalName};

// ---------------------------------------------------------------------------
/// Level Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelTier {
    Professional,
    Advanced,
    Emerging,
    Foundation,
}

impl std::fmt::Display for LevelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Professional => write!(f, "PROFESSIONAL"),
            Self::Advanced => write!(f, "ADVANCED"),
            Self::Emerging => write!(f, "EMERGING"),
            Self::Foundation => write!(f, "FOUNDATION"),
        }
    }
}

impl std::str::FromStr for LevelTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROFESSIONAL" => Ok(Self::Professional),
            "ADVANCED" => Ok(Self::Advanced),
            "EMERGING" => Ok(Self::Emerging),
            "FOUNDATION" => Ok(Self::Foundation),
            _ => Err(format!("Unknown level tier: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliteLevel {
    pub tier: LevelTier,
    pub label: String,
    pub icon: String,
    /// Inclusive lower bound
    pub threshold: f64,
}

impl EliteLevel {
    pub fn new(tier: LevelTier, label: &str, icon: &str, threshold: f64) -> Self {
        Self {
            tier,
            label: label.to_string(),
            icon: icon.to_string(),
            threshold,
        }
    }
}

// ---------------------------------------------------------------------------
/// Score Combination
// ---------------------------------------------------------------------------

/// Weighted mean over signals whose confidence clears `min_confidence`.
/// Returns 0 when no signal qualifies.
pub fn instant_score(signals: &[Signal], min_confidence: f64) -> f64 {
    let (weighted_sum, total_weight) = signals
        .iter()
        .filter(|s| s.confidence >= min_confidence)
        .fold((0.0, 0.0), |(sum, weight), s| {
            (sum + s.value * s.weight * s.confidence, weight + s.weight)
        });

    if total_weight > 0.0 {
        (weighted_sum / total_weight).min(1.0)
    } else {
        0.0
    }
}

/// Blend this run's instant score into the previous temporal score.
/// Without history the instant score is taken as is.
pub fn temporal_score(instant: f64, previous_temporal: Option<f64>, alpha: f64) -> f64 {
    match previous_temporal {
        Some(previous) => alpha * instant + (1.0 - alpha) * previous,
        None => instant,
    }
}

// ---------------------------------------------------------------------------
/// Tier Resolution
// ---------------------------------------------------------------------------

fn lookup_level(score: f64, config: &EliteScoreConfig) -> EliteLevel {
    let levels = config.levels();
    levels
        .iter()
        .find(|level| score >= level.threshold)
        .or_else(|| levels.last())
        .cloned()
        .unwrap_or_else(|| EliteLevel::new(LevelTier::Foundation, "Elite Foundation", "🥉", 0.0))
}

/// User-facing level derived from the temporal score
pub fn resolve_level(temporal_score: f64, config: &EliteScoreConfig) -> EliteLevel {
    lookup_level(temporal_score, config)
}

/// Tier of the performance signal value on its own (0 when absent)
pub fn resolve_performance_tier(signals: &[Signal], config: &EliteScoreConfig) -> LevelTier {
    let performance = find_signal(signals, SignalName::Performance)
        .map(|s| s.value)
        .unwrap_or(0.0);
    lookup_level(performance, config).tier
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use crate::test_utils::mock_signal;

    const ALPHA: f64 = 0.6;

    #[test]
    fn test_instant_score_weighted_by_confidence() {
        let signals = vec![
            mock_signal(SignalName::Performance, 0.8, 1.5, 0.9),
            mock_signal(SignalName::Consistency, 0.6, 1.0, 0.8),
        ];

        let score = instant_score(&signals, 0.7);

        let expected = (0.8 * 1.5 * 0.9 + 0.6 * 1.0 * 0.8) / 2.5;
        assert_approx_eq!(score, expected, 1e-12);
    }

    #[test]
    fn test_instant_score_skips_low_confidence() {
        let signals = vec![
            mock_signal(SignalName::Performance, 1.0, 1.0, 1.0),
            mock_signal(SignalName::DataIntegrity, 0.0, 5.0, 0.69),
        ];
        assert_approx_eq!(instant_score(&signals, 0.7), 1.0, 1e-12);
    }

    #[test]
    fn test_instant_score_zero_when_nothing_qualifies() {
        let signals = vec![
            mock_signal(SignalName::Performance, 0.9, 1.5, 0.5),
            mock_signal(SignalName::Engagement, 0.9, 0.8, 0.65),
        ];
        assert_eq!(instant_score(&signals, 0.7), 0.0);
        assert_eq!(instant_score(&[], 0.7), 0.0);
    }

    #[test]
    fn test_instant_score_stays_in_unit_interval() {
        for value in [0.0, 0.25, 0.5, 0.75, 1.0] {
            for confidence in [0.7, 0.85, 1.0] {
                let signals: Vec<Signal> = SignalName::ALL
                    .into_iter()
                    .map(|name| mock_signal(name, value, 1.3, confidence))
                    .collect();
                let score = instant_score(&signals, 0.7);
                assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
            }
        }
    }

    #[test]
    fn test_temporal_cold_start_is_instant() {
        assert_eq!(temporal_score(0.42, None, ALPHA), 0.42);
    }

    #[test]
    fn test_temporal_is_convex_blend() {
        assert_approx_eq!(temporal_score(0.8, Some(0.5), ALPHA), 0.68, 1e-12);
    }

    #[test]
    fn test_temporal_damps_single_extreme_run() {
        let prior = 0.5;
        let spiked = temporal_score(1.0, Some(prior), ALPHA);
        // The jump is the instant delta shrunk by alpha; the prior keeps (1 - alpha)
        assert_approx_eq!(spiked - prior, (1.0 - prior) * ALPHA, 1e-12);
        assert_approx_eq!(spiked, ALPHA * 1.0 + (1.0 - ALPHA) * prior, 1e-12);
    }

    #[test]
    fn test_temporal_converges_to_constant_instant() {
        let mut temporal = 0.1;
        for _ in 0..40 {
            temporal = temporal_score(0.9, Some(temporal), ALPHA);
        }
        assert_approx_eq!(temporal, 0.9, 1e-9);
    }

    #[test]
    fn test_resolve_level_thresholds() {
        let config = EliteScoreConfig::default();
        assert_eq!(resolve_level(0.95, &config).tier, LevelTier::Professional);
        assert_eq!(resolve_level(0.80, &config).tier, LevelTier::Advanced);
        assert_eq!(resolve_level(0.65, &config).tier, LevelTier::Emerging);
        assert_eq!(resolve_level(0.10, &config).tier, LevelTier::Foundation);
        assert_eq!(resolve_level(0.90, &config).tier, LevelTier::Professional);
        assert_eq!(resolve_level(0.0, &config).tier, LevelTier::Foundation);
    }

    #[test]
    fn test_resolve_level_carries_display_fields() {
        let config = EliteScoreConfig::default();
        let level = resolve_level(0.76, &config);
        assert_eq!(level.label, "Elite Advanced");
        assert_eq!(level.icon, "🥇");
        assert_eq!(level.threshold, 0.75);
    }

    #[test]
    fn test_performance_tier_ignores_other_signals() {
        let config = EliteScoreConfig::default();
        let signals = vec![
            mock_signal(SignalName::Performance, 0.92, 1.5, 0.85),
            mock_signal(SignalName::Consistency, 0.1, 1.2, 0.9),
        ];
        assert_eq!(resolve_performance_tier(&signals, &config), LevelTier::Professional);

        let without = vec![mock_signal(SignalName::Consistency, 0.99, 1.2, 0.9)];
        assert_eq!(resolve_performance_tier(&without, &config), LevelTier::Foundation);
    }

    #[test]
    fn test_level_tier_string_forms() {
        assert_eq!(LevelTier::Emerging.to_string(), "EMERGING");
        assert_eq!("ADVANCED".parse::<LevelTier>(), Ok(LevelTier::Advanced));
        assert_eq!(serde_json::to_string(&LevelTier::Professional).unwrap(), "\"PROFESSIONAL\"");
    }
}
