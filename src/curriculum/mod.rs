//! Curriculum thresholds: the acceptance bar tightens automatically as a
//! (subject, component) pair accumulates success history, instead of one
//! fixed global bar.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CurriculumConfig;
use crate::error::Result;
use crate::store::OutcomeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurriculumPhase {
    /// No track record yet: lenient bar.
    Learning,
    Improving,
    /// Full strictness.
    Mature,
}

impl std::fmt::Display for CurriculumPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Learning => "Learning",
            Self::Improving => "Improving",
            Self::Mature => "Mature",
        };
        write!(f, "{}", s)
    }
}

/// Phase-resolved acceptance gates for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDecision {
    pub phase: CurriculumPhase,
    /// Upper bound on the detector ai score.
    pub ai_threshold: f64,
    /// Lower bound on the detector human score.
    pub human_target: f64,
    pub success_rate: f64,
    pub samples: usize,
}

pub struct CurriculumCalculator {
    config: CurriculumConfig,
}

impl CurriculumCalculator {
    pub fn new(config: CurriculumConfig) -> Self {
        Self { config }
    }

    /// Resolve the acceptance gates for a (subject, component) pair from
    /// its trailing window of attempts.
    pub async fn threshold(
        &self,
        store: &dyn OutcomeStore,
        subject: &str,
        component_type: &str,
    ) -> Result<ThresholdDecision> {
        let since = Utc::now() - Duration::days(self.config.window_days);
        let attempts = store
            .query_subject_component(subject, component_type, since)
            .await?;

        let total = attempts.len();
        let successes = attempts.iter().filter(|a| a.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        };

        let decision = self.decide(total, success_rate);
        debug!(
            subject,
            component_type,
            phase = %decision.phase,
            ai_threshold = decision.ai_threshold,
            success_rate,
            samples = total,
            "Curriculum threshold resolved"
        );
        Ok(decision)
    }

    fn decide(&self, total: usize, success_rate: f64) -> ThresholdDecision {
        let c = &self.config;
        let (phase, multiplier) =
            if total < c.learning_min_total || success_rate < c.learning_max_success_rate {
                (CurriculumPhase::Learning, c.learning_multiplier)
            } else if total < c.improving_min_total || success_rate < c.improving_max_success_rate {
                (CurriculumPhase::Improving, c.improving_multiplier)
            } else {
                (CurriculumPhase::Mature, 1.0)
            };

        ThresholdDecision {
            phase,
            ai_threshold: (c.base_ai_threshold * multiplier).min(c.threshold_cap),
            // The human target relaxes by the same factor while learning
            // so both gates tighten together.
            human_target: c.base_human_target / multiplier,
            success_rate,
            samples: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> CurriculumCalculator {
        CurriculumCalculator::new(CurriculumConfig::default())
    }

    #[test]
    fn test_no_history_is_learning() {
        let decision = calculator().decide(0, 0.0);
        assert_eq!(decision.phase, CurriculumPhase::Learning);
        assert!((decision.ai_threshold - 0.4 * 1.33).abs() < 1e-12);
    }

    #[test]
    fn test_low_success_rate_stays_learning_despite_volume() {
        let decision = calculator().decide(40, 0.05);
        assert_eq!(decision.phase, CurriculumPhase::Learning);
    }

    #[test]
    fn test_improving_band() {
        let decision = calculator().decide(10, 0.2);
        assert_eq!(decision.phase, CurriculumPhase::Improving);
        assert!((decision.ai_threshold - 0.4 * 1.10).abs() < 1e-12);
    }

    #[test]
    fn test_mature_uses_base() {
        let decision = calculator().decide(20, 0.35);
        assert_eq!(decision.phase, CurriculumPhase::Mature);
        assert!((decision.ai_threshold - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_tightens_across_phases() {
        let learning = calculator().decide(3, 0.05);
        let mature = calculator().decide(20, 0.35);
        assert_eq!(learning.phase, CurriculumPhase::Learning);
        assert_eq!(mature.phase, CurriculumPhase::Mature);
        assert!(mature.ai_threshold < learning.ai_threshold);
        assert!(mature.human_target > learning.human_target);
    }

    #[test]
    fn test_cap_bounds_lenient_threshold() {
        let config = CurriculumConfig {
            base_ai_threshold: 0.9,
            ..CurriculumConfig::default()
        };
        let decision = CurriculumCalculator::new(config).decide(0, 0.0);
        assert!((decision.ai_threshold - 0.95).abs() < 1e-12);
    }
}
