use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{DetectorResult, SentenceScore};
use crate::config::ClassifierConfig;
use crate::error::{EngineError, Result};

use super::patterns::{PatternHit, scan_ai_patterns};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Systemically bad: near-uniform terrible sentences. Not incidental,
    /// so retrying on variance alone is wasted budget.
    Uniform,
    /// At least one viable sentence exists; the parameter region works.
    Partial,
    /// Middling scores with no standout sentence.
    Borderline,
    /// Fallback when nothing else matches.
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Retry,
    AdjustTemperature,
    RetryOnce,
    /// Terminal classification, applied by the session controller when
    /// the attempt budget runs out.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub excellent: usize,
    pub good: usize,
    pub poor: usize,
    pub terrible: usize,
}

impl ScoreDistribution {
    pub fn total(&self) -> usize {
        self.excellent + self.good + self.poor + self.terrible
    }
}

/// Pure function of a `DetectorResult`: identical input yields identical
/// output on repeated calls. Recomputed per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub failure_type: FailureType,
    pub retry_worth: bool,
    pub recommendation: Recommendation,
    pub worst_sentences: Vec<SentenceScore>,
    pub detected_patterns: Vec<PatternHit>,
    pub distribution: ScoreDistribution,
}

pub struct FailureClassifier {
    config: ClassifierConfig,
}

impl FailureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, result: &DetectorResult) -> Result<FailureAnalysis> {
        result.validate()?;
        if result.sentence_scores.is_empty() {
            return Err(EngineError::MalformedScore(
                "sentence score array is empty".into(),
            ));
        }

        let distribution = self.bucket(&result.sentence_scores);
        let (failure_type, retry_worth, recommendation) = self.apply_rules(&distribution);

        let mut sorted: Vec<SentenceScore> = result.sentence_scores.clone();
        sorted.sort_by(|a, b| a.score.total_cmp(&b.score));
        sorted.truncate(self.config.max_worst_sentences);

        let detected_patterns = scan_ai_patterns(&sorted, self.config.max_pattern_hits);

        debug!(
            ?failure_type,
            retry_worth,
            mean = distribution.mean,
            patterns = detected_patterns.len(),
            "Detector result classified"
        );

        Ok(FailureAnalysis {
            failure_type,
            retry_worth,
            recommendation,
            worst_sentences: sorted,
            detected_patterns,
            distribution,
        })
    }

    fn bucket(&self, sentences: &[SentenceScore]) -> ScoreDistribution {
        let c = &self.config;
        let mut dist = ScoreDistribution {
            mean: 0.0,
            min: f64::MAX,
            max: f64::MIN,
            excellent: 0,
            good: 0,
            poor: 0,
            terrible: 0,
        };

        let mut sum = 0.0;
        for s in sentences {
            sum += s.score;
            dist.min = dist.min.min(s.score);
            dist.max = dist.max.max(s.score);
            if s.score >= c.excellent_cutoff {
                dist.excellent += 1;
            } else if s.score >= c.good_cutoff {
                dist.good += 1;
            } else if s.score >= c.poor_cutoff {
                dist.poor += 1;
            } else {
                dist.terrible += 1;
            }
        }
        dist.mean = sum / sentences.len() as f64;
        dist
    }

    /// Ordered rules, first match wins. `retry_worth` is false for every
    /// systemic classification (Uniform, Poor).
    fn apply_rules(&self, dist: &ScoreDistribution) -> (FailureType, bool, Recommendation) {
        let c = &self.config;
        let terrible_share = dist.terrible as f64 / dist.total() as f64;

        if dist.mean < c.uniform_mean_cutoff && terrible_share >= c.uniform_terrible_share {
            return (FailureType::Uniform, false, Recommendation::AdjustTemperature);
        }
        if dist.excellent + dist.good >= 1 {
            return (FailureType::Partial, true, Recommendation::Retry);
        }
        if dist.mean >= c.poor_cutoff && dist.mean < c.good_cutoff {
            return (FailureType::Borderline, true, Recommendation::RetryOnce);
        }
        (FailureType::Poor, false, Recommendation::AdjustTemperature)
    }
}
