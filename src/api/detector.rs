use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One sentence with its detector humanness score, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceScore {
    pub text: String,
    pub score: f64,
}

/// Raw result from the external detector. Read-only input downstream;
/// the classifier derives everything else from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    /// Machine-authorship likelihood, 0 = human, 1 = machine.
    pub ai_score: f64,
    /// Humanness estimate, 0-100.
    pub human_score: f64,
    pub sentence_scores: Vec<SentenceScore>,
}

impl DetectorResult {
    /// Without the per-sentence array the detector degrades to
    /// pattern-only mode, which must never be recorded as ground truth.
    pub fn has_sentence_detail(&self) -> bool {
        !self.sentence_scores.is_empty()
    }

    /// Eager structural validation. Malformed input raises immediately,
    /// never coerced to a default.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ai_score) || !self.ai_score.is_finite() {
            return Err(EngineError::MalformedScore(format!(
                "ai_score {} outside [0,1]",
                self.ai_score
            )));
        }
        if !(0.0..=100.0).contains(&self.human_score) || !self.human_score.is_finite() {
            return Err(EngineError::MalformedScore(format!(
                "human_score {} outside [0,100]",
                self.human_score
            )));
        }
        for (i, sentence) in self.sentence_scores.iter().enumerate() {
            if !sentence.score.is_finite() || !(0.0..=100.0).contains(&sentence.score) {
                return Err(EngineError::MalformedScore(format!(
                    "sentence {} score {} outside [0,100]",
                    i, sentence.score
                )));
            }
        }
        Ok(())
    }
}

/// Adapter over the external AI-detection service.
///
/// Implementations must fail loudly when the detector is unreachable;
/// returning a substitute score in place of an error is forbidden. Retry
/// policy belongs to the session controller, not this adapter.
#[async_trait]
pub trait ScoreOracle: Send + Sync {
    async fn detect(&self, text: &str) -> Result<DetectorResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ai: f64, human: f64, sentences: &[f64]) -> DetectorResult {
        DetectorResult {
            ai_score: ai,
            human_score: human,
            sentence_scores: sentences
                .iter()
                .map(|&s| SentenceScore {
                    text: "x".into(),
                    score: s,
                })
                .collect(),
        }
    }

    #[test]
    fn test_valid_result_passes() {
        assert!(result(0.3, 72.0, &[80.0, 65.0]).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_scores_rejected() {
        assert!(result(1.5, 72.0, &[80.0]).validate().is_err());
        assert!(result(0.3, 120.0, &[80.0]).validate().is_err());
        assert!(result(0.3, 72.0, &[80.0, -5.0]).validate().is_err());
        assert!(result(0.3, f64::NAN, &[80.0]).validate().is_err());
    }

    #[test]
    fn test_sentence_detail_detection() {
        assert!(result(0.3, 72.0, &[80.0]).has_sentence_detail());
        assert!(!result(0.3, 72.0, &[]).has_sentence_detail());
    }
}
