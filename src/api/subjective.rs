use std::collections::BTreeSet;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Structured report from the external subjective-content evaluator.
/// Schema-enforced at the API level; the realism-tendency strategy
/// consumes the tendency tags, the weight learner the realism score.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubjectiveReport {
    /// 0-10 realism estimate.
    pub realism_score: f64,
    /// Named stylistic patterns flagged as characteristic of machine
    /// prose, e.g. "formulaic_phrasing".
    pub ai_tendencies: BTreeSet<String>,
    pub voice_authenticity: f64,
    pub tonal_consistency: f64,
}

impl SubjectiveReport {
    /// Realism normalized to [0,1] for the weight learner.
    pub fn normalized_realism(&self) -> f64 {
        (self.realism_score / 10.0).clamp(0.0, 1.0)
    }
}

#[async_trait]
pub trait SubjectiveEvaluator: Send + Sync {
    async fn evaluate(&self, text: &str) -> Result<SubjectiveReport>;
}
