//! Session reporting types returned to callers after a run completes.

use serde::{Deserialize, Serialize};

use crate::analysis::FailureType;
use crate::curriculum::CurriculumPhase;
use crate::error::FinalScores;
use crate::learning::WeightSet;

/// One line per attempt, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_number: u32,
    pub human_score: f64,
    pub ai_score: f64,
    /// Weighted combination of the available component scores.
    pub combined_score: f64,
    pub readability_pass: bool,
    pub failure_type: Option<FailureType>,
    pub applied_strategy: Option<String>,
}

/// Aggregate view of a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub subject: String,
    pub component_type: String,
    pub phase: CurriculumPhase,
    pub attempts: Vec<AttemptSummary>,
    pub final_scores: FinalScores,
    pub applied_strategies: Vec<String>,
    pub fresh_regenerations: u32,
}

/// Successful session output: the accepted text plus the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub text: String,
    pub summary: SessionSummary,
    /// Weights in effect when the session scored its drafts.
    pub weights: WeightSet,
}

impl SessionSummary {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}
