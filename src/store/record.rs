use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adjustment::{Adjustment, ParameterSet};

/// One scored attempt, exactly as persisted. Created once, append-only,
/// never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: i64,
    pub subject: String,
    pub component_type: String,
    pub attempt_number: u32,
    pub parameters: ParameterSet,
    pub generated_text: String,
    /// Detector humanness score, 0-100.
    pub detector_score: f64,
    pub ai_score: f64,
    /// 0-10 from the subjective evaluator; absent in simple mode.
    pub subjective_score: Option<f64>,
    /// 0-100; absent in simple mode.
    pub readability_score: Option<f64>,
    pub readability_pass: bool,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Qualifies for the weight learner when both non-detector scores
    /// could in principle be combined (subjective present; readability
    /// may be absent and degrades the fit to two weights).
    pub fn is_qualifying(&self) -> bool {
        self.subjective_score.is_some()
    }
}

/// An attempt awaiting its ledger id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttempt {
    pub subject: String,
    pub component_type: String,
    pub attempt_number: u32,
    pub parameters: ParameterSet,
    pub generated_text: String,
    pub detector_score: f64,
    pub ai_score: f64,
    pub subjective_score: Option<f64>,
    pub readability_score: Option<f64>,
    pub readability_pass: bool,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl NewAttempt {
    pub fn into_record(self, id: i64) -> AttemptRecord {
        AttemptRecord {
            id,
            subject: self.subject,
            component_type: self.component_type,
            attempt_number: self.attempt_number,
            parameters: self.parameters,
            generated_text: self.generated_text,
            detector_score: self.detector_score,
            ai_score: self.ai_score,
            subjective_score: self.subjective_score,
            readability_score: self.readability_score,
            readability_pass: self.readability_pass,
            success: self.success,
            created_at: self.created_at,
        }
    }
}

/// Audit row for the realism-tendency learning path: which tendencies
/// were observed, what adjustment was proposed, and whether the session
/// eventually succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TendencyEvent {
    pub id: i64,
    pub subject: String,
    pub tendencies: BTreeSet<String>,
    pub adjustments: Adjustment,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTendencyEvent {
    pub subject: String,
    pub tendencies: BTreeSet<String>,
    pub adjustments: Adjustment,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}
