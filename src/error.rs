use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which external collaborator failed mid-attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Generation,
    Detection,
    Subjective,
    Readability,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Generation => "generation",
            Self::Detection => "detection",
            Self::Subjective => "subjective",
            Self::Readability => "readability",
        };
        write!(f, "{}", s)
    }
}

/// Scores of the final failed attempt, attached to terminal exhaustion errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScores {
    pub human_score: f64,
    pub ai_score: f64,
    pub readability_pass: bool,
}

impl std::fmt::Display for FinalScores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "human={:.1} ai={:.3} readability_pass={}",
            self.human_score, self.ai_score, self.readability_pass
        )
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Generation/detector/evaluator unreachable or returned garbage
    /// transport-level output. Fatal per attempt, never recorded as a
    /// scored outcome, retried under the network budget.
    #[error("{service} service failed: {message}")]
    ExternalService {
        service: ServiceKind,
        message: String,
    },

    /// Structurally invalid detector result. Raised immediately, never
    /// coerced to a default.
    #[error("malformed detector result: {0}")]
    MalformedScore(String),

    /// A learner was queried before its minimum-sample threshold. The one
    /// sanctioned fallback boundary: callers catch this explicitly and
    /// use configured static defaults.
    #[error("insufficient learning data: {have} qualifying rows, need {need}")]
    InsufficientLearningData { have: usize, need: usize },

    /// Max attempts with no success. Terminal, surfaced with the full
    /// attempt history attached; never downgraded to partial success.
    #[error("quality exhausted after {attempts} attempts (last: {last_scores})")]
    QualityExhausted {
        attempts: u32,
        last_scores: FinalScores,
        history: Vec<FinalScores>,
    },

    /// A realism tendency referenced a voice/enrichment parameter absent
    /// from the current parameter set. Callers must supply a complete
    /// dictionary, no defaulting.
    #[error("unknown generation parameter: {name}")]
    UnknownParameter { name: String },

    #[error("invalid state transition: {from} -> {to} (allowed: {allowed})")]
    InvalidStateTransition {
        from: String,
        to: String,
        allowed: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("outcome store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    pub fn service(kind: ServiceKind, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: kind,
            message: message.into(),
        }
    }

    /// Service failures are retried under the network budget, distinct
    /// from the quality-retry budget.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::ExternalService { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_failure_classification() {
        let err = EngineError::service(ServiceKind::Detection, "connection refused");
        assert!(err.is_service_failure());

        let err = EngineError::MalformedScore("empty sentence list".into());
        assert!(!err.is_service_failure());
    }

    #[test]
    fn test_exhausted_display_names_last_scores() {
        let err = EngineError::QualityExhausted {
            attempts: 5,
            last_scores: FinalScores {
                human_score: 41.5,
                ai_score: 0.72,
                readability_pass: true,
            },
            history: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempts"));
        assert!(msg.contains("human=41.5"));
    }
}
