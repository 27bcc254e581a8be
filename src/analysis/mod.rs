//! Failure classification over detector results.

mod classifier;
mod patterns;

pub use classifier::{
    FailureAnalysis, FailureClassifier, FailureType, Recommendation, ScoreDistribution,
};
pub use patterns::{PatternHit, scan_ai_patterns};
