//! Seams for the four external collaborators: the generation API, the
//! AI-detection oracle, the subjective/realism evaluator, and the
//! readability gauge. Each is an attempt-fatal boundary: transport failure
//! surfaces as `ExternalService` and is never coerced into a scored
//! outcome; that would poison the learning ledger.

mod detector;
mod generator;
mod readability;
mod subjective;

pub use detector::{DetectorResult, ScoreOracle, SentenceScore};
pub use generator::{GenerationRequest, Generator};
pub use readability::{ReadabilityCheck, ReadabilityReport};
pub use subjective::{SubjectiveEvaluator, SubjectiveReport};
