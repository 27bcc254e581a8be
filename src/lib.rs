pub mod adjustment;
pub mod analysis;
pub mod api;
pub mod config;
pub mod curriculum;
pub mod error;
pub mod learning;
pub mod session;
pub mod store;

pub use adjustment::{
    Adjustment, AdjustmentSource, ExplorationStrategy, FixStrategyEngine, ParameterSet,
    RealismStrategy, merge_adjustments,
};
pub use analysis::{FailureAnalysis, FailureClassifier, FailureType, Recommendation};
pub use api::{
    DetectorResult, GenerationRequest, Generator, ReadabilityCheck, ReadabilityReport,
    ScoreOracle, SentenceScore, SubjectiveEvaluator, SubjectiveReport,
};
pub use config::EngineConfig;
pub use curriculum::{CurriculumCalculator, CurriculumPhase, ThresholdDecision};
pub use error::{EngineError, FinalScores, Result, ServiceKind};
pub use learning::{WeightCache, WeightLearner, WeightSet};
pub use session::{
    GenerationMode, SessionController, SessionReport, SessionRequest, SessionState,
    SessionSummary,
};
pub use store::{AttemptRecord, NewAttempt, OutcomeStore, SqliteOutcomeStore};
