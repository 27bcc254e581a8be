mod settings;

pub use settings::{
    ClassifierConfig, CurriculumConfig, EngineConfig, ExplorationConfig, GenerationConfig,
    LearningConfig, RetryConfig, StoreConfig,
};
