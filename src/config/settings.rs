use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub generation: GenerationConfig,
    pub classifier: ClassifierConfig,
    pub curriculum: CurriculumConfig,
    pub learning: LearningConfig,
    pub exploration: ExplorationConfig,
    pub retry: RetryConfig,
    pub store: StoreConfig,
}

impl EngineConfig {
    pub async fn load(engine_dir: &Path) -> Result<Self> {
        let config_path = engine_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, engine_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = engine_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        // Generation validation
        if !(0.0..=2.0).contains(&self.generation.base_temperature) {
            errors.push("generation.base_temperature must be between 0.0 and 2.0");
        }
        if self.generation.max_tokens == 0 {
            errors.push("generation.max_tokens must be greater than 0");
        }
        for (name, value) in self
            .generation
            .voice_defaults
            .iter()
            .chain(self.generation.enrichment_defaults.iter())
        {
            if !(0.0..=1.0).contains(value) {
                tracing::warn!(param = %name, value, "Parameter default out of range");
                errors.push("generation voice/enrichment defaults must be between 0.0 and 1.0");
                break;
            }
        }

        // Classifier bucket cut-offs must be ordered
        let c = &self.classifier;
        if !(c.poor_cutoff < c.good_cutoff && c.good_cutoff < c.excellent_cutoff) {
            errors.push("classifier cut-offs must satisfy poor < good < excellent");
        }
        if !(0.0..=100.0).contains(&c.uniform_mean_cutoff) {
            errors.push("classifier.uniform_mean_cutoff must be between 0 and 100");
        }
        if !(0.0..=1.0).contains(&c.uniform_terrible_share) {
            errors.push("classifier.uniform_terrible_share must be between 0.0 and 1.0");
        }

        // Curriculum validation
        let cu = &self.curriculum;
        if cu.learning_multiplier < cu.improving_multiplier {
            errors.push("curriculum.learning_multiplier must be >= improving_multiplier");
        }
        if cu.improving_multiplier < 1.0 {
            errors.push("curriculum.improving_multiplier must be >= 1.0");
        }
        if !(0.0..=1.0).contains(&cu.base_ai_threshold) {
            errors.push("curriculum.base_ai_threshold must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&cu.threshold_cap) {
            errors.push("curriculum.threshold_cap must be between 0.0 and 1.0");
        }
        if !(0.0..=100.0).contains(&cu.base_human_target) {
            errors.push("curriculum.base_human_target must be between 0 and 100");
        }
        if cu.window_days <= 0 {
            errors.push("curriculum.window_days must be positive");
        }
        if cu.learning_min_total >= cu.improving_min_total {
            errors.push("curriculum.learning_min_total must be less than improving_min_total");
        }
        if cu.learning_max_success_rate >= cu.improving_max_success_rate {
            errors.push(
                "curriculum.learning_max_success_rate must be less than improving_max_success_rate",
            );
        }

        // Learning validation
        if self.learning.min_samples == 0 {
            errors.push("learning.min_samples must be greater than 0");
        }
        let w = &self.learning;
        let weight_sum = w.default_winston_weight + w.default_subjective_weight
            + w.default_readability_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            errors.push("learning default weights must sum to 1.0");
        }
        if w.default_winston_weight < 0.0
            || w.default_subjective_weight < 0.0
            || w.default_readability_weight < 0.0
        {
            errors.push("learning default weights must be non-negative");
        }

        // Exploration validation
        if !(0.0..=1.0).contains(&self.exploration.probability) {
            errors.push("exploration.probability must be between 0.0 and 1.0");
        }
        if self.exploration.temperature_jitter < 0.0 || self.exploration.voice_jitter < 0.0 {
            errors.push("exploration jitter magnitudes must be non-negative");
        }

        // Retry budgets
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be greater than 0");
        }
        if self.retry.stuck_window < 2 {
            errors.push("retry.stuck_window must be at least 2");
        }

        // Store validation
        if self.store.read_pool_size == 0 {
            errors.push("store.read_pool_size must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Config(errors.join("; ")))
        }
    }
}

/// Baseline generation parameters, used whenever the weight learner has
/// insufficient data and as the starting point of every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_temperature: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub max_tokens: u32,
    pub voice_defaults: BTreeMap<String, f64>,
    pub enrichment_defaults: BTreeMap<String, f64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let voice_defaults = BTreeMap::from([
            ("colloquialism".to_string(), 0.5),
            ("contraction_rate".to_string(), 0.6),
            ("sentence_variance".to_string(), 0.5),
        ]);
        let enrichment_defaults = BTreeMap::from([
            ("anecdote_rate".to_string(), 0.4),
            ("imperfection".to_string(), 0.3),
            ("specificity".to_string(), 0.5),
        ]);
        Self {
            base_temperature: 0.9,
            frequency_penalty: 0.3,
            presence_penalty: 0.3,
            max_tokens: 1200,
            voice_defaults,
            enrichment_defaults,
        }
    }
}

/// Sentence-score bucket cut-offs and uniform-failure detection.
/// These defaults have no stated derivation in the original system; they
/// are configuration to be validated empirically, not fixed truths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub uniform_mean_cutoff: f64,
    pub uniform_terrible_share: f64,
    pub poor_cutoff: f64,
    pub good_cutoff: f64,
    pub excellent_cutoff: f64,
    pub max_worst_sentences: usize,
    pub max_pattern_hits: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            uniform_mean_cutoff: 20.0,
            uniform_terrible_share: 0.8,
            poor_cutoff: 30.0,
            good_cutoff: 50.0,
            excellent_cutoff: 70.0,
            max_worst_sentences: 3,
            max_pattern_hits: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumConfig {
    /// Strictest (mature) acceptance bound on the detector ai score.
    pub base_ai_threshold: f64,
    /// Strictest (mature) target on the detector human score.
    pub base_human_target: f64,
    pub window_days: i64,
    pub learning_multiplier: f64,
    pub improving_multiplier: f64,
    pub threshold_cap: f64,
    pub learning_min_total: usize,
    pub learning_max_success_rate: f64,
    pub improving_min_total: usize,
    pub improving_max_success_rate: f64,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            base_ai_threshold: 0.4,
            base_human_target: 80.0,
            window_days: 30,
            learning_multiplier: 1.33,
            improving_multiplier: 1.10,
            threshold_cap: 0.95,
            learning_min_total: 5,
            learning_max_success_rate: 0.10,
            improving_min_total: 15,
            improving_max_success_rate: 0.30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Minimum qualifying ledger rows before the weight learner may run.
    pub min_samples: usize,
    pub default_winston_weight: f64,
    pub default_subjective_weight: f64,
    pub default_readability_weight: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_samples: 110,
            default_winston_weight: 0.5,
            default_subjective_weight: 0.3,
            default_readability_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub probability: f64,
    pub temperature_jitter: f64,
    pub voice_jitter: f64,
    /// Fixed seed disables stochastic exploration drift between batch runs.
    pub seed: Option<u64>,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            probability: 0.05,
            temperature_jitter: 0.10,
            voice_jitter: 0.15,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Quality-retry budget: hard ceiling on scored attempts per session.
    pub max_attempts: u32,
    /// Network-retry budget per external call, distinct from max_attempts.
    pub network_retries: u32,
    pub network_backoff_secs: u64,
    /// Consecutive non-improving attempts before a fresh regeneration.
    pub stuck_window: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            network_retries: 3,
            network_backoff_secs: 2,
            stuck_window: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_file: String,
    pub read_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file: "outcomes.db".to_string(),
            read_pool_size: 4,
        }
    }
}
