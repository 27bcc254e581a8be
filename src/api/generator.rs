use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adjustment::ParameterSet;
use crate::error::Result;

/// One call to the text-generation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    /// Offset mixed into the provider-side sampling seed. A fresh
    /// regeneration bumps this to leave a stuck trajectory.
    pub seed_offset: u64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: system_prompt.into(),
            temperature: 1.0,
            max_tokens: 1024,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            seed_offset: 0,
        }
    }

    pub fn with_parameters(mut self, params: &ParameterSet) -> Self {
        self.temperature = params.temperature;
        self.max_tokens = params.max_tokens;
        self.frequency_penalty = params.frequency_penalty;
        self.presence_penalty = params.presence_penalty;
        self
    }

    pub fn with_seed_offset(mut self, offset: u64) -> Self {
        self.seed_offset = offset;
        self
    }
}

/// Adapter over the external text-generation API.
///
/// Failure must be distinguishable from degraded output: the controller
/// retries on low scores, never on malformed/error text. Implementations
/// return `ExternalService` for anything that is not a genuine completion.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
