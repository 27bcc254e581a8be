use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);
pub const PENALTY_RANGE: (f64, f64) = (-2.0, 2.0);

/// Immutable generation-parameter value. Each attempt uses exactly one;
/// adjustments always produce a new clamped instance, never mutate in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub temperature: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub voice: BTreeMap<String, f64>,
    pub enrichment: BTreeMap<String, f64>,
    pub max_tokens: u32,
}

impl ParameterSet {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.base_temperature,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
            voice: config.voice_defaults.clone(),
            enrichment: config.enrichment_defaults.clone(),
            max_tokens: config.max_tokens,
        }
        .clamped()
    }

    /// Clamp every field to its declared bound. Idempotent.
    pub fn clamped(mut self) -> Self {
        self.temperature = self.temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);
        self.frequency_penalty = self.frequency_penalty.clamp(PENALTY_RANGE.0, PENALTY_RANGE.1);
        self.presence_penalty = self.presence_penalty.clamp(PENALTY_RANGE.0, PENALTY_RANGE.1);
        for value in self.voice.values_mut().chain(self.enrichment.values_mut()) {
            *value = value.clamp(0.0, 1.0);
        }
        self
    }

    /// Apply a merged adjustment, producing a new clamped instance.
    pub fn apply(&self, adjustment: &Adjustment) -> Self {
        let mut next = self.clone();
        if let Some(delta) = adjustment.temperature_delta {
            next.temperature += delta;
        }
        for (name, delta) in &adjustment.voice_deltas {
            if let Some(value) = next.voice.get_mut(name) {
                *value += delta;
            }
        }
        for (name, delta) in &adjustment.enrichment_deltas {
            if let Some(value) = next.enrichment.get_mut(name) {
                *value += delta;
            }
        }
        next.clamped()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.voice.contains_key(name) || self.enrichment.contains_key(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AdjustmentSource {
    FailureStrategy { id: String },
    Realism,
    Exploration,
    Merged,
}

/// Typed delta record produced by one strategy. Merged by the session
/// under the precedence order in `merge_adjustments`, never by
/// dictionary overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub temperature_delta: Option<f64>,
    pub voice_deltas: BTreeMap<String, f64>,
    pub enrichment_deltas: BTreeMap<String, f64>,
    pub source: AdjustmentSource,
}

impl Adjustment {
    pub fn empty(source: AdjustmentSource) -> Self {
        Self {
            temperature_delta: None,
            voice_deltas: BTreeMap::new(),
            enrichment_deltas: BTreeMap::new(),
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temperature_delta.is_none()
            && self.voice_deltas.is_empty()
            && self.enrichment_deltas.is_empty()
    }
}
