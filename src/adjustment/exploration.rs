use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::ExplorationConfig;

use super::params::{Adjustment, AdjustmentSource, ParameterSet};

/// Feedback-independent exploration: with small probability, perturb
/// temperature and one randomly chosen voice parameter to escape local
/// optima the deterministic rules cannot reach. Disabled when a fixed
/// seed is configured so batch runs stay reproducible.
pub struct ExplorationStrategy {
    rng: Option<StdRng>,
    probability: f64,
    temperature_jitter: f64,
    voice_jitter: f64,
}

impl ExplorationStrategy {
    pub fn new(config: &ExplorationConfig) -> Self {
        let rng = match config.seed {
            Some(_) => None,
            None => Some(StdRng::from_entropy()),
        };
        Self {
            rng,
            probability: config.probability,
            temperature_jitter: config.temperature_jitter,
            voice_jitter: config.voice_jitter,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rng.is_some()
    }

    pub fn maybe_explore(&mut self, current: &ParameterSet) -> Option<Adjustment> {
        let rng = self.rng.as_mut()?;
        if !rng.gen_bool(self.probability) {
            return None;
        }

        let mut adjustment = Adjustment::empty(AdjustmentSource::Exploration);
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        adjustment.temperature_delta = Some(sign * self.temperature_jitter);

        if !current.voice.is_empty() {
            let index = rng.gen_range(0..current.voice.len());
            let name = current.voice.keys().nth(index).cloned()?;
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            adjustment.voice_deltas.insert(name, sign * self.voice_jitter);
        }

        debug!(?adjustment.temperature_delta, "Exploration perturbation");
        Some(adjustment)
    }
}
