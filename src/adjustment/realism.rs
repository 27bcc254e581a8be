use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{EngineError, Result};

use super::params::{Adjustment, AdjustmentSource, ParameterSet};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Temperature,
    Voice(&'static str),
    Enrichment(&'static str),
}

/// Static tendency -> adjustment table. Tags come from the external
/// subjective evaluator; tags without a table entry are ignored.
fn table_for(tendency: &str) -> Option<&'static [(Target, f64)]> {
    match tendency {
        "formulaic_phrasing" => Some(&[
            (Target::Temperature, 0.10),
            (Target::Voice("sentence_variance"), 0.15),
        ]),
        "overly_polished" => Some(&[
            (Target::Enrichment("imperfection"), 0.20),
            (Target::Voice("contraction_rate"), 0.10),
        ]),
        "repetitive_structure" => Some(&[
            (Target::Temperature, 0.15),
            (Target::Voice("sentence_variance"), 0.20),
        ]),
        "generic_examples" => Some(&[
            (Target::Enrichment("specificity"), 0.20),
            (Target::Enrichment("anecdote_rate"), 0.10),
        ]),
        "stiff_register" => Some(&[(Target::Voice("colloquialism"), 0.20)]),
        "hedging_language" => Some(&[
            (Target::Temperature, -0.10),
            (Target::Enrichment("specificity"), 0.10),
        ]),
        "excessive_transitions" => Some(&[
            (Target::Temperature, -0.05),
            (Target::Voice("sentence_variance"), 0.10),
        ]),
        _ => None,
    }
}

/// Per-parameter accumulator: same-direction magnitudes add, opposite
/// directions keep only the larger magnitude; summing opposing pulls
/// would oscillate across attempts.
#[derive(Default, Clone, Copy)]
struct DirectionalSum {
    positive: f64,
    negative: f64,
}

impl DirectionalSum {
    fn push(&mut self, delta: f64) {
        if delta >= 0.0 {
            self.positive += delta;
        } else {
            self.negative += -delta;
        }
    }
}

pub struct RealismStrategy;

impl RealismStrategy {
    /// Build the realism proposal for the observed tendency tags against
    /// the current parameter set. Raises `UnknownParameter` if any table
    /// entry references a voice/enrichment parameter the caller did not
    /// supply; no defaulting.
    pub fn propose(
        tendencies: &BTreeSet<String>,
        current: &ParameterSet,
    ) -> Result<Option<Adjustment>> {
        let mut temperature = DirectionalSum::default();
        let mut voice: BTreeMap<&'static str, DirectionalSum> = BTreeMap::new();
        let mut enrichment: BTreeMap<&'static str, DirectionalSum> = BTreeMap::new();
        let mut matched = 0usize;

        for tendency in tendencies {
            let Some(entries) = table_for(tendency) else {
                debug!(tendency = %tendency, "No adjustment table entry for tendency");
                continue;
            };
            matched += 1;
            for (target, delta) in entries {
                match target {
                    Target::Temperature => temperature.push(*delta),
                    Target::Voice(name) => {
                        if !current.voice.contains_key(*name) {
                            return Err(EngineError::UnknownParameter {
                                name: (*name).to_string(),
                            });
                        }
                        voice.entry(name).or_default().push(*delta);
                    }
                    Target::Enrichment(name) => {
                        if !current.enrichment.contains_key(*name) {
                            return Err(EngineError::UnknownParameter {
                                name: (*name).to_string(),
                            });
                        }
                        enrichment.entry(name).or_default().push(*delta);
                    }
                }
            }
        }

        if matched == 0 {
            return Ok(None);
        }

        let mut adjustment = Adjustment::empty(AdjustmentSource::Realism);
        let temp = resolve(temperature);
        if temp != 0.0 {
            adjustment.temperature_delta = Some(temp);
        }
        for (name, sum) in voice {
            adjustment.voice_deltas.insert(name.to_string(), resolve(sum));
        }
        for (name, sum) in enrichment {
            adjustment
                .enrichment_deltas
                .insert(name.to_string(), resolve(sum));
        }

        Ok(Some(adjustment))
    }
}

/// Same direction accumulates; opposite directions take the max
/// magnitude, never the sum.
fn resolve(sum: DirectionalSum) -> f64 {
    if sum.negative == 0.0 {
        sum.positive
    } else if sum.positive == 0.0 {
        -sum.negative
    } else if sum.positive >= sum.negative {
        sum.positive
    } else {
        -sum.negative
    }
}
