use std::collections::BTreeMap;

use tracing::debug;

use crate::analysis::FailureType;

use super::params::{Adjustment, AdjustmentSource};

struct Candidate {
    id: &'static str,
    temperature_delta: Option<f64>,
    voice_deltas: &'static [(&'static str, f64)],
    enrichment_deltas: &'static [(&'static str, f64)],
}

const UNIFORM: &[Candidate] = &[
    Candidate {
        id: "cool_sharply",
        temperature_delta: Some(-0.25),
        voice_deltas: &[("sentence_variance", 0.10)],
        enrichment_deltas: &[],
    },
    Candidate {
        id: "warm_sharply",
        temperature_delta: Some(0.25),
        voice_deltas: &[],
        enrichment_deltas: &[("imperfection", 0.10)],
    },
];

const PARTIAL: &[Candidate] = &[
    Candidate {
        id: "nudge_voice",
        temperature_delta: None,
        voice_deltas: &[("colloquialism", 0.10), ("contraction_rate", 0.05)],
        enrichment_deltas: &[],
    },
    Candidate {
        id: "slight_warm",
        temperature_delta: Some(0.05),
        voice_deltas: &[("sentence_variance", 0.05)],
        enrichment_deltas: &[],
    },
    Candidate {
        id: "enrich_detail",
        temperature_delta: None,
        voice_deltas: &[],
        enrichment_deltas: &[("specificity", 0.10), ("anecdote_rate", 0.05)],
    },
];

const BORDERLINE: &[Candidate] = &[
    Candidate {
        id: "warm_slightly",
        temperature_delta: Some(0.10),
        voice_deltas: &[],
        enrichment_deltas: &[("specificity", 0.10)],
    },
    Candidate {
        id: "boost_anecdote",
        temperature_delta: None,
        voice_deltas: &[("colloquialism", 0.05)],
        enrichment_deltas: &[("anecdote_rate", 0.15)],
    },
];

const POOR: &[Candidate] = &[
    Candidate {
        id: "cool_down",
        temperature_delta: Some(-0.15),
        voice_deltas: &[("contraction_rate", 0.10)],
        enrichment_deltas: &[],
    },
    Candidate {
        id: "shake_up",
        temperature_delta: Some(0.20),
        voice_deltas: &[("sentence_variance", 0.15)],
        enrichment_deltas: &[],
    },
];

fn candidates_for(failure_type: FailureType) -> &'static [Candidate] {
    match failure_type {
        FailureType::Uniform => UNIFORM,
        FailureType::Partial => PARTIAL,
        FailureType::Borderline => BORDERLINE,
        FailureType::Poor => POOR,
    }
}

/// Failure-driven proposal: maps (failure type, attempt number) onto a
/// fixed strategy table. Strategy identity persists across attempts so a
/// strategy that just failed is never re-selected consecutively; the
/// rotation skips to the next candidate instead.
pub struct FixStrategyEngine {
    previous_id: Option<String>,
}

impl FixStrategyEngine {
    pub fn new() -> Self {
        Self { previous_id: None }
    }

    pub fn previous_strategy(&self) -> Option<&str> {
        self.previous_id.as_deref()
    }

    /// Clear strategy memory; used by a fresh regeneration.
    pub fn reset(&mut self) {
        self.previous_id = None;
    }

    pub fn propose(&mut self, failure_type: FailureType, attempt_number: u32) -> Adjustment {
        let candidates = candidates_for(failure_type);
        let mut index = (attempt_number.saturating_sub(1)) as usize % candidates.len();
        if Some(candidates[index].id) == self.previous_id.as_deref() && candidates.len() > 1 {
            index = (index + 1) % candidates.len();
        }

        let candidate = &candidates[index];
        self.previous_id = Some(candidate.id.to_string());
        debug!(?failure_type, attempt_number, strategy = candidate.id, "Fix strategy selected");

        Adjustment {
            temperature_delta: candidate.temperature_delta,
            voice_deltas: delta_map(candidate.voice_deltas),
            enrichment_deltas: delta_map(candidate.enrichment_deltas),
            source: AdjustmentSource::FailureStrategy {
                id: candidate.id.to_string(),
            },
        }
    }
}

impl Default for FixStrategyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn delta_map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, delta)| ((*name).to_string(), *delta))
        .collect()
}
