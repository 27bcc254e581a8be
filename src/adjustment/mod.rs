//! Parameter-space adjustment: three independently-sourced proposals
//! (failure-driven, realism-tendency, exploration) merged under one
//! documented precedence order, then clamped.

mod exploration;
mod failure;
mod params;
mod realism;

pub use exploration::ExplorationStrategy;
pub use failure::FixStrategyEngine;
pub use params::{Adjustment, AdjustmentSource, ParameterSet};
pub use realism::RealismStrategy;

/// Merge the per-attempt proposals into one adjustment.
///
/// Precedence: when both the failure strategy and the realism strategy
/// propose a temperature delta, the effective delta is
/// 0.6 x realism + 0.4 x failure; the multi-dimensional subjective signal
/// outweighs the binary detector verdict. Voice and enrichment deltas are
/// disjoint concerns and add. Exploration jitter, when present, adds last.
pub fn merge_adjustments(
    failure: Option<Adjustment>,
    realism: Option<Adjustment>,
    exploration: Option<Adjustment>,
) -> Adjustment {
    let mut merged = Adjustment::empty(AdjustmentSource::Merged);

    let failure_temp = failure.as_ref().and_then(|a| a.temperature_delta);
    let realism_temp = realism.as_ref().and_then(|a| a.temperature_delta);
    merged.temperature_delta = match (failure_temp, realism_temp) {
        (Some(f), Some(r)) => Some(0.6 * r + 0.4 * f),
        (Some(f), None) => Some(f),
        (None, Some(r)) => Some(r),
        (None, None) => None,
    };

    for source in [failure, realism, exploration.clone()] {
        let Some(adjustment) = source else { continue };
        for (name, delta) in adjustment.voice_deltas {
            *merged.voice_deltas.entry(name).or_insert(0.0) += delta;
        }
        for (name, delta) in adjustment.enrichment_deltas {
            *merged.enrichment_deltas.entry(name).or_insert(0.0) += delta;
        }
    }

    if let Some(jitter) = exploration.and_then(|a| a.temperature_delta) {
        merged.temperature_delta = Some(merged.temperature_delta.unwrap_or(0.0) + jitter);
    }

    merged
}
