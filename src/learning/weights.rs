use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LearningConfig;
use crate::error::{EngineError, Result};
use crate::store::{AttemptRecord, OutcomeStore};

use super::cache::WeightCache;

/// Learned combination weights for the three scoring signals. Global,
/// not per-subject. Weights sum to 1.0, all non-negative; R-squared is a
/// confidence signal, not a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub winston_weight: f64,
    pub subjective_weight: f64,
    pub readability_weight: f64,
    pub sample_count: usize,
    pub r_squared: f64,
}

impl WeightSet {
    pub fn sum(&self) -> f64 {
        self.winston_weight + self.subjective_weight + self.readability_weight
    }
}

/// One normalized training row: scores in [0,1] plus the observed
/// outcome.
struct TrainingRow {
    winston: f64,
    subjective: f64,
    readability: Option<f64>,
    outcome: f64,
}

impl TrainingRow {
    fn from_record(record: &AttemptRecord) -> Option<Self> {
        let subjective = record.subjective_score?;
        Some(Self {
            winston: (record.detector_score / 100.0).clamp(0.0, 1.0),
            subjective: (subjective / 10.0).clamp(0.0, 1.0),
            readability: record
                .readability_score
                .map(|s| (s / 100.0).clamp(0.0, 1.0)),
            outcome: if record.success { 1.0 } else { 0.0 },
        })
    }
}

pub struct WeightLearner {
    config: LearningConfig,
    cache: WeightCache,
}

impl WeightLearner {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            cache: WeightCache::new(),
        }
    }

    pub fn with_cache(config: LearningConfig, cache: WeightCache) -> Self {
        Self { config, cache }
    }

    /// Static defaults for the sanctioned `InsufficientLearningData`
    /// fallback.
    pub fn default_weights(&self) -> WeightSet {
        WeightSet {
            winston_weight: self.config.default_winston_weight,
            subjective_weight: self.config.default_subjective_weight,
            readability_weight: self.config.default_readability_weight,
            sample_count: 0,
            r_squared: 0.0,
        }
    }

    /// Solve for the optimal weights over the whole ledger. Raises
    /// `InsufficientLearningData` below the minimum sample count; there
    /// is deliberately no silent fallback here.
    pub async fn optimal_weights(&self, store: &dyn OutcomeStore) -> Result<WeightSet> {
        let version = store.ledger_version().await?;
        if let Some(cached) = self.cache.get_if_current(version) {
            debug!(version, "Weight cache hit");
            return Ok(cached);
        }

        let qualifying = store.count_qualifying().await? as usize;
        if qualifying < self.config.min_samples {
            return Err(EngineError::InsufficientLearningData {
                have: qualifying,
                need: self.config.min_samples,
            });
        }

        let records = store.query_global().await?;
        let rows: Vec<TrainingRow> = records
            .iter()
            .filter_map(TrainingRow::from_record)
            .collect();

        let weights = fit(&rows);
        info!(
            samples = weights.sample_count,
            r_squared = weights.r_squared,
            winston = weights.winston_weight,
            subjective = weights.subjective_weight,
            readability = weights.readability_weight,
            "Weights refit"
        );
        self.cache.put(weights.clone(), version);
        Ok(weights)
    }
}

/// Bounded, equality-constrained least squares: minimize the squared
/// error between the weighted score combination and the observed outcome
/// subject to sum(w) = 1, w >= 0. Exact for three weights: eliminate the
/// equality constraint, solve the reduced normal equations, then pin
/// negative weights to zero one at a time.
///
/// Any row lacking a readability score degrades the whole fit to a
/// 2-weight solution (readability pinned to 0, still summing to 1); the
/// rows themselves are never discarded or imputed.
fn fit(rows: &[TrainingRow]) -> WeightSet {
    let all_have_readability = rows.iter().all(|r| r.readability.is_some());

    let (w1, w2, w3) = if all_have_readability {
        solve_three(rows)
    } else {
        let w1 = solve_pair(rows, |r| r.winston, |r| r.subjective);
        (w1, 1.0 - w1, 0.0)
    };

    let r_squared = r_squared(rows, w1, w2, w3);

    WeightSet {
        winston_weight: w1,
        subjective_weight: w2,
        readability_weight: w3,
        sample_count: rows.len(),
        r_squared,
    }
}

fn solve_three(rows: &[TrainingRow]) -> (f64, f64, f64) {
    // Substitute w3 = 1 - w1 - w2; the residual becomes
    // w1*(x1-x3) + w2*(x2-x3) + (x3 - y).
    let mut saa = 0.0;
    let mut sab = 0.0;
    let mut sbb = 0.0;
    let mut sac = 0.0;
    let mut sbc = 0.0;
    for row in rows {
        let x3 = row.readability.unwrap_or(0.0);
        let a = row.winston - x3;
        let b = row.subjective - x3;
        let c = row.outcome - x3;
        saa += a * a;
        sab += a * b;
        sbb += b * b;
        sac += a * c;
        sbc += b * c;
    }

    let det = saa * sbb - sab * sab;
    if det.abs() < 1e-12 {
        // Degenerate design matrix (collinear signals): nothing to
        // distinguish the weights, split evenly.
        return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
    }

    let w1 = (sac * sbb - sbc * sab) / det;
    let w2 = (sbc * saa - sac * sab) / det;
    let w3 = 1.0 - w1 - w2;

    if w1 >= 0.0 && w2 >= 0.0 && w3 >= 0.0 {
        return (w1, w2, w3);
    }

    // Active set: pin the most negative weight to zero and re-solve the
    // remaining pair. At most two pins are possible.
    let candidates = [
        // w1 = 0: weight between subjective and readability.
        {
            let w = solve_pair(rows, |r| r.subjective, |r| r.readability.unwrap_or(0.0));
            (0.0, w, 1.0 - w)
        },
        // w2 = 0.
        {
            let w = solve_pair(rows, |r| r.winston, |r| r.readability.unwrap_or(0.0));
            (w, 0.0, 1.0 - w)
        },
        // w3 = 0.
        {
            let w = solve_pair(rows, |r| r.winston, |r| r.subjective);
            (w, 1.0 - w, 0.0)
        },
    ];

    candidates
        .into_iter()
        .min_by(|&a, &b| {
            sse(rows, a.0, a.1, a.2)
                .total_cmp(&sse(rows, b.0, b.1, b.2))
        })
        .unwrap_or((1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0))
}

/// One free weight w on `first`, (1-w) on `second`, w clamped to [0,1].
fn solve_pair(
    rows: &[TrainingRow],
    first: impl Fn(&TrainingRow) -> f64,
    second: impl Fn(&TrainingRow) -> f64,
) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for row in rows {
        let a = first(row);
        let b = second(row);
        num += (row.outcome - b) * (a - b);
        den += (a - b) * (a - b);
    }
    if den < 1e-12 {
        return 0.5;
    }
    (num / den).clamp(0.0, 1.0)
}

fn combine(row: &TrainingRow, w1: f64, w2: f64, w3: f64) -> f64 {
    w1 * row.winston + w2 * row.subjective + w3 * row.readability.unwrap_or(0.0)
}

fn sse(rows: &[TrainingRow], w1: f64, w2: f64, w3: f64) -> f64 {
    rows.iter()
        .map(|r| {
            let e = combine(r, w1, w2, w3) - r.outcome;
            e * e
        })
        .sum()
}

fn r_squared(rows: &[TrainingRow], w1: f64, w2: f64, w3: f64) -> f64 {
    let n = rows.len() as f64;
    let mean = rows.iter().map(|r| r.outcome).sum::<f64>() / n;
    let ss_tot: f64 = rows.iter().map(|r| (r.outcome - mean).powi(2)).sum();
    if ss_tot < 1e-12 {
        return 0.0;
    }
    1.0 - sse(rows, w1, w2, w3) / ss_tot
}
