//! Cross-session weight learning over the historical ledger.

mod cache;
mod weights;

pub use cache::WeightCache;
pub use weights::{WeightLearner, WeightSet};
