use parking_lot::Mutex;
use tracing::debug;

use super::weights::WeightSet;

#[derive(Debug, Clone)]
struct CachedWeights {
    weights: WeightSet,
    computed_at_version: u64,
}

/// Explicit, injectable weight cache. Invalidated by a ledger version
/// bump, never by ambient global state; tests construct one
/// deterministically.
#[derive(Default)]
pub struct WeightCache {
    inner: Mutex<Option<CachedWeights>>,
}

impl WeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached weights, if they were computed at exactly this ledger
    /// version.
    pub fn get_if_current(&self, version: u64) -> Option<WeightSet> {
        let guard = self.inner.lock();
        match guard.as_ref() {
            Some(cached) if cached.computed_at_version == version => Some(cached.weights.clone()),
            _ => None,
        }
    }

    pub fn put(&self, weights: WeightSet, version: u64) {
        debug!(version, "Weight cache refreshed");
        *self.inner.lock() = Some(CachedWeights {
            weights,
            computed_at_version: version,
        });
    }

    pub fn invalidate(&self) {
        *self.inner.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> WeightSet {
        WeightSet {
            winston_weight: 0.5,
            subjective_weight: 0.3,
            readability_weight: 0.2,
            sample_count: 120,
            r_squared: 0.4,
        }
    }

    #[test]
    fn test_version_mismatch_misses() {
        let cache = WeightCache::new();
        cache.put(weights(), 7);
        assert!(cache.get_if_current(7).is_some());
        assert!(cache.get_if_current(8).is_none());
    }

    #[test]
    fn test_invalidate_clears() {
        let cache = WeightCache::new();
        cache.put(weights(), 7);
        cache.invalidate();
        assert!(cache.get_if_current(7).is_none());
    }
}
