use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityReport {
    /// 0-100, higher is more readable.
    pub score: f64,
    pub passed: bool,
}

impl ReadabilityReport {
    pub fn normalized(&self) -> f64 {
        (self.score / 100.0).clamp(0.0, 1.0)
    }
}

/// Readability gate consulted alongside the detector in full-validation
/// mode. Skipped entirely in simple mode.
#[async_trait]
pub trait ReadabilityCheck: Send + Sync {
    async fn assess(&self, text: &str) -> Result<ReadabilityReport>;
}
