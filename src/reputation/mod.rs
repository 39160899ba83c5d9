//! URL-reputation oracles.
//!
//! An oracle classifies a single URL as safe or unsafe. The `scanURL` tool
//! is the only consumer.

pub mod heuristic;
pub mod safe_browsing;

pub use heuristic::HeuristicScanner;
pub use safe_browsing::SafeBrowsingClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReputationError;

/// Outcome of one URL lookup, as reported back to the reasoning backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlScanResult {
    pub is_safe: bool,
    pub message: String,
}

impl UrlScanResult {
    pub fn safe(message: impl Into<String>) -> Self {
        Self {
            is_safe: true,
            message: message.into(),
        }
    }

    pub fn unsafe_url(message: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            message: message.into(),
        }
    }
}

/// Classifies a single URL.
#[async_trait]
pub trait UrlReputation: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    async fn scan(&self, url: &str) -> Result<UrlScanResult, ReputationError>;
}
