//! Per-analysis context handed to tools.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Context for one running analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisContext {
    /// Correlates log lines and the diagnostic record of one run.
    pub request_id: Uuid,
    /// When the analysis started.
    pub started_at: DateTime<Utc>,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl AnalysisContext {
    /// Create a context with a fresh request id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds since the analysis started.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
