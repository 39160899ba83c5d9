//! Tool trait and shared types.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::AnalysisContext;

/// Default per-call timeout when a tool does not override it.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Error from a single tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unknown tool: {0}")]
    NotFound(String),
}

/// Successful tool output.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    #[serde(skip)]
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }
}

/// A capability the reasoning backend may invoke mid-analysis.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the backend uses to call this tool.
    fn name(&self) -> &str;

    /// Description shown to the backend.
    fn description(&self) -> &str;

    /// JSON schema for the parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    fn execution_timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &AnalysisContext,
    ) -> Result<ToolOutput, ToolError>;
}

/// Fetch a required, non-empty string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{key}' parameter")))
}
