//! `scanURL`: URL reputation lookup offered to the reasoning backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::context::AnalysisContext;
use crate::reputation::{UrlReputation, UrlScanResult};
use crate::tools::tool::{DEFAULT_TOOL_TIMEOUT, Tool, ToolError, ToolOutput, require_str};

pub const SCAN_URL_TOOL: &str = "scanURL";

/// Checks one URL against the configured reputation oracle.
///
/// Oracle failures are reported as an unverified, not-safe result so the
/// backend never reads a failed lookup as a clean one.
pub struct ScanUrlTool {
    oracle: Arc<dyn UrlReputation>,
    timeout: Duration,
}

impl ScanUrlTool {
    pub fn new(oracle: Arc<dyn UrlReputation>) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for ScanUrlTool {
    fn name(&self) -> &str {
        SCAN_URL_TOOL
    }

    fn description(&self) -> &str {
        "Scans a URL to determine if it is safe. Use this to determine if any URLs found \
         in the text are malicious. Call it once for every URL in the content before \
         giving a verdict."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to scan, exactly as it appears in the content"
                }
            },
            "required": ["url"]
        })
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &AnalysisContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let url = require_str(&params, "url")?;

        let result = match self.oracle.scan(url).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    oracle = self.oracle.name(),
                    url,
                    error = %e,
                    "URL reputation lookup failed"
                );
                UrlScanResult::unsafe_url(format!(
                    "Could not verify this URL ({e}). Treat it as unverified and not safe."
                ))
            }
        };

        let value = serde_json::to_value(&result)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to serialize result: {e}")))?;
        Ok(ToolOutput::success(value, start.elapsed()))
    }
}
