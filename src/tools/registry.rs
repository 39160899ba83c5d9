//! Tool registry for the capabilities offered to the reasoning backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::ToolDefinition;
use crate::reputation::UrlReputation;
use crate::tools::builtin::ScanUrlTool;
use crate::tools::tool::Tool;

/// Registry of available tools.
///
/// Built once at startup and shared behind an `Arc`; it is never mutated
/// while analyses are running.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The standard capability set: `scanURL` backed by `oracle`.
    pub fn with_url_scanner(oracle: Arc<dyn UrlReputation>, timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ScanUrlTool::new(oracle).with_timeout(timeout)));
        registry
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced existing tool registration");
        } else {
            tracing::debug!("Registered tool: {}", name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions for LLM function calling, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
