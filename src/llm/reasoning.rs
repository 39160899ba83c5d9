//! Reasoning layer: one bounded backend call per turn.
//!
//! The orchestrator owns the transcript and the turn loop. `Reasoning` holds
//! what stays fixed for a run (system prompt, tool set, sampling, deadline)
//! and turns the transcript into either final text or a batch of tool calls.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::{ChatMessage, LlmProvider, ToolCall, ToolCompletionRequest, ToolDefinition};

/// Deadline for a single backend call when none is configured.
pub const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(60);

/// Token usage from an LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// What the backend did with its turn.
#[derive(Debug)]
pub enum RespondResult {
    /// Final answer text.
    Text(String),
    /// The backend wants capabilities invoked before it answers.
    ToolCalls {
        tool_calls: Vec<ToolCall>,
        content: Option<String>,
    },
}

#[derive(Debug)]
pub struct RespondOutput {
    pub result: RespondResult,
    pub usage: TokenUsage,
}

pub struct Reasoning {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl Reasoning {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        system_prompt: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            tools,
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_REASONING_TIMEOUT,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn cost_per_token(&self) -> (Decimal, Decimal) {
        self.llm.cost_per_token()
    }

    /// Send the system prompt plus `transcript` with the tool set attached.
    ///
    /// A backend that does not answer within the deadline is an
    /// `LlmError::Timeout`.
    pub async fn respond(&self, transcript: &[ChatMessage]) -> Result<RespondOutput, LlmError> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        messages.extend_from_slice(transcript);

        let mut request = ToolCompletionRequest::new(messages, self.tools.clone());
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let response = tokio::time::timeout(self.timeout, self.llm.complete_with_tools(request))
            .await
            .map_err(|_| LlmError::Timeout {
                model: self.llm.model_name().to_string(),
                after: self.timeout,
            })??;

        let usage = TokenUsage {
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        };
        let result = if response.tool_calls.is_empty() {
            RespondResult::Text(response.content.unwrap_or_default())
        } else {
            RespondResult::ToolCalls {
                tool_calls: response.tool_calls,
                content: response.content,
            }
        };
        Ok(RespondOutput { result, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{
        CompletionRequest, CompletionResponse, FinishReason, Role, ToolCompletionResponse,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the last request and answers with fixed tool calls.
    struct RecordingLlm {
        tool_calls: Vec<ToolCall>,
        seen: Mutex<Option<ToolCompletionRequest>>,
    }

    impl RecordingLlm {
        fn new(tool_calls: Vec<ToolCall>) -> Arc<Self> {
            Arc::new(Self {
                tool_calls,
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn model_name(&self) -> &str {
            "recording"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            unimplemented!("reasoning always sends tools")
        }
        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(ToolCompletionResponse {
                content: None,
                tool_calls: self.tool_calls.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: FinishReason::ToolUse,
                response_id: None,
            })
        }
    }

    /// Accepts the request and never answers.
    struct StalledLlm;

    #[async_trait]
    impl LlmProvider for StalledLlm {
        fn model_name(&self) -> &str {
            "stalled"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            std::future::pending().await
        }
        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            std::future::pending().await
        }
    }

    fn tool_def() -> ToolDefinition {
        ToolDefinition {
            name: "scanURL".into(),
            description: "scan".into(),
            parameters: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn system_prompt_and_sampling_are_sent() {
        let llm = RecordingLlm::new(vec![]);
        let reasoning =
            Reasoning::new(llm.clone(), "rules", vec![tool_def()]).with_sampling(0.1, 512);

        let out = reasoning.respond(&[ChatMessage::user("hi")]).await.unwrap();
        assert!(matches!(out.result, RespondResult::Text(ref t) if t.is_empty()));

        let seen = llm.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.messages[0].role, Role::System);
        assert_eq!(seen.messages[0].content, "rules");
        assert_eq!(seen.messages[1].role, Role::User);
        assert_eq!(seen.tools.len(), 1);
        assert_eq!(seen.max_tokens, Some(512));
        assert_eq!(seen.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn tool_calls_are_surfaced() {
        let call = ToolCall {
            id: "t1".into(),
            name: "scanURL".into(),
            arguments: serde_json::json!({"url": "http://x.example"}),
        };
        let reasoning = Reasoning::new(RecordingLlm::new(vec![call]), "rules", vec![tool_def()]);

        let out = reasoning.respond(&[ChatMessage::user("hi")]).await.unwrap();
        match out.result {
            RespondResult::ToolCalls { tool_calls, .. } => assert_eq!(tool_calls[0].id, "t1"),
            other => panic!("Expected ToolCalls, got {:?}", other),
        }
        assert_eq!(out.usage.total(), 15);
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let reasoning = Reasoning::new(Arc::new(StalledLlm), "rules", vec![tool_def()])
            .with_timeout(Duration::from_millis(50));

        let err = reasoning.respond(&[ChatMessage::user("hi")]).await.unwrap_err();
        match err {
            LlmError::Timeout { model, after } => {
                assert_eq!(model, "stalled");
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage {
            input_tokens: 5,
            output_tokens: 2,
        });
        total.add(TokenUsage {
            input_tokens: 1,
            output_tokens: 1,
        });
        assert_eq!(total.total(), 9);
    }
}
