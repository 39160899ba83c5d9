//! Anthropic Messages API provider.
//!
//! Speaks the HTTP API directly with `reqwest`. System messages are lifted into
//! the top-level `system` field, images become base64 `image` blocks, and
//! consecutive tool results are merged into a single user turn, which the API
//! requires when an assistant turn issued several `tool_use` blocks.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::LlmError;
use crate::llm::costs::model_cost;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

/// Default Anthropic API endpoint.
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 1024;

const PROVIDER: &str = "anthropic";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Override the endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request_body(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages_to_claude(messages),
        });

        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }

        if let Some(t) = temperature {
            body["temperature"] = serde_json::json!(t);
        }

        if !tools.is_empty() {
            let claude_tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(claude_tools);
        }

        body
    }

    async fn send(&self, body: serde_json::Value) -> Result<ClaudeResponse, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_secs);
        let body_text = response.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, retry_after, &self.model));
        }

        serde_json::from_str(&body_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_cost(&self.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request_body(
            &request.messages,
            &[],
            request.max_tokens,
            request.temperature,
        );
        let response = self.send(body).await?;
        let parsed = parse_response(&response);

        Ok(CompletionResponse {
            content: parsed.content.unwrap_or_default(),
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            finish_reason: parsed.finish_reason,
            response_id: response.id,
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let body = self.build_request_body(
            &request.messages,
            &request.tools,
            request.max_tokens,
            request.temperature,
        );
        let response = self.send(body).await?;
        let parsed = parse_response(&response);

        Ok(ToolCompletionResponse {
            content: parsed.content,
            tool_calls: parsed.tool_calls,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            finish_reason: parsed.finish_reason,
            response_id: response.id,
        })
    }
}

/// Convert chat messages to Claude's `messages` array.
fn messages_to_claude(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    let mut out: Vec<serde_json::Value> = Vec::new();
    let mut pending_results: Vec<serde_json::Value> = Vec::new();

    for message in messages {
        if message.role == Role::Tool {
            let mut block = serde_json::json!({
                "type": "tool_result",
                "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            });
            if message.is_error {
                block["is_error"] = serde_json::json!(true);
            }
            pending_results.push(block);
            continue;
        }

        if !pending_results.is_empty() {
            out.push(serde_json::json!({
                "role": "user",
                "content": std::mem::take(&mut pending_results),
            }));
        }

        match message.role {
            Role::System | Role::Tool => {}
            Role::User => {
                let mut content: Vec<serde_json::Value> = message
                    .images
                    .iter()
                    .map(|img| {
                        serde_json::json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": img.media_type,
                                "data": img.data_base64,
                            }
                        })
                    })
                    .collect();
                content.push(serde_json::json!({ "type": "text", "text": message.content }));
                out.push(serde_json::json!({ "role": "user", "content": content }));
            }
            Role::Assistant => {
                let mut content = Vec::new();
                if !message.content.is_empty() {
                    content.push(serde_json::json!({ "type": "text", "text": message.content }));
                }
                for call in message.tool_calls.iter().flatten() {
                    content.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                out.push(serde_json::json!({ "role": "assistant", "content": content }));
            }
        }
    }

    if !pending_results.is_empty() {
        out.push(serde_json::json!({ "role": "user", "content": pending_results }));
    }

    out
}

struct ParsedResponse {
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    finish_reason: FinishReason,
}

fn parse_response(response: &ClaudeResponse) -> ParsedResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in &response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: input.clone(),
            }),
            ContentBlock::Other => {}
        }
    }

    let finish_reason = match response.stop_reason.as_deref() {
        Some("end_turn") | Some("stop_sequence") | None => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolUse,
        Some(_) => FinishReason::Unknown,
    };

    ParsedResponse {
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        finish_reason,
    }
}

fn parse_http_error(
    status: u16,
    body: &str,
    retry_after: Option<std::time::Duration>,
    model: &str,
) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        404 => LlmError::ModelNotAvailable {
            provider: PROVIDER.to_string(),
            model: model.to_string(),
        },
        429 => LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after,
        },
        _ => LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {}: {}", status, body),
        },
    }
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
