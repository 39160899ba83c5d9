//! Analysis orchestrator: drives one request from enriched content through
//! the reasoning backend to a verdict.
//!
//! ```text
//! Idle -> Reasoning -> (ToolWait <-> Reasoning)* -> Completed | Degraded
//! ```
//!
//! Any backend failure ends in `Degraded`, which produces a fail-closed
//! verdict. `analyze` never fails.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::AnalyzerConfig;
use crate::context::AnalysisContext;
use crate::llm::costs::estimate_cost;
use crate::llm::{
    ChatMessage, ImageAttachment, LlmProvider, Reasoning, RespondResult, TokenUsage, ToolCall,
};
use crate::pipeline::prompts::{build_system_prompt, build_user_prompt, extract_urls};
use crate::pipeline::types::{
    AnalysisRun, AnalysisVerdict, DegradeReason, EnrichedContent, RawVerdict, RunOutcome,
    ToolCallRecord,
};
use crate::pipeline::verdict::{self, VERDICT_FIELDS};
use crate::tools::builtin::SCAN_URL_TOOL;
use crate::tools::{ToolError, ToolRegistry};

/// Where a run currently is.
#[derive(Debug)]
enum State {
    Idle,
    Reasoning,
    /// Tool calls issued in the last turn, plus the ids still unresolved.
    ToolWait {
        calls: Vec<ToolCall>,
        outstanding: BTreeSet<String>,
    },
    Completed(RawVerdict),
    Degraded(DegradeReason),
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Reasoning => "reasoning",
            Self::ToolWait { .. } => "tool_wait",
            Self::Completed(_) => "completed",
            Self::Degraded(_) => "degraded",
        }
    }
}

/// Runs analyses against one backend and one capability set.
pub struct AnalysisOrchestrator {
    reasoning: Reasoning,
    tools: Arc<ToolRegistry>,
    config: AnalyzerConfig,
}

impl AnalysisOrchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AnalyzerConfig) -> Self {
        let reasoning = Reasoning::new(
            llm,
            build_system_prompt(SCAN_URL_TOOL),
            tools.tool_definitions(),
        )
        .with_sampling(config.temperature, config.max_tokens)
        .with_timeout(config.llm_timeout);
        Self {
            reasoning,
            tools,
            config,
        }
    }

    /// Analyze content and return only the verdict.
    pub async fn analyze(&self, content: &EnrichedContent) -> AnalysisVerdict {
        self.analyze_detailed(content).await.verdict
    }

    /// Analyze content and return the full run record.
    pub async fn analyze_detailed(&self, content: &EnrichedContent) -> AnalysisRun {
        let ctx = AnalysisContext::new();
        let span = info_span!("analysis", request_id = %ctx.request_id);
        self.run(content, ctx).instrument(span).await
    }

    async fn run(&self, content: &EnrichedContent, ctx: AnalysisContext) -> AnalysisRun {
        let urls = extract_urls(&content.text);
        let mut transcript: Vec<ChatMessage> = Vec::new();

        info!(
            chars = content.text.len(),
            urls = urls.len(),
            image = content.image.is_some(),
            model = self.reasoning.model_name(),
            "Starting analysis"
        );

        let mut usage = TokenUsage::default();
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut rounds = 0usize;
        let mut tool_rounds = 0usize;
        let mut state = State::Idle;

        let (verdict, outcome) = loop {
            debug!(state = state.label(), round = rounds, "Orchestrator step");
            state = match state {
                State::Idle => {
                    let mut message = ChatMessage::user(build_user_prompt(content, &urls));
                    if let Some(ref image) = content.image {
                        message = message.with_image(ImageAttachment {
                            media_type: image.media_type().to_string(),
                            data_base64: image.base64_data(),
                        });
                    }
                    transcript.push(message);
                    State::Reasoning
                }

                State::Reasoning => {
                    rounds += 1;
                    match self.reasoning.respond(&transcript).await {
                        Err(e) => {
                            warn!(round = rounds, error = %e, "Reasoning call failed");
                            State::Degraded(DegradeReason::BackendFailure(e.to_string()))
                        }
                        Ok(output) => {
                            usage.add(output.usage);
                            match output.result {
                                RespondResult::Text(text) => parse_final_answer(&text),
                                RespondResult::ToolCalls { tool_calls, content } => {
                                    if tool_rounds >= self.config.max_tool_rounds {
                                        warn!(
                                            round = rounds,
                                            limit = self.config.max_tool_rounds,
                                            "Tool round limit reached"
                                        );
                                        State::Degraded(DegradeReason::ToolRoundsExceeded(
                                            self.config.max_tool_rounds,
                                        ))
                                    } else {
                                        tool_rounds += 1;
                                        transcript.push(
                                            ChatMessage::assistant_with_tool_calls(
                                                content,
                                                tool_calls.clone(),
                                            ),
                                        );
                                        let outstanding =
                                            tool_calls.iter().map(|c| c.id.clone()).collect();
                                        State::ToolWait {
                                            calls: tool_calls,
                                            outstanding,
                                        }
                                    }
                                }
                            }
                        }
                    }
                }

                State::ToolWait {
                    calls,
                    mut outstanding,
                } => {
                    debug!(count = calls.len(), round = tool_rounds, "Executing tool calls");
                    let results = join_all(
                        calls
                            .iter()
                            .map(|call| self.execute_tool(call, &ctx, tool_rounds)),
                    )
                    .await;

                    // join_all keeps issue order, so results are appended in
                    // the order the backend asked for them.
                    for (message, record) in results {
                        outstanding.remove(&record.id);
                        transcript.push(message);
                        records.push(record);
                    }

                    if outstanding.is_empty() {
                        State::Reasoning
                    } else {
                        State::Degraded(DegradeReason::BackendFailure(format!(
                            "unresolved tool calls: {:?}",
                            outstanding
                        )))
                    }
                }

                State::Completed(raw) => {
                    break (verdict::finalize(Some(raw)), RunOutcome::Completed);
                }
                State::Degraded(cause) => {
                    break (
                        verdict::degraded_verdict(&cause),
                        RunOutcome::Degraded { cause },
                    );
                }
            };
        };

        warn_unscanned(&urls, &records);

        let estimated_cost = estimate_cost(
            self.reasoning.cost_per_token(),
            usage.input_tokens,
            usage.output_tokens,
        );

        let outcome_label = if outcome.is_degraded() {
            "degraded"
        } else {
            "completed"
        };
        info!(
            outcome = outcome_label,
            is_phishing = verdict.is_phishing,
            threat_level = %verdict.threat_level,
            safety_score = verdict.safety_score,
            rounds,
            tool_calls = records.len(),
            tokens = usage.total(),
            elapsed_ms = ctx.elapsed_ms(),
            "Analysis finished"
        );

        AnalysisRun {
            request_id: ctx.request_id,
            verdict,
            outcome,
            tool_calls: records,
            rounds,
            model: self.reasoning.model_name().to_string(),
            usage,
            estimated_cost,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
        }
    }

    /// Execute one tool call. Failures become error results for the backend;
    /// they never abort the run.
    async fn execute_tool(
        &self,
        call: &ToolCall,
        ctx: &AnalysisContext,
        round: usize,
    ) -> (ChatMessage, ToolCallRecord) {
        let start = Instant::now();
        let result = match self.tools.get(&call.name) {
            None => Err(ToolError::NotFound(call.name.clone())),
            Some(tool) => {
                let timeout = tool.execution_timeout();
                match tokio::time::timeout(timeout, tool.execute(call.arguments.clone(), ctx)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::Timeout(timeout)),
                }
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (content, is_error) = match result {
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    elapsed_ms,
                    tool_ms = output.duration.as_millis() as u64,
                    "Tool call succeeded"
                );
                match serde_json::to_string(&output.result) {
                    Ok(json) => (json, false),
                    Err(e) => (tool_error_content(&format!("Failed to serialize result: {e}")), true),
                }
            }
            Err(e) => (tool_error_content(&e.to_string()), true),
        };

        if is_error {
            warn!(tool = %call.name, elapsed_ms, error = %content, "Tool call failed");
        }

        let message = if is_error {
            ChatMessage::tool_error(&call.id, &call.name, &content)
        } else {
            ChatMessage::tool_result(&call.id, &call.name, &content)
        };
        let record = ToolCallRecord {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: content,
            is_error,
            round,
            elapsed_ms,
        };
        (message, record)
    }
}

/// Error result shown to the backend. Mirrors the `scanURL` output shape so
/// a failed lookup reads as "not safe".
fn tool_error_content(error: &str) -> String {
    serde_json::json!({
        "isSafe": false,
        "message": format!("Error: {error}. The URL is unverified and must not be treated as safe."),
    })
    .to_string()
}

/// Turn the backend's final text into the next state.
fn parse_final_answer(text: &str) -> State {
    if text.trim().is_empty() {
        warn!("Backend returned empty output");
        return State::Degraded(DegradeReason::EmptyOutput);
    }

    let parsed = extract_json_value(text).and_then(|value| {
        RawVerdict::from_json(&value).ok_or_else(|| "not a JSON object".to_string())
    });

    match parsed {
        Ok(raw) => State::Completed(raw),
        Err(reason) => {
            warn!(error = %reason, "Backend output is not a verdict object");
            State::Degraded(DegradeReason::MalformedOutput(reason))
        }
    }
}

/// Read the verdict JSON out of LLM output: a bare value, a fenced block, or
/// an object embedded in prose. Anything after the first complete object is
/// ignored.
fn extract_json_value(text: &str) -> Result<Value, String> {
    let body = strip_code_fence(text.trim());

    let whole_error = match serde_json::from_str::<Value>(body) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    // Embedded candidates must carry at least one verdict field, so a nested
    // object inside truncated output is not mistaken for the answer.
    let mut first_error = None;
    for (start, _) in body.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) if is_verdict_shaped(&value) => return Ok(value),
            Some(Err(e)) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
            _ => {}
        }
    }

    Err(first_error.unwrap_or(whole_error))
}

/// Contents of the first ``` fence, or `text` unchanged when there is none.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after = &text[open + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(close) => after[..close].trim(),
        None => after.trim(),
    }
}

fn is_verdict_shaped(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| VERDICT_FIELDS.iter().any(|field| obj.contains_key(*field)))
}

/// Log pre-detected URLs the backend never asked to scan.
fn warn_unscanned(urls: &[String], records: &[ToolCallRecord]) {
    let scanned: Vec<&str> = records
        .iter()
        .filter(|r| r.name == SCAN_URL_TOOL)
        .filter_map(|r| r.arguments.get("url").and_then(|u| u.as_str()))
        .collect();
    for url in urls {
        let bare = url.trim_end_matches('/');
        if !scanned.iter().any(|s| s.contains(bare)) {
            warn!(url = %url, "URL in content was not scanned");
        }
    }
}
