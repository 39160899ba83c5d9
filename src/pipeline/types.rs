//! Shared types for the analysis pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExtractionError;
use crate::extract::DataUri;
use crate::llm::TokenUsage;

// ── Request ─────────────────────────────────────────────────────────

/// An undecoded `data:<mime>;base64,<data>` string as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn decode(&self) -> Result<DataUri, ExtractionError> {
        DataUri::parse(&self.0)
    }
}

/// One analysis request. Any field may be absent; blank strings count as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub text: Option<String>,
    pub image: Option<EncodedPayload>,
    pub email: Option<EncodedPayload>,
}

impl AnalysisRequest {
    pub fn new(text: Option<String>, image: Option<String>, email: Option<String>) -> Self {
        Self {
            text: non_blank(text),
            image: non_blank(image).map(EncodedPayload::new),
            email: non_blank(email).map(EncodedPayload::new),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Some(text.into()), None, None)
    }

    /// True when there is nothing to analyze.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none() && self.email.is_none()
    }
}

/// Whitespace-only input counts as absent and never reaches the backend.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Normalized content for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct EnrichedContent {
    /// Caller text, then `Image Text:` and `Email Content:` sections.
    pub text: String,
    /// Raster image to show a vision-capable backend.
    pub image: Option<DataUri>,
}

impl EnrichedContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Overall risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Safe,
    Suspicious,
    Dangerous,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Suspicious => "Suspicious",
            Self::Dangerous => "Dangerous",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "suspicious" => Ok(Self::Suspicious),
            "dangerous" => Ok(Self::Dangerous),
            other => Err(format!("unknown threat level '{other}'")),
        }
    }
}

/// Final result of one analysis. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisVerdict {
    pub is_phishing: bool,
    pub indicators: Vec<String>,
    /// 0 = definitely phishing, 1 = definitely safe.
    pub safety_score: f64,
    pub explanation: String,
    pub threat_level: ThreatLevel,
    pub risk_factors: Vec<String>,
}

/// Backend verdict with every field optional, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVerdict {
    pub is_phishing: Option<bool>,
    pub indicators: Option<Vec<String>>,
    pub safety_score: Option<f64>,
    pub explanation: Option<String>,
    /// Kept as text; unknown levels are dropped during normalization.
    pub threat_level: Option<String>,
    pub risk_factors: Option<Vec<String>>,
}

// ── Run record ──────────────────────────────────────────────────────

/// Why a run ended without a usable backend verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DegradeReason {
    /// Network, quota, auth or protocol failure talking to the backend.
    BackendFailure(String),
    /// The backend answered with nothing.
    EmptyOutput,
    /// The backend answered with something that is not a JSON object.
    MalformedOutput(String),
    /// The backend kept calling tools past the configured limit.
    ToolRoundsExceeded(usize),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendFailure(e) => write!(f, "backend failure: {e}"),
            Self::EmptyOutput => f.write_str("empty backend output"),
            Self::MalformedOutput(e) => write!(f, "malformed backend output: {e}"),
            Self::ToolRoundsExceeded(n) => write!(f, "exceeded {n} tool rounds"),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Degraded { cause: DegradeReason },
}

impl RunOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// One resolved tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    /// Content sent back to the backend.
    pub result: String,
    pub is_error: bool,
    pub round: usize,
    pub elapsed_ms: u64,
}

/// Diagnostic record of one orchestration run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub request_id: Uuid,
    pub verdict: AnalysisVerdict,
    pub outcome: RunOutcome,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Reasoning calls made.
    pub rounds: usize,
    pub model: String,
    pub usage: TokenUsage,
    pub estimated_cost: Decimal,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_count_as_absent() {
        let request = AnalysisRequest::new(Some("  ".into()), Some(String::new()), None);
        assert!(request.is_empty());
        assert!(!AnalysisRequest::text("hi").is_empty());
    }

    #[test]
    fn threat_level_parses_case_insensitively() {
        assert_eq!("DANGEROUS".parse::<ThreatLevel>(), Ok(ThreatLevel::Dangerous));
        assert_eq!(" suspicious ".parse::<ThreatLevel>(), Ok(ThreatLevel::Suspicious));
        assert!("critical".parse::<ThreatLevel>().is_err());
    }

    #[test]
    fn verdict_serializes_with_camel_case_names() {
        let verdict = AnalysisVerdict {
            is_phishing: true,
            indicators: vec!["urgency".into()],
            safety_score: 0.2,
            explanation: "x".into(),
            threat_level: ThreatLevel::Dangerous,
            risk_factors: vec![],
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["isPhishing"], true);
        assert_eq!(json["safetyScore"], 0.2);
        assert_eq!(json["threatLevel"], "Dangerous");
        assert_eq!(json["riskFactors"], serde_json::json!([]));
    }

    #[test]
    fn degraded_outcome_serializes_reason() {
        let outcome = RunOutcome::Degraded {
            cause: DegradeReason::ToolRoundsExceeded(6),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "degraded");
        assert_eq!(json["cause"]["reason"], "tool_rounds_exceeded");
        assert_eq!(json["cause"]["detail"], 6);
    }
}
