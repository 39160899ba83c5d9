//! Verdict normalization: per-field defaults, output invariants and the
//! fail-closed fallback verdicts.

use serde_json::Value;

use crate::pipeline::types::{AnalysisVerdict, DegradeReason, RawVerdict, ThreatLevel};

/// Value used for each field the backend leaves out.
struct VerdictDefaults {
    is_phishing: bool,
    indicators: &'static [&'static str],
    safety_score: f64,
    explanation: &'static str,
    threat_level: ThreatLevel,
    risk_factors: &'static [&'static str],
}

const DEFAULTS: VerdictDefaults = VerdictDefaults {
    is_phishing: false,
    indicators: &[],
    safety_score: 1.0,
    explanation: "No explanation provided.",
    threat_level: ThreatLevel::Safe,
    risk_factors: &[],
};

/// Fail-closed verdict parameters for one class of failure.
struct Fallback {
    indicator: &'static str,
    safety_score: f64,
    explanation: &'static str,
}

const NO_OUTPUT: Fallback = Fallback {
    indicator: "No analysis performed",
    safety_score: 0.2,
    explanation: "No analysis could be performed, possibly due to technical issues. \
                  Treat with extreme caution.",
};

const FAILED: Fallback = Fallback {
    indicator: "Analysis failed",
    safety_score: 0.1,
    explanation: "Failed to analyze content. Please treat as potentially dangerous.",
};

const TECHNICAL_FAILURE: &str = "Technical failure";

/// Keys of the verdict object the backend is asked to produce.
pub const VERDICT_FIELDS: [&str; 6] = [
    "isPhishing",
    "indicators",
    "safetyScore",
    "explanation",
    "threatLevel",
    "riskFactors",
];

pub const NO_CONTENT_EXPLANATION: &str = "No content provided for analysis.";

/// Verdict for a request with nothing to analyze.
pub fn no_content_verdict() -> AnalysisVerdict {
    AnalysisVerdict {
        is_phishing: false,
        indicators: Vec::new(),
        safety_score: 1.0,
        explanation: NO_CONTENT_EXPLANATION.to_string(),
        threat_level: ThreatLevel::Safe,
        risk_factors: Vec::new(),
    }
}

/// Fail-closed verdict for a degraded run.
pub fn degraded_verdict(reason: &DegradeReason) -> AnalysisVerdict {
    let fallback = match reason {
        DegradeReason::EmptyOutput => &NO_OUTPUT,
        DegradeReason::BackendFailure(_)
        | DegradeReason::MalformedOutput(_)
        | DegradeReason::ToolRoundsExceeded(_) => &FAILED,
    };
    AnalysisVerdict {
        is_phishing: true,
        indicators: vec![fallback.indicator.to_string()],
        safety_score: fallback.safety_score,
        explanation: fallback.explanation.to_string(),
        threat_level: ThreatLevel::Dangerous,
        risk_factors: vec![TECHNICAL_FAILURE.to_string()],
    }
}

/// Apply per-field defaults and output invariants to a backend verdict.
///
/// `None` means the backend produced nothing usable.
pub fn finalize(raw: Option<RawVerdict>) -> AnalysisVerdict {
    let Some(raw) = raw else {
        return degraded_verdict(&DegradeReason::EmptyOutput);
    };

    let threat_level = raw.threat_level.as_deref().and_then(|level| {
        level
            .parse::<ThreatLevel>()
            .map_err(|e| tracing::warn!("Ignoring backend threat level: {}", e))
            .ok()
    });

    let verdict = AnalysisVerdict {
        is_phishing: raw.is_phishing.unwrap_or(DEFAULTS.is_phishing),
        indicators: raw
            .indicators
            .unwrap_or_else(|| to_strings(DEFAULTS.indicators)),
        safety_score: raw
            .safety_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0))
            .unwrap_or(DEFAULTS.safety_score),
        // Blank counts as omitted, not only null.
        explanation: raw
            .explanation
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULTS.explanation.to_string()),
        threat_level: threat_level.unwrap_or(DEFAULTS.threat_level),
        risk_factors: raw
            .risk_factors
            .unwrap_or_else(|| to_strings(DEFAULTS.risk_factors)),
    };

    for issue in consistency_issues(&verdict) {
        tracing::warn!(issue = %issue, "Inconsistent verdict from backend");
    }

    verdict
}

/// Contradictions between `threatLevel`, `isPhishing` and `safetyScore`.
/// Reported only; the verdict is never rewritten.
pub fn consistency_issues(verdict: &AnalysisVerdict) -> Vec<String> {
    let mut issues = Vec::new();
    match (verdict.threat_level, verdict.is_phishing) {
        (ThreatLevel::Dangerous, false) => {
            issues.push("threatLevel is Dangerous but isPhishing is false".to_string());
        }
        (ThreatLevel::Safe, true) => {
            issues.push("threatLevel is Safe but isPhishing is true".to_string());
        }
        _ => {}
    }
    if verdict.is_phishing && verdict.safety_score > 0.7 {
        issues.push(format!(
            "isPhishing is true but safetyScore is {:.2}",
            verdict.safety_score
        ));
    }
    if !verdict.is_phishing && verdict.safety_score < 0.3 {
        issues.push(format!(
            "isPhishing is false but safetyScore is {:.2}",
            verdict.safety_score
        ));
    }
    issues
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RawVerdict {
    /// Read a backend JSON object leniently. Fields with the wrong shape
    /// count as omitted. Returns `None` when `value` is not an object.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            is_phishing: obj.get("isPhishing").and_then(lenient_bool),
            indicators: obj.get("indicators").and_then(string_list),
            safety_score: obj.get("safetyScore").and_then(lenient_f64),
            explanation: obj
                .get("explanation")
                .and_then(Value::as_str)
                .map(str::to_string),
            threat_level: obj
                .get("threatLevel")
                .and_then(Value::as_str)
                .map(str::to_string),
            risk_factors: obj.get("riskFactors").and_then(string_list),
        })
    }
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_raw_verdict_is_no_analysis_performed() {
        let verdict = finalize(None);
        assert!(verdict.is_phishing);
        assert_eq!(verdict.indicators, vec!["No analysis performed"]);
        assert_eq!(verdict.safety_score, 0.2);
        assert_eq!(verdict.threat_level, ThreatLevel::Dangerous);
        assert_eq!(verdict.risk_factors, vec!["Technical failure"]);
    }

    #[test]
    fn every_field_defaults_when_omitted() {
        let verdict = finalize(Some(RawVerdict::default()));
        assert_eq!(
            verdict,
            AnalysisVerdict {
                is_phishing: false,
                indicators: vec![],
                safety_score: 1.0,
                explanation: "No explanation provided.".into(),
                threat_level: ThreatLevel::Safe,
                risk_factors: vec![],
            }
        );
    }

    #[test]
    fn blank_explanation_gets_the_default() {
        let raw = RawVerdict::from_json(&json!({"isPhishing": false, "explanation": "  \n"})).unwrap();
        assert_eq!(finalize(Some(raw)).explanation, "No explanation provided.");
    }

    #[test]
    fn provided_indicators_survive_missing_threat_level() {
        let raw = RawVerdict::from_json(&json!({
            "isPhishing": true,
            "indicators": ["urgency cue", "misspelled domain"],
            "safetyScore": 0.15
        }))
        .unwrap();
        let verdict = finalize(Some(raw));
        assert_eq!(verdict.indicators, vec!["urgency cue", "misspelled domain"]);
        assert_eq!(verdict.risk_factors, Vec::<String>::new());
        assert_eq!(verdict.threat_level, ThreatLevel::Safe);
        assert!(verdict.is_phishing);
    }

    #[test]
    fn score_is_clamped_and_non_finite_is_omitted() {
        let high = finalize(Some(RawVerdict {
            safety_score: Some(7.5),
            ..Default::default()
        }));
        assert_eq!(high.safety_score, 1.0);

        let low = finalize(Some(RawVerdict {
            safety_score: Some(-0.4),
            ..Default::default()
        }));
        assert_eq!(low.safety_score, 0.0);

        let nan = finalize(Some(RawVerdict {
            safety_score: Some(f64::NAN),
            ..Default::default()
        }));
        assert_eq!(nan.safety_score, 1.0);
    }

    #[test]
    fn threat_level_is_case_insensitive_and_unknown_is_omitted() {
        let raw = RawVerdict::from_json(&json!({"threatLevel": "dangerous"})).unwrap();
        assert_eq!(finalize(Some(raw)).threat_level, ThreatLevel::Dangerous);

        let raw = RawVerdict::from_json(&json!({"threatLevel": "Catastrophic"})).unwrap();
        assert_eq!(finalize(Some(raw)).threat_level, ThreatLevel::Safe);
    }

    #[test]
    fn wrong_shaped_fields_count_as_omitted() {
        let raw = RawVerdict::from_json(&json!({
            "isPhishing": "yes",
            "indicators": "not a list",
            "safetyScore": "0.4",
            "explanation": 12,
            "riskFactors": ["ok", 3, " "]
        }))
        .unwrap();
        assert_eq!(raw.is_phishing, Some(true));
        assert_eq!(raw.indicators, None);
        assert_eq!(raw.safety_score, Some(0.4));
        assert_eq!(raw.explanation, None);
        assert_eq!(raw.risk_factors, Some(vec!["ok".to_string()]));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(RawVerdict::from_json(&json!(["a"])).is_none());
        assert!(RawVerdict::from_json(&json!("text")).is_none());
    }

    #[test]
    fn degraded_verdicts_are_fail_closed() {
        for reason in [
            DegradeReason::BackendFailure("timeout".into()),
            DegradeReason::MalformedOutput("not json".into()),
            DegradeReason::ToolRoundsExceeded(6),
        ] {
            let verdict = degraded_verdict(&reason);
            assert!(verdict.is_phishing);
            assert_eq!(verdict.threat_level, ThreatLevel::Dangerous);
            assert_eq!(verdict.safety_score, 0.1);
            assert_eq!(verdict.indicators, vec!["Analysis failed"]);
        }
    }

    #[test]
    fn consistency_check_reports_without_rewriting() {
        let raw = RawVerdict {
            is_phishing: Some(false),
            threat_level: Some("Dangerous".into()),
            safety_score: Some(0.1),
            ..Default::default()
        };
        let verdict = finalize(Some(raw));
        assert!(!verdict.is_phishing);
        assert_eq!(verdict.threat_level, ThreatLevel::Dangerous);
        assert_eq!(consistency_issues(&verdict).len(), 2);
    }

    #[test]
    fn no_content_verdict_is_safe() {
        let verdict = no_content_verdict();
        assert!(!verdict.is_phishing);
        assert_eq!(verdict.safety_score, 1.0);
        assert_eq!(verdict.explanation, "No content provided for analysis.");
        assert!(consistency_issues(&verdict).is_empty());
    }
}
