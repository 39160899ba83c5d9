//! Error types for phish-guard.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Model {model} not available on provider {provider}")]
    ModelNotAvailable { provider: String, model: String },

    #[error("Model {model} did not respond within {after:?}")]
    Timeout { model: String, after: Duration },
}

/// Errors raised by the OCR service or the message-container reader.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The payload is structurally invalid for this collaborator.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The collaborator could not be reached or returned an error.
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },
}

/// URL-reputation oracle errors.
#[derive(Debug, thiserror::Error)]
pub enum ReputationError {
    #[error("Reputation lookup for {url} failed: {reason}")]
    LookupFailed { url: String, reason: String },

    #[error("Reputation service returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// Input normalization errors. Raised before any reasoning call is made.
#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error("Malformed {field} payload: {reason}")]
    MalformedPayload { field: String, reason: String },

    #[error("{collaborator} failed: {reason}")]
    Collaborator { collaborator: String, reason: String },
}

impl NormalizationError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Map a collaborator error: format problems are payload problems,
    /// anything else is a collaborator failure.
    pub fn from_extraction(field: &str, collaborator: &str, err: ExtractionError) -> Self {
        match err {
            ExtractionError::InvalidFormat(reason) => Self::malformed(field, reason),
            other => Self::Collaborator {
                collaborator: collaborator.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Caller-facing analysis failure. Only input problems surface here;
/// reasoning failures are absorbed into a fail-closed verdict.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to analyze content: {0}")]
    Normalization(#[from] NormalizationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_format_maps_to_malformed_payload() {
        let err = NormalizationError::from_extraction(
            "email",
            "message reader",
            ExtractionError::InvalidFormat("missing payload".into()),
        );
        assert!(matches!(err, NormalizationError::MalformedPayload { ref field, .. } if field == "email"));
    }

    #[test]
    fn unavailable_maps_to_collaborator_failure() {
        let err = NormalizationError::from_extraction(
            "image",
            "ocr",
            ExtractionError::Unavailable {
                service: "ocr".into(),
                reason: "connection refused".into(),
            },
        );
        match err {
            NormalizationError::Collaborator { collaborator, reason } => {
                assert_eq!(collaborator, "ocr");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("Expected Collaborator, got {:?}", other),
        }
    }

    #[test]
    fn analysis_error_message_is_human_readable() {
        let err: AnalysisError = NormalizationError::malformed("image", "missing data: prefix").into();
        assert_eq!(
            err.to_string(),
            "Failed to analyze content: Malformed image payload: missing data: prefix"
        );
    }
}
