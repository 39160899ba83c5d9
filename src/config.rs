//! Configuration types.
//!
//! Everything is read from the environment once at startup.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::llm::reasoning::DEFAULT_REASONING_TIMEOUT;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Tool rounds allowed before the run is abandoned as degraded.
    pub max_tool_rounds: usize,
    /// Per tool-call timeout.
    pub tool_timeout: Duration,
    /// Per reasoning-call timeout. A backend that misses it degrades the run.
    pub llm_timeout: Duration,
    /// Max tokens per reasoning call.
    pub max_tokens: u32,
    /// Sampling temperature for reasoning calls.
    pub temperature: f32,
    /// Send raster images to the backend alongside their OCR text.
    pub attach_images: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 6,
            tool_timeout: Duration::from_secs(10),
            llm_timeout: DEFAULT_REASONING_TIMEOUT,
            max_tokens: 1024,
            temperature: 0.1,
            attach_images: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_tool_rounds = env_or("PHISH_GUARD_MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?;
        if max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PHISH_GUARD_MAX_TOOL_ROUNDS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            max_tool_rounds,
            tool_timeout: Duration::from_secs(env_or(
                "PHISH_GUARD_TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )?),
            llm_timeout: Duration::from_secs(env_or(
                "PHISH_GUARD_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            max_tokens: env_or("PHISH_GUARD_MAX_TOKENS", defaults.max_tokens)?,
            temperature: defaults.temperature,
            attach_images: env_flag("PHISH_GUARD_ATTACH_IMAGES", defaults.attach_images)?,
        })
    }
}

/// OCR collaborator selection. Without a URL, OCR goes through the LLM.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OcrConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_opt("PHISH_GUARD_OCR_URL"),
            api_key: env_opt("PHISH_GUARD_OCR_API_KEY").map(SecretString::from),
            timeout: Duration::from_secs(env_or(
                "PHISH_GUARD_OCR_TIMEOUT_SECS",
                Self::default().timeout.as_secs(),
            )?),
        })
    }
}

/// URL-reputation oracle selection. Without a key, the local heuristic
/// scanner is used.
#[derive(Debug, Clone, Default)]
pub struct ReputationConfig {
    pub safe_browsing_key: Option<SecretString>,
}

impl ReputationConfig {
    pub fn from_env() -> Self {
        Self {
            safe_browsing_key: env_opt("PHISH_GUARD_SAFE_BROWSING_KEY").map(SecretString::from),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env_or("PHISH_GUARD_PORT", Self::default().port)?,
        })
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub analyzer: AnalyzerConfig,
    pub ocr: OcrConfig,
    pub reputation: ReputationConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmConfig::from_env()?,
            analyzer: AnalyzerConfig::from_env()?,
            ocr: OcrConfig::from_env()?,
            reputation: ReputationConfig::from_env(),
            server: ServerConfig::from_env()?,
        })
    }
}

/// Non-blank value of `key`.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key`, falling back to `default` when unset. A value that does not
/// parse is an error rather than a silent default.
fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_opt(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{v}' is not a boolean"),
            }),
        },
    }
}
