//! phish-guard: phishing content analysis.
//!
//! Text, screenshots and raw email files are normalized into one text blob,
//! analyzed by an LLM that can check URLs through the `scanURL` tool, and
//! reduced to a structured verdict. Failures after normalization fail closed.

pub mod analyzer;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod reputation;
pub mod server;
pub mod tools;

pub use analyzer::PhishingAnalyzer;
pub use error::AnalysisError;
pub use pipeline::{AnalysisVerdict, ThreatLevel};
