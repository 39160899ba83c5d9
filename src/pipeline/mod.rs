//! Content-analysis pipeline.
//!
//! Every request flows through:
//! 1. `InputNormalizer::normalize()`: decode payloads, run OCR and the
//!    message reader, build one enriched text blob
//! 2. `AnalysisOrchestrator::analyze()`: reasoning loop with `scanURL`
//! 3. `verdict::finalize()`: per-field defaults and output invariants
//!
//! **Fail-closed.** Once input is normalized, every failure ends in a
//! `Dangerous` verdict.

pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod types;
pub mod verdict;

pub use normalizer::InputNormalizer;
pub use orchestrator::AnalysisOrchestrator;
pub use types::{
    AnalysisRequest, AnalysisRun, AnalysisVerdict, DegradeReason, EncodedPayload,
    EnrichedContent, RawVerdict, RunOutcome, ThreatLevel, ToolCallRecord,
};
