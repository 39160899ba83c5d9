//! Caller-facing entry point: wires the normalizer, orchestrator and
//! collaborators together.

use std::sync::Arc;

use tracing::info;

use crate::config::{AnalyzerConfig, Config, OcrConfig, ReputationConfig};
use crate::error::{AnalysisError, LlmError};
use crate::extract::{ContainerReader, HttpOcrClient, MailParserReader, TextExtractor, VisionOcr};
use crate::llm::{LlmProvider, create_provider};
use crate::pipeline::verdict::no_content_verdict;
use crate::pipeline::{
    AnalysisOrchestrator, AnalysisRequest, AnalysisRun, AnalysisVerdict, InputNormalizer,
};
use crate::reputation::{HeuristicScanner, SafeBrowsingClient, UrlReputation};
use crate::tools::ToolRegistry;

/// Phishing analyzer. Cheap to share behind an `Arc`; concurrent calls
/// only read shared state.
pub struct PhishingAnalyzer {
    normalizer: InputNormalizer,
    orchestrator: AnalysisOrchestrator,
}

impl PhishingAnalyzer {
    pub fn new(normalizer: InputNormalizer, orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            normalizer,
            orchestrator,
        }
    }

    /// Build an analyzer from explicit collaborators.
    pub fn with_collaborators(
        llm: Arc<dyn LlmProvider>,
        ocr: Arc<dyn TextExtractor>,
        reader: Arc<dyn ContainerReader>,
        oracle: Arc<dyn UrlReputation>,
        config: AnalyzerConfig,
    ) -> Self {
        let tools = Arc::new(ToolRegistry::with_url_scanner(oracle, config.tool_timeout));
        let normalizer = InputNormalizer::new(ocr, reader).with_attach_images(config.attach_images);
        let orchestrator = AnalysisOrchestrator::new(llm, tools, config);
        Self::new(normalizer, orchestrator)
    }

    /// Build an analyzer from runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let llm = create_provider(&config.llm)?;
        let ocr = ocr_from_config(&config.ocr, llm.clone());
        let oracle = oracle_from_config(&config.reputation);
        Ok(Self::with_collaborators(
            llm,
            ocr,
            Arc::new(MailParserReader::new()),
            oracle,
            config.analyzer.clone(),
        ))
    }

    /// Analyze optional text, image data URI and email data URI.
    ///
    /// Malformed payloads and collaborator outages are errors. Reasoning
    /// failures are not: they yield a fail-closed verdict.
    pub async fn analyze_content(
        &self,
        text: Option<String>,
        image_data_uri: Option<String>,
        email_data_uri: Option<String>,
    ) -> Result<AnalysisVerdict, AnalysisError> {
        let request = AnalysisRequest::new(text, image_data_uri, email_data_uri);
        self.analyze(&request).await
    }

    /// Analyze a prepared request.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisVerdict, AnalysisError> {
        if request.is_empty() {
            info!("Empty request, returning no-content verdict");
            return Ok(no_content_verdict());
        }
        let content = self.normalizer.normalize(request).await?;
        Ok(self.orchestrator.analyze(&content).await)
    }

    /// Like `analyze`, returning the diagnostic run record. An empty request
    /// has no run and yields `None`.
    pub async fn analyze_detailed(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalysisRun>, AnalysisError> {
        if request.is_empty() {
            return Ok(None);
        }
        let content = self.normalizer.normalize(request).await?;
        Ok(Some(self.orchestrator.analyze_detailed(&content).await))
    }
}

fn ocr_from_config(config: &OcrConfig, llm: Arc<dyn LlmProvider>) -> Arc<dyn TextExtractor> {
    match config.url {
        Some(ref url) => {
            info!(url = %url, "Using HTTP OCR service");
            Arc::new(HttpOcrClient::new(url, config.api_key.clone()).with_timeout(config.timeout))
        }
        None => {
            info!("Using vision model for OCR");
            Arc::new(VisionOcr::new(llm).with_timeout(config.timeout))
        }
    }
}

fn oracle_from_config(config: &ReputationConfig) -> Arc<dyn UrlReputation> {
    match config.safe_browsing_key {
        Some(ref key) => {
            info!("Using Safe Browsing URL reputation");
            Arc::new(SafeBrowsingClient::new(key.clone()))
        }
        None => {
            info!("Using heuristic URL reputation");
            Arc::new(HeuristicScanner::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmBackend, LlmConfig};

    #[test]
    fn builds_from_config_without_network() {
        let config = Config {
            llm: LlmConfig {
                backend: LlmBackend::Anthropic,
                api_key: secrecy::SecretString::from("test-key"),
                model: "claude-3-5-haiku-latest".into(),
                base_url: None,
            },
            analyzer: AnalyzerConfig::default(),
            ocr: OcrConfig::default(),
            reputation: ReputationConfig::default(),
            server: crate::config::ServerConfig::default(),
        };
        assert!(PhishingAnalyzer::from_config(&config).is_ok());
    }
}
