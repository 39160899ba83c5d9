//! Optical text extraction.
//!
//! Two backends:
//! - `HttpOcrClient` posts the data URI to an OCR endpoint
//! - `VisionOcr` asks the configured LLM to transcribe the image

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ExtractionError;
use crate::extract::data_uri::DataUri;
use crate::llm::{ChatMessage, CompletionRequest, ImageAttachment, LlmProvider};

const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns an image into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract visible text from an image payload.
    async fn extract_text(&self, image: &DataUri) -> Result<String, ExtractionError>;
}

/// OCR over HTTP.
///
/// Request: `POST <url>` with `{"image": "<data uri>"}`.
/// Response: `{"text": "..."}`.
pub struct HttpOcrClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<secrecy::SecretString>,
    timeout: Duration,
}

impl HttpOcrClient {
    pub fn new(url: impl Into<String>, api_key: Option<secrecy::SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
            timeout: DEFAULT_OCR_TIMEOUT,
        }
    }

    /// Bound the whole request, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl TextExtractor for HttpOcrClient {
    async fn extract_text(&self, image: &DataUri) -> Result<String, ExtractionError> {
        use secrecy::ExposeSecret;

        let unavailable = |reason: String| ExtractionError::Unavailable {
            service: "ocr".to_string(),
            reason,
        };

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "image": image.as_str() }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 415 {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::InvalidFormat(format!(
                "OCR service rejected the image: {body}"
            )));
        }
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status.as_u16())));
        }

        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("unreadable response: {e}")))?;
        tracing::debug!(chars = parsed.text.len(), "OCR extracted text");
        Ok(parsed.text)
    }
}

const TRANSCRIBE_PROMPT: &str = "Transcribe every piece of visible text in this image exactly as \
written, including URLs, email addresses, sender names and button labels. Output only the \
transcribed text. If there is no text, output nothing.";

/// OCR through a vision-capable LLM.
pub struct VisionOcr {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
    timeout: Duration,
}

impl VisionOcr {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            max_tokens: 1024,
            timeout: DEFAULT_OCR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TextExtractor for VisionOcr {
    async fn extract_text(&self, image: &DataUri) -> Result<String, ExtractionError> {
        if !image.is_raster_image() {
            return Err(ExtractionError::InvalidFormat(format!(
                "unsupported image type '{}'",
                image.media_type()
            )));
        }

        let message = ChatMessage::user(TRANSCRIBE_PROMPT).with_image(ImageAttachment {
            media_type: image.media_type().to_string(),
            data_base64: image.base64_data(),
        });
        let request = CompletionRequest::new(vec![message])
            .with_temperature(0.0)
            .with_max_tokens(self.max_tokens);

        let unavailable = |reason: String| ExtractionError::Unavailable {
            service: "vision ocr".to_string(),
            reason,
        };
        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| unavailable(format!("no response within {:?}", self.timeout)))?
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(response.content.trim().to_string())
    }
}
