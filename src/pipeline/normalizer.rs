//! Input normalization: decode the three content channels into one
//! enriched text blob.

use std::sync::Arc;

use tracing::debug;

use crate::error::NormalizationError;
use crate::extract::{ContainerReader, DataUri, TextExtractor};
use crate::pipeline::types::{AnalysisRequest, EncodedPayload, EnrichedContent};

const IMAGE_SECTION: &str = "\nImage Text: ";
const EMAIL_SECTION: &str = "\nEmail Content: ";

/// Builds `EnrichedContent` from a request using the OCR and
/// message-container collaborators.
pub struct InputNormalizer {
    ocr: Arc<dyn TextExtractor>,
    reader: Arc<dyn ContainerReader>,
    attach_images: bool,
}

impl InputNormalizer {
    pub fn new(ocr: Arc<dyn TextExtractor>, reader: Arc<dyn ContainerReader>) -> Self {
        Self {
            ocr,
            reader,
            attach_images: true,
        }
    }

    /// Whether raster images are carried along for a vision-capable backend.
    pub fn with_attach_images(mut self, attach: bool) -> Self {
        self.attach_images = attach;
        self
    }

    /// Decode and enrich a request.
    ///
    /// Both payloads are decoded before any collaborator runs, so a malformed
    /// email is reported without spending an OCR call on the image.
    pub async fn normalize(
        &self,
        request: &AnalysisRequest,
    ) -> Result<EnrichedContent, NormalizationError> {
        let image = decode(request.image.as_ref(), "image")?;
        let email = decode(request.email.as_ref(), "email")?;

        let mut text = request.text.clone().unwrap_or_default();

        if let Some(ref image) = image {
            let ocr_text = self
                .ocr
                .extract_text(image)
                .await
                .map_err(|e| NormalizationError::from_extraction("image", "ocr", e))?;
            debug!(chars = ocr_text.len(), "Image text extracted");
            text.push_str(IMAGE_SECTION);
            text.push_str(&ocr_text);
        }

        if let Some(ref email) = email {
            let email_text = self
                .reader
                .read_container(email)
                .await
                .map_err(|e| NormalizationError::from_extraction("email", "message reader", e))?;
            debug!(chars = email_text.len(), "Email content extracted");
            text.push_str(EMAIL_SECTION);
            text.push_str(&email_text);
        }

        let image = image.filter(|img| self.attach_images && img.is_raster_image());
        Ok(EnrichedContent { text, image })
    }
}

fn decode(
    payload: Option<&EncodedPayload>,
    field: &str,
) -> Result<Option<DataUri>, NormalizationError> {
    payload
        .map(|p| {
            p.decode()
                .map_err(|e| NormalizationError::from_extraction(field, "decoder", e))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::extract::MailParserReader;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOcr {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl FixedOcr {
        fn new(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                text,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextExtractor for FixedOcr {
        async fn extract_text(&self, _image: &DataUri) -> Result<String, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    struct DownOcr;

    #[async_trait]
    impl TextExtractor for DownOcr {
        async fn extract_text(&self, _image: &DataUri) -> Result<String, ExtractionError> {
            Err(ExtractionError::Unavailable {
                service: "ocr".into(),
                reason: "503".into(),
            })
        }
    }

    fn png() -> String {
        DataUri::from_bytes("image/png", vec![0x89, 0x50, 0x4e, 0x47])
            .as_str()
            .to_string()
    }

    fn eml() -> String {
        DataUri::from_bytes(
            "message/rfc822",
            b"From: a@b.example\r\nSubject: Hello\r\n\r\nBody text\r\n".to_vec(),
        )
        .as_str()
        .to_string()
    }

    #[tokio::test]
    async fn text_only_passes_through() {
        let normalizer = InputNormalizer::new(FixedOcr::new(""), Arc::new(MailParserReader));
        let content = normalizer
            .normalize(&AnalysisRequest::text("Lunch at noon?"))
            .await
            .unwrap();
        assert_eq!(content.text, "Lunch at noon?");
        assert!(content.image.is_none());
    }

    #[tokio::test]
    async fn sections_are_appended_in_order() {
        let normalizer =
            InputNormalizer::new(FixedOcr::new("VERIFY NOW"), Arc::new(MailParserReader));
        let request = AnalysisRequest::new(Some("hi".into()), Some(png()), Some(eml()));
        let content = normalizer.normalize(&request).await.unwrap();

        assert!(content.text.starts_with("hi\nImage Text: VERIFY NOW\nEmail Content: "));
        assert!(content.text.contains("Subject: Hello"));
        assert_eq!(content.image.unwrap().media_type(), "image/png");
    }

    #[tokio::test]
    async fn image_not_attached_when_disabled() {
        let normalizer = InputNormalizer::new(FixedOcr::new("x"), Arc::new(MailParserReader))
            .with_attach_images(false);
        let request = AnalysisRequest::new(None, Some(png()), None);
        let content = normalizer.normalize(&request).await.unwrap();
        assert_eq!(content.text, "\nImage Text: x");
        assert!(content.image.is_none());
    }

    #[tokio::test]
    async fn malformed_email_fails_before_ocr_runs() {
        let ocr = FixedOcr::new("x");
        let normalizer = InputNormalizer::new(ocr.clone(), Arc::new(MailParserReader));
        let request = AnalysisRequest::new(None, Some(png()), Some("message/rfc822;base64,AAAA".into()));

        let err = normalizer.normalize(&request).await.unwrap_err();
        assert!(matches!(err, NormalizationError::MalformedPayload { ref field, .. } if field == "email"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_base64_marker_is_malformed() {
        let normalizer = InputNormalizer::new(FixedOcr::new("x"), Arc::new(MailParserReader));
        let request = AnalysisRequest::new(None, Some("data:image/png,AAAA".into()), None);
        let err = normalizer.normalize(&request).await.unwrap_err();
        assert!(matches!(err, NormalizationError::MalformedPayload { ref field, .. } if field == "image"));
    }

    #[tokio::test]
    async fn ocr_outage_is_collaborator_failure() {
        let normalizer = InputNormalizer::new(Arc::new(DownOcr), Arc::new(MailParserReader));
        let request = AnalysisRequest::new(None, Some(png()), None);
        let err = normalizer.normalize(&request).await.unwrap_err();
        assert!(matches!(err, NormalizationError::Collaborator { ref collaborator, .. } if collaborator == "ocr"));
    }
}
