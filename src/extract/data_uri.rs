//! `data:<mime-type>;base64,<data>` payloads.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ExtractionError;

const PREFIX: &str = "data:";
const MARKER: &str = ";base64,";

/// A decoded data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    media_type: String,
    data: Vec<u8>,
    raw: String,
}

impl DataUri {
    /// Parse and decode a data URI.
    ///
    /// Fails when the `data:` prefix or `;base64,` marker is missing, when the
    /// payload after the marker is empty, or when it is not valid base64.
    pub fn parse(raw: &str) -> Result<Self, ExtractionError> {
        let raw = raw.trim();
        let rest = raw
            .strip_prefix(PREFIX)
            .ok_or_else(|| ExtractionError::InvalidFormat("missing 'data:' prefix".into()))?;
        let (media_type, encoded) = rest
            .split_once(MARKER)
            .ok_or_else(|| ExtractionError::InvalidFormat("missing ';base64,' marker".into()))?;

        // Whitespace is tolerated inside the payload (line-wrapped exports).
        let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if encoded.is_empty() {
            return Err(ExtractionError::InvalidFormat(
                "no base64 data found in the data URI".into(),
            ));
        }

        let data = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ExtractionError::InvalidFormat(format!("invalid base64 data: {e}")))?;

        Ok(Self {
            media_type: media_type.trim().to_ascii_lowercase(),
            data,
            raw: raw.to_string(),
        })
    }

    /// Build a data URI from raw bytes.
    pub fn from_bytes(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        let media_type = media_type.into();
        let raw = format!("{PREFIX}{media_type}{MARKER}{}", STANDARD.encode(&data));
        Self {
            media_type,
            data,
            raw,
        }
    }

    /// Read a file into a data URI, guessing the media type from its extension.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(media_type_for_path(path), data))
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The original `data:` string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The base64 portion, re-encoded without whitespace.
    pub fn base64_data(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Raster image types a vision model accepts directly.
    pub fn is_raster_image(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "image/png" | "image/jpeg" | "image/jpg" | "image/gif" | "image/webp"
        )
    }
}

/// Best-effort media type from a file extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "eml" => "message/rfc822",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
