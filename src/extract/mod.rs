//! Content extraction collaborators: data URI decoding, OCR, and the
//! message-container reader.

pub mod data_uri;
pub mod email;
pub mod ocr;

pub use data_uri::DataUri;
pub use email::{ContainerReader, MailParserReader};
pub use ocr::{HttpOcrClient, TextExtractor, VisionOcr};
