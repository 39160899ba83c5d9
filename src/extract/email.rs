//! Message-container reader: turns an `.eml` payload into analyzable text.
//!
//! Sender headers are rendered first, then the body. HTML-only bodies are
//! tag-stripped and their link targets listed separately.

use std::sync::LazyLock;

use async_trait::async_trait;
use mail_parser::{MessageParser, MimeHeaders};
use regex::Regex;

use crate::error::ExtractionError;
use crate::extract::data_uri::DataUri;

/// Max body characters handed on to the reasoning step.
const MAX_BODY_CHARS: usize = 20_000;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("static href regex")
});

/// Turns a raw email-file payload into plain text.
#[async_trait]
pub trait ContainerReader: Send + Sync {
    async fn read_container(&self, email: &DataUri) -> Result<String, ExtractionError>;
}

/// RFC 822 reader backed by `mail-parser`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MailParserReader;

impl MailParserReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContainerReader for MailParserReader {
    async fn read_container(&self, email: &DataUri) -> Result<String, ExtractionError> {
        render_message(email.data())
    }
}

/// Parse raw message bytes and render them as text.
pub fn render_message(raw: &[u8]) -> Result<String, ExtractionError> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ExtractionError::InvalidFormat("email payload is empty".into()));
    }

    let Some(parsed) = MessageParser::default().parse(raw) else {
        return raw_text_fallback(raw);
    };

    let mut out = String::new();
    let mut push_header = |name: &str, value: Option<String>| {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            out.push_str(&format!("{name}: {}\n", v.trim()));
        }
    };

    push_header("From", format_address(parsed.from()));
    push_header("Reply-To", format_address(parsed.reply_to()));
    push_header("Return-Path", raw_header(raw, "Return-Path"));
    push_header("To", {
        let to = extract_addresses(parsed.to());
        (!to.is_empty()).then(|| to.join(", "))
    });
    push_header("Subject", parsed.subject().map(str::to_string));
    push_header("Date", raw_header(raw, "Date"));

    let html = parsed.body_html(0).map(|h| h.to_string());
    let body = match parsed.body_text(0) {
        Some(text) => text.to_string(),
        None => html.as_deref().map(strip_html).unwrap_or_default(),
    };

    let links = html.as_deref().map(extract_links).unwrap_or_default();
    let attachments: Vec<String> = parsed
        .attachments()
        .map(|part| {
            MimeHeaders::attachment_name(part)
                .unwrap_or("unnamed")
                .to_string()
        })
        .collect();

    if out.is_empty() && body.trim().is_empty() {
        return raw_text_fallback(raw);
    }

    if !body.trim().is_empty() {
        out.push('\n');
        out.push_str(&truncate_chars(body.trim(), MAX_BODY_CHARS));
        out.push('\n');
    }

    if !links.is_empty() {
        out.push_str("\nLinks:\n");
        for link in &links {
            out.push_str(&format!("- {link}\n"));
        }
    }

    if !attachments.is_empty() {
        out.push_str(&format!("\nAttachments: {}\n", attachments.join(", ")));
    }

    Ok(out.trim_end().to_string())
}

fn raw_text_fallback(raw: &[u8]) -> Result<String, ExtractionError> {
    match std::str::from_utf8(raw) {
        Ok(text) => Ok(truncate_chars(text.trim(), MAX_BODY_CHARS)),
        Err(_) => Err(ExtractionError::InvalidFormat(
            "email payload is neither a parseable message nor text".into(),
        )),
    }
}

/// Value of a top-level header, unfolded. Reads the raw header block so the
/// value is reported exactly as the sender wrote it.
fn raw_header(raw: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut value: Option<String> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some(ref mut v) = value {
            if line.starts_with(' ') || line.starts_with('\t') {
                v.push(' ');
                v.push_str(line.trim());
                continue;
            }
            break;
        }
        if let Some((key, rest)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case(name)
        {
            value = Some(rest.trim().to_string());
        }
    }
    value
}

/// "Name <address>" for the first entry of an address header.
fn format_address(addr: Option<&mail_parser::Address>) -> Option<String> {
    let first = addr?.first()?;
    match (first.name(), first.address()) {
        (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// Extract email addresses from an optional mail_parser Address field.
pub fn extract_addresses(addr: Option<&mail_parser::Address>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unique href targets, in document order.
pub fn extract_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for cap in HREF_RE.captures_iter(html) {
        let link = cap[1].trim().to_string();
        if !link.is_empty() && !link.starts_with('#') && !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: PayPal Support <support@paypa1-secure.example>\r\n\
Reply-To: collect@mailbox.example\r\n\
To: victim@example.com\r\n\
Subject: Urgent: account suspended\r\n\
Date: Mon, 6 Jan 2025 10:00:00 +0000\r\n\
\r\n\
Dear Customer,\r\n\
Log in immediately to restore access.\r\n";

    const HTML_ONLY: &str = "From: bank@example.com\r\n\
Subject: Statement\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Your statement is <b>ready</b>.</p>\
<a href=\"http://login-verify.example/bank\">View statement</a>\
<a href=\"#top\">top</a></body></html>\r\n";

    #[test]
    fn renders_headers_and_body() {
        let text = render_message(PLAIN.as_bytes()).unwrap();
        assert!(text.contains("From: PayPal Support <support@paypa1-secure.example>"));
        assert!(text.contains("Reply-To: collect@mailbox.example"));
        assert!(text.contains("To: victim@example.com"));
        assert!(text.contains("Subject: Urgent: account suspended"));
        assert!(text.contains("Log in immediately"));
    }

    #[test]
    fn html_body_is_stripped_and_links_listed() {
        let text = render_message(HTML_ONLY.as_bytes()).unwrap();
        assert!(text.contains("Your statement is ready"));
        assert!(!text.contains("<b>"));
        assert!(text.contains("Links:\n- http://login-verify.example/bank"));
        assert!(!text.contains("#top"));
    }

    #[test]
    fn empty_payload_is_invalid() {
        let err = render_message(b"  \r\n").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidFormat(_)));
    }

    #[test]
    fn raw_header_unfolds_continuations() {
        let raw = b"Return-Path: <bounce@x.example>\r\nSubject: a\r\n b\r\n\r\nSubject: body";
        assert_eq!(raw_header(raw, "return-path").as_deref(), Some("<bounce@x.example>"));
        assert_eq!(raw_header(raw, "Subject").as_deref(), Some("a b"));
        assert_eq!(raw_header(raw, "Date"), None);
    }

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn extract_links_deduplicates() {
        let html = r#"<a href="https://a.example">x</a><a HREF='https://a.example'>y</a><a href="https://b.example">z</a>"#;
        assert_eq!(
            extract_links(html),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }

    #[tokio::test]
    async fn reader_decodes_data_uri() {
        let uri = DataUri::from_bytes("message/rfc822", PLAIN.as_bytes().to_vec());
        let text = MailParserReader::new().read_container(&uri).await.unwrap();
        assert!(text.starts_with("From: "));
    }
}
