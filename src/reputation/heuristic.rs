//! Local, structural URL checks. No network access.

use async_trait::async_trait;
use url::{Host, Url};

use crate::error::ReputationError;
use crate::reputation::{UrlReputation, UrlScanResult};

/// TLDs with very high abuse rates.
const RISKY_TLDS: &[&str] = &[
    "zip", "mov", "tk", "ml", "ga", "cf", "gq", "xyz", "top", "click", "country", "kim",
    "work", "loan", "rest", "cam",
];

const SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "rebrand.ly",
    "cutt.ly",
    "shorturl.at",
    "rb.gy",
    "tiny.cc",
];

/// Path or query words that signal a credential-collection page.
const CREDENTIAL_WORDS: &[&str] = &[
    "login", "signin", "sign-in", "verify", "account", "password", "secure", "update",
    "banking", "wallet",
];

const REDIRECT_PARAMS: &[&str] = &["redirect=", "redirect_uri=", "goto=", "url=", "next="];

/// Scanner built from structural red flags: marker keywords, IP-literal hosts,
/// punycode, user-info tricks, risky TLDs, shorteners, plain-http credential
/// paths and open-redirect parameters.
#[derive(Debug, Clone)]
pub struct HeuristicScanner {
    /// Substrings that mark a URL unsafe outright.
    blocked_keywords: Vec<String>,
}

impl Default for HeuristicScanner {
    fn default() -> Self {
        Self {
            blocked_keywords: vec!["suspicious".to_string()],
        }
    }
}

impl HeuristicScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword that marks any URL containing it unsafe.
    pub fn with_blocked_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.blocked_keywords.push(keyword.into().to_lowercase());
        self
    }

    /// Red flags found in `raw`. Empty means nothing was found.
    pub fn findings(&self, raw: &str) -> Vec<String> {
        let raw = raw.trim();
        let lower = raw.to_lowercase();
        let mut findings = Vec::new();

        for keyword in &self.blocked_keywords {
            if lower.contains(keyword.as_str()) {
                findings.push(format!("contains blocked keyword '{keyword}'"));
            }
        }

        let has_scheme = raw.contains("://")
            || lower.starts_with("javascript:")
            || lower.starts_with("data:");
        let candidate = if has_scheme {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };

        let url = match Url::parse(&candidate) {
            Ok(url) => url,
            Err(e) => {
                findings.push(format!("URL could not be parsed ({e})"));
                return findings;
            }
        };

        match url.scheme() {
            "http" | "https" => {}
            other => {
                findings.push(format!("non-web scheme '{other}'"));
                return findings;
            }
        }

        if !url.username().is_empty() || url.password().is_some() {
            findings.push("user-info before the host hides the real destination".to_string());
        }

        match url.host() {
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
                findings.push("host is a raw IP address".to_string());
            }
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_lowercase();
                if domain.split('.').any(|label| label.starts_with("xn--")) {
                    findings.push("internationalized (punycode) domain".to_string());
                }
                if let Some(tld) = domain.rsplit('.').next()
                    && domain.contains('.')
                    && RISKY_TLDS.contains(&tld)
                {
                    findings.push(format!("high-abuse top-level domain '.{tld}'"));
                }
                if SHORTENERS
                    .iter()
                    .any(|s| domain == *s || domain.ends_with(&format!(".{s}")))
                {
                    findings.push("link shortener hides the destination".to_string());
                }
                if domain.matches('-').count() >= 3 || domain.split('.').count() > 5 {
                    findings.push("unusually long or hyphenated hostname".to_string());
                }
            }
            None => findings.push("URL has no host".to_string()),
        }

        let path_and_query =
            format!("{}?{}", url.path(), url.query().unwrap_or("")).to_lowercase();
        if url.scheme() == "http" && CREDENTIAL_WORDS.iter().any(|w| path_and_query.contains(w)) {
            findings.push("credential page served without TLS".to_string());
        }
        if let Some(query) = url.query() {
            let query = query.to_lowercase();
            if REDIRECT_PARAMS.iter().any(|p| query.contains(p)) {
                findings.push("open-redirect parameter".to_string());
            }
        }

        findings
    }
}

#[async_trait]
impl UrlReputation for HeuristicScanner {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn scan(&self, url: &str) -> Result<UrlScanResult, ReputationError> {
        let findings = self.findings(url);
        if findings.is_empty() {
            Ok(UrlScanResult::safe("No known threats detected."))
        } else {
            tracing::debug!(url, findings = findings.len(), "URL flagged by heuristics");
            Ok(UrlScanResult::unsafe_url(format!(
                "URL flagged as potentially malicious: {}.",
                findings.join("; ")
            )))
        }
    }
}
