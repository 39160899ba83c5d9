//! Google Safe Browsing v4 lookup.
//!
//! `POST /v4/threatMatches:find?key=<key>`; an empty object means no match.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ReputationError;
use crate::reputation::{UrlReputation, UrlScanResult};

pub const SAFE_BROWSING_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";

const THREAT_TYPES: &[&str] = &[
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

/// Safe Browsing lookup client.
pub struct SafeBrowsingClient {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
}

impl SafeBrowsingClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: SAFE_BROWSING_URL.to_string(),
        }
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(url: &str) -> serde_json::Value {
        serde_json::json!({
            "client": {
                "clientId": env!("CARGO_PKG_NAME"),
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": THREAT_TYPES,
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url }],
            }
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FindResponse {
    #[serde(default)]
    matches: Vec<ThreatMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreatMatch {
    threat_type: String,
}

fn interpret(response: FindResponse) -> UrlScanResult {
    if response.matches.is_empty() {
        return UrlScanResult::safe("No matches in Safe Browsing lists.");
    }
    let mut types: Vec<&str> = response
        .matches
        .iter()
        .map(|m| m.threat_type.as_str())
        .collect();
    types.sort_unstable();
    types.dedup();
    UrlScanResult::unsafe_url(format!("Listed by Safe Browsing as {}.", types.join(", ")))
}

#[async_trait]
impl UrlReputation for SafeBrowsingClient {
    fn name(&self) -> &str {
        "safe_browsing"
    }

    async fn scan(&self, url: &str) -> Result<UrlScanResult, ReputationError> {
        let failed = |reason: String| ReputationError::LookupFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&Self::request_body(url))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: FindResponse = response
            .json()
            .await
            .map_err(|e| ReputationError::InvalidResponse(e.to_string()))?;
        Ok(interpret(parsed))
    }
}
