//! Prompt construction for the analysis call.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::EnrichedContent;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'\[\]{}|\\^`]+"#).expect("static url regex")
});

/// System prompt for the analysis call.
pub fn build_system_prompt(scan_tool: &str) -> String {
    format!(
        "You are an AI assistant specializing in detecting phishing attempts and social \
         engineering tactics.\n\n\
         Analyze the content for potential phishing indicators. Identify and list specific \
         risk factors such as:\n\
         - Urgency cues (e.g. \"act immediately\", \"urgent action required\")\n\
         - Suspicious domains (unusual or misspelled URLs)\n\
         - Emotional language (threats, promises of reward, appeals to fear or sympathy)\n\
         - Spoof indicators (mismatched sender information, generic greetings)\n\
         - Unusual requests (personal information, financial details, account credentials)\n\
         - Grammatical errors or typos\n\n\
         For every URL in the content, call the {scan_tool} tool before deciding. Always check \
         URL safety before determining whether the content is phishing. A URL whose scan \
         result is an error is unverified and must not be treated as safe.\n\n\
         Pay close attention to requests for account information, passwords or financial \
         transactions. These are strong indicators of phishing.\n\n\
         When you are done, respond with ONLY a JSON object:\n\
         {{\"isPhishing\": true, \"indicators\": [\"...\"], \"safetyScore\": 0.0, \
         \"explanation\": \"...\", \"threatLevel\": \"Safe\", \"riskFactors\": [\"...\"]}}\n\n\
         Rules:\n\
         - safetyScore is between 0 and 1, where 0 is definitely phishing and 1 is definitely safe\n\
         - threatLevel is one of Safe, Suspicious, Dangerous\n\
         - indicators are the specific evidence found in the content\n\
         - riskFactors name the categories of risk detected\n\
         - explanation gives your reasoning in detail"
    )
}

/// User prompt for one analysis.
pub fn build_user_prompt(content: &EnrichedContent, urls: &[String]) -> String {
    let mut prompt = String::with_capacity(content.text.len() + 256);

    if content.text.trim().is_empty() {
        prompt.push_str("No text provided.\n");
    } else {
        prompt.push_str(&format!("Text: {}\n", content.text));
    }

    match content.image {
        Some(ref image) => prompt.push_str(&format!("\nImage: attached ({})\n", image.media_type())),
        None => prompt.push_str("\nNo image attached.\n"),
    }

    if !urls.is_empty() {
        prompt.push_str("\nURLs found in the content:\n");
        for url in urls {
            prompt.push_str(&format!("- {url}\n"));
        }
    }

    prompt
}

/// Unique URLs in `text`, in order of appearance. Trailing sentence
/// punctuation is not part of the URL.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in URL_RE.find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\'', '"']);
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}
