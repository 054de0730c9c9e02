//! Parsing of model output. Models are told to return bare JSON but often
//! wrap it in a markdown fence or chat around it, so extraction is tolerant:
//! fenced block first, then the outermost brace span.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use xeber_core::{Error, Result, Sentiment, SummaryRecord};

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// The shape a summarization reply is expected to have. Every field is
/// optional; missing ones just lower the confidence score.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSummary {
    pub summary_short: Option<String>,
    pub summary_medium: Option<String>,
    pub summary_long: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub sentiment: Option<String>,
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(captures) = FENCED_JSON.captures(text) {
        return Some(captures.get(1).unwrap().as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_model_output(text: &str) -> Result<ModelSummary> {
    let json = extract_json(text)
        .ok_or_else(|| Error::Summarize("no JSON object in model output".to_string()))?;
    serde_json::from_str(json)
        .map_err(|e| Error::Summarize(format!("model output is not valid JSON: {}", e)))
}

/// Deterministic quality score in `[0, 1]`. Each of the five required
/// fields is worth 0.15; richness signals top it up.
pub fn confidence(summary: &ModelSummary) -> f32 {
    fn present(field: &Option<String>) -> bool {
        field.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
    fn longer_than(field: &Option<String>, chars: usize) -> bool {
        field.as_deref().is_some_and(|s| s.chars().count() > chars)
    }

    let mut score = 0.0f32;
    if present(&summary.summary_short) {
        score += 0.15;
    }
    if present(&summary.summary_medium) {
        score += 0.15;
    }
    if present(&summary.summary_long) {
        score += 0.15;
    }
    if !summary.key_points.is_empty() {
        score += 0.15;
    }
    if summary.sentiment.is_some() {
        score += 0.15;
    }

    if summary.entities.values().any(|v| !v.is_empty()) {
        score += 0.1;
    }
    if summary.topics.len() >= 2 {
        score += 0.1;
    }
    if longer_than(&summary.summary_short, 20) {
        score += 0.05;
    }
    if longer_than(&summary.summary_medium, 50) {
        score += 0.05;
    }
    if longer_than(&summary.summary_long, 100) {
        score += 0.05;
    }
    if summary.key_points.len() >= 3 {
        score += 0.05;
    }

    score.min(1.0)
}

impl ModelSummary {
    /// Converts into a persistable record, computing the confidence score
    /// and parsing the sentiment label (unknown labels become `None`).
    pub fn into_record(self, article_id: i64, model_used: &str, model_version: &str) -> SummaryRecord {
        let confidence_score = confidence(&self);
        let sentiment = self.sentiment.as_deref().and_then(|s| s.parse::<Sentiment>().ok());
        SummaryRecord {
            article_id,
            summary_short: self.summary_short,
            summary_medium: self.summary_medium,
            summary_long: self.summary_long,
            key_points: self.key_points,
            entities: self.entities,
            topics: self.topics,
            sentiment,
            model_used: model_used.to_string(),
            model_version: model_version.to_string(),
            confidence_score,
        }
    }
}
