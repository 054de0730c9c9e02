use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped news item. Identity is `(source_id, source_article_id)`;
/// a second insert of the same identity is a silent no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: Option<i64>,
    pub source_id: i64,
    pub source_article_id: String,
    pub title: String,
    pub url: String,
    pub slug: Option<String>,
    pub image_url: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    /// Source-local wall-clock time; deliberately not normalized to UTC.
    pub published_at: Option<NaiveDateTime>,
    pub view_count: i64,
    pub is_processed: bool,
    pub is_summarized: bool,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ArticleRecord {
    pub fn new(source_article_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            source_id: 0,
            source_article_id: source_article_id.into(),
            title: title.into(),
            url: url.into(),
            slug: None,
            image_url: None,
            excerpt: None,
            content: None,
            author: None,
            published_at: None,
            view_count: 0,
            is_processed: false,
            is_summarized: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// Field-wise merge of detail-page data: present detail fields overwrite,
    /// absent ones leave the listing extraction untouched.
    pub fn merge_detail(&mut self, detail: DetailData) {
        if detail.content.is_some() {
            self.content = detail.content;
        }
        if detail.author.is_some() {
            self.author = detail.author;
        }
        if detail.published_at.is_some() {
            self.published_at = detail.published_at;
        }
        for (key, value) in detail.metadata {
            self.metadata.insert(key, value);
        }
        self.is_processed = true;
    }
}

/// Enrichment extracted from an article detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailData {
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Pagination scheme of a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pagination {
    QueryParam,
    PathBased,
}

impl fmt::Display for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pagination::QueryParam => write!(f, "query_param"),
            Pagination::PathBased => write!(f, "path_based"),
        }
    }
}

impl std::str::FromStr for Pagination {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query_param" => Ok(Pagination::QueryParam),
            "path_based" => Ok(Pagination::PathBased),
            other => Err(crate::Error::Config(format!("unknown pagination type: {}", other))),
        }
    }
}

/// One configured news source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: i64,
    pub domain: String,
    pub name: String,
    pub base_url: String,
    pub pagination: Pagination,
    /// Source-specific knobs, e.g. a custom pagination query parameter.
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl SourceConfig {
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Incremental,
    FullScrape,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Incremental => write!(f, "incremental"),
            JobType::FullScrape => write!(f, "full_scrape"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Classification of a logged scrape error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeErrorKind {
    FetchError,
    ParseError,
    SaveError,
}

impl fmt::Display for ScrapeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeErrorKind::FetchError => write!(f, "fetch_error"),
            ScrapeErrorKind::ParseError => write!(f, "parse_error"),
            ScrapeErrorKind::SaveError => write!(f, "save_error"),
        }
    }
}

/// Aggregated counters for one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    pub job_id: i64,
    pub pages_scraped: u32,
    pub articles_found: u64,
    pub articles_new: u64,
    /// Reserved: re-scraped existing articles are silent no-ops, never
    /// counted as updates.
    pub articles_updated: u64,
    pub articles_failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::Neutral => write!(f, "neutral"),
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(crate::Error::Summarize(format!("unknown sentiment: {}", other))),
        }
    }
}

/// AI-derived enrichment of one article; one row per article,
/// last-write-wins on re-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub article_id: i64,
    pub summary_short: Option<String>,
    pub summary_medium: Option<String>,
    pub summary_long: Option<String>,
    pub key_points: Vec<String>,
    pub entities: BTreeMap<String, Vec<String>>,
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub model_used: String,
    pub model_version: String,
    pub confidence_score: f32,
}

/// A scrape job row as read back from storage.
#[derive(Debug, Clone)]
pub struct ScrapeJobRow {
    pub id: i64,
    pub source_id: i64,
    pub job_type: String,
    pub status: String,
    pub started_at: chrono::DateTime<Utc>,
    pub completed_at: Option<chrono::DateTime<Utc>>,
    pub articles_found: i64,
    pub articles_new: i64,
    pub articles_failed: i64,
    pub triggered_by: String,
    pub error_message: Option<String>,
}
