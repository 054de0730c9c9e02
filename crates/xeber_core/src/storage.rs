use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::types::{
    ArticleRecord, JobStatus, JobType, ScrapeErrorKind, ScrapeJobRow, ScrapeStats, SourceConfig,
    SummaryRecord,
};
use crate::Result;

/// SHA-256 hex digest of article content, used for dedup and audit.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-source article statistics as reported by `stats`.
#[derive(Debug, Clone)]
pub struct SourceStats {
    pub source_name: String,
    pub total_articles: i64,
    pub processed_articles: i64,
    pub summarized_articles: i64,
}

/// Persistence gateway. Every operation is one self-contained unit; a crash
/// mid-run loses at most the in-flight item.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Look up a source configuration by domain.
    async fn find_source(&self, domain: &str) -> Result<Option<SourceConfig>>;

    async fn list_sources(&self) -> Result<Vec<SourceConfig>>;

    /// Insert or refresh a source row, returning its id.
    async fn upsert_source(&self, source: &SourceConfig) -> Result<i64>;

    /// Create a job in `running` state and return its id.
    async fn create_job(&self, source_id: i64, job_type: JobType, triggered_by: &str) -> Result<i64>;

    /// Single terminal write for a job; also stamps completion time and
    /// derives the duration.
    async fn update_job(
        &self,
        job_id: i64,
        status: JobStatus,
        stats: &ScrapeStats,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Append one error row. Best-effort: implementations must swallow their
    /// own failures rather than fail the caller.
    async fn log_error(
        &self,
        job_id: i64,
        source_id: i64,
        url: &str,
        kind: ScrapeErrorKind,
        message: &str,
    );

    /// Insert-or-ignore keyed on `(source_id, source_article_id)`.
    /// `None` means the article already existed; that is not an error.
    async fn upsert_article(&self, record: &ArticleRecord) -> Result<Option<i64>>;

    async fn article_exists(&self, source_id: i64, source_article_id: &str) -> Result<bool>;

    /// Articles with content, already detail-processed but not yet
    /// summarized, newest first.
    async fn fetch_unsummarized(&self, limit: u32) -> Result<Vec<ArticleRecord>>;

    /// Insert or overwrite the summary for an article, returning its id.
    async fn upsert_summary(&self, summary: &SummaryRecord) -> Result<i64>;

    async fn mark_summarized(&self, article_id: i64) -> Result<()>;

    async fn recent_jobs(&self, limit: u32) -> Result<Vec<ScrapeJobRow>>;

    async fn stats(&self) -> Result<Vec<SourceStats>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_sha256() {
        // sha256("hello") — fixed vector
        assert_eq!(
            content_hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(content_hash(""), content_hash(""));
        assert_ne!(content_hash("a"), content_hash("b"));
    }
}
