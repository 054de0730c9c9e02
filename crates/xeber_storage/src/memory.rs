//! In-memory store with the same gateway contract as the SQLite backend.
//! Used by orchestrator and pipeline tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use xeber_core::storage::SourceStats;
use xeber_core::types::ScrapeJobRow;
use xeber_core::{
    ArticleRecord, ArticleStore, Error, JobStatus, JobType, Result, ScrapeErrorKind, ScrapeStats,
    SourceConfig, SummaryRecord,
};

#[derive(Debug, Clone)]
pub struct LoggedError {
    pub job_id: i64,
    pub source_id: i64,
    pub url: String,
    pub kind: ScrapeErrorKind,
    pub message: String,
}

#[derive(Default)]
struct Inner {
    sources: Vec<SourceConfig>,
    articles: Vec<ArticleRecord>,
    jobs: Vec<ScrapeJobRow>,
    errors: Vec<LoggedError>,
    summaries: HashMap<i64, SummaryRecord>,
    next_article_id: i64,
    /// When set, the next upsert_article call fails once. Test hook for the
    /// per-item isolation contract.
    fail_next_upsert: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn logged_errors(&self) -> Vec<LoggedError> {
        self.inner.read().await.errors.clone()
    }

    pub async fn articles(&self) -> Vec<ArticleRecord> {
        self.inner.read().await.articles.clone()
    }

    pub async fn jobs(&self) -> Vec<ScrapeJobRow> {
        self.inner.read().await.jobs.clone()
    }

    pub async fn summaries(&self) -> Vec<SummaryRecord> {
        self.inner.read().await.summaries.values().cloned().collect()
    }

    pub async fn fail_next_upsert(&self) {
        self.inner.write().await.fail_next_upsert = true;
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn find_source(&self, domain: &str) -> Result<Option<SourceConfig>> {
        Ok(self
            .inner
            .read()
            .await
            .sources
            .iter()
            .find(|s| s.domain == domain)
            .cloned())
    }

    async fn list_sources(&self) -> Result<Vec<SourceConfig>> {
        Ok(self.inner.read().await.sources.clone())
    }

    async fn upsert_source(&self, source: &SourceConfig) -> Result<i64> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.sources.iter_mut().find(|s| s.domain == source.domain) {
            let id = existing.id;
            *existing = SourceConfig { id, ..source.clone() };
            return Ok(id);
        }
        let id = inner.sources.len() as i64 + 1;
        inner.sources.push(SourceConfig { id, ..source.clone() });
        Ok(id)
    }

    async fn create_job(&self, source_id: i64, job_type: JobType, triggered_by: &str) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let id = inner.jobs.len() as i64 + 1;
        inner.jobs.push(ScrapeJobRow {
            id,
            source_id,
            job_type: job_type.to_string(),
            status: JobStatus::Running.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            articles_found: 0,
            articles_new: 0,
            articles_failed: 0,
            triggered_by: triggered_by.to_string(),
            error_message: None,
        });
        Ok(id)
    }

    async fn update_job(
        &self,
        job_id: i64,
        status: JobStatus,
        stats: &ScrapeStats,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::Database(format!("no such job: {}", job_id)))?;
        job.status = status.to_string();
        job.completed_at = Some(Utc::now());
        job.articles_found = stats.articles_found as i64;
        job.articles_new = stats.articles_new as i64;
        job.articles_failed = stats.articles_failed as i64;
        job.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn log_error(
        &self,
        job_id: i64,
        source_id: i64,
        url: &str,
        kind: ScrapeErrorKind,
        message: &str,
    ) {
        self.inner.write().await.errors.push(LoggedError {
            job_id,
            source_id,
            url: url.to_string(),
            kind,
            message: message.to_string(),
        });
    }

    async fn upsert_article(&self, record: &ArticleRecord) -> Result<Option<i64>> {
        let mut inner = self.inner.write().await;
        if inner.fail_next_upsert {
            inner.fail_next_upsert = false;
            return Err(Error::Database("injected failure".to_string()));
        }
        let exists = inner.articles.iter().any(|a| {
            a.source_id == record.source_id && a.source_article_id == record.source_article_id
        });
        if exists {
            return Ok(None);
        }
        inner.next_article_id += 1;
        let id = inner.next_article_id;
        inner.articles.push(ArticleRecord { id: Some(id), ..record.clone() });
        Ok(Some(id))
    }

    async fn article_exists(&self, source_id: i64, source_article_id: &str) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .articles
            .iter()
            .any(|a| a.source_id == source_id && a.source_article_id == source_article_id))
    }

    async fn fetch_unsummarized(&self, limit: u32) -> Result<Vec<ArticleRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .articles
            .iter()
            .filter(|a| a.is_processed && !a.is_summarized && a.content.is_some())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn upsert_summary(&self, summary: &SummaryRecord) -> Result<i64> {
        let mut inner = self.inner.write().await;
        inner.summaries.insert(summary.article_id, summary.clone());
        Ok(summary.article_id)
    }

    async fn mark_summarized(&self, article_id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(article) = inner.articles.iter_mut().find(|a| a.id == Some(article_id)) {
            article.is_summarized = true;
        }
        Ok(())
    }

    async fn recent_jobs(&self, limit: u32) -> Result<Vec<ScrapeJobRow>> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn stats(&self) -> Result<Vec<SourceStats>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sources
            .iter()
            .map(|s| {
                let of_source: Vec<_> =
                    inner.articles.iter().filter(|a| a.source_id == s.id).collect();
                SourceStats {
                    source_name: s.name.clone(),
                    total_articles: of_source.len() as i64,
                    processed_articles: of_source.iter().filter(|a| a.is_processed).count() as i64,
                    summarized_articles: of_source.iter().filter(|a| a.is_summarized).count() as i64,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xeber_core::types::Pagination;

    #[tokio::test]
    async fn memory_store_honors_identity_uniqueness() {
        let store = MemoryStore::new();
        let source_id = store
            .upsert_source(&SourceConfig {
                id: 0,
                domain: "x.az".to_string(),
                name: "X".to_string(),
                base_url: "https://x.az".to_string(),
                pagination: Pagination::QueryParam,
                settings: serde_json::Map::new(),
            })
            .await
            .unwrap();

        let mut record = ArticleRecord::new("1", "Title", "https://x.az/1/a");
        record.source_id = source_id;

        assert!(store.upsert_article(&record).await.unwrap().is_some());
        assert!(store.upsert_article(&record).await.unwrap().is_none());
        assert_eq!(store.articles().await.len(), 1);
    }
}
