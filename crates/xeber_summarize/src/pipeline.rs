//! Batch summarization over unsummarized articles. Same isolation contract
//! as the scrape runner: one bad article never stops the batch.

use tracing::{info, warn};

use xeber_core::{ArticleRecord, ArticleStore, Error, Result};

use crate::gemini::SummaryModel;
use crate::parse::parse_model_output;
use crate::prompt::build_prompt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummarizeStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

pub struct Summarizer<'a> {
    store: &'a dyn ArticleStore,
    model: &'a dyn SummaryModel,
    source_id: Option<i64>,
}

impl<'a> Summarizer<'a> {
    pub fn new(store: &'a dyn ArticleStore, model: &'a dyn SummaryModel) -> Self {
        Self { store, model, source_id: None }
    }

    /// Restrict the batch to articles from one source.
    pub fn for_source(mut self, source_id: i64) -> Self {
        self.source_id = Some(source_id);
        self
    }

    /// Summarizes up to `batch_size` articles. Fails fast if the model is
    /// unreachable; otherwise per-article errors are only counted.
    pub async fn run(&self, batch_size: u32) -> Result<SummarizeStats> {
        self.model.healthcheck().await.map_err(|e| {
            Error::Summarize(format!("model healthcheck failed, aborting batch: {}", e))
        })?;

        let mut articles = self.store.fetch_unsummarized(batch_size).await?;
        if let Some(source_id) = self.source_id {
            articles.retain(|a| a.source_id == source_id);
        }
        info!("🤖 summarizing {} articles", articles.len());

        let mut stats = SummarizeStats::default();
        for article in articles {
            stats.processed += 1;
            match self.summarize_one(&article).await {
                Ok(()) => stats.succeeded += 1,
                Err(err) => {
                    stats.failed += 1;
                    warn!("failed to summarize article {:?}: {}", article.id, err);
                }
            }
        }
        info!(
            "✅ summarization done: {} ok, {} failed",
            stats.succeeded, stats.failed
        );
        Ok(stats)
    }

    async fn summarize_one(&self, article: &ArticleRecord) -> Result<()> {
        let article_id = article
            .id
            .ok_or_else(|| Error::Summarize("article has no id".to_string()))?;
        let content = article
            .content
            .as_deref()
            .ok_or_else(|| Error::Summarize("article has no content".to_string()))?;

        let prompt = build_prompt(&article.title, content);
        let raw = self.model.generate(&prompt).await?;
        let record =
            parse_model_output(&raw)?.into_record(article_id, self.model.name(), self.model.version());

        // Low confidence is recorded, not rejected; the score is there for
        // downstream consumers to filter on.
        self.store.upsert_summary(&record).await?;
        self.store.mark_summarized(article_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use xeber_core::types::Pagination;
    use xeber_core::SourceConfig;
    use xeber_storage::MemoryStore;

    struct ScriptedModel {
        /// One reply per call after the healthcheck; `Err` entries simulate
        /// per-article model failures.
        replies: Vec<std::result::Result<String, String>>,
        calls: AtomicU32,
    }

    impl ScriptedModel {
        fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
            Self { replies, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl SummaryModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn version(&self) -> &str {
            "v0"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if call == 0 {
                return Ok("salam".to_string()); // healthcheck
            }
            match &self.replies[call - 1] {
                Ok(reply) => Ok(reply.clone()),
                Err(message) => Err(Error::Summarize(message.clone())),
            }
        }
    }

    const GOOD_REPLY: &str = r#"```json
        {"summary_short": "qısa xülasə mətni",
         "summary_medium": "orta xülasə",
         "summary_long": "uzun xülasə",
         "key_points": ["a", "b"],
         "entities": {"people": []},
         "topics": ["iqtisadiyyat"],
         "sentiment": "neutral"}
    ```"#;

    async fn store_with_articles(count: usize) -> MemoryStore {
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
        for n in 0..count {
            let mut article = xeber_core::ArticleRecord::new(
                n.to_string(),
                format!("Başlıq {n}"),
                format!("https://x.az/{n}"),
            );
            article.source_id = source_id;
            article.content = Some("Mətn.".to_string());
            article.is_processed = true;
            store.upsert_article(&article).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn batch_summarizes_and_marks_articles() {
        let store = store_with_articles(2).await;
        let model = ScriptedModel::new(vec![Ok(GOOD_REPLY.to_string()), Ok(GOOD_REPLY.to_string())]);

        let stats = Summarizer::new(&store, &model).run(10).await.unwrap();

        assert_eq!(stats, SummarizeStats { processed: 2, succeeded: 2, failed: 0 });
        assert_eq!(store.summaries().await.len(), 2);
        assert!(store.articles().await.iter().all(|a| a.is_summarized));

        let summary = &store.summaries().await[0];
        assert_eq!(summary.model_used, "scripted");
        assert!(summary.confidence_score > 0.0);
    }

    #[tokio::test]
    async fn one_bad_reply_does_not_stop_the_batch() {
        let store = store_with_articles(3).await;
        let model = ScriptedModel::new(vec![
            Ok(GOOD_REPLY.to_string()),
            Err("model timeout".to_string()),
            Ok("cavab verə bilmərəm".to_string()), // unparseable
        ]);

        let stats = Summarizer::new(&store, &model).run(10).await.unwrap();

        assert_eq!(stats, SummarizeStats { processed: 3, succeeded: 1, failed: 2 });
        assert_eq!(store.summaries().await.len(), 1);
        assert_eq!(store.articles().await.iter().filter(|a| a.is_summarized).count(), 1);
    }

    #[tokio::test]
    async fn failed_healthcheck_aborts_before_any_article() {
        struct DeadModel;

        #[async_trait]
        impl SummaryModel for DeadModel {
            fn name(&self) -> &str {
                "dead"
            }
            fn version(&self) -> &str {
                "v0"
            }
            async fn generate(&self, _prompt: &str) -> Result<String> {
                Err(Error::Summarize("connection refused".to_string()))
            }
        }

        let store = store_with_articles(2).await;
        let err = Summarizer::new(&store, &DeadModel).run(10).await.unwrap_err();

        assert!(err.to_string().contains("healthcheck"));
        assert!(store.summaries().await.is_empty());
        assert!(store.articles().await.iter().all(|a| !a.is_summarized));
    }

    #[tokio::test]
    async fn already_summarized_articles_are_skipped() {
        let store = store_with_articles(1).await;
        let model = ScriptedModel::new(vec![Ok(GOOD_REPLY.to_string())]);
        Summarizer::new(&store, &model).run(10).await.unwrap();

        // second run sees nothing to do and never calls the model again
        let model = ScriptedModel::new(vec![]);
        let stats = Summarizer::new(&store, &model).run(10).await.unwrap();
        assert_eq!(stats.processed, 0);
    }
}
