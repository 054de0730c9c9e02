//! Scrape orchestration: one job per run, strictly sequential page walk,
//! per-item error isolation.

use scraper::Html;
use tracing::{info, warn};

use xeber_core::{
    ArticleRecord, ArticleStore, Error, JobStatus, JobType, Result, ScrapeErrorKind, ScrapeStats,
    SourceConfig,
};

use crate::fetch::PageFetcher;
use crate::sources::SourceScraper;

/// Knobs for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_pages: u32,
    /// Follow each new article's detail page before persisting it.
    pub fetch_details: bool,
    pub job_type: JobType,
    pub triggered_by: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: 3,
            fetch_details: false,
            job_type: JobType::Incremental,
            triggered_by: "cli".to_string(),
        }
    }
}

/// Drives one source through listing pages, detail pages and persistence.
/// A run is bracketed by exactly one `create_job` and one `update_job`.
pub struct ScrapeRunner<'a> {
    store: &'a dyn ArticleStore,
    fetcher: &'a dyn PageFetcher,
    scraper: &'a dyn SourceScraper,
    source: &'a SourceConfig,
}

impl<'a> ScrapeRunner<'a> {
    pub fn new(
        store: &'a dyn ArticleStore,
        fetcher: &'a dyn PageFetcher,
        scraper: &'a dyn SourceScraper,
        source: &'a SourceConfig,
    ) -> Self {
        Self { store, fetcher, scraper, source }
    }

    /// Runs a full scrape job. Item-level failures are counted and logged
    /// but never abort the run; only structural failures (job bookkeeping,
    /// listing-level errors) mark the job failed and propagate.
    pub async fn run(&self, options: &RunOptions) -> Result<ScrapeStats> {
        let job_id = self
            .store
            .create_job(self.source.id, options.job_type, &options.triggered_by)
            .await?;
        info!(
            "🚀 starting {} job {} for {}",
            options.job_type, job_id, self.source.domain
        );

        let mut stats = ScrapeStats { job_id, ..ScrapeStats::default() };
        match self.run_pages(job_id, options, &mut stats).await {
            Ok(()) => {
                self.store
                    .update_job(job_id, JobStatus::Completed, &stats, None)
                    .await?;
                info!(
                    "✅ job {} done: {} pages, {} found, {} new, {} failed",
                    job_id,
                    stats.pages_scraped,
                    stats.articles_found,
                    stats.articles_new,
                    stats.articles_failed
                );
                Ok(stats)
            }
            Err(err) => {
                warn!("❌ job {} failed: {}", job_id, err);
                self.store
                    .update_job(job_id, JobStatus::Failed, &stats, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }

    async fn run_pages(
        &self,
        job_id: i64,
        options: &RunOptions,
        stats: &mut ScrapeStats,
    ) -> Result<()> {
        for page in 1..=options.max_pages {
            let url = self.scraper.listing_url(self.source, page);
            info!("📄 fetching page {} of {}: {}", page, self.source.domain, url);

            let Some(html) = self.fetcher.fetch(&url).await? else {
                info!("no listing page at {}, stopping", url);
                break;
            };
            // Html is not Send; parse in a scope that ends before any await.
            let records = {
                let doc = Html::parse_document(&html);
                self.scraper.parse_list(&doc, page)
            };
            if records.is_empty() {
                info!("page {} of {} yielded no articles, stopping", page, self.source.domain);
                break;
            }
            // Only pages that produced articles count as scraped.
            stats.pages_scraped += 1;

            for mut record in records {
                record.source_id = self.source.id;
                stats.articles_found += 1;
                let article_url = record.url.clone();
                match self.save_item(record, options.fetch_details).await {
                    Ok(Some(_)) => stats.articles_new += 1,
                    Ok(None) => {}
                    Err(err) => {
                        stats.articles_failed += 1;
                        warn!("failed to save {}: {}", article_url, err);
                        self.store
                            .log_error(job_id, self.source.id, &article_url, error_kind(&err), &err.to_string())
                            .await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Enriches a new article from its detail page, then persists it.
    /// `Ok(None)` means the identity already existed.
    async fn save_item(&self, mut record: ArticleRecord, fetch_details: bool) -> Result<Option<i64>> {
        let already_known = self
            .store
            .article_exists(self.source.id, &record.source_article_id)
            .await?;

        if fetch_details && !already_known {
            if let Some(html) = self.fetcher.fetch(&record.url).await? {
                let detail = {
                    let doc = Html::parse_document(&html);
                    self.scraper.parse_detail(&doc, &record.url)
                };
                match detail {
                    Some(detail) => record.merge_detail(detail),
                    None => warn!("no detail data extracted from {}", record.url),
                }
            } else {
                // A missing detail page is not fatal; the listing data stands.
                warn!("detail page unavailable: {}", record.url);
            }
        }

        self.store.upsert_article(&record).await
    }
}

fn error_kind(err: &Error) -> ScrapeErrorKind {
    match err {
        Error::Fetch(_) | Error::Http(_) => ScrapeErrorKind::FetchError,
        Error::Scraping(_) => ScrapeErrorKind::ParseError,
        _ => ScrapeErrorKind::SaveError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use scraper::Selector;

    use xeber_core::types::Pagination;
    use xeber_core::DetailData;
    use xeber_storage::MemoryStore;

    use crate::sources::util::element_text;

    /// Serves canned bodies by exact URL and records every request.
    struct MockFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<Option<String>> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(self.pages.get(url).cloned())
        }
    }

    struct TestScraper;

    impl SourceScraper for TestScraper {
        fn domain(&self) -> &'static str {
            "test.az"
        }

        fn parse_list(&self, doc: &Html, _page: u32) -> Vec<ArticleRecord> {
            static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("a.item").unwrap());
            doc.select(&ITEM)
                .filter_map(|link| {
                    let href = link.value().attr("href")?;
                    let id = href.trim_matches('/').to_string();
                    Some(ArticleRecord::new(
                        id,
                        element_text(link),
                        format!("https://test.az{}", href),
                    ))
                })
                .collect()
        }

        fn parse_detail(&self, doc: &Html, _url: &str) -> Option<DetailData> {
            static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("div.body").unwrap());
            let content = doc.select(&BODY).next().map(element_text)?;
            Some(DetailData { content: Some(content), ..DetailData::default() })
        }
    }

    fn listing(ids: &[u32]) -> String {
        let items: String = ids
            .iter()
            .map(|id| format!(r#"<a class="item" href="/{id}">Article {id}</a>"#))
            .collect();
        format!("<html><body>{items}</body></html>")
    }

    async fn seeded_source(store: &MemoryStore) -> SourceConfig {
        let mut source = SourceConfig {
            id: 0,
            domain: "test.az".to_string(),
            name: "Test".to_string(),
            base_url: "https://test.az".to_string(),
            pagination: Pagination::QueryParam,
            settings: serde_json::Map::new(),
        };
        source.id = store.upsert_source(&source).await.unwrap();
        source
    }

    #[tokio::test]
    async fn single_page_run_persists_every_article() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[("https://test.az", &listing(&[1, 2, 3]))]);

        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options = RunOptions { max_pages: 1, ..RunOptions::default() };
        let stats = runner.run(&options).await.unwrap();

        assert_eq!(stats.pages_scraped, 1);
        assert_eq!(stats.articles_found, 3);
        assert_eq!(stats.articles_new, 3);
        assert_eq!(stats.articles_failed, 0);
        assert_eq!(store.articles().await.len(), 3);

        let jobs = store.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, "completed");
        assert_eq!(jobs[0].articles_new, 3);
    }

    #[tokio::test]
    async fn rerun_over_same_listing_creates_nothing() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[("https://test.az", &listing(&[1, 2]))]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options = RunOptions { max_pages: 1, ..RunOptions::default() };

        let first = runner.run(&options).await.unwrap();
        let second = runner.run(&options).await.unwrap();

        assert_eq!(first.articles_new, 2);
        assert_eq!(second.articles_found, 2);
        assert_eq!(second.articles_new, 0);
        assert_eq!(second.articles_failed, 0);
        assert_eq!(store.articles().await.len(), 2);
        assert_eq!(store.jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn missing_page_stops_the_walk() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        // page 2 is absent, so page 3 must never be requested
        let fetcher = MockFetcher::new(&[("https://test.az", &listing(&[1]))]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options = RunOptions { max_pages: 3, ..RunOptions::default() };

        let stats = runner.run(&options).await.unwrap();

        assert_eq!(stats.pages_scraped, 1);
        let requested = fetcher.requested();
        assert_eq!(requested, vec!["https://test.az", "https://test.az?page=2"]);
    }

    #[tokio::test]
    async fn empty_listing_stops_the_walk() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[
            ("https://test.az", &listing(&[1, 2])),
            ("https://test.az?page=2", &listing(&[])),
            ("https://test.az?page=3", &listing(&[9])),
        ]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options = RunOptions { max_pages: 3, ..RunOptions::default() };

        let stats = runner.run(&options).await.unwrap();

        // the empty page 2 is not counted as scraped
        assert_eq!(stats.pages_scraped, 1);
        assert_eq!(stats.articles_found, 2);
        assert!(!fetcher.requested().contains(&"https://test.az?page=3".to_string()));
    }

    #[tokio::test]
    async fn page_yielding_nothing_does_not_count_as_scraped() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[
            ("https://test.az", &listing(&[1, 2, 3])),
            ("https://test.az?page=2", &listing(&[])),
        ]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options = RunOptions { max_pages: 2, ..RunOptions::default() };

        let stats = runner.run(&options).await.unwrap();

        assert_eq!(stats.pages_scraped, 1);
        assert_eq!(stats.articles_found, 3);
        assert_eq!(stats.articles_new, 3);
    }

    #[tokio::test]
    async fn item_failure_is_isolated_and_logged() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[("https://test.az", &listing(&[1, 2, 3]))]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options = RunOptions { max_pages: 1, ..RunOptions::default() };

        store.fail_next_upsert().await;
        let stats = runner.run(&options).await.unwrap();

        assert_eq!(stats.articles_found, 3);
        assert_eq!(stats.articles_new, 2);
        assert_eq!(stats.articles_failed, 1);

        let errors = store.logged_errors().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ScrapeErrorKind::SaveError);
        assert_eq!(errors[0].url, "https://test.az/1");

        // the failed item never poisons the job itself
        assert_eq!(store.jobs().await[0].status, "completed");
    }

    #[tokio::test]
    async fn detail_fetch_enriches_new_articles() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[
            ("https://test.az", &listing(&[7])),
            ("https://test.az/7", r#"<html><body><div class="body">Full text.</div></body></html>"#),
        ]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options =
            RunOptions { max_pages: 1, fetch_details: true, ..RunOptions::default() };

        runner.run(&options).await.unwrap();

        let articles = store.articles().await;
        assert_eq!(articles[0].content.as_deref(), Some("Full text."));
        assert!(articles[0].is_processed);
    }

    #[tokio::test]
    async fn known_articles_skip_the_detail_fetch() {
        let store = MemoryStore::new();
        let source = seeded_source(&store).await;
        let fetcher = MockFetcher::new(&[
            ("https://test.az", &listing(&[7])),
            ("https://test.az/7", r#"<html><body><div class="body">Full text.</div></body></html>"#),
        ]);
        let runner = ScrapeRunner::new(&store, &fetcher, &TestScraper, &source);
        let options =
            RunOptions { max_pages: 1, fetch_details: true, ..RunOptions::default() };

        runner.run(&options).await.unwrap();
        runner.run(&options).await.unwrap();

        let detail_fetches = fetcher
            .requested()
            .iter()
            .filter(|u| *u == "https://test.az/7")
            .count();
        assert_eq!(detail_fetches, 1);
    }
}
