use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, info, warn};

use xeber_core::storage::SourceStats;
use xeber_core::types::ScrapeJobRow;
use xeber_core::{
    content_hash, ArticleRecord, ArticleStore, Error, JobStatus, JobType, Result, ScrapeErrorKind,
    ScrapeStats, SourceConfig, SummaryRecord,
};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        base_url TEXT NOT NULL,
        pagination_type TEXT NOT NULL DEFAULT 'query_param',
        settings TEXT NOT NULL DEFAULT '{}',
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL REFERENCES sources(id),
        source_article_id TEXT NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        slug TEXT,
        image_url TEXT,
        excerpt TEXT,
        content TEXT,
        author TEXT,
        published_at TEXT,
        view_count INTEGER NOT NULL DEFAULT 0,
        is_processed INTEGER NOT NULL DEFAULT 0,
        is_summarized INTEGER NOT NULL DEFAULT 0,
        content_hash TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(source_id, source_article_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scrape_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL REFERENCES sources(id),
        job_type TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_seconds REAL,
        articles_found INTEGER NOT NULL DEFAULT 0,
        articles_new INTEGER NOT NULL DEFAULT 0,
        articles_updated INTEGER NOT NULL DEFAULT 0,
        articles_failed INTEGER NOT NULL DEFAULT 0,
        triggered_by TEXT NOT NULL DEFAULT 'manual',
        error_message TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scrape_errors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id INTEGER NOT NULL REFERENCES scrape_jobs(id),
        source_id INTEGER NOT NULL,
        url TEXT,
        error_type TEXT NOT NULL,
        error_message TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS summaries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER NOT NULL UNIQUE REFERENCES articles(id),
        summary_short TEXT,
        summary_medium TEXT,
        summary_long TEXT,
        key_points TEXT NOT NULL DEFAULT '[]',
        entities TEXT NOT NULL DEFAULT '{}',
        topics TEXT NOT NULL DEFAULT '[]',
        sentiment TEXT,
        model_used TEXT NOT NULL,
        model_version TEXT NOT NULL,
        confidence_score REAL NOT NULL DEFAULT 0.0,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn db_err(context: &str, e: sqlx::Error) -> Error {
    Error::Database(format!("{}: {}", context, e))
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) a database file and apply migrations.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        Self::connect(&url).await
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| db_err("failed to connect", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_err(&format!("migration {}", i), e))?;
        }
        info!("database ready at {}", url);
        Ok(Self { pool })
    }

    fn row_to_source(row: &sqlx::sqlite::SqliteRow) -> Result<SourceConfig> {
        let settings: String = row.get("settings");
        Ok(SourceConfig {
            id: row.get("id"),
            domain: row.get("domain"),
            name: row.get("name"),
            base_url: row.get("base_url"),
            pagination: row.get::<String, _>("pagination_type").parse()?,
            settings: serde_json::from_str(&settings)?,
        })
    }

    fn row_to_article(row: &sqlx::sqlite::SqliteRow) -> Result<ArticleRecord> {
        let metadata: String = row.get("metadata");
        let published_at = row
            .get::<Option<String>, _>("published_at")
            .and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok());
        Ok(ArticleRecord {
            id: Some(row.get("id")),
            source_id: row.get("source_id"),
            source_article_id: row.get("source_article_id"),
            title: row.get("title"),
            url: row.get("url"),
            slug: row.get("slug"),
            image_url: row.get("image_url"),
            excerpt: row.get("excerpt"),
            content: row.get("content"),
            author: row.get("author"),
            published_at,
            view_count: row.get("view_count"),
            is_processed: row.get("is_processed"),
            is_summarized: row.get("is_summarized"),
            metadata: serde_json::from_str(&metadata)?,
        })
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_source(&self, domain: &str) -> Result<Option<SourceConfig>> {
        let row = sqlx::query("SELECT * FROM sources WHERE domain = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find_source", e))?;
        row.as_ref().map(Self::row_to_source).transpose()
    }

    async fn list_sources(&self) -> Result<Vec<SourceConfig>> {
        let rows = sqlx::query("SELECT * FROM sources WHERE is_active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list_sources", e))?;
        rows.iter().map(Self::row_to_source).collect()
    }

    async fn upsert_source(&self, source: &SourceConfig) -> Result<i64> {
        let settings = serde_json::to_string(&source.settings)?;
        sqlx::query(
            r#"
            INSERT INTO sources (domain, name, base_url, pagination_type, settings)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(domain) DO UPDATE SET
                name = excluded.name,
                base_url = excluded.base_url,
                pagination_type = excluded.pagination_type,
                settings = excluded.settings
            "#,
        )
        .bind(&source.domain)
        .bind(&source.name)
        .bind(&source.base_url)
        .bind(source.pagination.to_string())
        .bind(settings)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("upsert_source", e))?;

        let row = sqlx::query("SELECT id FROM sources WHERE domain = ?")
            .bind(&source.domain)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("upsert_source id", e))?;
        Ok(row.get("id"))
    }

    async fn create_job(&self, source_id: i64, job_type: JobType, triggered_by: &str) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO scrape_jobs (source_id, job_type, status, started_at, triggered_by)
            VALUES (?, ?, 'running', ?, ?)
            "#,
        )
        .bind(source_id)
        .bind(job_type.to_string())
        .bind(Utc::now().format(DATETIME_FORMAT).to_string())
        .bind(triggered_by)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create_job", e))?;

        let job_id = result.last_insert_rowid();
        info!("created scrape job {} for source {}", job_id, source_id);
        Ok(job_id)
    }

    async fn update_job(
        &self,
        job_id: i64,
        status: JobStatus,
        stats: &ScrapeStats,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = ?,
                completed_at = ?,
                duration_seconds = (julianday('now') - julianday(started_at)) * 86400.0,
                articles_found = ?,
                articles_new = ?,
                articles_updated = ?,
                articles_failed = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(Utc::now().format(DATETIME_FORMAT).to_string())
        .bind(stats.articles_found as i64)
        .bind(stats.articles_new as i64)
        .bind(stats.articles_updated as i64)
        .bind(stats.articles_failed as i64)
        .bind(error_message)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update_job", e))?;

        info!("updated scrape job {}: {}", job_id, status);
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
        let result = sqlx::query(
            r#"
            INSERT INTO scrape_errors (job_id, source_id, url, error_type, error_message)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_id)
        .bind(source_id)
        .bind(url)
        .bind(kind.to_string())
        .bind(message)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("failed to log scrape error for job {}: {}", job_id, e);
        }
    }

    async fn upsert_article(&self, record: &ArticleRecord) -> Result<Option<i64>> {
        let metadata = serde_json::to_string(&record.metadata)?;
        let hash = record.content.as_deref().map(content_hash);

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles (
                source_id, source_article_id, title, url, slug,
                image_url, excerpt, content, author, published_at,
                view_count, is_processed, is_summarized, content_hash, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.source_id)
        .bind(&record.source_article_id)
        .bind(&record.title)
        .bind(&record.url)
        .bind(&record.slug)
        .bind(&record.image_url)
        .bind(&record.excerpt)
        .bind(&record.content)
        .bind(&record.author)
        .bind(record.published_at.map(|d| d.format(DATETIME_FORMAT).to_string()))
        .bind(record.view_count)
        .bind(record.is_processed)
        .bind(record.is_summarized)
        .bind(hash)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("upsert_article", e))?;

        if result.rows_affected() > 0 {
            debug!("inserted article {}", record.source_article_id);
            Ok(Some(result.last_insert_rowid()))
        } else {
            debug!("article already exists: {}", record.source_article_id);
            Ok(None)
        }
    }

    async fn article_exists(&self, source_id: i64, source_article_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM articles WHERE source_id = ? AND source_article_id = ? LIMIT 1",
        )
        .bind(source_id)
        .bind(source_article_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("article_exists", e))?;
        Ok(row.is_some())
    }

    async fn fetch_unsummarized(&self, limit: u32) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE is_processed = 1
              AND is_summarized = 0
              AND content IS NOT NULL
            ORDER BY published_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch_unsummarized", e))?;
        rows.iter().map(Self::row_to_article).collect()
    }

    async fn upsert_summary(&self, summary: &SummaryRecord) -> Result<i64> {
        let key_points = serde_json::to_string(&summary.key_points)?;
        let entities = serde_json::to_string(&summary.entities)?;
        let topics = serde_json::to_string(&summary.topics)?;

        sqlx::query(
            r#"
            INSERT INTO summaries (
                article_id, summary_short, summary_medium, summary_long,
                key_points, entities, topics, sentiment,
                model_used, model_version, confidence_score
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(article_id) DO UPDATE SET
                summary_short = excluded.summary_short,
                summary_medium = excluded.summary_medium,
                summary_long = excluded.summary_long,
                key_points = excluded.key_points,
                entities = excluded.entities,
                topics = excluded.topics,
                sentiment = excluded.sentiment,
                model_used = excluded.model_used,
                model_version = excluded.model_version,
                confidence_score = excluded.confidence_score,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(summary.article_id)
        .bind(&summary.summary_short)
        .bind(&summary.summary_medium)
        .bind(&summary.summary_long)
        .bind(key_points)
        .bind(entities)
        .bind(topics)
        .bind(summary.sentiment.map(|s| s.to_string()))
        .bind(&summary.model_used)
        .bind(&summary.model_version)
        .bind(summary.confidence_score)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("upsert_summary", e))?;

        let row = sqlx::query("SELECT id FROM summaries WHERE article_id = ?")
            .bind(summary.article_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("upsert_summary id", e))?;
        Ok(row.get("id"))
    }

    async fn mark_summarized(&self, article_id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET is_summarized = 1 WHERE id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("mark_summarized", e))?;
        Ok(())
    }

    async fn recent_jobs(&self, limit: u32) -> Result<Vec<ScrapeJobRow>> {
        let rows = sqlx::query("SELECT * FROM scrape_jobs ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("recent_jobs", e))?;

        let parse_ts = |s: String| -> Option<DateTime<Utc>> {
            NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
                .ok()
                .map(|n| n.and_utc())
        };

        Ok(rows
            .iter()
            .map(|row| ScrapeJobRow {
                id: row.get("id"),
                source_id: row.get("source_id"),
                job_type: row.get("job_type"),
                status: row.get("status"),
                started_at: parse_ts(row.get("started_at")).unwrap_or_else(Utc::now),
                completed_at: row.get::<Option<String>, _>("completed_at").and_then(parse_ts),
                articles_found: row.get("articles_found"),
                articles_new: row.get("articles_new"),
                articles_failed: row.get("articles_failed"),
                triggered_by: row.get("triggered_by"),
                error_message: row.get("error_message"),
            })
            .collect())
    }

    async fn stats(&self) -> Result<Vec<SourceStats>> {
        let rows = sqlx::query(
            r#"
            SELECT s.name AS source_name,
                   COUNT(a.id) AS total_articles,
                   COALESCE(SUM(a.is_processed), 0) AS processed_articles,
                   COALESCE(SUM(a.is_summarized), 0) AS summarized_articles
            FROM sources s
            LEFT JOIN articles a ON a.source_id = s.id
            GROUP BY s.id
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("stats", e))?;

        Ok(rows
            .iter()
            .map(|row| SourceStats {
                source_name: row.get("source_name"),
                total_articles: row.get("total_articles"),
                processed_articles: row.get("processed_articles"),
                summarized_articles: row.get("summarized_articles"),
            })
            .collect())
    }
}
