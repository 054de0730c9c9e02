use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use xeber_core::{ArticleStore, Error, JobType, Result, SourceConfig};
use xeber_scrapers::{
    build_fetcher, configured_sources, scraper_for, FetchConfig, FetchMode, PageFetcher,
    RunOptions, ScrapeRunner,
};
use xeber_storage::SqliteStore;
use xeber_summarize::{GeminiModel, Summarizer, SummaryModel};

const RUN_ALL_DELAY: Duration = Duration::from_secs(5);
/// Runs walking past this many pages are considered full re-scrapes.
const INCREMENTAL_PAGE_LIMIT: u32 = 5;

#[derive(Parser, Debug)]
#[command(author, version, about = "Azerbaijani news scraping and summarization", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "XEBER_DB", default_value = "xeber.db", global = true)]
    database: String,
    /// Fetch pages through a headless browser instead of plain HTTP
    #[arg(long, global = true)]
    render_js: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Scrape news sources
    Scrape {
        #[command(subcommand)]
        command: ScrapeCommands,
    },
    /// Summarize scraped articles with Gemini
    Summarize {
        #[command(subcommand)]
        command: SummarizeCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ScrapeCommands {
    /// Scrape one source
    Run {
        /// Source domain, e.g. sonxeber.az
        #[arg(long)]
        source: String,
        #[arg(long, default_value_t = 3)]
        pages: u32,
        /// Also fetch each new article's detail page
        #[arg(long)]
        details: bool,
        #[arg(long, default_value = "cli")]
        triggered_by: String,
    },
    /// Scrape every configured source in sequence
    RunAll {
        #[arg(long, default_value_t = 3)]
        pages: u32,
        #[arg(long)]
        details: bool,
    },
    /// List configured sources
    List,
    /// Per-source article counts
    Stats,
    /// Recent scrape jobs
    Jobs {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(clap::Subcommand, Debug)]
enum SummarizeCommands {
    /// Summarize unsummarized articles
    Run {
        #[arg(long, default_value_t = 100)]
        batch_size: u32,
        /// Restrict to one source domain
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value = "cli")]
        triggered_by: String,
    },
    /// Verify the Gemini API is reachable with the configured key
    Test,
}

fn job_type_for(pages: u32) -> JobType {
    if pages <= INCREMENTAL_PAGE_LIMIT {
        JobType::Incremental
    } else {
        JobType::FullScrape
    }
}

fn fetch_mode(render_js: bool) -> FetchMode {
    if render_js {
        FetchMode::Browser
    } else {
        FetchMode::Http
    }
}

fn gemini_from_env() -> Result<GeminiModel> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| Error::Config("GEMINI_API_KEY is not set".to_string()))?;
    Ok(GeminiModel::new(api_key))
}

/// Refresh the sources table from the built-in registry, returning the
/// stored configurations with their assigned ids.
async fn seed_sources(store: &dyn ArticleStore) -> Result<Vec<SourceConfig>> {
    let mut seeded = Vec::new();
    for mut source in configured_sources() {
        source.id = store.upsert_source(&source).await?;
        seeded.push(source);
    }
    Ok(seeded)
}

async fn resolve_source(store: &dyn ArticleStore, domain: &str) -> Result<SourceConfig> {
    store
        .find_source(domain)
        .await?
        .ok_or_else(|| Error::Config(format!("unknown source: {}", domain)))
}

async fn scrape_one(
    store: &dyn ArticleStore,
    fetcher: &dyn PageFetcher,
    source: &SourceConfig,
    pages: u32,
    details: bool,
    triggered_by: &str,
) -> Result<()> {
    let scraper = scraper_for(&source.domain)
        .ok_or_else(|| Error::Config(format!("no scraper registered for {}", source.domain)))?;
    let options = RunOptions {
        max_pages: pages,
        fetch_details: details,
        job_type: job_type_for(pages),
        triggered_by: triggered_by.to_string(),
    };
    let runner = ScrapeRunner::new(store, fetcher, scraper.as_ref(), source);
    let stats = runner.run(&options).await?;
    println!(
        "{}: {} pages, {} found, {} new, {} failed",
        source.domain, stats.pages_scraped, stats.articles_found, stats.articles_new, stats.articles_failed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let store = SqliteStore::open(&cli.database).await?;
    info!("💾 database ready at {}", cli.database);
    let sources = seed_sources(&store).await?;

    match cli.command {
        Commands::Scrape { command } => match command {
            ScrapeCommands::Run { source, pages, details, triggered_by } => {
                let source = resolve_source(&store, &source).await?;
                let fetcher = build_fetcher(fetch_mode(cli.render_js), FetchConfig::default())?;
                scrape_one(&store, fetcher.as_ref(), &source, pages, details, &triggered_by).await?;
            }
            ScrapeCommands::RunAll { pages, details } => {
                let fetcher = build_fetcher(fetch_mode(cli.render_js), FetchConfig::default())?;
                let mut failures = 0u32;
                for (n, source) in sources.iter().enumerate() {
                    if n > 0 {
                        info!("⏳ waiting {}s before the next source", RUN_ALL_DELAY.as_secs());
                        tokio::time::sleep(RUN_ALL_DELAY).await;
                    }
                    // One broken source must not stop the sweep.
                    if let Err(e) =
                        scrape_one(&store, fetcher.as_ref(), source, pages, details, "run-all").await
                    {
                        failures += 1;
                        error!("source {} failed: {}", source.domain, e);
                    }
                }
                println!("scraped {} sources, {} failed", sources.len(), failures);
            }
            ScrapeCommands::List => {
                for source in store.list_sources().await? {
                    println!("{:<16} {:<12} {}", source.domain, source.pagination.to_string(), source.base_url);
                }
            }
            ScrapeCommands::Stats => {
                for stat in store.stats().await? {
                    println!(
                        "{:<16} {:>6} articles, {:>6} processed, {:>6} summarized",
                        stat.source_name,
                        stat.total_articles,
                        stat.processed_articles,
                        stat.summarized_articles
                    );
                }
            }
            ScrapeCommands::Jobs { limit } => {
                for job in store.recent_jobs(limit).await? {
                    println!(
                        "#{:<5} source {:<3} {:<12} {:<10} found {:<4} new {:<4} failed {:<4} {}",
                        job.id,
                        job.source_id,
                        job.job_type,
                        job.status,
                        job.articles_found,
                        job.articles_new,
                        job.articles_failed,
                        job.error_message.as_deref().unwrap_or("")
                    );
                }
            }
        },
        Commands::Summarize { command } => match command {
            SummarizeCommands::Run { batch_size, source, triggered_by } => {
                let model = gemini_from_env()?;
                info!("🤖 summarize batch triggered by {}", triggered_by);
                let mut summarizer = Summarizer::new(&store, &model);
                if let Some(domain) = source {
                    let source = resolve_source(&store, &domain).await?;
                    summarizer = summarizer.for_source(source.id);
                }
                let stats = summarizer.run(batch_size).await?;
                println!(
                    "summarized {} articles: {} ok, {} failed",
                    stats.processed, stats.succeeded, stats.failed
                );
            }
            SummarizeCommands::Test => {
                let model = gemini_from_env()?;
                match model.healthcheck().await {
                    Ok(()) => println!("✅ Gemini API connection ok ({})", model.version()),
                    Err(e) => {
                        warn!("healthcheck failed: {}", e);
                        return Err(Error::Summarize(format!("Gemini API unreachable: {}", e)));
                    }
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_run_accepts_triggered_by() {
        let cli = Cli::try_parse_from([
            "xeber",
            "summarize",
            "run",
            "--batch-size",
            "20",
            "--triggered-by",
            "scheduler",
        ])
        .unwrap();

        match cli.command {
            Commands::Summarize { command: SummarizeCommands::Run { batch_size, triggered_by, .. } } => {
                assert_eq!(batch_size, 20);
                assert_eq!(triggered_by, "scheduler");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn triggered_by_defaults_to_cli() {
        let cli = Cli::try_parse_from(["xeber", "summarize", "run"]).unwrap();
        match cli.command {
            Commands::Summarize { command: SummarizeCommands::Run { triggered_by, .. } } => {
                assert_eq!(triggered_by, "cli");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
