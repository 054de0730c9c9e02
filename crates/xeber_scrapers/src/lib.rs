pub mod fetch;
pub mod runner;
pub mod sources;

pub use fetch::{build_fetcher, FetchConfig, FetchMode, HttpFetcher, PageFetcher};
pub use runner::{RunOptions, ScrapeRunner};
pub use sources::{configured_sources, scraper_for, SourceScraper};

pub mod prelude {
    pub use super::fetch::PageFetcher;
    pub use super::sources::SourceScraper;
    pub use xeber_core::{ArticleRecord, DetailData, Error, Result};
}
