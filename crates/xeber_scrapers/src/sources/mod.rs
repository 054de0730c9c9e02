//! Site-specific extraction strategies. The orchestrator only knows this
//! trait; each news source plugs in its own listing and detail parsing.

use scraper::Html;

use xeber_core::types::Pagination;
use xeber_core::{ArticleRecord, DetailData, SourceConfig};

pub mod banker;
pub mod fed;
pub mod sonxeber;
pub(crate) mod util;

pub use banker::BankerScraper;
pub use fed::FedScraper;
pub use sonxeber::SonxeberScraper;

/// Extraction strategy for one news source. Parsing is pure and must never
/// fail a whole page over one malformed item: bad items are skipped, and
/// `source_article_id` duplicates within one page are dropped (first wins).
pub trait SourceScraper: Send + Sync {
    fn domain(&self) -> &'static str;

    /// Extract candidate records from a listing page.
    fn parse_list(&self, doc: &Html, page: u32) -> Vec<ArticleRecord>;

    /// Extract enrichment from a detail page; `None` means "no data", which
    /// degrades to an unenriched item, never an error.
    fn parse_detail(&self, doc: &Html, url: &str) -> Option<DetailData>;

    /// Listing URL for a page. The default covers the common schemes; a
    /// source with its own layout overrides it.
    fn listing_url(&self, source: &SourceConfig, page: u32) -> String {
        default_listing_url(source, page)
    }
}

/// First page is the source root; later pages append either a query
/// parameter (name configurable via the `pagination_param` setting) or a
/// `/page/{n}/` path segment.
pub fn default_listing_url(source: &SourceConfig, page: u32) -> String {
    if page <= 1 {
        return source.base_url.clone();
    }
    match source.pagination {
        Pagination::QueryParam => {
            let param = source.setting_str("pagination_param").unwrap_or("page");
            format!("{}?{}={}", source.base_url, param, page)
        }
        Pagination::PathBased => {
            format!("{}/page/{}/", source.base_url.trim_end_matches('/'), page)
        }
    }
}

/// Static domain-to-strategy mapping; the closed set of sources this build
/// knows how to scrape.
pub fn scraper_for(domain: &str) -> Option<Box<dyn SourceScraper>> {
    match domain {
        "sonxeber.az" => Some(Box::new(SonxeberScraper)),
        "banker.az" => Some(Box::new(BankerScraper)),
        "fed.az" => Some(Box::new(FedScraper)),
        _ => None,
    }
}

/// Built-in source configurations, used to seed the sources table on
/// startup. Ids are assigned by the store.
pub fn configured_sources() -> Vec<SourceConfig> {
    fn settings(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    vec![
        SourceConfig {
            id: 0,
            domain: "sonxeber.az".to_string(),
            name: "Son Xəbər".to_string(),
            base_url: "https://sonxeber.az".to_string(),
            pagination: Pagination::QueryParam,
            settings: settings(&[("pagination_param", "start")]),
        },
        SourceConfig {
            id: 0,
            domain: "banker.az".to_string(),
            name: "Banker.az".to_string(),
            base_url: "https://banker.az".to_string(),
            pagination: Pagination::PathBased,
            settings: settings(&[("category_path", "/category/x%c9%99b%c9%99rl%c9%99r")]),
        },
        SourceConfig {
            id: 0,
            domain: "fed.az".to_string(),
            name: "Fed.az".to_string(),
            base_url: "https://fed.az".to_string(),
            pagination: Pagination::PathBased,
            settings: settings(&[("category_path", "/az/maliyye")]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use xeber_core::types::Pagination;

    fn source(pagination: Pagination) -> SourceConfig {
        SourceConfig {
            id: 1,
            domain: "x.az".to_string(),
            name: "X".to_string(),
            base_url: "https://x.az".to_string(),
            pagination,
            settings: serde_json::Map::new(),
        }
    }

    #[test]
    fn first_page_is_the_source_root() {
        let src = source(Pagination::QueryParam);
        assert_eq!(default_listing_url(&src, 1), "https://x.az");
    }

    #[test]
    fn query_param_pagination_uses_configured_name() {
        let mut src = source(Pagination::QueryParam);
        assert_eq!(default_listing_url(&src, 2), "https://x.az?page=2");

        src.settings.insert(
            "pagination_param".to_string(),
            serde_json::Value::String("start".to_string()),
        );
        assert_eq!(default_listing_url(&src, 3), "https://x.az?start=3");
    }

    #[test]
    fn path_based_pagination_appends_page_segment() {
        let src = source(Pagination::PathBased);
        assert_eq!(default_listing_url(&src, 2), "https://x.az/page/2/");
    }

    #[test]
    fn registry_knows_each_configured_source() {
        for config in configured_sources() {
            let scraper = scraper_for(&config.domain);
            assert!(scraper.is_some(), "no scraper for {}", config.domain);
            assert_eq!(scraper.unwrap().domain(), config.domain);
        }
        assert!(scraper_for("unknown.az").is_none());
    }
}
