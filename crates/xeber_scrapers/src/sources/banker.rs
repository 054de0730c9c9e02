//! banker.az: a WordPress/tagDiv site. Listing cards are `.td_module_wrap`
//! blocks with an ISO-8601 `<time datetime="...">`, pagination is
//! `/category/.../page/N/`.

use std::collections::HashSet;

use chrono::DateTime;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

use super::util::{element_text, last_path_segment, normalize_url};
use super::SourceScraper;
use xeber_core::{ArticleRecord, DetailData, SourceConfig};

const DEFAULT_CATEGORY_PATH: &str = "/category/x%c9%99b%c9%99rl%c9%99r";

static CARDS: Lazy<Selector> = Lazy::new(|| Selector::parse(".td_module_wrap").unwrap());
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("h3.entry-title a").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time.entry-date").unwrap());
static AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse(".td-post-author-name a").unwrap());

const CONTENT_SELECTORS: &[&str] = &[
    "div.tdb_single_content .tdb-block-inner",
    "div.tdb_single_content",
    "div.td-post-content",
    "article .entry-content",
];

fn category_path(source: &SourceConfig) -> String {
    source
        .setting_str("category_path")
        .unwrap_or(DEFAULT_CATEGORY_PATH)
        .trim_end_matches('/')
        .to_string()
}

#[derive(Debug, Clone)]
pub struct BankerScraper;

impl SourceScraper for BankerScraper {
    fn domain(&self) -> &'static str {
        "banker.az"
    }

    fn listing_url(&self, source: &SourceConfig, page: u32) -> String {
        let base = source.base_url.trim_end_matches('/');
        let path = category_path(source);
        if page <= 1 {
            format!("{base}{path}/")
        } else {
            format!("{base}{path}/page/{page}/")
        }
    }

    fn parse_list(&self, doc: &Html, _page: u32) -> Vec<ArticleRecord> {
        let base_url = "https://banker.az";
        let mut articles = Vec::new();
        let mut seen_ids = HashSet::new();

        for card in doc.select(&CARDS) {
            let Some(link) = card.select(&TITLE_LINK).next() else { continue };
            let Some(href) = link.value().attr("href") else { continue };
            let title = element_text(link);
            if title.is_empty() {
                continue;
            }
            // The post slug is the stable identifier on this site.
            let Some(slug) = last_path_segment(href) else { continue };
            if !seen_ids.insert(slug.clone()) {
                continue;
            }

            let mut record = ArticleRecord::new(slug.clone(), title, normalize_url(href, base_url));
            record.slug = Some(slug);

            if let Some(img) = card.select(&IMG).next() {
                let src = img
                    .value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"));
                if let Some(src) = src {
                    record.image_url = Some(normalize_url(src, base_url));
                }
            }
            if let Some(time) = card.select(&TIME).next() {
                if let Some(datetime) = time.value().attr("datetime") {
                    record.published_at = DateTime::parse_from_rfc3339(datetime)
                        .ok()
                        .map(|d| d.naive_local());
                }
            }

            debug!("extracted banker article {}", record.source_article_id);
            articles.push(record);
        }

        articles
    }

    fn parse_detail(&self, doc: &Html, _url: &str) -> Option<DetailData> {
        static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

        let mut content = None;
        for selector_str in CONTENT_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else { continue };
            if let Some(el) = doc.select(&selector).next() {
                let parts: Vec<String> = el
                    .select(&PARAGRAPHS)
                    .map(element_text)
                    .filter(|t| t.len() > 10)
                    .collect();
                if !parts.is_empty() {
                    content = Some(parts.join("\n\n"));
                    break;
                }
            }
        }

        let published_at = doc
            .select(&TIME)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.naive_local());
        let author = doc.select(&AUTHOR).next().map(element_text).filter(|t| !t.is_empty());

        if content.is_none() && published_at.is_none() && author.is_none() {
            return None;
        }
        Some(DetailData { content, author, published_at, metadata: serde_json::Map::new() })
    }
}
