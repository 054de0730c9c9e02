//! fed.az: listing cards are `div.news` blocks, pagination appends the page
//! number to the section path (`/az/maliyye/2`). Detail pages carry the
//! date and time in separate `span.time` elements prefixed with an icon
//! glyph.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

use super::util::{element_text, last_path_segment, normalize_url};
use super::SourceScraper;
use xeber_core::dates::parse_source_date;
use xeber_core::{ArticleRecord, DetailData, SourceConfig};

const DEFAULT_CATEGORY_PATH: &str = "/az/maliyye";

static CARDS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.news").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static CARD_HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("div.heading").unwrap());
static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, h3, h4").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static DETAIL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.news-detail").unwrap());
static DATE_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.time.date").unwrap());
static TIME_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.time:not(.date)").unwrap());
static BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div.news-text[itemprop="articleBody"]"#).unwrap());
static BODY_FALLBACK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.news-text").unwrap());
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Drops the leading icon glyph ("\u{f017} 15 Noy 2025" -> "15 Noy 2025").
fn strip_icon(text: &str) -> &str {
    text.trim_start_matches(|c: char| !c.is_ascii_digit()).trim()
}

#[derive(Debug, Clone)]
pub struct FedScraper;

impl SourceScraper for FedScraper {
    fn domain(&self) -> &'static str {
        "fed.az"
    }

    fn listing_url(&self, source: &SourceConfig, page: u32) -> String {
        let base = source.base_url.trim_end_matches('/');
        let path = source
            .setting_str("category_path")
            .unwrap_or(DEFAULT_CATEGORY_PATH)
            .trim_end_matches('/');
        if page <= 1 {
            format!("{base}{path}")
        } else {
            format!("{base}{path}/{page}")
        }
    }

    fn parse_list(&self, doc: &Html, _page: u32) -> Vec<ArticleRecord> {
        let base_url = "https://fed.az";
        let mut articles = Vec::new();
        let mut seen_ids = HashSet::new();

        for card in doc.select(&CARDS) {
            let Some(link) = card.select(&LINK).next() else { continue };
            let Some(href) = link.value().attr("href") else { continue };

            let mut title = card
                .select(&CARD_HEADING)
                .next()
                .or_else(|| card.select(&HEADINGS).next())
                .map(element_text)
                .unwrap_or_default();
            if title.is_empty() {
                title = element_text(link);
            }
            if title.len() < 5 {
                continue;
            }
            let Some(slug) = last_path_segment(href) else { continue };
            if !seen_ids.insert(slug.clone()) {
                continue;
            }

            let mut record = ArticleRecord::new(slug.clone(), title, normalize_url(href, base_url));
            record.slug = Some(slug);
            if let Some(img) = card.select(&IMG).next() {
                if let Some(src) = img.value().attr("src") {
                    record.image_url = Some(normalize_url(src, base_url));
                }
            }

            debug!("extracted fed article {}", record.source_article_id);
            articles.push(record);
        }

        articles
    }

    fn parse_detail(&self, doc: &Html, _url: &str) -> Option<DetailData> {
        let detail = doc.select(&DETAIL).next();

        let published_at = detail.and_then(|d| {
            let date = d.select(&DATE_SPAN).next().map(element_text)?;
            let date = strip_icon(&date).to_string();
            if date.is_empty() {
                return None;
            }
            let combined = match d.select(&TIME_SPAN).next().map(element_text) {
                Some(time) if !strip_icon(&time).is_empty() => {
                    format!("{} {}", date, strip_icon(&time))
                }
                _ => date,
            };
            parse_source_date(&combined)
        });

        let content = doc
            .select(&BODY)
            .next()
            .or_else(|| doc.select(&BODY_FALLBACK).next())
            .and_then(|el| {
                let parts: Vec<String> = el
                    .select(&PARAGRAPHS)
                    .map(element_text)
                    .filter(|t| t.len() > 10)
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n\n"))
                }
            });

        if content.is_none() && published_at.is_none() {
            return None;
        }
        Some(DetailData { content, author: None, published_at, metadata: serde_json::Map::new() })
    }
}
