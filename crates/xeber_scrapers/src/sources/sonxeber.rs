//! sonxeber.az: articles live at `/{numeric-id}/{slug}`, listings paginate
//! with `?start=N`, dates are free text ("21 fevral", "Tarix: 21 fevral
//! 2026 12:06").

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::util::{element_text, last_path_segment, normalize_url};
use super::SourceScraper;
use xeber_core::dates::parse_source_date;
use xeber_core::{ArticleRecord, DetailData, SourceConfig};

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d+)/").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d{1,2}\s+(yanvar|fevral|mart|aprel|may|iyun|iyul|avqust|sentyabr|oktyabr|noyabr|dekabr)(\s+\d{4})?(\s+\d{1,2}:\d{2})?",
    )
    .unwrap()
});
static TARIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Tarix:\s*(.+)").unwrap());

static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static MAIN_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("main p").unwrap());
static AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="author"], [class*="muellif"]"#).unwrap());
static CATEGORY: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[class*="category"], span[class*="category"], a[class*="kataqoriya"], span[class*="kataqoriya"]"#)
        .unwrap()
});

const CONTENT_SELECTORS: &[&str] = &[
    "div.article-content",
    "div.content",
    "div.news-content",
    "article",
    r#"div[itemprop="articleBody"]"#,
];

/// Nearest enclosing card/list container of a link, if any.
fn container_of<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take(3)
        .find(|a| matches!(a.value().name(), "div" | "article" | "li" | "section"))
}

#[derive(Debug, Clone)]
pub struct SonxeberScraper;

impl SourceScraper for SonxeberScraper {
    fn domain(&self) -> &'static str {
        "sonxeber.az"
    }

    fn listing_url(&self, source: &SourceConfig, page: u32) -> String {
        if page <= 1 {
            format!("{}/xeberler/", source.base_url.trim_end_matches('/'))
        } else {
            format!("{}/xeberler/?start={}", source.base_url.trim_end_matches('/'), page)
        }
    }

    fn parse_list(&self, doc: &Html, _page: u32) -> Vec<ArticleRecord> {
        let base_url = "https://sonxeber.az";
        let mut articles = Vec::new();
        let mut seen_ids = HashSet::new();

        for link in doc.select(&LINKS) {
            let Some(href) = link.value().attr("href") else { continue };
            let Some(captures) = ID_RE.captures(href) else { continue };
            let article_id = captures[1].to_string();
            if !seen_ids.insert(article_id.clone()) {
                continue;
            }

            // Title from the link itself, its title attribute, or an
            // enclosing heading. Too-short candidates are navigation noise.
            let mut title = element_text(link);
            if title.len() < 5 {
                title = link.value().attr("title").unwrap_or_default().trim().to_string();
            }
            if title.len() < 5 {
                if let Some(heading) =
                    container_of(link).and_then(|c| c.select(&HEADINGS).next())
                {
                    title = element_text(heading);
                }
            }
            if title.len() < 5 {
                seen_ids.remove(&article_id);
                continue;
            }

            let full_url = normalize_url(href, base_url);
            let mut record = ArticleRecord::new(article_id, title, full_url);
            record.slug = last_path_segment(href);

            if let Some(container) = container_of(link) {
                if let Some(img) = container.select(&IMG).next() {
                    if let Some(src) = img.value().attr("src") {
                        record.image_url = Some(normalize_url(src, base_url));
                    }
                }
                let container_text = container.text().collect::<String>();
                if let Some(found) = DATE_RE.find(&container_text) {
                    record.published_at = parse_source_date(found.as_str());
                }
            }

            debug!("extracted sonxeber article {}", record.source_article_id);
            articles.push(record);
        }

        articles
    }

    fn parse_detail(&self, doc: &Html, _url: &str) -> Option<DetailData> {
        let mut content = None;
        for selector_str in CONTENT_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else { continue };
            if let Some(el) = doc.select(&selector).next() {
                let parts: Vec<String> = el
                    .select(&PARAGRAPHS)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect();
                if !parts.is_empty() {
                    content = Some(parts.join("\n\n"));
                    break;
                }
            }
        }
        if content.is_none() {
            let parts: Vec<String> = doc
                .select(&MAIN_PARAGRAPHS)
                .map(element_text)
                .filter(|t| t.len() > 20)
                .collect();
            if !parts.is_empty() {
                content = Some(parts.join("\n\n"));
            }
        }

        // "Tarix: <date>" appears somewhere in the page chrome.
        let page_text = doc.root_element().text().collect::<String>();
        let published_at = TARIX_RE
            .captures(&page_text)
            .and_then(|c| parse_source_date(c[1].lines().next().unwrap_or("").trim()));

        let author = doc.select(&AUTHOR).next().map(element_text).filter(|t| !t.is_empty());
        let category = doc.select(&CATEGORY).next().map(element_text).filter(|t| !t.is_empty());

        if content.is_none() && author.is_none() && published_at.is_none() && category.is_none() {
            return None;
        }

        let mut metadata = serde_json::Map::new();
        if let Some(category) = category {
            metadata.insert("category".to_string(), serde_json::Value::String(category));
        }
        Some(DetailData { content, author, published_at, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const LISTING: &str = r#"
        <html><body>
          <div class="news-item">
            <a href="/388358/gurcustan-azerbaycandan-qaz-alir">Gürcüstan Azərbaycandan qaz alır</a>
            <img src="/uploads/ss_388358_abc.jpg">
            <span>21 fevral 2026 12:06</span>
          </div>
          <div class="news-item">
            <a href="/388359/ikinci-xeber">İkinci xəbərin başlığı</a>
          </div>
          <div class="news-item">
            <a href="/388358/gurcustan-azerbaycandan-qaz-alir">Gürcüstan Azərbaycandan qaz alır</a>
          </div>
          <a href="/haqqimizda">Haqqımızda</a>
          <a href="/388360/x">x</a>
        </body></html>
    "#;

    #[test]
    fn parses_listing_and_drops_duplicates() {
        let doc = Html::parse_document(LISTING);
        let articles = SonxeberScraper.parse_list(&doc, 1);

        // duplicate 388358 dropped, nav link without numeric id skipped,
        // too-short title skipped
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].source_article_id, "388358");
        assert_eq!(articles[1].source_article_id, "388359");

        assert_eq!(articles[0].url, "https://sonxeber.az/388358/gurcustan-azerbaycandan-qaz-alir");
        assert_eq!(articles[0].slug.as_deref(), Some("gurcustan-azerbaycandan-qaz-alir"));
        assert_eq!(
            articles[0].image_url.as_deref(),
            Some("https://sonxeber.az/uploads/ss_388358_abc.jpg")
        );

        let published = articles[0].published_at.unwrap();
        assert_eq!((published.year(), published.month(), published.day()), (2026, 2, 21));
        assert_eq!((published.hour(), published.minute()), (12, 6));
    }

    #[test]
    fn parses_detail_content_and_metadata() {
        let html = r#"
            <html><body>
              <span>Tarix: 21 fevral 2026 12:06</span>
              <a class="category-link" href="/iqtisadiyyat">İqtisadiyyat</a>
              <div class="article-content">
                <p>Birinci abzas mətnidir.</p>
                <p>İkinci abzas mətnidir.</p>
              </div>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let detail = SonxeberScraper.parse_detail(&doc, "https://sonxeber.az/388358/x").unwrap();

        assert_eq!(
            detail.content.as_deref(),
            Some("Birinci abzas mətnidir.\n\nİkinci abzas mətnidir.")
        );
        assert_eq!(detail.published_at.unwrap().day(), 21);
        assert_eq!(detail.metadata["category"], serde_json::json!("İqtisadiyyat"));
    }

    #[test]
    fn empty_detail_page_is_no_data() {
        let doc = Html::parse_document("<html><body><nav>menu</nav></body></html>");
        assert!(SonxeberScraper.parse_detail(&doc, "https://sonxeber.az/1/x").is_none());
    }

    #[test]
    fn listing_url_uses_start_parameter() {
        let source = super::super::configured_sources()
            .into_iter()
            .find(|s| s.domain == "sonxeber.az")
            .unwrap();
        assert_eq!(SonxeberScraper.listing_url(&source, 1), "https://sonxeber.az/xeberler/");
        assert_eq!(SonxeberScraper.listing_url(&source, 3), "https://sonxeber.az/xeberler/?start=3");
    }
}
