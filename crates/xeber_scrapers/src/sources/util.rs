use scraper::ElementRef;

/// Collected, whitespace-trimmed text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Resolve a possibly-relative URL against a source base URL.
pub fn normalize_url(url: &str, base_url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else if url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), url)
    }
}

/// Last non-empty path segment of a URL, the usual source-native id for
/// slug-addressed sites.
pub fn last_path_segment(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let mut parts = after_scheme.trim_end_matches('/').split('/');
    let _host = parts.next();
    parts.last().filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn element_text_trims_and_joins() {
        let html = Html::parse_fragment("<p>  Xəbər <b>başlığı</b>  </p>");
        let sel = Selector::parse("p").unwrap();
        let el = html.select(&sel).next().unwrap();
        assert_eq!(element_text(el), "Xəbər başlığı");
    }

    #[test]
    fn normalize_url_handles_each_shape() {
        let base = "https://x.az/";
        assert_eq!(normalize_url("https://y.az/a", base), "https://y.az/a");
        assert_eq!(normalize_url("//cdn.x.az/img.jpg", base), "https://cdn.x.az/img.jpg");
        assert_eq!(normalize_url("/news/1", base), "https://x.az/news/1");
        assert_eq!(normalize_url("news/1", base), "https://x.az/news/1");
    }

    #[test]
    fn last_path_segment_strips_query_and_slashes() {
        assert_eq!(last_path_segment("https://x.az/a/b-c/?p=1").as_deref(), Some("b-c"));
        assert_eq!(last_path_segment("https://x.az/").as_deref(), None);
    }
}
