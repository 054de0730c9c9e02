//! Page fetching. One implementation speaks plain HTTP with browser-like
//! headers and bounded retries; an optional one drives headless Chrome for
//! sources that need client-side rendering. The choice between them is made
//! once at process start, never per request.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use xeber_core::{Error, Result};

/// Small fixed pool of ordinary desktop browser user agents; one is picked
/// uniformly at random per request. Anti-blocking heuristic, nothing more.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    /// Politeness delay applied before every attempt.
    pub request_delay: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            request_delay: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Which fetcher implementation the process uses. Static, set once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Http,
    Browser,
}

/// `Ok(None)` is the definitive "no page" outcome (404/403, exhausted
/// retries, render failure); the orchestrator treats it as an early stop or
/// a skipped item, never a job failure.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<String>>;
}

pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Http)?;
        Ok(Self { client, config })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("User-Agent", random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            )
            .header("Accept-Language", "az-AZ,az;q=0.9,en-US;q=0.8,en;q=0.7,tr;q=0.6")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Cache-Control", "max-age=0")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header("DNT", "1")
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        for attempt in 1..=self.config.max_retries {
            tokio::time::sleep(self.config.request_delay).await;

            match self.request(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        // The connection can still drop mid-body; that is as
                        // transient as a failed send.
                        match response.text().await {
                            Ok(body) => {
                                debug!("fetched {} ({} bytes)", url, body.len());
                                return Ok(Some(body));
                            }
                            Err(e) => {
                                warn!(
                                    "error reading body from {}: {} (attempt {}/{})",
                                    url, e, attempt, self.config.max_retries
                                );
                            }
                        }
                    } else if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
                        // Gone or blocked: definitive, retrying will not help.
                        warn!("{} for {}, giving up", status, url);
                        return Ok(None);
                    } else {
                        warn!("HTTP {} for {} (attempt {}/{})", status, url, attempt, self.config.max_retries);
                    }
                }
                Err(e) if e.is_timeout() => {
                    warn!("timeout fetching {} (attempt {}/{})", url, attempt, self.config.max_retries);
                }
                Err(e) if e.is_connect() => {
                    warn!("connection error for {} (attempt {}/{})", url, attempt, self.config.max_retries);
                }
                Err(e) => {
                    warn!("error fetching {}: {} (attempt {}/{})", url, e, attempt, self.config.max_retries);
                }
            }

            if attempt < self.config.max_retries {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        error!("failed to fetch {} after {} attempts", url, self.config.max_retries);
        Ok(None)
    }
}

/// Build the process-wide fetcher for the selected mode.
pub fn build_fetcher(mode: FetchMode, config: FetchConfig) -> Result<Box<dyn PageFetcher>> {
    match mode {
        FetchMode::Http => Ok(Box::new(HttpFetcher::new(config)?)),
        #[cfg(feature = "browser")]
        FetchMode::Browser => Ok(Box::new(browser::BrowserFetcher::new(config))),
        #[cfg(not(feature = "browser"))]
        FetchMode::Browser => Err(Error::Config(
            "browser rendering requested but this build lacks the `browser` feature".to_string(),
        )),
    }
}

#[cfg(feature = "browser")]
pub mod browser {
    //! Headless Chrome fetching via the DevTools protocol, for sources whose
    //! listings only exist after script execution.

    use std::sync::Arc;

    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tracing::{debug, info, warn};

    use super::{FetchConfig, PageFetcher};
    use xeber_core::{Error, Result};

    pub struct BrowserFetcher {
        config: FetchConfig,
        browser: Arc<Mutex<Option<Browser>>>,
    }

    impl BrowserFetcher {
        pub fn new(config: FetchConfig) -> Self {
            Self { config, browser: Arc::new(Mutex::new(None)) }
        }

        async fn ensure_browser(&self) -> Result<()> {
            let mut guard = self.browser.lock().await;
            if guard.is_some() {
                return Ok(());
            }

            info!("launching headless browser");
            let browser_config = BrowserConfig::builder()
                .no_sandbox()
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .build()
                .map_err(Error::Fetch)?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| Error::Fetch(format!("failed to launch browser: {}", e)))?;

            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            *guard = Some(browser);
            Ok(())
        }

        async fn render(&self, url: &str) -> Result<String> {
            self.ensure_browser().await?;
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| Error::Fetch("browser not initialized".to_string()))?;

            let page = browser
                .new_page(url)
                .await
                .map_err(|e| Error::Fetch(format!("failed to open page: {}", e)))?;

            tokio::time::timeout(self.config.timeout, page.wait_for_navigation())
                .await
                .map_err(|_| Error::Fetch(format!("page load timeout: {}", url)))?
                .map_err(|e| Error::Fetch(format!("navigation failed: {}", e)))?;

            let html = page
                .content()
                .await
                .map_err(|e| Error::Fetch(format!("failed to read content: {}", e)))?;

            if let Err(e) = page.close().await {
                warn!("failed to close page for {}: {}", url, e);
            }
            Ok(html)
        }
    }

    #[async_trait]
    impl PageFetcher for BrowserFetcher {
        async fn fetch(&self, url: &str) -> Result<Option<String>> {
            tokio::time::sleep(self.config.request_delay).await;
            match self.render(url).await {
                Ok(html) => {
                    debug!("rendered {} ({} bytes)", url, html.len());
                    Ok(Some(html))
                }
                Err(e) => {
                    warn!("browser fetch failed for {}: {}", url, e);
                    Ok(None)
                }
            }
        }
    }
}
