//! Concurrent page scraper
//!
//! All pages of a batch are driven from a single task: the per-URL futures are
//! joined and interleave at their await points (navigation, quiescence wait,
//! grace delay). A semaphore admits at most `max_in_flight` of them past the
//! gate at once; each holds its permit from opening its page until the page is
//! closed.

use crate::config::CrawlerConfig;
use crate::crawler::parser::{is_not_found, ContentExtractor};
use crate::crawler::{Document, FetchError, PageHandle, SiteSession};
use crate::state::PageOutcome;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Timeouts and limits for a scrape batch
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub max_in_flight: usize,
    pub navigation_timeout: Duration,
    pub quiescence_timeout: Duration,
    pub quiescence_grace: Duration,
}

impl From<&CrawlerConfig> for ScrapeSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_in_flight: config.max_concurrent_pages_open as usize,
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            quiescence_timeout: Duration::from_millis(config.quiescence_timeout_ms),
            quiescence_grace: Duration::from_millis(config.quiescence_grace_ms),
        }
    }
}

/// Result of scraping a batch of URLs
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Documents for pages that loaded and were not "not found"
    pub documents: Vec<Document>,

    /// One outcome per input URL, in input order
    pub outcomes: Vec<(String, PageOutcome)>,
}

impl ScrapeReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn scraped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn not_found(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_error()).count()
    }
}

/// Scrapes pages concurrently behind an admission gate
pub struct ConcurrentScraper {
    settings: ScrapeSettings,
    extractor: ContentExtractor,
}

impl ConcurrentScraper {
    pub fn new(settings: ScrapeSettings, extractor: ContentExtractor) -> Self {
        Self {
            settings: ScrapeSettings {
                max_in_flight: settings.max_in_flight.max(1),
                ..settings
            },
            extractor,
        }
    }

    /// Builds a scraper from the crawler section of the configuration
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let extractor = ContentExtractor::new(&config.content_selectors, &config.comment_selectors)?;
        Ok(Self::new(ScrapeSettings::from(config), extractor))
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.settings
    }

    /// Scrapes every URL in `urls` within `session`
    ///
    /// Never fails as a whole: each URL either contributes one document or is
    /// recorded as not found / failed in the report.
    pub async fn scrape(&self, session: &dyn SiteSession, urls: &[String]) -> ScrapeReport {
        tracing::info!("Starting async scrape of {} pages...", urls.len());

        let gate = Semaphore::new(self.settings.max_in_flight);
        let results = join_all(
            urls.iter()
                .map(|url| self.scrape_single(session, url, &gate)),
        )
        .await;

        let mut report = ScrapeReport::default();
        for (url, (outcome, document)) in urls.iter().zip(results) {
            if let Some(document) = document {
                report.documents.push(document);
            }
            report.outcomes.push((url.clone(), outcome));
        }

        tracing::info!(
            "Finished! Successfully scraped {}/{} pages ({} not found, {} failed).",
            report.scraped(),
            report.total(),
            report.not_found(),
            report.failed()
        );

        report
    }

    async fn scrape_single(
        &self,
        session: &dyn SiteSession,
        url: &str,
        gate: &Semaphore,
    ) -> (PageOutcome, Option<Document>) {
        // The semaphore lives for the whole batch and is never closed
        let _permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => return (PageOutcome::Failed(e.to_string()), None),
        };

        let mut page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed {}: {}", url, e);
                return (PageOutcome::Failed(e.to_string()), None);
            }
        };

        let result = self.process_page(page.as_mut(), url).await;
        page.close().await;

        match result {
            Ok(Some(document)) => {
                tracing::info!("Scraped: {}", display_path(url));
                (PageOutcome::Scraped, Some(document))
            }
            Ok(None) => {
                tracing::info!("Skipping 404/Not Found: {}", url);
                (PageOutcome::NotFound, None)
            }
            Err(e) => {
                tracing::warn!("Failed {}: {}", url, e);
                (PageOutcome::Failed(e.to_string()), None)
            }
        }
    }

    async fn process_page(
        &self,
        page: &mut dyn PageHandle,
        url: &str,
    ) -> Result<Option<Document>, FetchError> {
        page.goto(url, self.settings.navigation_timeout).await?;

        if let Err(e) = page
            .wait_for_quiescence(self.settings.quiescence_timeout)
            .await
        {
            tracing::warn!("Timeout waiting for content on {}: {}", url, e);
            tokio::time::sleep(self.settings.quiescence_grace).await;
        }

        let title = page.title().await?;
        if is_not_found(&title) {
            return Ok(None);
        }

        let html = page.content().await?;
        let markdown = self.extractor.to_markdown(&html)?;

        Ok(Some(Document::from_page(url, &title, &markdown)))
    }
}

/// Strips scheme and host for log output
fn display_path(url: &str) -> String {
    url.splitn(4, '/').nth(3).unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        open: AtomicUsize,
        max_open: AtomicUsize,
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    /// Serves synthetic pages; the URL decides how each one behaves
    struct FakeSession {
        counters: Arc<Counters>,
    }

    struct FakePage {
        counters: Arc<Counters>,
        url: Option<String>,
    }

    #[async_trait]
    impl SiteSession for FakeSession {
        async fn new_page(&self) -> Result<Box<dyn PageHandle>, FetchError> {
            let now = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_open.fetch_max(now, Ordering::SeqCst);
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePage {
                counters: Arc::clone(&self.counters),
                url: None,
            }))
        }
    }

    #[async_trait]
    impl PageHandle for FakePage {
        async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), FetchError> {
            let delay = if url.contains("slow") { 80 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if url.contains("broken") {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: 500,
                });
            }
            self.url = Some(url.to_string());
            Ok(())
        }

        async fn wait_for_quiescence(&mut self, timeout: Duration) -> Result<(), FetchError> {
            match &self.url {
                Some(url) if url.contains("busy") => Err(FetchError::QuiescenceTimeout(timeout)),
                _ => Ok(()),
            }
        }

        async fn title(&self) -> Result<String, FetchError> {
            let url = self.url.as_deref().ok_or(FetchError::NotLoaded)?;
            Ok(if url.contains("missing") {
                "404 Page Not Found".to_string()
            } else {
                format!("Title of {}", display_path(url))
            })
        }

        async fn content(&self) -> Result<String, FetchError> {
            let url = self.url.as_deref().ok_or(FetchError::NotLoaded)?;
            Ok(format!(
                "<html><body><div class=\"contents\"><p>Body of {}</p></div></body></html>",
                url
            ))
        }

        async fn close(self: Box<Self>) {
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scraper(max_in_flight: usize) -> ConcurrentScraper {
        let config = CrawlerConfig::default();
        let extractor =
            ContentExtractor::new(&config.content_selectors, &config.comment_selectors).unwrap();
        ConcurrentScraper::new(
            ScrapeSettings {
                max_in_flight,
                navigation_timeout: Duration::from_secs(1),
                quiescence_timeout: Duration::from_millis(10),
                quiescence_grace: Duration::from_millis(5),
            },
            extractor,
        )
    }

    fn urls(paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .map(|p| format!("https://wiki.example.com/{}", p))
            .collect()
    }

    #[tokio::test]
    async fn test_admission_gate_bounds_open_pages() {
        let counters = Arc::new(Counters::default());
        let session = FakeSession {
            counters: Arc::clone(&counters),
        };
        let paths: Vec<String> = (0..25).map(|i| format!("page-{}", i)).collect();
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();

        let report = scraper(3).scrape(&session, &urls(&paths)).await;

        assert_eq!(report.documents.len(), 25);
        assert!(counters.max_open.load(Ordering::SeqCst) <= 3);
        assert_eq!(counters.max_open.load(Ordering::SeqCst), 3);
        assert_eq!(counters.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_found_and_failed_pages_excluded() {
        let counters = Arc::new(Counters::default());
        let session = FakeSession {
            counters: Arc::clone(&counters),
        };
        let input = urls(&["home", "missing-page", "broken-page", "busy-page"]);

        let report = scraper(2).scrape(&session, &input).await;

        assert_eq!(report.total(), 4);
        assert_eq!(report.scraped(), 2);
        assert_eq!(report.not_found(), 1);
        assert_eq!(report.failed(), 1);

        let sources: Vec<&str> = report.documents.iter().map(|d| d.source.as_str()).collect();
        assert!(sources.iter().all(|s| input.iter().any(|u| u == s)));
        assert!(sources.contains(&"https://wiki.example.com/busy-page"));
        assert!(!sources.iter().any(|s| s.contains("missing") || s.contains("broken")));

        // Every opened page was closed, including the failed one
        assert_eq!(counters.opened.load(Ordering::SeqCst), 4);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_outcomes_follow_input_order() {
        let session = FakeSession {
            counters: Arc::new(Counters::default()),
        };
        let input = urls(&["slow-page", "home", "missing-page", "about"]);

        let report = scraper(4).scrape(&session, &input).await;

        let reported: Vec<&String> = report.outcomes.iter().map(|(url, _)| url).collect();
        assert_eq!(reported, input.iter().collect::<Vec<_>>());
        assert_eq!(report.outcomes[0].1, PageOutcome::Scraped);
        assert_eq!(report.outcomes[2].1, PageOutcome::NotFound);
        assert_eq!(report.documents[0].source, input[0]);
    }

    #[tokio::test]
    async fn test_document_shape() {
        let session = FakeSession {
            counters: Arc::new(Counters::default()),
        };
        let report = scraper(1).scrape(&session, &urls(&["docs/intro"])).await;

        let doc = &report.documents[0];
        assert_eq!(doc.title, "Title of docs/intro");
        assert_eq!(doc.source, "https://wiki.example.com/docs/intro");
        assert!(doc
            .content
            .starts_with("# Title of docs/intro\nURL: https://wiki.example.com/docs/intro\n\n"));
        assert!(doc.content.contains("Body of"));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let session = FakeSession {
            counters: Arc::new(Counters::default()),
        };
        let report = scraper(4).scrape(&session, &[]).await;
        assert_eq!(report.total(), 0);
        assert!(report.documents.is_empty());
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path("https://wiki.example.com/hardware/pcu"), "hardware/pcu");
        assert_eq!(display_path("not-a-url"), "not-a-url");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ScrapeSettings::from(&CrawlerConfig::default());
        assert_eq!(settings.max_in_flight, 10);
        assert_eq!(settings.navigation_timeout, Duration::from_secs(30));
        assert_eq!(settings.quiescence_timeout, Duration::from_secs(5));
        assert_eq!(settings.quiescence_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_report_counts() {
        let report = ScrapeReport {
            documents: vec![],
            outcomes: vec![
                ("a".to_string(), PageOutcome::Scraped),
                ("b".to_string(), PageOutcome::NotFound),
                ("c".to_string(), PageOutcome::Failed("x".to_string())),
                ("d".to_string(), PageOutcome::Scraped),
            ],
        };
        assert_eq!(report.total(), 4);
        assert_eq!(report.scraped(), 2);
        assert_eq!(report.not_found(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let config = CrawlerConfig::default();
        let extractor =
            ContentExtractor::new(&config.content_selectors, &config.comment_selectors).unwrap();
        let mut settings = ScrapeSettings::from(&config);
        settings.max_in_flight = 0;
        let scraper = ConcurrentScraper::new(settings, extractor);
        assert_eq!(scraper.settings().max_in_flight, 1);
    }
}
