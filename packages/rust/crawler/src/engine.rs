//! Scope-aware crawler engine.
//!
//! The crawler runs a breadth-first traversal from a fixed seed list,
//! fetching in batches bounded by the concurrency limit while the frontier
//! itself (dequeue, seen-set, enqueue) stays on the driver task. A politeness
//! delay is awaited before every fetch. The frontier is session-scoped: no
//! visited-set survives across runs, so re-crawls rely on downstream change
//! detection for idempotency.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use lexibase_shared::{CapturedPage, CrawlConfig, LexibaseError, Result};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("lexibase-research-bot/", env!("CARGO_PKG_VERSION"));

/// Binary and administrative resources that are never worth fetching.
static DISALLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.pdf($|\?))|(\.docx?)|(\.xlsx?)|login|logon|search|sitesearch").unwrap()
});

// ---------------------------------------------------------------------------
// CrawlReport
// ---------------------------------------------------------------------------

/// Summary of a completed crawl run.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Number of pages successfully captured.
    pub pages_fetched: usize,
    /// Number of URLs skipped (duplicate, out of scope, blocked).
    pub pages_skipped: usize,
    /// Fetch failures encountered (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Breadth-first crawler over an allow-listed frontier.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
    scope: CrawlScope,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LexibaseError::Fetch(format!("failed to build HTTP client: {e}")))?;

        let scope = CrawlScope::new(&config);

        Ok(Self {
            config,
            client,
            scope,
            allow_localhost: false,
        })
    }

    /// Allow crawling localhost/private IPs (for integration tests against
    /// mock servers).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Crawl from the configured seeds until the frontier is exhausted or
    /// `max_pages` captures have been collected.
    #[instrument(skip_all, fields(seeds = self.config.seeds.len()))]
    pub async fn crawl(&self) -> Result<(CrawlReport, Vec<CapturedPage>)> {
        let start_time = std::time::Instant::now();

        let mut queue: VecDeque<Url> = VecDeque::new();
        for seed in &self.config.seeds {
            match Url::parse(seed) {
                Ok(url) => queue.push_back(url),
                Err(e) => warn!(seed = %seed, error = %e, "invalid seed URL, skipping"),
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));

        let mut captured: Vec<CapturedPage> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut pages_skipped: usize = 0;

        info!(
            concurrency = self.config.concurrency,
            max_pages = self.config.max_pages,
            delay_ms = self.config.delay_ms,
            "starting crawl"
        );

        while !queue.is_empty() && captured.len() < self.config.max_pages {
            // Take a batch bounded by the concurrency limit and the remaining
            // page budget; the frontier itself never leaves this task.
            let remaining = self.config.max_pages - captured.len();
            let batch_size = queue
                .len()
                .min(self.config.concurrency.max(1) as usize)
                .min(remaining);
            let batch: Vec<Url> = queue.drain(..batch_size).collect();

            let mut handles = Vec::new();

            for mut url in batch {
                url.set_fragment(None);

                if !seen.insert(url.as_str().to_string()) {
                    pages_skipped += 1;
                    continue;
                }

                if !self.scope.admits(&url) {
                    debug!(%url, "rejected by crawl policy");
                    pages_skipped += 1;
                    continue;
                }

                if !self.allow_localhost && is_ssrf_target(&url) {
                    warn!(%url, "SSRF protection: blocked");
                    pages_skipped += 1;
                    continue;
                }

                let client = self.client.clone();
                let sem = semaphore.clone();
                let delay_ms = self.config.delay_ms;

                handles.push(tokio::spawn(async move {
                    let _permit = sem.acquire().await.expect("semaphore closed");

                    // Politeness: bound the request rate against target hosts.
                    if delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }

                    let result = fetch_page(&client, &url).await;
                    (url, result)
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok((url, Ok((page, links)))) => {
                        for link in links {
                            if let Ok(link_url) = Url::parse(&link) {
                                if self.scope.enqueueable(&link_url) {
                                    queue.push_back(link_url);
                                }
                            }
                        }
                        debug!(%url, "page captured");
                        captured.push(page);
                    }
                    Ok((url, Err(e))) => {
                        warn!(%url, error = %e, "fetch failed, continuing");
                        errors.push((url.to_string(), e.to_string()));
                    }
                    Err(e) => {
                        errors.push(("task".into(), e.to_string()));
                    }
                }
            }
        }

        let report = CrawlReport {
            pages_fetched: captured.len(),
            pages_skipped,
            errors,
            duration: start_time.elapsed(),
        };

        info!(
            pages_fetched = report.pages_fetched,
            pages_skipped = report.pages_skipped,
            errors = report.errors.len(),
            duration_ms = report.duration.as_millis(),
            "crawl completed"
        );

        Ok((report, captured))
    }
}

// ---------------------------------------------------------------------------
// Scope checking
// ---------------------------------------------------------------------------

/// Determines which URLs are fetchable and which discovered links enter the
/// frontier.
struct CrawlScope {
    /// Hostnames the crawler may fetch from.
    allow_hosts: Vec<String>,
    /// URL prefixes considered in-scope when enqueuing discovered links.
    path_prefixes: Vec<String>,
}

impl CrawlScope {
    fn new(config: &CrawlConfig) -> Self {
        Self {
            allow_hosts: config.allow_hosts.clone(),
            path_prefixes: config.path_prefixes.clone(),
        }
    }

    /// May this URL be fetched at all? Applied when a URL is popped from the
    /// frontier, seeds included.
    fn admits(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        if DISALLOW.is_match(url.as_str()) {
            return false;
        }
        let host = url.host_str().unwrap_or("");
        self.allow_hosts.iter().any(|h| h == host)
    }

    /// May this discovered link enter the frontier? Stricter than [`admits`]:
    /// the URL must also match one of the in-scope path prefixes.
    fn enqueueable(&self, url: &Url) -> bool {
        self.admits(url) && self.path_prefixes.iter().any(|p| url.as_str().starts_with(p))
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        if host == "localhost"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch a single page, capture the raw body, and extract outbound links.
///
/// Any failure (non-2xx, DNS, connect, timeout) maps to a [`LexibaseError::Fetch`]
/// the caller treats as "skip this URL, continue". No retries here.
async fn fetch_page(client: &Client, url: &Url) -> Result<(CapturedPage, Vec<String>)> {
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| LexibaseError::Fetch(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LexibaseError::Fetch(format!("{url}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| LexibaseError::Fetch(format!("{url}: body read failed: {e}")))?;

    let doc = Html::parse_document(&body);
    let links = extract_links(&doc, url);

    let page = CapturedPage {
        url: url.to_string(),
        html: body,
        fetched_at: Utc::now(),
    };

    Ok((page, links))
}

/// Extract all links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").unwrap();
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            // Skip anchors, javascript:, mailto:
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                links.push(resolved.to_string());
            }
        }
    }

    links
}
