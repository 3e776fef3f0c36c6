pub mod error;
pub mod poll;
pub mod retry;
pub mod types;

pub use error::{parse_retry_hint, FirecrawlError, Result};
pub use poll::{poll_with_backoff, JobState, JobStatus, PollOptions};
pub use retry::{call_provider, with_retry, RetryPolicy};
pub use types::{
    CrawlDocument, CrawlOptions, CrawlScrapeOptions, CrawlStarted, CrawlStatus, DocumentMetadata,
    ExtractOptions, MapLinks, MapOptions, ScrapeOptions, ScrapeResult,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use types::ScrapeResponse;

const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Extraction runs an LLM over the page and is much slower than the other calls.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(180);

pub struct FirecrawlClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirecrawlClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    /// Point the client at another host, e.g. a self-hosted instance.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Enumerate the site's URLs. Response shape differences are folded into [`MapLinks`].
    pub async fn map(&self, opts: &MapOptions) -> Result<MapLinks> {
        tracing::info!(url = %opts.url, limit = opts.limit, "Starting map");
        let url = format!("{}/v2/map", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(opts)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body: Value = read_json(resp).await?;
        let links = MapLinks::from_value(&body);
        tracing::info!(
            count = links.len(),
            unusable = links.unusable,
            "Map returned links"
        );
        Ok(links)
    }

    /// Start an async crawl job. Returns immediately with the job id.
    pub async fn start_crawl(&self, opts: &CrawlOptions) -> Result<CrawlStarted> {
        tracing::info!(url = %opts.url, limit = opts.limit, "Starting crawl");
        let url = format!("{}/v2/crawl", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(opts)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let started: CrawlStarted = read_json(resp).await?;
        tracing::info!(job_id = %started.id, "Crawl job started");
        Ok(started)
    }

    /// Fetch a crawl job's status. A completed job's documents are collected
    /// across every `next` page.
    pub async fn crawl_status(&self, job_id: &str) -> Result<CrawlStatus> {
        let url = format!("{}/v2/crawl/{}", self.base_url, job_id);
        let mut status: CrawlStatus = self.get_json(&url).await?;

        if status.state() != JobState::Completed {
            return Ok(status);
        }

        let mut pages = 1;
        while let Some(next) = status.next.take() {
            let page: CrawlStatus = self.get_json(&next).await?;
            status.data.extend(page.data);
            status.next = page.next;
            pages += 1;
        }
        tracing::debug!(job_id, pages, documents = status.data.len(), "Fetched crawl results");
        Ok(status)
    }

    /// Scrape one URL with structured extraction.
    pub async fn scrape(&self, opts: &ScrapeOptions) -> Result<ScrapeResult> {
        tracing::debug!(url = %opts.url, "Scraping page");
        let url = format!("{}/v1/scrape", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(opts)
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await?;

        let body: ScrapeResponse = read_json(resp).await?;
        Ok(body.into())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        read_json(resp).await
    }
}

/// Turn a non-2xx response into [`FirecrawlError::Api`], keeping any `Retry-After`.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().await.unwrap_or_default();
        return Err(FirecrawlError::Api {
            status: status.as_u16(),
            message: body,
            retry_after,
        });
    }

    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}
