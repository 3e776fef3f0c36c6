// Trait seams for the two external collaborators.
//
// CrawlProvider: map / crawl / scrape against the crawl provider. Errors stay
//   typed so rate-limit and credit classification reach the orchestrators.
// ContentStore: find / create / update against the CMS collections API.
//
// MockProvider and InMemoryStore in `testing` implement these for tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use firecrawl_client::{
    CrawlOptions, CrawlStarted, CrawlStatus, FirecrawlClient, MapLinks, MapOptions,
    ScrapeOptions, ScrapeResult,
};
use payload_client::{DocId, Document, PayloadClient, Where};

// ---------------------------------------------------------------------------
// CrawlProvider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CrawlProvider: Send + Sync {
    async fn map(&self, opts: &MapOptions) -> firecrawl_client::Result<MapLinks>;

    async fn start_crawl(&self, opts: &CrawlOptions) -> firecrawl_client::Result<CrawlStarted>;

    /// Status of a crawl job, with all result pages once it has completed.
    async fn crawl_status(&self, job_id: &str) -> firecrawl_client::Result<CrawlStatus>;

    async fn scrape(&self, opts: &ScrapeOptions) -> firecrawl_client::Result<ScrapeResult>;
}

#[async_trait]
impl CrawlProvider for FirecrawlClient {
    async fn map(&self, opts: &MapOptions) -> firecrawl_client::Result<MapLinks> {
        FirecrawlClient::map(self, opts).await
    }

    async fn start_crawl(&self, opts: &CrawlOptions) -> firecrawl_client::Result<CrawlStarted> {
        FirecrawlClient::start_crawl(self, opts).await
    }

    async fn crawl_status(&self, job_id: &str) -> firecrawl_client::Result<CrawlStatus> {
        FirecrawlClient::crawl_status(self, job_id).await
    }

    async fn scrape(&self, opts: &ScrapeOptions) -> firecrawl_client::Result<ScrapeResult> {
        FirecrawlClient::scrape(self, opts).await
    }
}

// ---------------------------------------------------------------------------
// ContentStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find(&self, collection: &str, filter: &Where, limit: u32) -> Result<Vec<Document>>;

    async fn create(&self, collection: &str, data: &Value) -> Result<Document>;

    async fn update(&self, collection: &str, id: &DocId, data: &Value) -> Result<Document>;
}

#[async_trait]
impl ContentStore for PayloadClient {
    async fn find(&self, collection: &str, filter: &Where, limit: u32) -> Result<Vec<Document>> {
        Ok(PayloadClient::find(self, collection, filter, limit).await?)
    }

    async fn create(&self, collection: &str, data: &Value) -> Result<Document> {
        Ok(PayloadClient::create(self, collection, data).await?)
    }

    async fn update(&self, collection: &str, id: &DocId, data: &Value) -> Result<Document> {
        Ok(PayloadClient::update(self, collection, id, data).await?)
    }
}
