// Test mocks for the pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockProvider (CrawlProvider): queued map results, a scripted crawl job,
//   URL→scrape responses, call counters and an in-flight high-water mark
// - InMemoryStore (ContentStore): collections of documents with integer ids,
//   filtered through `Where::matches`

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use firecrawl_client::{
    CrawlDocument, CrawlOptions, CrawlStarted, CrawlStatus, FirecrawlError, MapLinks, MapOptions,
    ScrapeOptions, ScrapeResult,
};
use payload_client::{DocId, Document, Where};

use crate::traits::{ContentStore, CrawlProvider};

/// Provider error with the given status, e.g. 429 or 402.
pub fn api_error(status: u16, message: &str) -> FirecrawlError {
    FirecrawlError::Api {
        status,
        message: message.to_string(),
        retry_after: None,
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MockScrape {
    Extract { extract: Value, markdown: String },
    Unsuccessful(String),
    Error { status: u16, message: String },
}

/// Scripted crawl provider.
///
/// Map calls pop from a queue and fall back to an empty link list. A crawl
/// reports `pending` for the configured number of polls, then completes with
/// the registered documents. Scrapes of unregistered URLs fail with a 404.
pub struct MockProvider {
    map_results: Mutex<VecDeque<firecrawl_client::Result<MapLinks>>>,
    crawl_start_errors: Mutex<VecDeque<FirecrawlError>>,
    crawl_urls: Vec<String>,
    pending_polls: usize,
    scrapes: HashMap<String, MockScrape>,
    scrape_delay: Duration,

    map_calls: AtomicUsize,
    crawl_starts: AtomicUsize,
    status_polls: AtomicUsize,
    scrape_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            map_results: Mutex::new(VecDeque::new()),
            crawl_start_errors: Mutex::new(VecDeque::new()),
            crawl_urls: Vec::new(),
            pending_polls: 0,
            scrapes: HashMap::new(),
            scrape_delay: Duration::ZERO,
            map_calls: AtomicUsize::new(0),
            crawl_starts: AtomicUsize::new(0),
            status_polls: AtomicUsize::new(0),
            scrape_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn on_map(self, links: &[&str]) -> Self {
        let links = MapLinks {
            links: links.iter().map(|l| l.to_string()).collect(),
            unusable: 0,
        };
        self.push_map(Ok(links))
    }

    pub fn fail_map(self, err: FirecrawlError) -> Self {
        self.push_map(Err(err))
    }

    fn push_map(self, result: firecrawl_client::Result<MapLinks>) -> Self {
        if let Ok(mut queue) = self.map_results.lock() {
            queue.push_back(result);
        }
        self
    }

    /// Documents a completed crawl returns, after `pending_polls` pending statuses.
    pub fn on_crawl(mut self, urls: &[&str], pending_polls: usize) -> Self {
        self.crawl_urls = urls.iter().map(|u| u.to_string()).collect();
        self.pending_polls = pending_polls;
        self
    }

    /// The next crawl start fails with `err`.
    pub fn fail_crawl(self, err: FirecrawlError) -> Self {
        if let Ok(mut queue) = self.crawl_start_errors.lock() {
            queue.push_back(err);
        }
        self
    }

    pub fn on_scrape(mut self, url: &str, extract: Value) -> Self {
        self.scrapes.insert(
            url.to_string(),
            MockScrape::Extract {
                extract,
                markdown: format!("# {url}"),
            },
        );
        self
    }

    /// Provider answers with `success: false` and `error`.
    pub fn on_scrape_unsuccessful(mut self, url: &str, error: &str) -> Self {
        self.scrapes
            .insert(url.to_string(), MockScrape::Unsuccessful(error.to_string()));
        self
    }

    pub fn fail_scrape(mut self, url: &str, status: u16, message: &str) -> Self {
        self.scrapes.insert(
            url.to_string(),
            MockScrape::Error {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// How long each scrape holds its slot.
    pub fn with_scrape_delay(mut self, delay: Duration) -> Self {
        self.scrape_delay = delay;
        self
    }

    pub fn map_calls(&self) -> usize {
        self.map_calls.load(Ordering::SeqCst)
    }

    pub fn crawl_starts(&self) -> usize {
        self.crawl_starts.load(Ordering::SeqCst)
    }

    pub fn status_polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }

    pub fn scrape_calls(&self) -> usize {
        self.scrape_calls.load(Ordering::SeqCst)
    }

    /// Most scrapes ever running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlProvider for MockProvider {
    async fn map(&self, _opts: &MapOptions) -> firecrawl_client::Result<MapLinks> {
        self.map_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.map_results.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Ok(MapLinks::default()))
    }

    async fn start_crawl(&self, _opts: &CrawlOptions) -> firecrawl_client::Result<CrawlStarted> {
        self.crawl_starts.fetch_add(1, Ordering::SeqCst);
        let err = self.crawl_start_errors.lock().ok().and_then(|mut q| q.pop_front());
        match err {
            Some(err) => Err(err),
            None => Ok(CrawlStarted {
                id: "mock-crawl".to_string(),
                url: None,
            }),
        }
    }

    async fn crawl_status(&self, _job_id: &str) -> firecrawl_client::Result<CrawlStatus> {
        let poll = self.status_polls.fetch_add(1, Ordering::SeqCst);
        let total = self.crawl_urls.len() as u32;
        if poll < self.pending_polls {
            return Ok(CrawlStatus {
                status: "scraping".to_string(),
                total,
                ..Default::default()
            });
        }
        Ok(CrawlStatus {
            status: "completed".to_string(),
            total,
            completed: total,
            data: self
                .crawl_urls
                .iter()
                .map(|u| CrawlDocument {
                    url: Some(u.clone()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
    }

    async fn scrape(&self, opts: &ScrapeOptions) -> firecrawl_client::Result<ScrapeResult> {
        self.scrape_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.scrape_delay.is_zero() {
            tokio::time::sleep(self.scrape_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scrapes.get(&opts.url) {
            Some(MockScrape::Extract { extract, markdown }) => Ok(ScrapeResult {
                success: true,
                markdown: Some(markdown.clone()),
                extract: Some(extract.clone()),
                metadata: Some(serde_json::json!({ "sourceURL": opts.url })),
                error: None,
            }),
            Some(MockScrape::Unsuccessful(error)) => Ok(ScrapeResult {
                success: false,
                error: Some(error.clone()),
                ..Default::default()
            }),
            Some(MockScrape::Error { status, message }) => Err(api_error(*status, message)),
            None => Err(api_error(404, &format!("MockProvider: no scrape registered for {}", opts.url))),
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Collections of documents held in memory. Ids are sequential integers.
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    next_id: AtomicI64,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Seed a document directly, bypassing the create counter.
    pub fn with_doc(self, collection: &str, fields: Value) -> Self {
        self.insert(collection, fields);
        self
    }

    fn insert(&self, collection: &str, fields: Value) -> Document {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let doc = Document {
            id: DocId::Int(self.next_id.fetch_add(1, Ordering::SeqCst)),
            fields,
        };
        if let Ok(mut collections) = self.collections.lock() {
            collections
                .entry(collection.to_string())
                .or_default()
                .push(doc.clone());
        }
        doc
    }

    pub fn docs(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .ok()
            .and_then(|c| c.get(collection).cloned())
            .unwrap_or_default()
    }

    pub fn find_by_slug(&self, collection: &str, slug: &str) -> Option<Document> {
        self.docs(collection)
            .into_iter()
            .find(|d| d.get_str("slug") == Some(slug))
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn find(&self, collection: &str, filter: &Where, limit: u32) -> Result<Vec<Document>> {
        Ok(self
            .docs(collection)
            .into_iter()
            .filter(|d| filter.matches(d))
            .take(limit as usize)
            .collect())
    }

    async fn create(&self, collection: &str, data: &Value) -> Result<Document> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.insert(collection, data.clone()))
    }

    async fn update(&self, collection: &str, id: &DocId, data: &Value) -> Result<Document> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let Value::Object(patch) = data else {
            return Err(anyhow!("InMemoryStore: update data must be an object"));
        };
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| anyhow!("InMemoryStore: lock poisoned"))?;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| &d.id == id))
            .ok_or_else(|| anyhow!("InMemoryStore: no {collection} document with id {id}"))?;
        for (key, value) in patch {
            doc.fields.insert(key.clone(), value.clone());
        }
        Ok(doc.clone())
    }
}
