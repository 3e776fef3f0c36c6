//! Per-category structured extraction.
//!
//! Each URL is served from the response cache when possible, otherwise
//! scraped through the provider under the concurrency limiter. Failures are
//! recorded on the URL's record; the batch always yields one record per URL.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use firecrawl_client::{with_retry, RetryPolicy, ScrapeOptions, ScrapeResult};
use firmsite_common::{
    AttorneyExtract, IndustryExtract, Normalize, PracticeAreaExtract, ScrapeOutput, ScrapeRecord,
    SiteMap, Taxonomy,
};

use crate::cache::ResponseCache;
use crate::documents::{read_document, write_document};
use crate::scheduler::ConcurrencyLimiter;
use crate::traits::CrawlProvider;

pub const MISSING_KEY_ERROR: &str = "FIRECRAWL_API_KEY not configured";
pub const NO_CREDITS_ERROR: &str = "Skipped due to insufficient credits";

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// An extract type the scraper knows how to request and store.
pub trait ScrapeEntity:
    Normalize + Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// Collection-style name, e.g. `practice-areas`.
    const KIND: &'static str;

    /// The site-map bucket this entity is scraped from.
    fn site_map_urls(site_map: &SiteMap) -> &[String];

    /// JSON Schema handed to the extraction endpoint.
    fn extraction_schema() -> Value;

    fn extraction_prompt() -> &'static str;
}

#[derive(JsonSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct PracticeAreaSchema {
    name: String,
    #[serde(default)]
    description: Option<String>,
    overview_markdown: String,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    related_industries: Vec<String>,
    #[serde(default)]
    attorneys: Vec<String>,
}

#[derive(JsonSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct IndustrySchema {
    name: String,
    #[serde(default)]
    description: Option<String>,
    overview_markdown: String,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    related_practice_areas: Vec<String>,
    #[serde(default)]
    attorneys: Vec<String>,
}

#[derive(JsonSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct AttorneySchema {
    name: String,
    /// Position as shown on the page, e.g. "Partner".
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    practice_areas: Vec<String>,
    #[serde(default)]
    industries: Vec<String>,
}

const PRACTICE_AREA_PROMPT: &str = "\
Extract practice area information from this page. Focus on:
- Practice area name
- Description/overview (convert to markdown)
- Services offered
- Related industries
- Attorneys who practice in this area

Be thorough but accurate. If information is not present, omit the field rather than guessing.";

const INDUSTRY_PROMPT: &str = "\
Extract industry information from this page. Focus on:
- Industry name
- Description/overview (convert to markdown)
- Services offered
- Related practice areas
- Attorneys who serve this industry

Be thorough but accurate. If information is not present, omit the field rather than guessing.";

const ATTORNEY_PROMPT: &str = "\
Extract the attorney profile on this page. Focus on:
- Full name and position title
- Email address and phone number
- Biography (convert to markdown)
- Practice areas
- Industries served

Be thorough but accurate. If information is not present, omit the field rather than guessing.";

impl ScrapeEntity for PracticeAreaExtract {
    const KIND: &'static str = "practice-areas";

    fn site_map_urls(site_map: &SiteMap) -> &[String] {
        &site_map.urls.practice_areas
    }

    fn extraction_schema() -> Value {
        extraction_schema_for::<PracticeAreaSchema>()
    }

    fn extraction_prompt() -> &'static str {
        PRACTICE_AREA_PROMPT
    }
}

impl ScrapeEntity for IndustryExtract {
    const KIND: &'static str = "industries";

    fn site_map_urls(site_map: &SiteMap) -> &[String] {
        &site_map.urls.industries
    }

    fn extraction_schema() -> Value {
        extraction_schema_for::<IndustrySchema>()
    }

    fn extraction_prompt() -> &'static str {
        INDUSTRY_PROMPT
    }
}

impl ScrapeEntity for AttorneyExtract {
    const KIND: &'static str = "attorneys";

    fn site_map_urls(site_map: &SiteMap) -> &[String] {
        &site_map.urls.attorneys
    }

    fn extraction_schema() -> Value {
        extraction_schema_for::<AttorneySchema>()
    }

    fn extraction_prompt() -> &'static str {
        ATTORNEY_PROMPT
    }
}

/// Plain draft-07 object schema: no `$schema`, `definitions` or `title`,
/// and optional fields typed without a `null` alternative.
fn extraction_schema_for<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_default();
    strip_null_types(&mut value);

    if let Value::Object(map) = &mut value {
        map.remove("definitions");
        map.remove("$schema");
        map.remove("title");
    }
    value
}

fn strip_null_types(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(types)) = map.get_mut("type") {
                types.retain(|t| t != "null");
                if types.len() == 1 {
                    let single = types.remove(0);
                    map.insert("type".to_string(), single);
                }
            }
            for (_, v) in map.iter_mut() {
                strip_null_types(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_null_types),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Ignore cached records.
    pub force: bool,
    /// Re-fetch cached records that carry errors.
    pub retry_failed: bool,
    pub concurrency: usize,
    /// Jittered pause before each provider request.
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            force: false,
            retry_failed: false,
            concurrency: ConcurrencyLimiter::DEFAULT,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(750),
            retry: RetryPolicy::scrape(),
        }
    }
}

impl ScrapeSettings {
    fn request_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

pub struct CategoryScraper<P: CrawlProvider> {
    /// `None` when no API key is configured.
    provider: Option<Arc<P>>,
    cache: ResponseCache,
    taxonomy: Arc<Taxonomy>,
    settings: ScrapeSettings,
}

impl<P: CrawlProvider> CategoryScraper<P> {
    pub fn new(
        provider: Option<Arc<P>>,
        cache: ResponseCache,
        taxonomy: Arc<Taxonomy>,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            taxonomy,
            settings,
        }
    }

    /// One record per input URL, in completion order.
    pub async fn scrape_all<E: ScrapeEntity>(&self, urls: &[String]) -> Vec<ScrapeRecord<E>> {
        let Some(provider) = self.provider.as_deref() else {
            warn!(kind = E::KIND, urls = urls.len(), "{MISSING_KEY_ERROR}, skipping scrape");
            return urls
                .iter()
                .map(|url| ScrapeRecord::failed(url, MISSING_KEY_ERROR))
                .collect();
        };

        let limiter = ConcurrencyLimiter::new(self.settings.concurrency);
        let out_of_credits = AtomicBool::new(false);
        let schema = E::extraction_schema();
        info!(
            kind = E::KIND,
            urls = urls.len(),
            concurrency = limiter.max(),
            "Scraping category"
        );

        let mut pending: FuturesUnordered<_> = urls
            .iter()
            .map(|url| self.scrape_one::<E>(provider, url, &schema, &limiter, &out_of_credits))
            .collect();

        let mut records = Vec::with_capacity(urls.len());
        while let Some(record) = pending.next().await {
            records.push(record);
        }
        records
    }

    async fn scrape_one<E: ScrapeEntity>(
        &self,
        provider: &P,
        url: &str,
        schema: &Value,
        limiter: &ConcurrencyLimiter,
        out_of_credits: &AtomicBool,
    ) -> ScrapeRecord<E> {
        if !self.settings.force {
            if let Some(cached) = self.cache.read_scrape::<E>(url).await {
                if !(self.settings.retry_failed && cached.has_errors()) {
                    let mut record = cached.normalized(&self.taxonomy);
                    record.url = url.to_string();
                    record.cached = true;
                    return record;
                }
                debug!(url, "Re-fetching previously failed URL");
            }
        }

        let _permit = match limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => return ScrapeRecord::failed(url, e.to_string()),
        };
        if out_of_credits.load(Ordering::SeqCst) {
            return ScrapeRecord::failed(url, NO_CREDITS_ERROR);
        }

        let delay = self.settings.request_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let opts = ScrapeOptions::extract(url, schema.clone(), E::extraction_prompt());
        let opts = &opts;
        let name = format!("scrape {url}");
        match with_retry(&name, &self.settings.retry, move || provider.scrape(opts)).await {
            Ok(result) => {
                let raw = record_from_result::<E>(url, result);
                self.cache.write_scrape(url, &raw).await;
                if raw.has_errors() {
                    warn!(url, errors = ?raw.errors, "Scrape returned errors");
                } else {
                    debug!(url, "Scraped");
                }
                raw.normalized(&self.taxonomy)
            }
            Err(err) => {
                if err.is_insufficient_credits() && !out_of_credits.swap(true, Ordering::SeqCst) {
                    error!(url, "Provider credits exhausted, skipping remaining URLs");
                } else {
                    warn!(url, error = %err, "Scrape failed");
                }
                ScrapeRecord::failed(url, err.to_string())
            }
        }
    }
}

/// Raw (un-normalized) record for one provider response.
fn record_from_result<E: DeserializeOwned>(url: &str, result: ScrapeResult) -> ScrapeRecord<E> {
    let mut errors = Vec::new();
    if !result.success {
        errors.push(
            result
                .error
                .unwrap_or_else(|| "Unknown Firecrawl error".to_string()),
        );
    }

    let extracted = match result.extract {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<E>(value) {
            Ok(extract) => Some(extract),
            Err(e) => {
                errors.push(format!("Unparsable extract: {e}"));
                None
            }
        },
    };

    ScrapeRecord {
        url: url.to_string(),
        extracted,
        raw_markdown: result.markdown,
        metadata: result.metadata,
        errors,
        cached: false,
    }
}

// ---------------------------------------------------------------------------
// Category run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub total: usize,
    pub processed: usize,
    pub cached: usize,
    pub errors: usize,
}

impl ScrapeStats {
    pub fn from_records<E>(records: &[ScrapeRecord<E>]) -> Self {
        let cached = records.iter().filter(|r| r.cached).count();
        Self {
            total: records.len(),
            processed: records.len() - cached,
            cached,
            errors: records.iter().filter(|r| r.has_errors()).count(),
        }
    }
}

impl fmt::Display for ScrapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, processed: {}, cached: {}, errors: {}",
            self.total, self.processed, self.cached, self.errors
        )
    }
}

/// Scrape one category from the site map at `input` into the document at `out`.
pub async fn scrape_category<E, P>(
    scraper: &CategoryScraper<P>,
    input: &Path,
    out: &Path,
) -> Result<ScrapeStats>
where
    E: ScrapeEntity,
    P: CrawlProvider,
{
    let site_map: SiteMap = read_document(input)
        .await
        .context("Run discovery first to produce the site map")?;
    let urls = E::site_map_urls(&site_map);

    let records = scraper.scrape_all::<E>(urls).await;
    let stats = ScrapeStats::from_records(&records);

    let output = ScrapeOutput::new(&site_map.base_url, records);
    write_document(out, &output)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!(kind = E::KIND, out = %out.display(), %stats, "Scrape complete");
    Ok(stats)
}
