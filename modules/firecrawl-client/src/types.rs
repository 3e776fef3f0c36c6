use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::poll::{JobState, JobStatus};

// --- Map ---

/// Input for the `/map` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// "include", "skip" or "only".
    pub sitemap: String,
    pub include_subdomains: bool,
    pub limit: u32,
    pub ignore_query_parameters: bool,
}

impl MapOptions {
    /// Whole-site enumeration: sitemap included, no subdomains, query params ignored.
    pub fn site(url: &str, limit: u32) -> Self {
        Self {
            url: url.to_string(),
            search: None,
            sitemap: "include".to_string(),
            include_subdomains: false,
            limit,
            ignore_query_parameters: true,
        }
    }
}

/// Links returned by `/map`, reduced to their raw target strings.
///
/// The endpoint has shipped several shapes over time: a bare array, `{links}`,
/// `{data}`, `{urls}`, with entries that are strings or `{url|href|link}`
/// objects. Everything is folded into this one structure at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLinks {
    pub links: Vec<String>,
    /// Entries that had no usable URL string.
    #[serde(default)]
    pub unusable: usize,
}

impl MapLinks {
    pub fn from_value(value: &Value) -> Self {
        let mut out = MapLinks::default();
        for entry in link_array(value) {
            match link_target(entry) {
                Some(target) => out.links.push(target),
                None => out.unusable += 1,
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

fn link_array(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => ["links", "data", "urls"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .or_else(|| {
                map.values()
                    .filter_map(Value::as_array)
                    .find(|items| !items.is_empty())
            })
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn link_target(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["url", "href", "link"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

// --- Crawl ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlScrapeOptions {
    pub formats: Vec<String>,
    pub only_main_content: bool,
}

/// Input for starting an async `/crawl` job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOptions {
    pub url: String,
    pub limit: u32,
    pub max_discovery_depth: u32,
    pub allow_external_links: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<String>,
    pub scrape_options: CrawlScrapeOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlStarted {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Status of a crawl job. A completed status carries the crawled documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStatus {
    pub status: String,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<u32>,
    /// Next page of documents when the result set is paginated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, alias = "results")]
    pub data: Vec<CrawlDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus for CrawlStatus {
    fn state(&self) -> JobState {
        match self.status.as_str() {
            "completed" => JobState::Completed,
            "failed" | "cancelled" => {
                JobState::Failed(self.error.clone().unwrap_or_else(|| self.status.clone()))
            }
            _ => JobState::Pending,
        }
    }

    fn label(&self) -> String {
        format!("{} ({}/{})", self.status, self.completed, self.total)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, rename = "sourceURL", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// One crawled page. Only the addressing fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "sourceURL", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl CrawlDocument {
    /// `metadata.sourceURL`, then `url`, then `sourceURL`.
    pub fn source_url(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.source_url.as_deref())
            .or(self.url.as_deref())
            .or(self.source_url.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

// --- Scrape with extraction ---

#[derive(Debug, Clone, Serialize)]
pub struct ExtractOptions {
    pub schema: Value,
    pub prompt: String,
}

/// Input for the synchronous `/scrape` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    pub url: String,
    pub formats: Vec<String>,
    pub only_main_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractOptions>,
}

impl ScrapeOptions {
    /// Markdown plus structured extraction against `schema`.
    pub fn extract(url: &str, schema: Value, prompt: &str) -> Self {
        Self {
            url: url.to_string(),
            formats: vec!["markdown".to_string(), "extract".to_string()],
            only_main_content: true,
            extract: Some(ExtractOptions {
                schema,
                prompt: prompt.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScrapeResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<ScrapeData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ScrapeData {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub extract: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_true() -> bool {
    true
}

/// Result of a scrape-with-extraction call.
#[derive(Debug, Clone, Default)]
pub struct ScrapeResult {
    pub success: bool,
    pub markdown: Option<String>,
    pub extract: Option<Value>,
    pub metadata: Option<Value>,
    pub error: Option<String>,
}

impl From<ScrapeResponse> for ScrapeResult {
    fn from(resp: ScrapeResponse) -> Self {
        let data = resp.data.unwrap_or_default();
        Self {
            success: resp.success,
            markdown: data.markdown,
            extract: data.extract,
            metadata: data.metadata,
            error: resp.error,
        }
    }
}
