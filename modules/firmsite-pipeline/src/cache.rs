use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use firecrawl_client::{CrawlStatus, MapLinks};
use firmsite_common::ScrapeRecord;

use crate::documents::write_document;

const MAP_FILE: &str = "firecrawl-map.json";
const CRAWL_FILE: &str = "firecrawl-crawl.json";
const SCRAPE_DIR: &str = "scrape";

/// File-backed cache of provider responses.
///
/// Reads never fail: a missing, unreadable or unparsable entry is a miss.
/// Writes are best-effort and only logged on failure. There is no expiry;
/// callers bypass reads with `--force`.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First 16 hex chars of the URL's SHA-256.
    pub fn cache_key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    pub fn scrape_path(&self, url: &str) -> PathBuf {
        self.dir
            .join(SCRAPE_DIR)
            .join(format!("{}.json", Self::cache_key(url)))
    }

    pub async fn read_map(&self) -> Option<MapLinks> {
        // Decoded through MapLinks so caches written by older tooling still load.
        let value: Value = self.read_json(&self.dir.join(MAP_FILE)).await?;
        Some(MapLinks::from_value(&value))
    }

    pub async fn write_map(&self, links: &MapLinks) {
        self.write_json(&self.dir.join(MAP_FILE), links).await;
    }

    pub async fn read_crawl(&self) -> Option<CrawlStatus> {
        self.read_json(&self.dir.join(CRAWL_FILE)).await
    }

    pub async fn write_crawl(&self, status: &CrawlStatus) {
        self.write_json(&self.dir.join(CRAWL_FILE), status).await;
    }

    pub async fn read_scrape<E: DeserializeOwned>(&self, url: &str) -> Option<ScrapeRecord<E>> {
        self.read_json(&self.scrape_path(url)).await
    }

    pub async fn write_scrape<E: Serialize>(&self, url: &str, record: &ScrapeRecord<E>) {
        self.write_json(&self.scrape_path(url), record).await;
    }

    /// Remove the map, crawl and every per-URL entry. Returns how many files went.
    pub async fn clear(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for file in [MAP_FILE, CRAWL_FILE] {
            match tokio::fs::remove_file(self.dir.join(file)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        let scrape_dir = self.dir.join(SCRAPE_DIR);
        let mut entries = match tokio::fs::read_dir(&scrape_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cache entry");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(path = %path.display(), "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unparsable cache entry");
                None
            }
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) {
        if let Err(e) = write_document(path, value).await {
            warn!(path = %path.display(), error = %e, "Failed to write cache entry");
        }
    }
}
