//! Site discovery: enumerate a firm site's URLs and bucket them by category.
//!
//! The run is a small state machine. The map phase is always tried first and
//! is cheap; the crawl phase only runs when asked for or when every content
//! bucket came back thin. A failed crawl degrades to the map result unless the
//! caller demanded the crawl. The site map document is checkpointed after
//! each phase so an observer always finds a complete snapshot on disk.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use url::Url;

use firecrawl_client::{
    poll_with_backoff, with_retry, CrawlDocument, CrawlOptions, CrawlScrapeOptions, CrawlStatus,
    FirecrawlError, JobState, JobStatus, MapLinks, MapOptions, PollOptions, RetryPolicy,
};
use firmsite_common::{CategoryCounts, SiteMap};

use crate::cache::ResponseCache;
use crate::categorize::categorize_all;
use crate::documents::write_document;
use crate::traits::CrawlProvider;
use crate::urls::normalize_discovered_url;

pub const MAP_LIMIT: u32 = 1000;

/// Path prefixes the crawl is scoped to.
pub const CRAWL_INCLUDE_PATHS: [&str; 6] = [
    "/our-team/attorneys/",
    "/practice-areas/",
    "/industries/",
    "/blog/",
    "/insights/",
    "/news/",
];

const BLOG_SAMPLE_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub base_url: String,
    pub out: PathBuf,
    pub use_crawl: bool,
    pub require_crawl: bool,
    pub depth: u32,
    pub limit: u32,
    pub force: bool,
    pub retry: RetryPolicy,
    pub poll: PollOptions,
}

impl DiscoveryOptions {
    pub fn new(base_url: &str, out: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            out: out.into(),
            use_crawl: false,
            require_crawl: false,
            depth: 2,
            limit: 200,
            force: false,
            retry: RetryPolicy::discovery(),
            poll: PollOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Map,
    ThresholdCheck,
    Crawl,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Map results were enough; no crawl was attempted.
    MapOnly,
    Crawled,
    /// The crawl failed and the run kept the map results.
    MapOnlyFallback { rate_limited: bool },
}

impl fmt::Display for DiscoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryOutcome::MapOnly => f.write_str("map only"),
            DiscoveryOutcome::Crawled => f.write_str("map + crawl"),
            DiscoveryOutcome::MapOnlyFallback { rate_limited: true } => {
                f.write_str("map only (crawl rate limited)")
            }
            DiscoveryOutcome::MapOnlyFallback { rate_limited: false } => {
                f.write_str("map only (crawl failed)")
            }
        }
    }
}

/// Per-category minimums below which the map result counts as thin.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub attorneys: usize,
    pub practice_areas: usize,
    pub industries: usize,
    pub blog_posts: usize,
}

pub const MIN_COUNTS: Thresholds = Thresholds {
    attorneys: 10,
    practice_areas: 10,
    industries: 5,
    blog_posts: 10,
};

/// Crawl when forced, or when every content bucket is under its minimum.
pub fn should_crawl(counts: &CategoryCounts, use_crawl: bool) -> bool {
    use_crawl
        || (counts.attorneys < MIN_COUNTS.attorneys
            && counts.practice_areas < MIN_COUNTS.practice_areas
            && counts.industries < MIN_COUNTS.industries
            && counts.blog_posts < MIN_COUNTS.blog_posts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlFailure {
    Fallback { rate_limited: bool },
    Fatal,
}

pub fn crawl_failure_transition(err: &FirecrawlError, require_crawl: bool) -> CrawlFailure {
    if require_crawl {
        CrawlFailure::Fatal
    } else {
        CrawlFailure::Fallback {
            rate_limited: err.is_rate_limited(),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub outcome: DiscoveryOutcome,
    pub site_map: SiteMap,
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.site_map.counts;
        writeln!(f, "Discovery for {} ({})", self.site_map.base_url, self.outcome)?;
        writeln!(f, "  total:         {}", c.total)?;
        writeln!(f, "  attorneys:     {}", c.attorneys)?;
        writeln!(f, "  practiceAreas: {}", c.practice_areas)?;
        writeln!(f, "  industries:    {}", c.industries)?;
        writeln!(f, "  blogPosts:     {}", c.blog_posts)?;
        write!(f, "  misc:          {}", c.misc)
    }
}

pub struct SiteDiscovery<'a, P: CrawlProvider> {
    provider: &'a P,
    cache: &'a ResponseCache,
    opts: DiscoveryOptions,
}

impl<'a, P: CrawlProvider> SiteDiscovery<'a, P> {
    pub fn new(provider: &'a P, cache: &'a ResponseCache, opts: DiscoveryOptions) -> Self {
        Self {
            provider,
            cache,
            opts,
        }
    }

    pub async fn run(&self) -> Result<DiscoveryReport> {
        let base = Url::parse(&self.opts.base_url)
            .with_context(|| format!("Invalid base URL {}", self.opts.base_url))?;

        let mut urls = BTreeSet::new();
        let mut outcome = DiscoveryOutcome::MapOnly;
        let mut site_map = SiteMap::new(&self.opts.base_url, Default::default());
        let mut phase = Phase::Map;

        loop {
            debug!(?phase, "Discovery phase");
            phase = match phase {
                Phase::Map => {
                    urls.extend(self.map_phase(&base).await);
                    site_map = self.checkpoint(&urls).await?;
                    info!(
                        total = site_map.counts.total,
                        attorneys = site_map.counts.attorneys,
                        practice_areas = site_map.counts.practice_areas,
                        industries = site_map.counts.industries,
                        blog_posts = site_map.counts.blog_posts,
                        "Map phase complete"
                    );
                    if site_map.counts.blog_posts == 0 {
                        let sample: Vec<&String> = urls.iter().take(BLOG_SAMPLE_SIZE).collect();
                        debug!(?sample, "No blog URLs matched");
                    }
                    Phase::ThresholdCheck
                }
                Phase::ThresholdCheck => {
                    if should_crawl(&site_map.counts, self.opts.use_crawl) {
                        Phase::Crawl
                    } else {
                        Phase::Done
                    }
                }
                Phase::Crawl => {
                    match self.crawl_phase(&base).await {
                        Ok(crawled) => {
                            let before = urls.len();
                            urls.extend(crawled);
                            info!(added = urls.len() - before, total = urls.len(), "Crawl phase complete");
                            site_map = self.checkpoint(&urls).await?;
                            outcome = DiscoveryOutcome::Crawled;
                        }
                        Err(err) => match crawl_failure_transition(&err, self.opts.require_crawl) {
                            CrawlFailure::Fallback { rate_limited } => {
                                warn!(error = %err, rate_limited, "Crawl failed, keeping map results");
                                outcome = DiscoveryOutcome::MapOnlyFallback { rate_limited };
                            }
                            CrawlFailure::Fatal => {
                                return Err(anyhow::Error::new(err)
                                    .context("Crawl failed and --requireCrawl was set"));
                            }
                        },
                    }
                    Phase::Done
                }
                Phase::Done => {
                    site_map = self.checkpoint(&urls).await?;
                    break;
                }
            };
        }

        Ok(DiscoveryReport { outcome, site_map })
    }

    /// Normalized map links. A failed map call is logged and yields nothing.
    async fn map_phase(&self, base: &Url) -> Vec<String> {
        let links = match self.map_links().await {
            Ok(links) => links,
            Err(err) => {
                warn!(error = %err, "Map failed, continuing with no URLs");
                return Vec::new();
            }
        };

        let normalized = normalize_all(links.links.iter().map(String::as_str), base);
        if !links.is_empty() && normalized.is_empty() {
            warn!(
                raw = links.len(),
                base = %base,
                "No map link survived normalization"
            );
        }
        normalized
    }

    async fn map_links(&self) -> firecrawl_client::Result<MapLinks> {
        if !self.opts.force {
            if let Some(cached) = self.cache.read_map().await {
                info!(count = cached.len(), "Using cached map response");
                return Ok(cached);
            }
        }

        let provider = self.provider;
        let opts = MapOptions::site(&self.opts.base_url, MAP_LIMIT);
        let opts = &opts;
        let links = with_retry("map", &self.opts.retry, move || provider.map(opts)).await?;
        self.cache.write_map(&links).await;
        Ok(links)
    }

    async fn crawl_phase(&self, base: &Url) -> firecrawl_client::Result<Vec<String>> {
        let status = self.crawl_results().await?;
        let urls = normalize_all(status.data.iter().filter_map(CrawlDocument::source_url), base);
        info!(documents = status.data.len(), urls = urls.len(), "Crawl returned documents");
        Ok(urls)
    }

    async fn crawl_results(&self) -> firecrawl_client::Result<CrawlStatus> {
        if !self.opts.force {
            if let Some(cached) = self.cache.read_crawl().await {
                if cached.state() == JobState::Completed {
                    info!(documents = cached.data.len(), "Using cached crawl response");
                    return Ok(cached);
                }
            }
        }

        let provider = self.provider;
        let opts = CrawlOptions {
            url: self.opts.base_url.clone(),
            limit: self.opts.limit,
            max_discovery_depth: self.opts.depth,
            allow_external_links: false,
            include_paths: CRAWL_INCLUDE_PATHS.iter().map(|p| p.to_string()).collect(),
            scrape_options: CrawlScrapeOptions {
                formats: vec!["markdown".to_string()],
                only_main_content: true,
            },
        };
        let opts = &opts;
        let started = with_retry("crawl", &self.opts.retry, move || provider.start_crawl(opts)).await?;

        let job_id = started.id.as_str();
        let status = poll_with_backoff(move || provider.crawl_status(job_id), &self.opts.poll).await?;
        self.cache.write_crawl(&status).await;
        Ok(status)
    }

    async fn checkpoint(&self, urls: &BTreeSet<String>) -> Result<SiteMap> {
        let site_map = SiteMap::new(&self.opts.base_url, categorize_all(urls));
        write_document(&self.opts.out, &site_map)
            .await
            .with_context(|| format!("Failed to write site map {}", self.opts.out.display()))?;
        Ok(site_map)
    }
}

fn normalize_all<'s>(raw: impl Iterator<Item = &'s str>, base: &Url) -> Vec<String> {
    let unique: BTreeSet<String> = raw
        .filter_map(|link| normalize_discovered_url(link, base))
        .collect();
    unique.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(attorneys: usize, practice_areas: usize, industries: usize, blog_posts: usize) -> CategoryCounts {
        CategoryCounts {
            total: attorneys + practice_areas + industries + blog_posts,
            attorneys,
            practice_areas,
            industries,
            blog_posts,
            misc: 0,
        }
    }

    #[test]
    fn thin_map_result_triggers_crawl() {
        assert!(should_crawl(&counts(3, 2, 1, 0), false));
        assert!(should_crawl(&counts(9, 9, 4, 9), false));
    }

    #[test]
    fn any_bucket_at_minimum_skips_crawl() {
        assert!(!should_crawl(&counts(10, 0, 0, 0), false));
        assert!(!should_crawl(&counts(0, 0, 5, 0), false));
        assert!(!should_crawl(&counts(0, 0, 0, 10), false));
    }

    #[test]
    fn forced_crawl_ignores_counts() {
        assert!(should_crawl(&counts(50, 50, 50, 50), true));
    }

    #[test]
    fn crawl_failure_falls_back_unless_required() {
        let limited = FirecrawlError::Api {
            status: 429,
            message: "Rate limit exceeded".into(),
            retry_after: None,
        };
        let broken = FirecrawlError::JobFailed("failed".into());

        assert_eq!(
            crawl_failure_transition(&limited, false),
            CrawlFailure::Fallback { rate_limited: true }
        );
        assert_eq!(
            crawl_failure_transition(&broken, false),
            CrawlFailure::Fallback { rate_limited: false }
        );
        assert_eq!(crawl_failure_transition(&limited, true), CrawlFailure::Fatal);
        assert_eq!(crawl_failure_transition(&broken, true), CrawlFailure::Fatal);
    }

    #[test]
    fn normalize_all_dedupes_and_drops_foreign_links() {
        let base = Url::parse("https://rbelaw.com").unwrap();
        let links = [
            "/team/a/",
            "https://rbelaw.com/team/a/#bio",
            "https://rbelaw.com/team/a/?utm_source=x",
            "https://twitter.com/rbe",
            "",
        ];
        assert_eq!(
            normalize_all(links.into_iter(), &base),
            vec!["https://rbelaw.com/team/a/"]
        );
    }
}
