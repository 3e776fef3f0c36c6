use std::time::Duration;

use firecrawl_client::{PollOptions, RetryPolicy};
use firmsite_common::SiteMap;
use firmsite_pipeline::cache::ResponseCache;
use firmsite_pipeline::discovery::{DiscoveryOptions, DiscoveryOutcome, SiteDiscovery};
use firmsite_pipeline::testing::{api_error, MockProvider};

const BASE: &str = "https://rbelaw.com";

fn thin_map() -> Vec<&'static str> {
    vec![
        "/our-team/attorneys/jane-roe/",
        "/our-team/attorneys/john-doe/",
        "https://rbelaw.com/our-team/attorneys/sam-poe/",
        "/practice-areas/tax/",
        "practice-areas/litigation/",
        "/industries/health-care/",
        "https://rbelaw.com/contact/#form",
        "https://www.linkedin.com/company/rbe",
    ]
}

fn crawled() -> Vec<&'static str> {
    vec![
        "https://rbelaw.com/blog/new-tax-rules/",
        "https://rbelaw.com/insights/estate-planning/",
        "https://rbelaw.com/practice-areas/tax/",
        "https://rbelaw.com/industries/banking/?utm_source=crawl",
    ]
}

fn options(dir: &std::path::Path) -> DiscoveryOptions {
    let mut opts = DiscoveryOptions::new(BASE, dir.join("site-map.json"));
    opts.retry = RetryPolicy::none();
    opts.poll = PollOptions {
        max_wait: Duration::from_secs(60),
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(40),
    };
    opts
}

fn read_site_map(path: &std::path::Path) -> SiteMap {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn thin_map_result_transitions_into_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("cache"));
    let provider = MockProvider::new()
        .on_map(&thin_map())
        .on_crawl(&crawled(), 2);

    let opts = options(dir.path());
    let out = opts.out.clone();
    let report = SiteDiscovery::new(&provider, &cache, opts).run().await.unwrap();

    assert_eq!(provider.map_calls(), 1);
    assert_eq!(provider.crawl_starts(), 1);
    assert_eq!(provider.status_polls(), 3);
    assert_eq!(report.outcome, DiscoveryOutcome::Crawled);

    let counts = report.site_map.counts;
    assert_eq!(counts.attorneys, 3);
    assert_eq!(counts.practice_areas, 2);
    assert_eq!(counts.industries, 2);
    assert_eq!(counts.blog_posts, 2);
    assert_eq!(counts.misc, 1);
    assert_eq!(counts.total, 10);

    let on_disk = read_site_map(&out);
    assert_eq!(on_disk, report.site_map);
    assert!(on_disk
        .urls
        .industries
        .contains(&"https://rbelaw.com/industries/banking/".to_string()));
}

#[tokio::test]
async fn rich_map_result_skips_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("cache"));
    let links: Vec<String> = (0..12)
        .map(|i| format!("/our-team/attorneys/person-{i}/"))
        .collect();
    let links: Vec<&str> = links.iter().map(String::as_str).collect();
    let provider = MockProvider::new().on_map(&links);

    let report = SiteDiscovery::new(&provider, &cache, options(dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, DiscoveryOutcome::MapOnly);
    assert_eq!(provider.crawl_starts(), 0);
    assert_eq!(report.site_map.counts.attorneys, 12);
}

#[tokio::test]
async fn rate_limited_crawl_falls_back_to_map_results() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("cache"));
    let provider = MockProvider::new()
        .on_map(&thin_map())
        .fail_crawl(api_error(429, "Rate limit exceeded"));

    let opts = options(dir.path());
    let out = opts.out.clone();
    let report = SiteDiscovery::new(&provider, &cache, opts).run().await.unwrap();

    assert_eq!(
        report.outcome,
        DiscoveryOutcome::MapOnlyFallback { rate_limited: true }
    );
    assert_eq!(report.site_map.counts.total, 7);
    assert_eq!(read_site_map(&out).counts.total, 7);
}

#[tokio::test]
async fn required_crawl_failure_is_fatal_but_map_checkpoint_remains() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("cache"));
    let provider = MockProvider::new()
        .on_map(&thin_map())
        .fail_crawl(api_error(500, "crawler unavailable"));

    let mut opts = options(dir.path());
    opts.require_crawl = true;
    let out = opts.out.clone();
    let err = SiteDiscovery::new(&provider, &cache, opts)
        .run()
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("crawler unavailable"));
    assert_eq!(read_site_map(&out).counts.attorneys, 3);
}

#[tokio::test]
async fn map_failure_is_not_fatal_and_forces_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("cache"));
    let provider = MockProvider::new()
        .fail_map(api_error(500, "map broke"))
        .on_crawl(&crawled(), 0);

    let report = SiteDiscovery::new(&provider, &cache, options(dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, DiscoveryOutcome::Crawled);
    assert_eq!(report.site_map.counts.blog_posts, 2);
}

#[tokio::test]
async fn second_run_uses_cached_responses_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path().join("cache"));
    let provider = MockProvider::new()
        .on_map(&thin_map())
        .on_crawl(&crawled(), 0);

    let first = SiteDiscovery::new(&provider, &cache, options(dir.path()))
        .run()
        .await
        .unwrap();
    let second = SiteDiscovery::new(&provider, &cache, options(dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(provider.map_calls(), 1);
    assert_eq!(provider.crawl_starts(), 1);
    assert_eq!(first.site_map.urls, second.site_map.urls);

    let mut forced = options(dir.path());
    forced.force = true;
    SiteDiscovery::new(&provider, &cache, forced).run().await.unwrap();
    assert_eq!(provider.map_calls(), 2);
    assert_eq!(provider.crawl_starts(), 2);
}
