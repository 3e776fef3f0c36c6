use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use firecrawl_client::FirecrawlClient;
use firmsite_common::{AttorneyExtract, Config, IndustryExtract, PracticeAreaExtract, Taxonomy};
use firmsite_pipeline::cache::ResponseCache;
use firmsite_pipeline::discovery::{DiscoveryOptions, SiteDiscovery};
use firmsite_pipeline::scrape::{scrape_category, CategoryScraper, ScrapeSettings, ScrapeStats};
use firmsite_pipeline::seed::{seed_file, SeedOptions, SeedStats, SeedWriter};
use payload_client::PayloadClient;

const SITE_MAP_PATH: &str = "data/site-map.json";
const DEFAULT_LOG_FILTER: &str = "firmsite=info,firecrawl_client=info,payload_client=info";

#[derive(Parser)]
#[command(name = "firmsite", about = "Discover, scrape and seed the firm website content")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate site URLs and write the categorized site map.
    Discover(DiscoverArgs),
    /// Extract structured content for one category of the site map.
    Scrape(ScrapeArgs),
    /// Upsert a scrape output document into the CMS.
    Seed(SeedArgs),
    /// Manage the provider response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete every cached provider response.
    Clear,
}

#[derive(Args)]
struct DiscoverArgs {
    /// Site to discover. Defaults to FIRMSITE_BASE_URL.
    #[arg(long = "baseUrl")]
    base_url: Option<String>,
    #[arg(long, default_value = SITE_MAP_PATH)]
    out: PathBuf,
    /// Always run the crawl phase.
    #[arg(long = "useCrawl")]
    use_crawl: bool,
    /// Fail instead of falling back to map results when the crawl fails.
    #[arg(long = "requireCrawl")]
    require_crawl: bool,
    #[arg(long, default_value_t = 2)]
    depth: u32,
    #[arg(long, default_value_t = 200)]
    limit: u32,
    /// Ignore cached provider responses.
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ScrapeArgs {
    kind: Kind,
    #[arg(long = "in", default_value = SITE_MAP_PATH)]
    input: PathBuf,
    /// Defaults to data/<kind>.json.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value_t = 2)]
    concurrency: usize,
    #[arg(long)]
    force: bool,
    /// Re-fetch URLs whose cached record has errors.
    #[arg(long)]
    retry_failed: bool,
}

#[derive(Args)]
struct SeedArgs {
    kind: Kind,
    /// Defaults to data/<kind>.json.
    #[arg(long = "in")]
    input: Option<PathBuf>,
    /// Log what would be written without writing it.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    PracticeAreas,
    Industries,
    Attorneys,
}

impl Kind {
    fn default_path(self) -> PathBuf {
        PathBuf::from(format!("data/{self}.json"))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::PracticeAreas => "practice-areas",
            Kind::Industries => "industries",
            Kind::Attorneys => "attorneys",
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let cache = ResponseCache::new(&config.cache_dir);

    match cli.command {
        Command::Discover(args) => discover(&config, &cache, args).await,
        Command::Scrape(args) => {
            let taxonomy = Arc::new(Taxonomy::load(&config));
            scrape(&config, cache, taxonomy, args).await
        }
        Command::Seed(args) => {
            let taxonomy = Taxonomy::load(&config);
            seed(&config, &taxonomy, args).await
        }
        Command::Cache {
            action: CacheAction::Clear,
        } => {
            let removed = cache
                .clear()
                .await
                .with_context(|| format!("Failed to clear {}", cache.dir().display()))?;
            println!("Removed {removed} cached responses from {}", cache.dir().display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref());

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// `RUST_LOG` when set and parsable, else info for our own crates.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn firecrawl(config: &Config) -> Option<FirecrawlClient> {
    config
        .firecrawl_api_key
        .clone()
        .map(|key| FirecrawlClient::new(key).with_base_url(&config.firecrawl_base_url))
}

async fn discover(config: &Config, cache: &ResponseCache, args: DiscoverArgs) -> Result<ExitCode> {
    let Some(client) = firecrawl(config) else {
        warn!("FIRECRAWL_API_KEY not configured, skipping discovery");
        println!("Skipped discovery: FIRECRAWL_API_KEY not configured");
        return Ok(ExitCode::SUCCESS);
    };

    let base_url = args.base_url.as_deref().unwrap_or(&config.site_base_url);
    let mut opts = DiscoveryOptions::new(base_url, args.out);
    opts.use_crawl = args.use_crawl;
    opts.require_crawl = args.require_crawl;
    opts.depth = args.depth;
    opts.limit = args.limit;
    opts.force = args.force;

    info!(base_url, out = %opts.out.display(), "Starting discovery");
    let report = SiteDiscovery::new(&client, cache, opts).run().await?;
    println!("{report}");
    Ok(ExitCode::SUCCESS)
}

async fn scrape(
    config: &Config,
    cache: ResponseCache,
    taxonomy: Arc<Taxonomy>,
    args: ScrapeArgs,
) -> Result<ExitCode> {
    let provider = firecrawl(config).map(Arc::new);
    if provider.is_none() {
        println!("FIRECRAWL_API_KEY not configured: every URL will be recorded as skipped");
    }

    let settings = ScrapeSettings {
        force: args.force,
        retry_failed: args.retry_failed,
        concurrency: args.concurrency,
        ..Default::default()
    };
    let scraper = CategoryScraper::new(provider, cache, taxonomy, settings);
    let out = args.out.unwrap_or_else(|| args.kind.default_path());

    let stats: ScrapeStats = match args.kind {
        Kind::PracticeAreas => {
            scrape_category::<PracticeAreaExtract, _>(&scraper, &args.input, &out).await?
        }
        Kind::Industries => {
            scrape_category::<IndustryExtract, _>(&scraper, &args.input, &out).await?
        }
        Kind::Attorneys => {
            scrape_category::<AttorneyExtract, _>(&scraper, &args.input, &out).await?
        }
    };
    println!("Scraped {} into {}: {stats}", args.kind, out.display());
    Ok(ExitCode::SUCCESS)
}

async fn seed(config: &Config, taxonomy: &Taxonomy, args: SeedArgs) -> Result<ExitCode> {
    let payload = config.require_payload()?;
    let client = PayloadClient::new(&payload.url, &payload.api_key, &payload.auth_collection);
    let opts = SeedOptions {
        dry_run: args.dry_run,
        email_domain: config.attorney_email_domain.clone(),
    };
    let writer = SeedWriter::new(&client, taxonomy, opts);
    let input = args.input.unwrap_or_else(|| args.kind.default_path());

    let stats: SeedStats = match args.kind {
        Kind::PracticeAreas => seed_file::<PracticeAreaExtract, _>(&writer, &input).await?,
        Kind::Industries => seed_file::<IndustryExtract, _>(&writer, &input).await?,
        Kind::Attorneys => seed_file::<AttorneyExtract, _>(&writer, &input).await?,
    };
    println!("Seeded {}: {stats}", args.kind);

    Ok(if stats.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_replaces_default_filter() {
        let filter = log_filter(Some("firmsite=debug")).to_string().to_lowercase();
        assert_eq!(filter, "firmsite=debug");
    }

    #[test]
    fn default_filter_when_rust_log_unset_or_invalid() {
        for rust_log in [None, Some("firmsite=loud")] {
            let filter = log_filter(rust_log).to_string().to_lowercase();
            assert!(filter.contains("firmsite=info"), "{filter}");
        }
    }
}
