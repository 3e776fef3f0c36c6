use std::path::PathBuf;

use crate::error::{FirmsiteError, Result};

/// Pipeline configuration loaded from environment variables.
/// Every provider key is optional; commands decide what they can't run without.
#[derive(Debug, Clone)]
pub struct Config {
    // Crawl provider
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,

    // Content store
    pub payload_url: Option<String>,
    pub payload_api_key: Option<String>,
    pub payload_auth_collection: String,

    // Local state
    pub cache_dir: PathBuf,
    pub practice_area_aliases: PathBuf,
    pub industry_aliases: PathBuf,

    // Site defaults
    pub site_base_url: String,
    pub attorney_email_domain: String,
}

/// Connection details for the content store.
#[derive(Debug, Clone)]
pub struct PayloadSettings {
    pub url: String,
    pub api_key: String,
    pub auth_collection: String,
}

impl Config {
    /// Load `.env.local` then `.env` (neither overrides what is already set),
    /// then read the process environment.
    pub fn from_env() -> Self {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Self {
            firecrawl_api_key: get("FIRECRAWL_API_KEY"),
            firecrawl_base_url: or("FIRECRAWL_BASE_URL", "https://api.firecrawl.dev"),
            payload_url: get("PAYLOAD_URL"),
            payload_api_key: get("PAYLOAD_API_KEY"),
            payload_auth_collection: or("PAYLOAD_AUTH_COLLECTION", "users"),
            cache_dir: or("FIRMSITE_CACHE_DIR", "data/cache").into(),
            practice_area_aliases: or(
                "PRACTICE_AREA_ALIASES",
                "data/normalize/practice-area-aliases.json",
            )
            .into(),
            industry_aliases: or("INDUSTRY_ALIASES", "data/normalize/industry-aliases.json").into(),
            site_base_url: or("FIRMSITE_BASE_URL", "https://rbelaw.com"),
            attorney_email_domain: or("FIRMSITE_EMAIL_DOMAIN", "rbelaw.com"),
        }
    }

    pub fn require_payload(&self) -> Result<PayloadSettings> {
        let url = self
            .payload_url
            .clone()
            .ok_or_else(|| FirmsiteError::Config("PAYLOAD_URL is required for seeding".into()))?;
        let api_key = self.payload_api_key.clone().ok_or_else(|| {
            FirmsiteError::Config("PAYLOAD_API_KEY is required for seeding".into())
        })?;
        Ok(PayloadSettings {
            url,
            api_key,
            auth_collection: self.payload_auth_collection.clone(),
        })
    }

    /// Log which settings are present without printing secrets.
    pub fn log_redacted(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let n = v.chars().take(4).map(char::len_utf8).sum::<usize>();
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  FIRECRAWL_API_KEY: {}", preview(&self.firecrawl_api_key));
        tracing::info!("  FIRECRAWL_BASE_URL: {}", self.firecrawl_base_url);
        tracing::info!(
            "  PAYLOAD_URL: {}",
            self.payload_url.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  PAYLOAD_API_KEY: {}", preview(&self.payload_api_key));
        tracing::info!("  FIRMSITE_CACHE_DIR: {}", self.cache_dir.display());
    }
}
