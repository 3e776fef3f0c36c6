use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirecrawlError>;

#[derive(Debug, Error)]
pub enum FirecrawlError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Parsed `Retry-After` header, when the provider sent one.
        retry_after: Option<Duration>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Job failed with status: {0}")]
    JobFailed(String),

    #[error(
        "Polling timed out after {}s (last status: {})",
        .waited.as_secs(),
        .last_status.as_deref().unwrap_or("none")
    )]
    Timeout {
        waited: Duration,
        last_status: Option<String>,
    },
}

static RETRY_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry after (\d+)\s*(?:s|sec|second|seconds)?").expect("valid regex")
});

static RESETS_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)resets at (\S+)").expect("valid regex"));

impl FirecrawlError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FirecrawlError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 429, or a message that reads like one. Timeouts and failed jobs are never
    /// rate-limit class even if their last status text happens to mention it.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            FirecrawlError::Api { status: 429, .. } => true,
            FirecrawlError::Api { message, .. } | FirecrawlError::Network(message) => {
                let lower = message.to_lowercase();
                lower.contains("rate limit") || lower.contains("429")
            }
            _ => false,
        }
    }

    /// 402 Payment Required: the account is out of credits. Retrying won't help.
    pub fn is_insufficient_credits(&self) -> bool {
        match self {
            FirecrawlError::Api { status: 402, .. } => true,
            FirecrawlError::Api { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("insufficient credit") || lower.contains("payment required")
            }
            _ => false,
        }
    }

    /// How long the provider asked us to wait, from the header or the message body.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FirecrawlError::Api {
                retry_after: Some(wait),
                ..
            } => Some(*wait),
            FirecrawlError::Api { message, .. } | FirecrawlError::Network(message) => {
                parse_retry_hint(message, Utc::now())
            }
            _ => None,
        }
    }
}

/// Pull a wait hint out of a provider error message.
///
/// Handles "retry after 5s", "Retry after 5 seconds" and
/// "resets at 2024-01-01T12:00:00Z". A reset time in the past yields `None`.
pub fn parse_retry_hint(message: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(caps) = RETRY_AFTER_RE.captures(message) {
        if let Ok(secs) = caps[1].parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }
    }

    let caps = RESETS_AT_RE.captures(message)?;
    let raw = caps[1].trim_end_matches(['.', ',', ')']);
    let reset = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    (reset - now).to_std().ok().filter(|d| !d.is_zero())
}

impl From<reqwest::Error> for FirecrawlError {
    fn from(err: reqwest::Error) -> Self {
        FirecrawlError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FirecrawlError {
    fn from(err: serde_json::Error) -> Self {
        FirecrawlError::Parse(err.to_string())
    }
}
