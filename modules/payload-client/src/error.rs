use thiserror::Error;

pub type Result<T> = std::result::Result<T, PayloadError>;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PayloadError {
    fn from(err: reqwest::Error) -> Self {
        PayloadError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Parse(err.to_string())
    }
}
