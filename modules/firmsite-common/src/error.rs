use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirmsiteError>;

#[derive(Error, Debug)]
pub enum FirmsiteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FirmsiteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FirmsiteError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        FirmsiteError::Json {
            path: path.into(),
            source,
        }
    }
}
