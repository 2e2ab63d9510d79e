//! Errors raised while loading configuration or preparing the base directory.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A value loaded successfully but cannot be used
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid API base URL: {0}")]
    InvalidApiUrl(#[from] url::ParseError),

    /// The config file exists but is not valid JSON for [`crate::Config`]
    #[error("Malformed config file: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("Could not determine home directory")]
    HomeDirUnavailable,
}

pub type CoreResult<T> = Result<T, CoreError>;
