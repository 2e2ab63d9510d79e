//! Configuration, paths and logging setup shared by the rental crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_BASE_URL, DEFAULT_EXPIRY_SKEW_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_to_file};
pub use paths::Paths;
