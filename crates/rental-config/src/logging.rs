//! Logging initialization.
//!
//! Thin wrapper over the `observability` crate so binaries only pass a level
//! and, optionally, a JSONL file.

use observability::{LogConfig, LogFormat};
use std::path::PathBuf;

const SERVICE_NAME: &str = "rental";

/// Initialize logging to stderr.
///
/// The stderr format is taken from `RENTAL_LOG_FORMAT` (`json` or `compact`).
pub fn init_logging(level: &str) {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: None,
        also_stderr: true,
        stderr_format: stderr_format_from_env(),
    });
}

/// Initialize logging to stderr and to a JSONL file.
pub fn init_logging_to_file(level: &str, log_path: PathBuf) {
    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: Some(log_path),
        also_stderr: true,
        stderr_format: stderr_format_from_env(),
    });
}

fn stderr_format_from_env() -> LogFormat {
    std::env::var("RENTAL_LOG_FORMAT")
        .map(|raw| LogFormat::parse(&raw))
        .unwrap_or_default()
}
