//! # Observability
//!
//! Centralized tracing setup for the rental workspace.
//!
//! Crates are **log producers** only. They use the standard `tracing` macros
//! and never decide where output goes; the binary calls
//! [`init_with_config`] once at startup and that choice applies everywhere.
//!
//! Two sinks are available and can be combined:
//!
//! - a compact human-readable layer on stderr
//! - a JSONL layer appended to a log file (one event per line)
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "rental-cli".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the stderr sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to [`LogFormat::Compact`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written in the startup event.
    pub service_name: String,

    /// Default level filter (e.g. "debug", "info", "warn").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Optional JSONL log file. Parent directories are created on demand.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr.
    pub also_stderr: bool,

    /// Format used for the stderr sink.
    pub stderr_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
            stderr_format: LogFormat::Compact,
        }
    }
}

/// Initialize tracing with custom configuration.
///
/// Calling this more than once is harmless: only the first subscriber is
/// installed. A log file that cannot be opened disables the file sink and is
/// reported on the remaining sinks.
pub fn init_with_config(config: LogConfig) {
    let filter = build_filter(&config.default_level);

    let mut file_error = None;
    let file_layer = match config.log_path.as_deref().map(open_log_file) {
        Some(Ok(file)) => Some(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(Mutex::new(file)),
        ),
        Some(Err(e)) => {
            file_error = Some(e);
            None
        }
        None => None,
    };

    let (compact_layer, json_layer) = if config.also_stderr {
        match config.stderr_format {
            LogFormat::Compact => (
                Some(
                    fmt::layer()
                        .compact()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                ),
                None,
            ),
            LogFormat::Json => (
                None,
                Some(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                ),
            ),
        }
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(compact_layer)
        .with(json_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "Log file unavailable, file sink disabled");
    }
    tracing::debug!(service = %config.service_name, "Logging initialized");
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
