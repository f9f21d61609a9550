//! # Observability
//!
//! Logging setup shared by every Expediente binary.
//!
//! Library crates only emit events through the standard `tracing` macros.
//! Binaries call [`init_with_config`] once at startup, which installs:
//!
//! - a JSONL file layer (`~/.expediente/logs/client.jsonl` by default)
//! - an optional compact stderr layer for interactive use
//! - an `EnvFilter` driven by `RUST_LOG`, falling back to the configured level
//!
//! Every structured field passes through [`redact`] before it is written, so
//! access tokens, refresh tokens and passwords never reach disk even when a
//! caller logs them by accident.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "expediente-cli".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;
pub mod redact;
mod writer;

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{CentralLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the emitting binary, written into every log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info,themis=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Custom JSONL file path. Defaults to `~/.expediente/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Write JSONL to `log_path`. Disable for ephemeral runs.
    pub file_output: bool,

    /// Also emit compact, human-readable lines to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            file_output: true,
            also_stderr: false,
        }
    }
}

/// Default JSONL location, or `None` when no home directory is available.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".expediente").join("logs").join("client.jsonl"))
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Installing a global subscriber twice is a no-op. A log file that cannot be
/// opened degrades to stderr-only output instead of aborting the process.
pub fn init_with_config(config: LogConfig) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let mut file_error = None;
    let log_path = config.log_path.clone().or_else(default_log_path);

    let json_layer = match (config.file_output, log_path.as_ref()) {
        (true, Some(path)) => match CentralLogWriter::new(path) {
            Ok(writer) => Some(
                JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                    .with_filter(filter()),
            ),
            Err(e) => {
                file_error = Some(format!("{}: {}", path.display(), e));
                None
            }
        },
        _ => None,
    };

    // Fall back to stderr so a broken log file never silences the client.
    let stderr_enabled = config.also_stderr || file_error.is_some() || json_layer.is_none();
    let stderr_layer = stderr_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match file_error {
        Some(error) => tracing::warn!(error = %error, "log file unavailable, using stderr only"),
        None => tracing::debug!(
            service = %config.service_name,
            log_path = ?log_path,
            "observability initialized"
        ),
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};
