//! Structured logging setup for cdpipe
//!
//! Logs are written to stderr through `tracing-subscriber`, leaving stdout for
//! rendered pipelines. `RUST_LOG` takes precedence over the configured level.
//!
//! ```no_run
//! use cdpipe::util::logging::{init_logging, LoggingConfig};
//! use tracing::Level;
//!
//! init_logging(LoggingConfig::with_level(Level::DEBUG));
//! tracing::debug!(pipeline = "trivia-backend", "Assembling");
//! ```

use crate::config::AppConfig;
use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for cdpipe's own targets
    pub level: Level,

    /// One JSON object per event instead of human-readable lines
    pub use_json: bool,

    /// Include the module target (e.g. cdpipe::topology::builder)
    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Level and format taken from the process configuration
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            level: parse_level(&config.log_level).unwrap_or(Level::INFO),
            use_json: config.log_json,
            include_location: config.log_json,
            ..Default::default()
        }
    }
}

/// Parses a level name case-insensitively
///
/// ```
/// use cdpipe::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
/// assert_eq!(parse_level("loud"), None);
/// ```
pub fn parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global subscriber. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = if env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(format!("warn,cdpipe={}", config.level))
        };

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    });
}
