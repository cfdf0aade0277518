//! Logging configuration and setup.

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Compact single-line format.
    #[default]
    Compact,
    /// Human-readable multi-line format.
    Pretty,
    /// JSON format for structured logging.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level used when no filter is given.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
    /// Include source file and line.
    pub include_location: bool,
    /// Custom filter string (e.g., "offkit=debug,reqwest=warn").
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            include_location: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Create a debug configuration.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            ..Default::default()
        }
    }

    /// Create a production configuration.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            ..Default::default()
        }
    }

    /// Set a custom filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize logging with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when no explicit filter
/// is configured. Panics if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) {
    let filter = match config.filter {
        Some(ref custom) => EnvFilter::try_new(custom)
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string())),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string())),
    };

    match config.format {
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location);
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_file(config.include_location)
                .with_line_number(config.include_location);
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer().json();
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }
}
