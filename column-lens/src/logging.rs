//! Logging utilities and configuration for column-lens.
//!
//! The engine logs through `tracing`. [`LogConfig`] controls how chatty the
//! profiler is about generated queries and per-fragment results, and
//! [`setup::init_logging`] installs a ready-made `tracing-subscriber` stack
//! for hosts that do not bring their own.

use serde::{Deserialize, Serialize};
use tracing::Level;

/// Logging configuration for profiling runs.
///
/// `base_level` gates the profiler's lifecycle events (plan start and
/// completion, segment discovery, key ranking, correlation summaries).
/// Query text and per-fragment row counts are separate opt-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base log level for engine components
    #[serde(with = "level_serde")]
    pub base_level: Level,
    /// Whether to log the SQL text of every generated fragment
    pub log_queries: bool,
    /// Whether to log the number of rows each fragment returned
    pub log_fragment_rows: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_queries: false,
            log_fragment_rows: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging generated SQL.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_queries: true,
            log_fragment_rows: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_queries: false,
            log_fragment_rows: false,
            max_field_length: 128,
        }
    }

    /// Whether events at `level` pass the configured base level.
    ///
    /// `tracing` orders levels by verbosity, so `TRACE` is the greatest.
    pub fn enables(&self, level: Level) -> bool {
        level <= self.base_level
    }
}

mod level_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(level.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Level>().map_err(serde::de::Error::custom)
    }
}

/// Macro for conditional query logging.
#[macro_export]
macro_rules! log_query {
    ($config:expr, $kind:expr, $sql:expr) => {
        if $config.log_queries {
            tracing::debug!(
                fragment = %$kind,
                sql = %$crate::logging::truncate_field($sql, $config.max_field_length),
                "Executing profiling fragment"
            );
        }
    };
}

/// Macro for lifecycle events gated on [`LogConfig::base_level`] at `INFO`.
#[macro_export]
macro_rules! log_info {
    ($config:expr, $($arg:tt)*) => {
        if $config.enables(tracing::Level::INFO) {
            tracing::info!($($arg)*);
        }
    };
}

/// Like [`log_info!`] at `DEBUG`; arguments are only evaluated when enabled.
#[macro_export]
macro_rules! log_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.enables(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
///
/// Truncation never splits a UTF-8 character.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut cut = max_length;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...(truncated)", &value[..cut])
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for the logging subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for column-lens components specifically
        pub engine_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                engine_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a production configuration: warnings only, JSON output.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                engine_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_engine_level(mut self, level: Level) -> Self {
            self.engine_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},column_lens={}",
                    self.level.as_str().to_lowercase(),
                    self.engine_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `tracing` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter when set.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use column_lens::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::default().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
