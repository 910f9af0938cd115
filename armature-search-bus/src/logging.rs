//! Logging setup.
//!
//! The gateway logs through `tracing`. [`init`] installs a global subscriber
//! configured from the environment:
//!
//! - `GATEWAY_DEBUG=1` - enable debug logging
//! - `GATEWAY_LOG_LEVEL=trace|debug|info|warn|error` - set log level
//! - `GATEWAY_LOG_FORMAT=json|pretty|compact` - set output format (json by default)
//! - `RUST_LOG` - full filter directive, takes precedence over the level

use std::collections::HashMap;
use std::env;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human readable
    Pretty,
    /// Single-line, human readable
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Minimum level
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Raw `RUST_LOG` directive, if set
    pub directive: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            directive: None,
        }
    }
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Read settings from a set of variables.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let debug = vars
            .get("GATEWAY_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let level = vars
            .get("GATEWAY_LOG_LEVEL")
            .and_then(|s| parse_level(s))
            .unwrap_or(if debug { Level::DEBUG } else { Level::INFO });

        let format = vars
            .get("GATEWAY_LOG_FORMAT")
            .and_then(|s| LogFormat::parse(s))
            .unwrap_or(LogFormat::Json);

        let directive = vars.get("RUST_LOG").filter(|s| !s.is_empty()).cloned();

        Self {
            level,
            format,
            directive,
        }
    }

    /// The filter the subscriber is built with.
    pub fn filter(&self) -> EnvFilter {
        self.directive
            .as_deref()
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &LogSettings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_target(true);

    match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    }
}
