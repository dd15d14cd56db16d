//! `tracing-subscriber` setup.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the crate's log level.
pub const LEVEL_ENV: &str = "CONTENTFLOW_LOG_LEVEL";
/// Environment variable switching to JSON output.
pub const JSON_ENV: &str = "CONTENTFLOW_LOG_JSON";

/// How logs are filtered and formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level for the `contentflow` target.
    pub level: Level,
    /// Emit one JSON object per line.
    pub use_json: bool,
    /// Include the module target.
    pub include_target: bool,
    /// Include file and line.
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
    /// Default configuration at `level`.
    #[must_use]
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// JSON output with locations, for log collectors.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
        }
    }

    fn directive(&self) -> String {
        format!("contentflow={}", self.level.as_str().to_ascii_lowercase())
    }
}

/// Parses a level name, case-insensitively. Unknown names fall back to
/// `INFO`.
///
/// ```
/// use contentflow::observability::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Debug"), Level::DEBUG);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
#[must_use]
pub fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

/// Installs the global subscriber. Only the first call in a process has an
/// effect, and an already installed subscriber is left alone.
///
/// `RUST_LOG` directives are honored on top of `config.level`.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = config.directive().parse() {
            filter = filter.add_directive(directive);
        }

        let registry = tracing_subscriber::registry().with(filter);
        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);
        let installed = if config.use_json {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer).try_init()
        };
        if installed.is_err() {
            tracing::debug!("A global subscriber was already installed");
        }
    });
}

/// Reads [`LEVEL_ENV`] and [`JSON_ENV`] and installs the subscriber.
pub fn init_from_env() {
    let level = env::var(LEVEL_ENV).map_or(Level::INFO, |v| parse_level(&v));
    let use_json = env::var(JSON_ENV)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    init_logging(&LoggingConfig {
        level,
        use_json,
        ..LoggingConfig::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level(" error "), Level::ERROR);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_directive_is_lowercase() {
        let config = LoggingConfig::with_level(Level::DEBUG);
        assert_eq!(config.directive(), "contentflow=debug");
        assert!(!config.use_json);
    }

    #[test]
    fn test_production_config() {
        let config = LoggingConfig::production();
        assert!(config.use_json);
        assert!(config.include_location);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig::production());
    }
}
