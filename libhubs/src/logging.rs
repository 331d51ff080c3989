//! Logging setup
//!
//! Output goes to stderr through a `tracing-subscriber` fmt layer. The
//! `[logging]` section of the configuration picks the format and level;
//! `HUBS_LOG_FORMAT` and `HUBS_LOG_LEVEL` override it, and `RUST_LOG`, when
//! set, replaces the level filter outright.
//!
//! ```toml
//! [logging]
//! format = "json"
//! level = "libhubs=debug,hubs_app=debug,warn"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Overrides `logging.format`
pub const FORMAT_ENV: &str = "HUBS_LOG_FORMAT";
/// Overrides `logging.level`
pub const LEVEL_ENV: &str = "HUBS_LOG_LEVEL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain lines, suitable for piping
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// Multi-line, colored, with source locations
    Pretty,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}' (text, json, pretty)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `info` or `hubs_app=debug,warn`
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    /// Apply `HUBS_LOG_FORMAT` and `HUBS_LOG_LEVEL`
    ///
    /// An unparseable format in the environment is ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(format) = std::env::var(FORMAT_ENV) {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring {}: {}", FORMAT_ENV, e),
            }
        }
        if let Ok(level) = std::env::var(LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.level = level;
            }
        }
        self
    }

    /// Whether `level` parses as filter directives
    pub fn is_valid_level(&self) -> bool {
        EnvFilter::try_new(&self.level).is_ok()
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new(default_level()))
    }

    /// Install the global subscriber
    ///
    /// Returns `false` if one is already installed; the existing one stays.
    pub fn init(&self) -> bool {
        let filter = self.filter();
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let result = match self.format {
            LogFormat::Text => builder.with_target(false).try_init(),
            LogFormat::Json => builder.json().flatten_event(true).try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
        };

        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(FORMAT_ENV);
        std::env::remove_var(LEVEL_ENV);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().unwrap_err().contains("'xml'"));
    }

    #[test]
    fn test_section_defaults() {
        let config: LoggingConfig = toml::from_str("").unwrap();
        assert_eq!(config, LoggingConfig::default());

        let config: LoggingConfig = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    #[serial]
    fn test_env_overrides_config() {
        clear_env();
        std::env::set_var(FORMAT_ENV, "pretty");
        std::env::set_var(LEVEL_ENV, "hubs_app=trace");

        let config = LoggingConfig::default().with_env_overrides();
        clear_env();

        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "hubs_app=trace");
    }

    #[test]
    #[serial]
    fn test_bad_env_format_keeps_config() {
        clear_env();
        std::env::set_var(FORMAT_ENV, "xml");

        let config = LoggingConfig {
            format: LogFormat::Json,
            level: "warn".to_string(),
        }
        .with_env_overrides();
        clear_env();

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn test_level_validation() {
        assert!(LoggingConfig::default().is_valid_level());
        let bad = LoggingConfig {
            level: "libhubs=loud".to_string(),
            ..Default::default()
        };
        assert!(!bad.is_valid_level());
    }

    #[test]
    fn test_second_init_keeps_first() {
        LoggingConfig::default().init();
        assert!(!LoggingConfig::default().init());
    }
}
