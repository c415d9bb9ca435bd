//! Logging setup for the `sched` binary
//!
//! Logs always go to stderr so stdout stays parseable when `--format json` is
//! used. Settings are layered, highest first:
//! - command line (`--log-format`, `-v`)
//! - `SOCIAL_SCHEDULER_LOG_FORMAT` / `SOCIAL_SCHEDULER_LOG_LEVEL`
//! - `[logging]` in `settings.toml`
//! - text format at `warn`
//!
//! `RUST_LOG`, when set, replaces the level entirely.
//!
//! # Examples
//!
//! ```no_run
//! use libsched::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "debug", false).init();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

pub const FORMAT_ENV: &str = "SOCIAL_SCHEDULER_LOG_FORMAT";
pub const LEVEL_ENV: &str = "SOCIAL_SCHEDULER_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain single-line text, no colors
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Forces `debug` regardless of `level`
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>, verbose: bool) -> Self {
        Self {
            format,
            level: level.into(),
            verbose,
        }
    }

    /// Merge command-line choices with the environment and `settings.toml`
    pub fn resolve(cli_format: Option<LogFormat>, verbose: bool, settings: &LoggingSettings) -> Self {
        Self::resolve_with(cli_format, verbose, settings, |key| std::env::var(key).ok())
    }

    fn resolve_with<F>(
        cli_format: Option<LogFormat>,
        verbose: bool,
        settings: &LoggingSettings,
        env: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = cli_format
            .or_else(|| env(FORMAT_ENV).and_then(|s| s.parse().ok()))
            .or_else(|| settings.format.as_deref().and_then(|s| s.parse().ok()))
            .unwrap_or(LogFormat::Text);

        let level = env(LEVEL_ENV)
            .or_else(|| settings.level.clone())
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        Self::new(format, level, verbose)
    }

    fn filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }

        let level = if self.verbose { "debug" } else { self.level.as_str() };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    }

    /// Install the global subscriber
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init(&self) -> bool {
        let filter = self.filter();

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };

        installed.is_ok()
    }
}
