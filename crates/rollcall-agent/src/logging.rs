//! Logging setup for the agent.
//!
//! Console output is human-readable; file output goes to a rolling
//! `rollcall.log`. `RUST_LOG` overrides the configured level for both layers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::LoggingSection;

const LOG_FILE_NAME: &str = "rollcall.log";

/// Log rotation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub file_logging: bool,
    pub level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            file_logging: false,
            level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    pub fn from_section(section: &LoggingSection) -> Self {
        Self {
            log_dir: section
                .dir
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(default_log_dir),
            console_output: section.console,
            file_logging: section.file,
            level: section.level.parse().unwrap_or(Level::INFO),
            rotation: section.rotation,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/rollcall/logs", home))
}

/// Keeps the non-blocking file writer alive; buffered output is flushed on drop
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. Keep the returned guard until exit.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(config.filter());
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;

        let appender = RollingFileAppender::new(config.rotation.into(), &config.log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(config.filter());
        layers.push(Box::new(file_layer));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(log_dir = %config.log_dir.display(), "File logging initialized");
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_section() {
        let section = LoggingSection {
            level: "warn".to_string(),
            console: false,
            file: true,
            dir: Some("/var/log/rollcall".to_string()),
            rotation: LogRotation::Hourly,
        };
        let config = LoggingConfig::from_section(&section);
        assert_eq!(config.level, Level::WARN);
        assert!(!config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/rollcall"));
        assert_eq!(config.rotation, LogRotation::Hourly);
        assert_eq!(Rotation::from(config.rotation), Rotation::HOURLY);
    }

    #[test]
    fn test_from_default_section() {
        let config = LoggingConfig::from_section(&LoggingSection::default());
        assert_eq!(config.level, Level::INFO);
        assert!(config.console_output);
        assert!(!config.file_logging);
        assert!(config.log_dir.ends_with("rollcall/logs"));
        assert_eq!(config.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_init_file_logging() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_dir: dir.path().join("logs"),
            console_output: false,
            file_logging: true,
            level: Level::INFO,
            rotation: LogRotation::Never,
        };

        let guard = init_logging(&config).unwrap();
        tracing::info!("written to file");
        drop(guard);

        let contents = std::fs::read_to_string(dir.path().join("logs").join(LOG_FILE_NAME)).unwrap();
        assert!(contents.contains("written to file"));
    }
}
