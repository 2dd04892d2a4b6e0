use std::fs;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
    Registry,
};

use crate::error::{ErrorContext, HighlighterError, HighlighterResult};

/// Logging configuration for the highlighter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
            max_log_files: 10,
        }
    }
}

/// Initialize the logging system.
///
/// The returned guard flushes the file writer when dropped, so callers keep
/// it alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> HighlighterResult<Option<WorkerGuard>> {
    if config.enable_file_logging {
        fs::create_dir_all(&config.log_dir)
            .with_path(&config.log_dir.to_string_lossy())?;
    }

    // Keep HTTP client internals quiet unless explicitly requested
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "concept_highlighter={},reqwest=warn,hyper=warn,{}",
                config.level, config.level
            ))
        });

    let registry = Registry::default().with(env_filter);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    let (file_layer, guard) = if config.enable_file_logging {
        let file_appender = rolling::daily(&config.log_dir, "concept-highlighter.log");
        let (file_writer, guard) = non_blocking(file_appender);

        let file_layer = if config.enable_json_format {
            fmt::layer()
                .json()
                .with_writer(file_writer)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .boxed()
        };

        (Some(file_layer), Some(guard))
    } else {
        (None, None)
    };

    registry
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| HighlighterError::configuration(format!("Failed to initialize logging: {}", e)))?;

    info!("🧠 Concept highlighter logging initialized");
    info!("Log level: {}", config.level);

    if config.enable_file_logging {
        info!("File logging enabled: {}", config.log_dir.display());
    }

    Ok(guard)
}

/// Performance logging utilities
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        info!("⏱️  Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn checkpoint(&self, checkpoint: &str) {
        let elapsed = self.start.elapsed();
        info!("⏱️  {} - {}: {}ms", self.operation, checkpoint, elapsed.as_millis());
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!("⏱️  Completed {}: {}ms", self.operation, elapsed.as_millis());
    }
}

/// Clean up old log files
pub fn cleanup_old_logs(config: &LoggingConfig) -> HighlighterResult<()> {
    if !config.enable_file_logging {
        return Ok(());
    }

    let dir = config.log_dir.to_string_lossy().to_string();
    let mut log_files = Vec::new();

    for entry in fs::read_dir(&config.log_dir).with_path(&dir)? {
        let path = entry.with_path(&dir)?.path();
        let is_log = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| name.starts_with("concept-highlighter.log"))
            .unwrap_or(false);
        if is_log {
            if let Ok(metadata) = fs::metadata(&path) {
                log_files.push((path, metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH)));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    if log_files.len() > config.max_log_files {
        for (path, _) in &log_files[config.max_log_files..] {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old log file {}: {}", path.display(), e);
            } else {
                info!("Removed old log file: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Macro for logging with context
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "Concept highlighter error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_keeps_newest_logs() {
        let dir = tempdir().unwrap();
        for day in 1..=4 {
            let name = format!("concept-highlighter.log.2026-01-0{}", day);
            fs::write(dir.path().join(name), "log").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        let config = LoggingConfig {
            log_dir: dir.path().to_path_buf(),
            enable_file_logging: true,
            max_log_files: 2,
            ..LoggingConfig::default()
        };
        cleanup_old_logs(&config).unwrap();

        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(remaining.len(), 3);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_cleanup_noop_without_file_logging() {
        let config = LoggingConfig::default();
        assert!(cleanup_old_logs(&config).is_ok());
    }
}
