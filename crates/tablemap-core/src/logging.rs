//! Optional SQL logging collaborator.
//!
//! Every collection operation emits `tracing` events regardless of this
//! module. [`SqlLogger`] is an additional, explicitly configured sink for
//! leveled messages carrying the operation name and SQL text. It is disabled
//! by default and never fails the operation it reports on: sink errors are
//! dropped.
//!
//! # Environment Variables
//!
//! - `TABLEMAP_LOG=1` - enable logging ([`LogConfig::from_env`])
//! - `TABLEMAP_LOG_LEVEL=debug|info|warn|error|off` - minimum level

use serde::{Deserialize, Serialize};
use std::env;
use std::io::{self, Write};
use std::sync::Arc;

/// Log levels for SQL logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
    /// No logging
    Off,
}

impl LogLevel {
    /// Parse a log level from a string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "trace" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "off" | "none" => Some(Self::Off),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Off => "OFF",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the logger writes, and from which level up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub min_level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_level: LogLevel::Info,
        }
    }
}

impl LogConfig {
    /// Enabled at `min_level`.
    pub fn enabled(min_level: LogLevel) -> Self {
        Self {
            enabled: true,
            min_level,
        }
    }

    /// Read `TABLEMAP_LOG` and `TABLEMAP_LOG_LEVEL`.
    pub fn from_env() -> Self {
        let enabled = env::var("TABLEMAP_LOG").is_ok_and(|v| {
            let v = v.to_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        });
        let min_level = env::var("TABLEMAP_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::from_str(&s))
            .unwrap_or(LogLevel::Info);
        Self { enabled, min_level }
    }

    /// Would a message at `level` be written?
    pub fn allows(&self, level: LogLevel) -> bool {
        self.enabled && level != LogLevel::Off && level >= self.min_level
    }
}

/// One logged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub operation: Option<String>,
    pub sql: Option<String>,
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[tablemap] [{}]", self.level)?;
        if let Some(op) = &self.operation {
            write!(f, " [{}]", op)?;
        }
        write!(f, " {}", self.message)?;
        if let Some(sql) = &self.sql {
            write!(f, " | SQL: {}", sql)?;
        }
        Ok(())
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord) -> io::Result<()>;
}

/// Writes records to stderr, one line each.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, record: &LogRecord) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", record)
    }
}

/// Explicitly configured SQL logger.
#[derive(Clone, Default)]
pub struct SqlLogger {
    config: LogConfig,
    sink: Option<Arc<dyn LogSink>>,
}

impl std::fmt::Debug for SqlLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlLogger")
            .field("config", &self.config)
            .field("sink", &self.sink.as_ref().map(|_| "dyn LogSink"))
            .finish()
    }
}

impl SqlLogger {
    /// A logger that writes nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Logger writing to stderr under `config`.
    pub fn stderr(config: LogConfig) -> Self {
        Self::with_sink(config, Arc::new(StderrSink))
    }

    pub fn with_sink(config: LogConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            sink: Some(sink),
        }
    }

    pub fn config(&self) -> LogConfig {
        self.config
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.sink.is_some() && self.config.allows(level)
    }

    /// Write a record if the configuration allows its level.
    pub fn log(&self, level: LogLevel, operation: Option<&str>, sql: Option<&str>, message: &str) {
        if !self.is_enabled(level) {
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        let record = LogRecord {
            level,
            message: message.to_string(),
            operation: operation.map(str::to_string),
            sql: sql.map(str::to_string),
        };
        // Logging never fails the caller.
        let _ = sink.write(&record);
    }

    pub fn debug(&self, operation: &str, sql: Option<&str>, message: &str) {
        self.log(LogLevel::Debug, Some(operation), sql, message);
    }

    pub fn info(&self, operation: &str, sql: Option<&str>, message: &str) {
        self.log(LogLevel::Info, Some(operation), sql, message);
    }

    pub fn warning(&self, operation: &str, sql: Option<&str>, message: &str) {
        self.log(LogLevel::Warning, Some(operation), sql, message);
    }

    pub fn error(&self, operation: &str, sql: Option<&str>, message: &str) {
        self.log(LogLevel::Error, Some(operation), sql, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<LogRecord>>,
    }

    impl LogSink for MemorySink {
        fn write(&self, record: &LogRecord) -> io::Result<()> {
            if let Ok(mut records) = self.records.lock() {
                records.push(record.clone());
            }
            Ok(())
        }
    }

    struct FailingSink;

    impl LogSink for FailingSink {
        fn write(&self, _record: &LogRecord) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_str("none"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("loud"), None);
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn test_disabled_by_default() {
        let sink = Arc::new(MemorySink::default());
        let logger = SqlLogger::with_sink(LogConfig::default(), sink.clone());
        logger.error("find", None, "boom");
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_min_level_filters() {
        let sink = Arc::new(MemorySink::default());
        let logger = SqlLogger::with_sink(LogConfig::enabled(LogLevel::Warning), sink.clone());
        logger.info("find", None, "skipped");
        logger.warning("query_raw", Some("SELECT 1"), "raw SQL");

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation.as_deref(), Some("query_raw"));
        assert_eq!(records[0].sql.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_sink_errors_are_swallowed() {
        let logger =
            SqlLogger::with_sink(LogConfig::enabled(LogLevel::Debug), Arc::new(FailingSink));
        logger.error("add", None, "still fine");
    }

    #[test]
    fn test_record_display() {
        let record = LogRecord {
            level: LogLevel::Warning,
            message: "raw SQL".into(),
            operation: Some("list_where_raw".into()),
            sql: Some("SELECT * FROM T".into()),
        };
        assert_eq!(
            record.to_string(),
            "[tablemap] [WARN] [list_where_raw] raw SQL | SQL: SELECT * FROM T"
        );
    }

    #[test]
    fn test_config_from_json() {
        let config: LogConfig =
            serde_json::from_str(r#"{"enabled": true, "min_level": "warn"}"#).unwrap();
        assert_eq!(config, LogConfig::enabled(LogLevel::Warning));

        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LogConfig::default());
    }
}
