//! Configuration for an entity collection.

use serde::{Deserialize, Serialize};
use tablemap_core::{LogConfig, SqlLogger};

/// What the `_raw` entry points do with caller-supplied SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawSqlPolicy {
    /// Run the injection guard; reject High risk, warn otherwise.
    #[default]
    Guarded,
    /// Run the injection guard and only warn.
    WarnOnly,
    /// Refuse every raw SQL call.
    Disabled,
}

/// How predicate constants reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralMode {
    /// Constants become bound parameters.
    #[default]
    Parameterized,
    /// Constants are inlined with `to_sql_literal` (legacy, unescaped).
    Inline,
}

/// Options threaded through every operation of an `EntityCollection`.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    pub logger: SqlLogger,
    pub raw_sql_policy: RawSqlPolicy,
    pub literal_mode: LiteralMode,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn raw_sql_policy(mut self, policy: RawSqlPolicy) -> Self {
        self.raw_sql_policy = policy;
        self
    }

    pub fn literal_mode(mut self, mode: LiteralMode) -> Self {
        self.literal_mode = mode;
        self
    }

    /// Build options from a deserialized settings block, logging to stderr.
    pub fn from_settings(settings: &CollectionSettings) -> Self {
        Self {
            logger: SqlLogger::stderr(settings.log),
            raw_sql_policy: settings.raw_sql_policy,
            literal_mode: settings.literal_mode,
        }
    }
}

/// Serializable form of [`CollectionOptions`] for configuration files.
///
/// ```
/// use tablemap_query::{CollectionSettings, LiteralMode, RawSqlPolicy};
///
/// let settings: CollectionSettings = serde_json::from_str(
///     r#"{ "raw_sql_policy": "disabled", "log": { "enabled": true } }"#,
/// )
/// .unwrap();
/// assert_eq!(settings.raw_sql_policy, RawSqlPolicy::Disabled);
/// assert_eq!(settings.literal_mode, LiteralMode::Parameterized);
/// assert!(settings.log.enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub log: LogConfig,
    pub raw_sql_policy: RawSqlPolicy,
    pub literal_mode: LiteralMode,
}

impl CollectionSettings {
    /// Settings with logging taken from `TABLEMAP_LOG` / `TABLEMAP_LOG_LEVEL`.
    pub fn from_env() -> Self {
        Self {
            log: LogConfig::from_env(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_safe() {
        let options = CollectionOptions::default();
        assert_eq!(options.raw_sql_policy, RawSqlPolicy::Guarded);
        assert_eq!(options.literal_mode, LiteralMode::Parameterized);
        assert!(!options.logger.config().enabled);
    }

    #[test]
    fn test_builder() {
        let options = CollectionOptions::new()
            .raw_sql_policy(RawSqlPolicy::Disabled)
            .literal_mode(LiteralMode::Inline);
        assert_eq!(options.raw_sql_policy, RawSqlPolicy::Disabled);
        assert_eq!(options.literal_mode, LiteralMode::Inline);
    }

    #[test]
    fn test_settings_from_json() {
        let settings: CollectionSettings =
            serde_json::from_str(r#"{"literal_mode": "inline", "raw_sql_policy": "warn_only"}"#)
                .unwrap();
        assert_eq!(settings.literal_mode, LiteralMode::Inline);
        assert_eq!(settings.raw_sql_policy, RawSqlPolicy::WarnOnly);
        assert_eq!(settings.log, LogConfig::default());

        let options = CollectionOptions::from_settings(&settings);
        assert_eq!(options.raw_sql_policy, RawSqlPolicy::WarnOnly);
    }
}
