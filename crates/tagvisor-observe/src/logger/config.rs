use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Env var holding the tracing filter, e.g. `info,tagvisor_core=debug`.
pub const ENV_LOG: &str = "TAGVISOR_LOG";
/// Env var holding the output format (`text`, `json`, `journald`).
pub const ENV_LOG_FORMAT: &str = "TAGVISOR_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive string.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: cfg!(test) || std::io::stdout().is_terminal(),
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `TAGVISOR_LOG` and `TAGVISOR_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, LoggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            cfg.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).filter(|v| !v.trim().is_empty()) {
            cfg.format = format.parse()?;
        }
        if cfg.format != LoggerFormat::Text {
            cfg.use_color = false;
        }
        Ok(cfg)
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_targets(mut self, with_targets: bool) -> Self {
        self.with_targets = with_targets;
        self
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_env_keeps_defaults() {
        let cfg = LoggerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, LoggerConfig::default());
    }

    #[test]
    fn env_overrides_level_and_format() {
        let cfg = LoggerConfig::from_lookup(lookup(&[
            (ENV_LOG, "debug,tagvisor_core=trace"),
            (ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.level, "debug,tagvisor_core=trace");
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert!(!cfg.use_color);
    }

    #[test]
    fn bad_format_is_an_error() {
        let err = LoggerConfig::from_lookup(lookup(&[(ENV_LOG_FORMAT, "xml")])).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidFormat(_)));
    }

    #[test]
    fn partial_document_deserializes() {
        let cfg: LoggerConfig = serde_json::from_str(r#"{"level":"warn","withTargets":false}"#).unwrap();
        assert_eq!(cfg.level, "warn");
        assert!(!cfg.with_targets);
        assert_eq!(cfg.format, LoggerFormat::Text);
    }
}
