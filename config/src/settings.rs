use std::collections::BTreeMap;
use std::time::Duration;

use flowlint_types::DiagnosticSeverity;
use serde::Deserialize;

pub const DEFAULT_EXECUTABLE: &str = "actionlint";

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const MIN_DEBOUNCE_MS: u64 = 50;
pub const MAX_DEBOUNCE_MS: u64 = 5_000;

/// When edits trigger a lint. Saves and opens always do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    #[serde(alias = "onsave")]
    Save,
    #[default]
    #[serde(alias = "ontype")]
    Type,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string for `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Effective configuration, passed around as an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSettings {
    pub enabled: bool,
    pub executable: String,
    pub trigger: RunTrigger,
    /// Already clamped to `[MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS]`.
    pub debounce: Duration,
    pub ignore_patterns: Vec<String>,
    pub shellcheck: Option<String>,
    pub pyflakes: Option<String>,
    /// Empty unless the workspace is trusted.
    pub extra_args: Vec<String>,
    pub rule_severity: BTreeMap<String, DiagnosticSeverity>,
    pub log_level: LogLevel,
    pub trusted: bool,
}

impl Default for LintSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: DEFAULT_EXECUTABLE.to_string(),
            trigger: RunTrigger::default(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            ignore_patterns: Vec::new(),
            shellcheck: None,
            pyflakes: None,
            extra_args: Vec::new(),
            rule_severity: BTreeMap::new(),
            log_level: LogLevel::default(),
            trusted: false,
        }
    }
}

impl LintSettings {
    #[must_use]
    pub fn lints_on_type(&self) -> bool {
        self.trigger == RunTrigger::Type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LintSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.executable, "actionlint");
        assert!(settings.lints_on_type());
        assert_eq!(settings.debounce, Duration::from_millis(300));
        assert!(!settings.trusted);
    }

    #[test]
    fn test_trigger_aliases() {
        let t: RunTrigger = serde_json::from_value(serde_json::json!("onsave")).unwrap();
        assert_eq!(t, RunTrigger::Save);
        let t: RunTrigger = serde_json::from_value(serde_json::json!("type")).unwrap();
        assert_eq!(t, RunTrigger::Type);
    }

    #[test]
    fn test_log_level_directive() {
        let level: LogLevel = serde_json::from_value(serde_json::json!("debug")).unwrap();
        assert_eq!(level.as_str(), "debug");
    }
}
