//! Settings layers and their resolution into a [`LintSettings`] snapshot.

use std::collections::BTreeMap;
use std::time::Duration;

use flowlint_types::DiagnosticSeverity;
use serde::Deserialize;
use thiserror::Error;

use crate::load::expand_env_vars;
use crate::settings::{LintSettings, LogLevel, MAX_DEBOUNCE_MS, MIN_DEBOUNCE_MS, RunTrigger};

/// Where a layer came from. Later scopes override earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigScope {
    Default,
    /// The user's own config file and settings pushed by their editor.
    User,
    /// Checked into the repository; only honored for restricted keys when trusted.
    Workspace,
}

impl ConfigScope {
    fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::User => "user",
            Self::Workspace => "workspace",
        }
    }
}

/// One partially-specified layer of settings.
///
/// Keys are snake_case in TOML; camelCase aliases are accepted for settings
/// pushed by editor clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsLayer {
    pub enabled: Option<bool>,
    pub executable: Option<String>,
    pub trigger: Option<RunTrigger>,
    #[serde(alias = "debounceMs")]
    pub debounce_ms: Option<u64>,
    pub ignore: Option<Vec<String>>,
    pub shellcheck: Option<String>,
    pub pyflakes: Option<String>,
    #[serde(alias = "extraArgs")]
    pub extra_args: Option<Vec<String>>,
    #[serde(alias = "ruleSeverity")]
    pub rule_severity: Option<BTreeMap<String, String>>,
    #[serde(alias = "logLevel")]
    pub log_level: Option<LogLevel>,
}

/// Something in the configuration was not applied as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("{scope} setting rule_severity.{kind} = '{value}' is not a valid severity; ignored")]
    InvalidSeverity {
        scope: &'static str,
        kind: String,
        value: String,
    },
    #[error("{scope} setting '{key}' is ignored in an untrusted workspace")]
    Restricted { scope: &'static str, key: &'static str },
    #[error("debounce_ms = {requested} is out of range; using {applied}")]
    DebounceClamped { requested: u64, applied: u64 },
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub settings: LintSettings,
    pub warnings: Vec<ConfigWarning>,
}

/// All the layers known to a host, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// `~/.flowlint/config.toml`.
    pub user_file: Option<SettingsLayer>,
    /// Settings pushed by the editor client.
    pub client: Option<SettingsLayer>,
    /// `<root>/.github/flowlint.toml`.
    pub workspace: Option<SettingsLayer>,
}

impl ConfigSources {
    #[must_use]
    pub fn resolve(&self, trusted: bool) -> ResolvedSettings {
        let mut layers = Vec::new();
        if let Some(layer) = &self.user_file {
            layers.push((ConfigScope::User, layer));
        }
        if let Some(layer) = &self.client {
            layers.push((ConfigScope::User, layer));
        }
        if let Some(layer) = &self.workspace {
            layers.push((ConfigScope::Workspace, layer));
        }
        resolve_layers(&layers, trusted)
    }
}

/// Merge layers over the defaults.
///
/// Layers are applied in scope order; within a scope, in slice order.
#[must_use]
pub fn resolve_layers(layers: &[(ConfigScope, &SettingsLayer)], trusted: bool) -> ResolvedSettings {
    let mut ordered: Vec<&(ConfigScope, &SettingsLayer)> = layers.iter().collect();
    ordered.sort_by_key(|(scope, _)| *scope);

    let mut settings = LintSettings {
        trusted,
        ..LintSettings::default()
    };
    let mut warnings = Vec::new();

    for (scope, layer) in ordered {
        let scope = *scope;
        let restricted_ok = trusted || scope != ConfigScope::Workspace;

        if let Some(enabled) = layer.enabled {
            settings.enabled = enabled;
        }
        if let Some(trigger) = layer.trigger {
            settings.trigger = trigger;
        }
        if let Some(requested) = layer.debounce_ms {
            let applied = requested.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
            if applied != requested {
                warnings.push(ConfigWarning::DebounceClamped { requested, applied });
            }
            settings.debounce = Duration::from_millis(applied);
        }
        if let Some(ignore) = &layer.ignore {
            settings.ignore_patterns = ignore.clone();
        }
        if let Some(level) = layer.log_level {
            settings.log_level = level;
        }

        let mut restricted = |key, value| {
            restricted_value(scope, key, value, restricted_ok, &mut warnings)
        };
        if let Some(value) = restricted("executable", layer.executable.as_ref()) {
            settings.executable = value;
        }
        if let Some(value) = restricted("shellcheck", layer.shellcheck.as_ref()) {
            settings.shellcheck = Some(value);
        }
        if let Some(value) = restricted("pyflakes", layer.pyflakes.as_ref()) {
            settings.pyflakes = Some(value);
        }

        if let Some(extra) = &layer.extra_args {
            if trusted {
                settings.extra_args = extra.clone();
            } else if !extra.is_empty() {
                warnings.push(ConfigWarning::Restricted {
                    scope: scope.label(),
                    key: "extra_args",
                });
            }
        }

        if let Some(overrides) = &layer.rule_severity {
            for (kind, value) in overrides {
                match value.parse::<DiagnosticSeverity>() {
                    Ok(severity) => {
                        settings.rule_severity.insert(kind.clone(), severity);
                    }
                    Err(_) => warnings.push(ConfigWarning::InvalidSeverity {
                        scope: scope.label(),
                        kind: kind.clone(),
                        value: value.clone(),
                    }),
                }
            }
        }
    }

    for warning in &warnings {
        match warning {
            // Untrusted overrides are dropped quietly.
            ConfigWarning::Restricted { .. } => tracing::debug!("{warning}"),
            _ => tracing::warn!("{warning}"),
        }
    }

    ResolvedSettings { settings, warnings }
}

/// A path-valued setting after trust gating and `${VAR}` expansion.
fn restricted_value(
    scope: ConfigScope,
    key: &'static str,
    value: Option<&String>,
    allowed: bool,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<String> {
    let value = value?;
    if !allowed {
        warnings.push(ConfigWarning::Restricted {
            scope: scope.label(),
            key,
        });
        return None;
    }
    let value = expand_env_vars(value.trim());
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DEFAULT_EXECUTABLE;

    fn workspace_layer() -> SettingsLayer {
        SettingsLayer {
            executable: Some("/tmp/evil/actionlint".to_string()),
            shellcheck: Some("/tmp/evil/shellcheck".to_string()),
            pyflakes: Some("/tmp/evil/pyflakes".to_string()),
            extra_args: Some(vec!["-config-file".to_string(), "x.yaml".to_string()]),
            ignore: Some(vec!["SC2086".to_string()]),
            rule_severity: Some(BTreeMap::from([(
                "runner-label".to_string(),
                "information".to_string(),
            )])),
            ..SettingsLayer::default()
        }
    }

    #[test]
    fn test_no_layers_gives_defaults() {
        let resolved = resolve_layers(&[], false);
        assert_eq!(resolved.settings, LintSettings::default());
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn test_untrusted_drops_restricted_workspace_keys() {
        let layer = workspace_layer();
        let resolved = resolve_layers(&[(ConfigScope::Workspace, &layer)], false);
        let s = &resolved.settings;

        assert_eq!(s.executable, DEFAULT_EXECUTABLE);
        assert_eq!(s.shellcheck, None);
        assert_eq!(s.pyflakes, None);
        assert!(s.extra_args.is_empty());
        // Unrestricted settings still apply.
        assert_eq!(s.ignore_patterns, vec!["SC2086"]);
        assert_eq!(
            s.rule_severity.get("runner-label"),
            Some(&DiagnosticSeverity::Information)
        );
        assert_eq!(resolved.warnings.len(), 4);
    }

    #[test]
    fn test_trusted_honors_workspace_keys() {
        let layer = workspace_layer();
        let resolved = resolve_layers(&[(ConfigScope::Workspace, &layer)], true);
        let s = &resolved.settings;
        assert_eq!(s.executable, "/tmp/evil/actionlint");
        assert_eq!(s.shellcheck.as_deref(), Some("/tmp/evil/shellcheck"));
        assert_eq!(s.extra_args, vec!["-config-file", "x.yaml"]);
        assert!(s.trusted);
    }

    #[test]
    fn test_untrusted_user_scope_keeps_paths_but_not_extra_args() {
        let layer = workspace_layer();
        let resolved = resolve_layers(&[(ConfigScope::User, &layer)], false);
        assert_eq!(resolved.settings.executable, "/tmp/evil/actionlint");
        assert!(resolved.settings.extra_args.is_empty());
    }

    #[test]
    fn test_workspace_overrides_user() {
        let user = SettingsLayer {
            enabled: Some(false),
            ignore: Some(vec!["a".to_string()]),
            ..SettingsLayer::default()
        };
        let workspace = SettingsLayer {
            enabled: Some(true),
            ..SettingsLayer::default()
        };
        // Slice order is irrelevant across scopes.
        let resolved = resolve_layers(
            &[
                (ConfigScope::Workspace, &workspace),
                (ConfigScope::User, &user),
            ],
            false,
        );
        assert!(resolved.settings.enabled);
        assert_eq!(resolved.settings.ignore_patterns, vec!["a"]);
    }

    #[test]
    fn test_invalid_severity_dropped_with_warning() {
        let layer = SettingsLayer {
            rule_severity: Some(BTreeMap::from([
                ("expression".to_string(), "warning".to_string()),
                ("shellcheck".to_string(), "catastrophic".to_string()),
            ])),
            ..SettingsLayer::default()
        };
        let resolved = resolve_layers(&[(ConfigScope::User, &layer)], false);
        assert_eq!(resolved.settings.rule_severity.len(), 1);
        assert!(matches!(
            &resolved.warnings[..],
            [ConfigWarning::InvalidSeverity { kind, .. }] if kind == "shellcheck"
        ));
    }

    #[test]
    fn test_debounce_is_clamped() {
        let layer = SettingsLayer {
            debounce_ms: Some(10),
            ..SettingsLayer::default()
        };
        let resolved = resolve_layers(&[(ConfigScope::User, &layer)], false);
        assert_eq!(
            resolved.settings.debounce,
            Duration::from_millis(MIN_DEBOUNCE_MS)
        );
        assert_eq!(
            resolved.warnings,
            vec![ConfigWarning::DebounceClamped {
                requested: 10,
                applied: MIN_DEBOUNCE_MS
            }]
        );
    }

    #[test]
    fn test_empty_executable_keeps_default() {
        let layer = SettingsLayer {
            executable: Some("   ".to_string()),
            ..SettingsLayer::default()
        };
        let resolved = resolve_layers(&[(ConfigScope::User, &layer)], true);
        assert_eq!(resolved.settings.executable, DEFAULT_EXECUTABLE);
    }

    #[test]
    fn test_sources_order_client_after_user_file() {
        let sources = ConfigSources {
            user_file: Some(SettingsLayer {
                trigger: Some(RunTrigger::Type),
                ..SettingsLayer::default()
            }),
            client: Some(SettingsLayer {
                trigger: Some(RunTrigger::Save),
                ..SettingsLayer::default()
            }),
            workspace: None,
        };
        assert_eq!(sources.resolve(false).settings.trigger, RunTrigger::Save);
    }
}
