//! Reading settings layers from disk and from editor-supplied JSON.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::layers::SettingsLayer;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".flowlint").join("config.toml"))
}

#[must_use]
pub fn workspace_config_path(root: &Path) -> PathBuf {
    root.join(".github").join("flowlint.toml")
}

/// Load one TOML layer. A missing file is not an error.
pub fn load_layer(path: &Path) -> Result<Option<SettingsLayer>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    match toml::from_str(&content) {
        Ok(layer) => Ok(Some(layer)),
        Err(err) => {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            })
        }
    }
}

/// Settings pushed by an editor client.
///
/// Accepts either the settings object itself or one nested under a
/// `flowlint` key, which is how most clients scope per-server settings.
pub fn layer_from_json(value: &serde_json::Value) -> Result<SettingsLayer, serde_json::Error> {
    let inner = value.get("flowlint").unwrap_or(value);
    if inner.is_null() {
        return Ok(SettingsLayer::default());
    }
    serde_json::from_value(inner.clone())
}

/// Replace `${VAR}` with the environment value (empty when unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
