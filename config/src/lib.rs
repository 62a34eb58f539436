//! Configuration for flowlint.
//!
//! Settings arrive in layers (built-in defaults, the user's config file and
//! editor-pushed settings, the workspace's `.github/flowlint.toml`) and are
//! resolved into one immutable [`LintSettings`] snapshot. Resolution is where
//! workspace trust is enforced: an untrusted workspace cannot choose which
//! binaries run or which extra flags they get.

mod layers;
mod load;
mod settings;

pub use layers::{
    ConfigScope, ConfigSources, ConfigWarning, ResolvedSettings, SettingsLayer, resolve_layers,
};
pub use load::{
    ConfigError, expand_env_vars, layer_from_json, load_layer, user_config_path,
    workspace_config_path,
};
pub use settings::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_EXECUTABLE, LintSettings, LogLevel, MAX_DEBOUNCE_MS,
    MIN_DEBOUNCE_MS, RunTrigger,
};
