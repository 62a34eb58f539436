use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowlint_config::LintSettings;

/// Everything one invocation needs, captured at trigger time.
///
/// Never mutated after construction, so a run always lints the snapshot it
/// was started with even if the buffer keeps changing.
#[derive(Debug, Clone)]
pub struct LintRequest {
    document: String,
    text: Arc<str>,
    relative_path: String,
    working_dir: PathBuf,
    trusted: bool,
    settings: Arc<LintSettings>,
}

impl LintRequest {
    #[must_use]
    pub fn new(
        document: impl Into<String>,
        text: Arc<str>,
        relative_path: impl Into<String>,
        working_dir: PathBuf,
        settings: Arc<LintSettings>,
    ) -> Self {
        Self {
            document: document.into(),
            text,
            relative_path: relative_path.into(),
            working_dir,
            trusted: settings.trusted,
            settings,
        }
    }

    /// Document identity, for logging.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Path handed to `-stdin-filename`, always with `/` separators.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    #[must_use]
    pub fn trusted(&self) -> bool {
        self.trusted
    }

    #[must_use]
    pub fn settings(&self) -> &LintSettings {
        &self.settings
    }
}
