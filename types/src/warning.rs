//! Workspace-wide tool health.

use serde::Serialize;

/// Process-wide warning state, set by the most recent non-stale run of any
/// document.
///
/// The variants are mutually exclusive so impossible combinations (missing
/// binary *and* garbage output) cannot be represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningState {
    #[default]
    None,
    BinaryNotFound,
    UnexpectedOutput,
}

impl WarningState {
    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BinaryNotFound => "binaryNotFound",
            Self::UnexpectedOutput => "unexpectedOutput",
        }
    }
}
