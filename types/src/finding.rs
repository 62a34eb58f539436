//! Findings as reported by the external tool.

use serde::Deserialize;

/// A single error record from `actionlint -format '{{json .}}'`.
///
/// Coordinates are 1-based as the tool reports them. Every field defaults so a
/// partially populated object still deserializes; the mapper clamps bad values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawFinding {
    #[serde(default)]
    message: String,
    #[serde(default)]
    filepath: String,
    #[serde(default)]
    line: i64,
    #[serde(default)]
    column: i64,
    /// Inclusive end column, 0 when the tool does not know it.
    #[serde(default)]
    end_column: i64,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    snippet: String,
}

impl RawFinding {
    #[must_use]
    pub fn new(message: &str, line: i64, column: i64, end_column: i64, kind: &str) -> Self {
        Self {
            message: message.to_string(),
            filepath: String::new(),
            line,
            column,
            end_column,
            kind: kind.to_string(),
            snippet: String::new(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// 1-based line.
    #[must_use]
    pub fn line(&self) -> i64 {
        self.line
    }

    /// 1-based start column.
    #[must_use]
    pub fn column(&self) -> i64 {
        self.column
    }

    /// 1-based inclusive end column (0 = unknown).
    #[must_use]
    pub fn end_column(&self) -> i64 {
        self.end_column
    }

    /// Rule kind, e.g. `expression`, `shellcheck`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn snippet(&self) -> &str {
        &self.snippet
    }
}
