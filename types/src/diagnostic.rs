//! Editor-native diagnostics.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity level for a diagnostic.
///
/// Numeric values match the LSP wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity '{0}' (expected error, warning, information or hint)")]
pub struct UnknownSeverity(pub String);

impl DiagnosticSeverity {
    /// LSP numeric severity (1=Error, 2=Warning, 3=Info, 4=Hint).
    #[must_use]
    pub fn to_lsp(self) -> u64 {
        self as u64
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

impl FromStr for DiagnosticSeverity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "information" | "info" => Ok(Self::Information),
            "hint" => Ok(Self::Hint),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Largest start column; one more must still fit in a `u32`.
pub const MAX_START_COL: u32 = u32::MAX - 1;

/// A single finding in editor coordinates.
///
/// Lines and columns are 0-indexed; the column range is half-open and never
/// empty. Fields are private so the range invariant holds for every value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    message: String,
    line: u32,
    start_col: u32,
    end_col: u32,
    /// Resolved to a concrete string at the boundary, never empty.
    source: String,
    code: String,
}

impl Diagnostic {
    /// Construct a diagnostic.
    ///
    /// An `end_col` at or before `start_col` is widened to one character.
    /// `start_col` is capped at `MAX_START_COL` so that character always fits.
    #[must_use]
    pub fn new(
        severity: DiagnosticSeverity,
        message: String,
        line: u32,
        start_col: u32,
        end_col: u32,
        source: String,
        code: String,
    ) -> Self {
        let start_col = start_col.min(MAX_START_COL);
        let end_col = end_col.max(start_col + 1);
        Self {
            severity,
            message,
            line,
            start_col,
            end_col,
            source,
            code,
        }
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 0-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 0-indexed start column (inclusive).
    #[must_use]
    pub fn start_col(&self) -> u32 {
        self.start_col
    }

    /// 0-indexed end column (exclusive).
    #[must_use]
    pub fn end_col(&self) -> u32 {
        self.end_col
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rule code, e.g. `expression` or `shellcheck:SC2086`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Format as `path:line:col: severity: [code] message` (1-indexed for display).
    #[must_use]
    pub fn display_with_path(&self, path: &Path) -> String {
        format!(
            "{}:{}:{}: {}: [{}] {}",
            path.display(),
            self.line + 1,
            self.start_col + 1,
            self.severity.label(),
            self.code,
            self.message,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn diag(start: u32, end: u32) -> Diagnostic {
        Diagnostic::new(
            DiagnosticSeverity::Error,
            "undefined context".to_string(),
            9,
            start,
            end,
            "actionlint".to_string(),
            "expression".to_string(),
        )
    }

    #[test]
    fn test_to_lsp_values() {
        assert_eq!(DiagnosticSeverity::Error.to_lsp(), 1);
        assert_eq!(DiagnosticSeverity::Warning.to_lsp(), 2);
        assert_eq!(DiagnosticSeverity::Information.to_lsp(), 3);
        assert_eq!(DiagnosticSeverity::Hint.to_lsp(), 4);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(
            "Warning".parse::<DiagnosticSeverity>(),
            Ok(DiagnosticSeverity::Warning)
        );
        assert_eq!(
            "info".parse::<DiagnosticSeverity>(),
            Ok(DiagnosticSeverity::Information)
        );
        assert!("fatal".parse::<DiagnosticSeverity>().is_err());
    }

    #[test]
    fn test_empty_range_is_widened() {
        let d = diag(4, 4);
        assert_eq!(d.start_col(), 4);
        assert_eq!(d.end_col(), 5);

        let d = diag(7, 2);
        assert_eq!(d.end_col(), 8);
    }

    #[test]
    fn test_valid_range_is_kept() {
        let d = diag(4, 10);
        assert_eq!((d.start_col(), d.end_col()), (4, 10));
    }

    #[test]
    fn test_range_at_u32_max_stays_non_empty() {
        let d = diag(u32::MAX, 0);
        assert_eq!((d.start_col(), d.end_col()), (u32::MAX - 1, u32::MAX));

        let d = diag(u32::MAX, u32::MAX);
        assert!(d.end_col() > d.start_col());
    }

    #[test]
    fn test_display_with_path() {
        let d = diag(4, 10);
        let path = PathBuf::from(".github/workflows/ci.yml");
        assert_eq!(
            d.display_with_path(&path),
            ".github/workflows/ci.yml:10:5: error: [expression] undefined context"
        );
    }
}
