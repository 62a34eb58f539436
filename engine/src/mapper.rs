//! Position Mapper: tool findings to editor diagnostics.
//!
//! actionlint reports 1-based lines and columns with an inclusive end column.
//! Diagnostics are 0-based with a half-open column range, so the inclusive
//! 1-based end is numerically the exclusive 0-based end and is used as is.
//!
//! Findings from shellcheck and pyflakes arrive wrapped in a single actionlint
//! finding that points at the `run:` key. Their message carries the position
//! inside the script (`SC2086:info:1:5: Double quote ...`), which is resolved
//! back into the document when its text is available.
//!
//! Everything here is pure: malformed input degrades to the nearest safe
//! position instead of failing.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use flowlint_types::{DIAGNOSTIC_SOURCE, Diagnostic, DiagnosticSeverity, MAX_START_COL, RawFinding};
use regex::Regex;

const SHELLCHECK_KIND: &str = "shellcheck";
const PYFLAKES_KIND: &str = "pyflakes";
const SCRIPT_KEY: &str = "run:";

/// Map a batch of findings. `text` enables embedded-script position
/// resolution.
#[must_use]
pub fn to_diagnostics(
    findings: &[RawFinding],
    overrides: &BTreeMap<String, DiagnosticSeverity>,
    text: Option<&str>,
) -> Vec<Diagnostic> {
    let lines: Option<Vec<&str>> = text.map(|text| text.lines().collect());
    findings
        .iter()
        .map(|finding| map_finding(finding, overrides, lines.as_deref()))
        .collect()
}

/// Map a single finding.
#[must_use]
pub fn map_finding(
    finding: &RawFinding,
    overrides: &BTreeMap<String, DiagnosticSeverity>,
    lines: Option<&[&str]>,
) -> Diagnostic {
    let kind = finding.kind();
    let line = to_zero_based(finding.line());
    let start = to_zero_based(finding.column()).min(MAX_START_COL);
    let end = match to_u32(finding.end_column()) {
        end if end > start => end,
        _ => start + 1,
    };

    let embedded = is_embedded_kind(kind)
        .then(|| EmbeddedMessage::parse(finding.message()))
        .flatten();

    let severity = overrides
        .get(kind)
        .copied()
        .or_else(|| {
            embedded
                .as_ref()
                .filter(|_| kind == SHELLCHECK_KIND)
                .and_then(|m| m.severity)
        })
        .or_else(|| kind_severity(kind))
        .unwrap_or(DiagnosticSeverity::Error);

    let Some(embedded) = embedded else {
        return Diagnostic::new(
            severity,
            finding.message().to_string(),
            line,
            start,
            end,
            DIAGNOSTIC_SOURCE.to_string(),
            kind.to_string(),
        );
    };

    let code = match embedded.code {
        Some(sub) => format!("{kind}:{sub}"),
        None => kind.to_string(),
    };
    let (line, start, end) = lines
        .and_then(|lines| {
            resolve_script_position(lines, line as usize, embedded.line, embedded.column)
        })
        .unwrap_or((line, start, end));

    Diagnostic::new(
        severity,
        embedded.description.to_string(),
        line,
        start,
        end,
        DIAGNOSTIC_SOURCE.to_string(),
        code,
    )
}

/// Default tier for known actionlint rule kinds.
#[must_use]
pub fn kind_severity(kind: &str) -> Option<DiagnosticSeverity> {
    let severity = match kind {
        "syntax-check" | "expression" | "action" | "job-needs" | "matrix" | "events" | "glob"
        | "id" | "workflow-call" | "env-var" | "shell-name" | "permissions" => {
            DiagnosticSeverity::Error
        }
        "deprecated-commands" | "credentials" | "runner-label" | "if-cond" => {
            DiagnosticSeverity::Warning
        }
        PYFLAKES_KIND => DiagnosticSeverity::Information,
        _ => return None,
    };
    Some(severity)
}

fn is_embedded_kind(kind: &str) -> bool {
    kind == SHELLCHECK_KIND || kind == PYFLAKES_KIND
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn to_zero_based(value: i64) -> u32 {
    to_u32(value.saturating_sub(1))
}

fn shellcheck_severity(token: &str) -> Option<DiagnosticSeverity> {
    match token {
        "error" => Some(DiagnosticSeverity::Error),
        "warning" => Some(DiagnosticSeverity::Warning),
        "info" => Some(DiagnosticSeverity::Information),
        "style" => Some(DiagnosticSeverity::Hint),
        _ => None,
    }
}

/// A sub-tool report embedded in an actionlint message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EmbeddedMessage<'a> {
    code: Option<&'a str>,
    severity: Option<DiagnosticSeverity>,
    /// 1-based, relative to the script body.
    line: u32,
    column: u32,
    description: &'a str,
}

fn embedded_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:.*?: )?(?:(?P<code>SC\d+):(?P<severity>[a-z]+):)?(?P<line>\d+):(?P<col>\d+):? (?P<description>.+)$",
        )
        .expect("valid embedded message regex")
    })
}

impl<'a> EmbeddedMessage<'a> {
    fn parse(message: &'a str) -> Option<Self> {
        let caps = embedded_pattern().captures(message.trim_end())?;
        let line = caps.name("line")?.as_str().parse().ok()?;
        let column = caps.name("col")?.as_str().parse().ok()?;
        let description = caps.name("description")?.as_str().trim();
        if description.is_empty() {
            return None;
        }
        Some(Self {
            code: caps.name("code").map(|m| m.as_str()),
            severity: caps
                .name("severity")
                .and_then(|m| shellcheck_severity(m.as_str())),
            line,
            column,
            description,
        })
    }
}

/// Resolve a script-relative position back into the document.
///
/// `statement_line` is the 0-based document line holding `run:`; `script_line`
/// and `script_col` are 1-based within the script. Returns the 0-based
/// `(line, start, end)`, or `None` when the position can't be located.
#[must_use]
pub fn resolve_script_position(
    lines: &[&str],
    statement_line: usize,
    script_line: u32,
    script_col: u32,
) -> Option<(u32, u32, u32)> {
    if script_line == 0 || script_col == 0 {
        return None;
    }
    let script_line = script_line as usize;
    let script_col = script_col as usize;

    let statement = lines.get(statement_line)?;
    let key_at = find_script_key(statement)?;
    let after_key = &statement[key_at + SCRIPT_KEY.len()..];
    let value = after_key.trim_start();

    let (target_line, column) = if value.starts_with('|') || value.starts_with('>') {
        // The body ends at the first non-blank line not indented past the key.
        let key_indent = char_len(&statement[..key_at]);
        let body_start = statement_line + 1;
        let body = lines.get(body_start..)?;
        let body_len = body
            .iter()
            .take_while(|line| line.trim().is_empty() || indent_of(line) > key_indent)
            .count();
        if script_line > body_len {
            return None;
        }
        let indent = body[..body_len]
            .iter()
            .find(|line| !line.trim().is_empty())
            .map(|line| indent_of(line))?;
        (body_start + (script_line - 1), indent + (script_col - 1))
    } else {
        if script_line != 1 {
            return None;
        }
        let mut value_at = char_len(&statement[..key_at]) + char_len(SCRIPT_KEY);
        value_at += char_len(after_key) - char_len(value);
        if value.starts_with('"') || value.starts_with('\'') {
            value_at += 1;
        }
        (statement_line, value_at + (script_col - 1))
    };

    let target = lines.get(target_line)?;
    let width = char_len(target.trim_end());
    if column > width {
        return None;
    }
    let end = (column + 1).max(width);
    Some((
        u32::try_from(target_line).ok()?,
        u32::try_from(column).ok()?,
        u32::try_from(end).ok()?,
    ))
}

/// Byte offset of a `run:` key, which must start the line's content or
/// follow whitespace (as in `- run:`).
fn find_script_key(line: &str) -> Option<usize> {
    line.match_indices(SCRIPT_KEY).map(|(at, _)| at).find(|&at| {
        line[..at]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace)
    })
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn indent_of(line: &str) -> usize {
    char_len(line) - char_len(line.trim_start())
}
