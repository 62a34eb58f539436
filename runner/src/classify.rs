//! Turning an exit code and captured output into a [`LintOutcome`].
//!
//! This is the boundary where the tool's JSON becomes typed [`RawFinding`]s;
//! nothing past this point sees `serde_json::Value`.

use flowlint_types::{ExecutionError, LintOutcome, RawFinding};
use serde_json::Value;

/// Cap on raw tool output quoted in error messages.
pub const MAX_QUOTED_OUTPUT_CHARS: usize = 2_000;

/// Classify a process that exited normally with `exit_code`.
#[must_use]
pub fn classify(exit_code: i32, stdout: &str, stderr: &str) -> LintOutcome {
    if !(0..=1).contains(&exit_code) {
        return LintOutcome::ExecutionError(ExecutionError::ExitCode {
            code: exit_code,
            output: describe_output(stdout, stderr),
        });
    }

    let trimmed = stdout.trim();
    let parsed = if trimmed.is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(trimmed)
    };

    match parsed {
        Ok(Value::Null) => empty_output(exit_code, stderr),
        Ok(Value::Array(items)) if items.is_empty() => empty_output(exit_code, stderr),
        Ok(Value::Array(items)) => findings(items),
        Ok(other) => LintOutcome::ExecutionError(ExecutionError::UnexpectedFormat {
            detail: format!("expected a JSON array, got {}", json_type(&other)),
        }),
        Err(err) => LintOutcome::ExecutionError(ExecutionError::Parse {
            error: err.to_string(),
            raw: truncate_chars(trimmed, MAX_QUOTED_OUTPUT_CHARS),
        }),
    }
}

/// Exit 0 with nothing to say is clean. Exit 1 means "findings reported", so
/// an empty payload alongside it can't be trusted.
fn empty_output(exit_code: i32, stderr: &str) -> LintOutcome {
    if exit_code == 0 {
        return LintOutcome::Success(Vec::new());
    }
    let mut message = String::from(
        "actionlint exited with code 1 but reported no findings; the executable may be a \
         broken shim or wrapper",
    );
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(&truncate_chars(stderr, MAX_QUOTED_OUTPUT_CHARS));
    }
    LintOutcome::Warning(message)
}

fn findings(items: Vec<Value>) -> LintOutcome {
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return LintOutcome::ExecutionError(ExecutionError::UnexpectedFormat {
                detail: format!("element {index} is {}, not an object", json_type(&item)),
            });
        }
        match serde_json::from_value::<RawFinding>(item) {
            Ok(finding) => out.push(finding),
            Err(err) => {
                return LintOutcome::ExecutionError(ExecutionError::UnexpectedFormat {
                    detail: format!("element {index}: {err}"),
                });
            }
        }
    }
    LintOutcome::Success(out)
}

fn describe_output(stdout: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    let stdout = stdout.trim();
    let text = match (stderr.is_empty(), stdout.is_empty()) {
        (false, _) => stderr,
        (true, false) => stdout,
        (true, true) => "(no output)",
    };
    truncate_chars(text, MAX_QUOTED_OUTPUT_CHARS)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Truncate on a char boundary, noting the original size.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... ({} bytes total)", &text[..cut], text.len()),
        None => text.to_string(),
    }
}
