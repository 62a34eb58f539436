//! Command-line construction for `actionlint`.

use crate::LintRequest;

/// Go template that makes actionlint print a single JSON array.
pub const JSON_FORMAT: &str = "{{json .}}";

/// Arguments for one invocation, in the order actionlint expects them.
///
/// Extra user arguments are only appended for trusted requests, and always
/// come right before the terminal `-` (read from stdin).
#[must_use]
pub fn build_args(request: &LintRequest) -> Vec<String> {
    let settings = request.settings();
    let mut args = vec![
        "-format".to_string(),
        JSON_FORMAT.to_string(),
        "-stdin-filename".to_string(),
        request.relative_path().to_string(),
    ];

    for pattern in &settings.ignore_patterns {
        args.push("-ignore".to_string());
        args.push(pattern.clone());
    }

    if let Some(path) = &settings.shellcheck {
        args.push("-shellcheck".to_string());
        args.push(path.clone());
    }
    if let Some(path) = &settings.pyflakes {
        args.push("-pyflakes".to_string());
        args.push(path.clone());
    }

    if request.trusted() {
        args.extend(settings.extra_args.iter().cloned());
    }

    args.push("-".to_string());
    args
}
