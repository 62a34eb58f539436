//! Classified results of a single tool invocation.

use thiserror::Error;

use crate::RawFinding;

/// Why the tool could not produce trustworthy findings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error(
        "actionlint executable not found at '{path}'. Install actionlint \
         (https://github.com/rhysd/actionlint) or point `executable` at it."
    )]
    NotFound { path: String },
    #[error("actionlint was terminated: {reason}")]
    Terminated { reason: String },
    #[error("failed to run actionlint (os error {code}): {message}")]
    Spawn { code: i32, message: String },
    #[error("actionlint exited with code {code}: {output}")]
    ExitCode { code: i32, output: String },
    #[error("actionlint produced an unexpected output format: {detail}")]
    UnexpectedFormat { detail: String },
    #[error("failed to parse actionlint output ({error}): {raw}")]
    Parse { error: String, raw: String },
}

impl ExecutionError {
    /// Whether this is the workspace-wide "binary missing" condition.
    #[must_use]
    pub fn is_binary_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Exactly one of these per completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintOutcome {
    Success(Vec<RawFinding>),
    /// The tool exited as if it reported findings but produced none; likely a
    /// broken shim.
    Warning(String),
    ExecutionError(ExecutionError),
}

/// What was actually executed. Logged, never used for control flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintResult {
    outcome: LintOutcome,
    invocation: Option<Invocation>,
}

impl LintResult {
    #[must_use]
    pub fn new(outcome: LintOutcome) -> Self {
        Self {
            outcome,
            invocation: None,
        }
    }

    /// Result of a run that was cancelled before or during execution.
    ///
    /// Result-bearing and empty: cancellation is not a failure.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(LintOutcome::Success(Vec::new()))
    }

    #[must_use]
    pub fn with_invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = Some(invocation);
        self
    }

    #[must_use]
    pub fn outcome(&self) -> &LintOutcome {
        &self.outcome
    }

    #[must_use]
    pub fn into_outcome(self) -> LintOutcome {
        self.outcome
    }

    #[must_use]
    pub fn invocation(&self) -> Option<&Invocation> {
        self.invocation.as_ref()
    }
}
