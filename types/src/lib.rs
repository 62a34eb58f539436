//! Core domain types for flowlint.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The runner produces [`LintResult`]s from [`RawFinding`]s, the engine turns them into
//! [`Diagnostic`]s, and hosts render those.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod diagnostic;
mod finding;
mod outcome;
mod warning;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, MAX_START_COL, UnknownSeverity};
pub use finding::RawFinding;
pub use outcome::{ExecutionError, Invocation, LintOutcome, LintResult};
pub use warning::WarningState;

/// Source tag attached to every diagnostic produced from tool output.
pub const DIAGNOSTIC_SOURCE: &str = "actionlint";
