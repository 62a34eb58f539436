//! Lint engine for flowlint.
//!
//! Decides when workflow documents are linted, keeps at most one run per
//! document authoritative, maps tool findings to editor diagnostics and
//! derives the status a host should display. The tool itself is reached only
//! through [`flowlint_runner::LintRunner`].

mod debounce;
mod document;
mod mapper;
mod orchestrator;
mod slot;
mod status;
mod store;

pub use debounce::Debouncer;
pub use document::{
    Location, TextDocument, WORKFLOW_GLOB, WORKFLOW_LANGUAGE_IDS, WorkflowFilter, WorkspaceRoots,
};
pub use mapper::{kind_severity, map_finding, resolve_script_position, to_diagnostics};
pub use orchestrator::{
    COMMAND_CHANNEL_CAPACITY, EngineCommand, EngineConfig, EngineEvent, EngineHandle,
    SpawnedEngine, spawn_engine,
};
pub use slot::{SlotOutcome, TaskSlot, Ticket};
pub use status::{DocumentPhase, NoticeLevel, Notification, StatusIndicator, WarningTracker};
pub use store::DiagnosticsStore;
