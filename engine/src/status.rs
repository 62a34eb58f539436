//! Document phases, the global warning tracker, the derived status indicator
//! and user-facing notifications.

use flowlint_types::WarningState;
use serde::Serialize;

/// Per-document lint state.
///
/// `Idle → Running → {Idle | Failed | NotInstalled | UnexpectedOutput}`, and
/// every state returns to `Idle` or `Running` on the next trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentPhase {
    #[default]
    Idle,
    Running,
    /// The last run hit an execution error other than a missing binary.
    Failed,
    NotInstalled,
    UnexpectedOutput,
}

/// What the host shows in its always-visible status item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StatusIndicator {
    Idle,
    Running,
    Findings { count: usize },
    Failed,
    BinaryNotFound,
    UnexpectedOutput,
}

impl StatusIndicator {
    /// Derive the indicator. Global tool health beats anything per-document.
    #[must_use]
    pub fn derive(warning: WarningState, active: Option<(DocumentPhase, usize)>) -> Self {
        match warning {
            WarningState::BinaryNotFound => return Self::BinaryNotFound,
            WarningState::UnexpectedOutput => return Self::UnexpectedOutput,
            WarningState::None => {}
        }
        match active {
            Some((DocumentPhase::Running, _)) => Self::Running,
            Some((DocumentPhase::Failed, _)) => Self::Failed,
            Some((_, count)) if count > 0 => Self::Findings { count },
            _ => Self::Idle,
        }
    }

    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Idle => "actionlint: ok".to_string(),
            Self::Running => "actionlint: running".to_string(),
            Self::Findings { count: 1 } => "actionlint: 1 problem".to_string(),
            Self::Findings { count } => format!("actionlint: {count} problems"),
            Self::Failed => "actionlint: error".to_string(),
            Self::BinaryNotFound => "actionlint: not installed".to_string(),
            Self::UnexpectedOutput => "actionlint: unexpected output".to_string(),
        }
    }
}

/// Tracks [`WarningState`] transitions so repeated failures notify once.
#[derive(Debug, Default)]
pub struct WarningTracker {
    state: WarningState,
}

impl WarningTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> WarningState {
        self.state
    }

    /// Move to `next`. Returns true when this enters a warning state the
    /// tracker was not already in.
    pub fn transition(&mut self, next: WarningState) -> bool {
        let entered = !next.is_none() && next != self.state;
        if next != self.state {
            tracing::info!(from = self.state.label(), to = next.label(), "Warning state changed");
        }
        self.state = next;
        entered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
    Warning,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    level: NoticeLevel,
    message: String,
    /// Whether the host should offer to reveal the log output.
    show_output: bool,
}

impl Notification {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            show_output: true,
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            show_output: true,
        }
    }

    #[must_use]
    pub fn level(&self) -> NoticeLevel {
        self.level
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn show_output(&self) -> bool {
        self.show_output
    }
}
