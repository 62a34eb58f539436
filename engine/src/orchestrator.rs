//! Lint Orchestrator.
//!
//! One task owns every piece of lint state (open documents, their task slots
//! and debouncers, the diagnostics store, the global warning state) and
//! mutates it only from its own loop. Hosts talk to it through an
//! [`EngineHandle`] and observe it through [`EngineEvent`]s.
//!
//! Runs execute on spawned tasks and report back over an internal channel
//! carrying their slot [`Ticket`]; the result is applied only if the ticket is
//! still current when the loop receives it. Different documents never share
//! a slot, so their runs complete and apply independently.

use std::any::Any;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flowlint_config::LintSettings;
use flowlint_runner::{LintRequest, LintRunner};
use flowlint_types::{Diagnostic, LintOutcome, LintResult, WarningState};
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::debounce::Debouncer;
use crate::document::{TextDocument, WorkflowFilter, WorkspaceRoots};
use crate::mapper::to_diagnostics;
use crate::slot::{SlotOutcome, TaskSlot, Ticket};
use crate::status::{DocumentPhase, Notification, StatusIndicator, WarningTracker};
use crate::store::DiagnosticsStore;

/// Channel capacity for host → engine commands.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Inputs from the host. Handlers in the host translate editor events into
/// these and do nothing else.
#[derive(Debug)]
pub enum EngineCommand {
    Open(TextDocument),
    Change {
        uri: Url,
        version: i32,
        text: String,
    },
    /// `text` is the saved content when the host includes it.
    Save {
        uri: Url,
        text: Option<String>,
    },
    Close {
        uri: Url,
    },
    SetActive {
        uri: Option<Url>,
    },
    UpdateSettings(Arc<LintSettings>),
    SetWorkspaceRoots(Vec<PathBuf>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Replace-all diagnostics for one document.
    PublishDiagnostics {
        uri: Url,
        version: Option<i32>,
        diagnostics: Vec<Diagnostic>,
    },
    Status(StatusIndicator),
    Notify(Notification),
    /// A run for `uri` finished and was not superseded. Always the last event
    /// that run produces.
    RunSettled { uri: Url },
}

/// Initial state for a new engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub settings: Arc<LintSettings>,
    pub workspace_roots: Vec<PathBuf>,
    /// Documents already open; each qualifying one is linted once at startup.
    pub open_documents: Vec<TextDocument>,
}

/// Cloneable sender side of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Returns false once the engine has shut down.
    pub async fn send(&self, command: EngineCommand) -> bool {
        self.tx.send(command).await.is_ok()
    }

    pub async fn open(&self, document: TextDocument) -> bool {
        self.send(EngineCommand::Open(document)).await
    }

    pub async fn change(&self, uri: Url, version: i32, text: String) -> bool {
        self.send(EngineCommand::Change { uri, version, text }).await
    }

    pub async fn save(&self, uri: Url, text: Option<String>) -> bool {
        self.send(EngineCommand::Save { uri, text }).await
    }

    pub async fn close(&self, uri: Url) -> bool {
        self.send(EngineCommand::Close { uri }).await
    }

    pub async fn set_active(&self, uri: Option<Url>) -> bool {
        self.send(EngineCommand::SetActive { uri }).await
    }

    pub async fn update_settings(&self, settings: Arc<LintSettings>) -> bool {
        self.send(EngineCommand::UpdateSettings(settings)).await
    }

    pub async fn set_workspace_roots(&self, roots: Vec<PathBuf>) -> bool {
        self.send(EngineCommand::SetWorkspaceRoots(roots)).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(EngineCommand::Shutdown).await
    }
}

pub struct SpawnedEngine {
    pub handle: EngineHandle,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    pub task: JoinHandle<()>,
}

/// Start an engine on the current tokio runtime.
pub fn spawn_engine(runner: Arc<dyn LintRunner>, config: EngineConfig) -> SpawnedEngine {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();

    let engine = LintEngine {
        runner,
        settings: config.settings,
        workspace: WorkspaceRoots::new(config.workspace_roots),
        filter: WorkflowFilter::new(),
        documents: HashMap::new(),
        diagnostics: DiagnosticsStore::new(),
        warning: WarningTracker::new(),
        active: None,
        status: None,
        disposed: false,
        events: event_tx,
        internal_tx,
    };
    let task = tokio::spawn(engine.run(command_rx, internal_rx, config.open_documents));

    SpawnedEngine {
        handle: EngineHandle { tx: command_tx },
        events: event_rx,
        task,
    }
}

enum Internal {
    DebounceElapsed { uri: Url, ticket: Ticket },
    RunFinished(Box<RunFinished>),
}

struct RunFinished {
    uri: Url,
    ticket: Ticket,
    version: i32,
    request: LintRequest,
    /// `Err` carries a panic message from the runner call path.
    result: Result<LintResult, String>,
    elapsed: Duration,
}

struct OpenDocument {
    version: i32,
    text: Arc<str>,
    qualifies: bool,
    phase: DocumentPhase,
    slot: TaskSlot,
    debounce: Debouncer,
}

impl OpenDocument {
    fn new(document: TextDocument, qualifies: bool) -> Self {
        Self {
            version: document.version,
            text: Arc::from(document.text),
            qualifies,
            phase: DocumentPhase::Idle,
            slot: TaskSlot::new(),
            debounce: Debouncer::new(),
        }
    }

    fn cancel(&self) {
        self.debounce.cancel();
        self.slot.cancel();
    }
}

struct LintEngine {
    runner: Arc<dyn LintRunner>,
    settings: Arc<LintSettings>,
    workspace: WorkspaceRoots,
    filter: WorkflowFilter,
    documents: HashMap<Url, OpenDocument>,
    diagnostics: DiagnosticsStore,
    warning: WarningTracker,
    active: Option<Url>,
    /// Last indicator sent, to suppress duplicates.
    status: Option<StatusIndicator>,
    disposed: bool,
    events: mpsc::UnboundedSender<EngineEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl LintEngine {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        open_documents: Vec<TextDocument>,
    ) {
        for document in open_documents {
            self.open(document);
        }
        self.refresh_status();

        loop {
            tokio::select! {
                Some(message) = internal.recv() => self.handle_internal(message),
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
            }
        }

        self.dispose();
    }

    fn handle_command(&mut self, command: EngineCommand) -> ControlFlow<()> {
        match command {
            EngineCommand::Open(document) => self.open(document),
            EngineCommand::Change { uri, version, text } => self.change(&uri, version, text),
            EngineCommand::Save { uri, text } => self.save(&uri, text),
            EngineCommand::Close { uri } => self.close(&uri),
            EngineCommand::SetActive { uri } => {
                tracing::debug!(uri = ?uri.as_ref().map(Url::as_str), "Active document changed");
                self.active = uri;
                self.refresh_status();
            }
            EngineCommand::UpdateSettings(settings) => self.update_settings(settings),
            EngineCommand::SetWorkspaceRoots(roots) => {
                tracing::debug!(count = roots.len(), "Workspace roots changed");
                self.workspace.set(roots);
            }
            EngineCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn handle_internal(&mut self, message: Internal) {
        if self.disposed {
            return;
        }
        match message {
            Internal::DebounceElapsed { uri, ticket } => {
                let Some(document) = self.documents.get(&uri) else {
                    return;
                };
                if document.debounce.fire(&ticket) {
                    self.lint(&uri);
                } else {
                    tracing::debug!(uri = %uri, "Dropping superseded debounce");
                }
            }
            Internal::RunFinished(run) => self.finish(*run),
        }
    }

    fn open(&mut self, document: TextDocument) {
        let uri = document.uri.clone();
        let qualifies = self.filter.qualifies(&uri, &document.language_id);
        if let Some(previous) = self.documents.remove(&uri) {
            previous.cancel();
        }
        tracing::debug!(uri = %uri, qualifies, "Document opened");
        self.documents
            .insert(uri.clone(), OpenDocument::new(document, qualifies));
        if qualifies {
            self.lint(&uri);
        }
    }

    fn change(&mut self, uri: &Url, version: i32, text: String) {
        let Some(document) = self.documents.get_mut(uri) else {
            tracing::debug!(uri = %uri, "Change for a document that is not open");
            return;
        };
        document.version = version;
        document.text = Arc::from(text);
        if !document.qualifies || !self.settings.lints_on_type() {
            return;
        }

        let owned = uri.clone();
        document
            .debounce
            .schedule(self.settings.debounce, &self.internal_tx, move |ticket| {
                Internal::DebounceElapsed { uri: owned, ticket }
            });
        tracing::debug!(
            uri = %uri,
            delay_ms = self.settings.debounce.as_millis() as u64,
            "Lint scheduled"
        );
    }

    fn save(&mut self, uri: &Url, text: Option<String>) {
        let Some(document) = self.documents.get_mut(uri) else {
            return;
        };
        if let Some(text) = text {
            document.text = Arc::from(text);
        }
        document.debounce.cancel();
        if document.qualifies {
            self.lint(uri);
        }
    }

    fn close(&mut self, uri: &Url) {
        let Some(document) = self.documents.remove(uri) else {
            return;
        };
        document.cancel();
        tracing::debug!(uri = %uri, "Document closed");
        if document.qualifies {
            self.diagnostics.remove(uri);
            self.emit(EngineEvent::PublishDiagnostics {
                uri: uri.clone(),
                version: None,
                diagnostics: Vec::new(),
            });
        }
        self.refresh_status();
    }

    fn update_settings(&mut self, settings: Arc<LintSettings>) {
        tracing::info!(
            enabled = settings.enabled,
            trusted = settings.trusted,
            "Settings changed"
        );
        self.settings = settings;

        let mut uris: Vec<Url> = self
            .documents
            .iter()
            .filter(|(_, document)| document.qualifies)
            .map(|(uri, _)| uri.clone())
            .collect();
        uris.sort();
        for uri in uris {
            if let Some(document) = self.documents.get(&uri) {
                document.debounce.cancel();
            }
            self.lint(&uri);
        }
    }

    /// The run procedure: start a run in the document's slot.
    fn lint(&mut self, uri: &Url) {
        let settings = Arc::clone(&self.settings);
        let Some(document) = self.documents.get_mut(uri) else {
            return;
        };
        if !document.qualifies {
            return;
        }

        if !settings.enabled {
            document.slot.cancel();
            document.phase = DocumentPhase::Idle;
            self.diagnostics.remove(uri);
            self.emit(EngineEvent::PublishDiagnostics {
                uri: uri.clone(),
                version: None,
                diagnostics: Vec::new(),
            });
            self.refresh_status();
            self.emit(EngineEvent::RunSettled { uri: uri.clone() });
            return;
        }

        let Ok(path) = uri.to_file_path() else {
            return;
        };
        let location = self.workspace.locate(&path);
        let request = LintRequest::new(
            uri.as_str(),
            Arc::clone(&document.text),
            location.relative_path,
            location.working_dir,
            settings,
        );
        let ticket = document.slot.begin();
        let version = document.version;
        document.phase = DocumentPhase::Running;
        tracing::debug!(
            uri = %uri,
            version,
            relative_path = request.relative_path(),
            "Lint started"
        );

        let runner = Arc::clone(&self.runner);
        let tx = self.internal_tx.clone();
        let uri = uri.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let token = ticket.token();
            let result = AssertUnwindSafe(async { runner.execute(&request, token).await })
                .catch_unwind()
                .await
                .map_err(panic_message);
            let _ = tx.send(Internal::RunFinished(Box::new(RunFinished {
                uri,
                ticket,
                version,
                request,
                result,
                elapsed: started.elapsed(),
            })));
        });

        self.refresh_status();
    }

    fn finish(&mut self, run: RunFinished) {
        let RunFinished {
            uri,
            ticket,
            version,
            request,
            result,
            elapsed,
        } = run;
        let Some(document) = self.documents.get(&uri) else {
            tracing::debug!(uri = %uri, "Dropping result for a closed document");
            return;
        };
        let result = match document.slot.settle(&ticket, result) {
            SlotOutcome::Current(result) => result,
            SlotOutcome::Stale => {
                tracing::debug!(uri = %uri, "Dropping superseded lint result");
                return;
            }
        };

        let phase = match result {
            Ok(result) => self.apply(&uri, version, &request, result, elapsed),
            Err(panic) => {
                tracing::error!(uri = %uri, panic = %panic, "Lint run panicked");
                self.notify(Notification::error(format!(
                    "flowlint hit an internal error while linting {}: {panic}",
                    request.relative_path()
                )));
                DocumentPhase::Failed
            }
        };
        if let Some(document) = self.documents.get_mut(&uri) {
            document.phase = phase;
        }

        self.refresh_status();
        self.emit(EngineEvent::RunSettled { uri });
    }

    fn apply(
        &mut self,
        uri: &Url,
        version: i32,
        request: &LintRequest,
        result: LintResult,
        elapsed: Duration,
    ) -> DocumentPhase {
        let elapsed_ms = elapsed.as_millis() as u64;
        if let Some(invocation) = result.invocation() {
            tracing::debug!(
                uri = %uri,
                program = %invocation.program,
                args = ?invocation.args,
                exit_code = ?invocation.exit_code,
                stderr = %invocation.stderr,
                "actionlint invocation"
            );
        }

        match result.into_outcome() {
            LintOutcome::Success(findings) => {
                self.warning.transition(WarningState::None);
                let diagnostics = to_diagnostics(
                    &findings,
                    &request.settings().rule_severity,
                    Some(request.text()),
                );
                tracing::info!(uri = %uri, count = diagnostics.len(), elapsed_ms, "Lint finished");
                self.publish(uri, version, diagnostics);
                DocumentPhase::Idle
            }
            LintOutcome::Warning(message) => {
                tracing::warn!(uri = %uri, elapsed_ms, "{message}");
                self.publish(uri, version, Vec::new());
                if self.warning.transition(WarningState::UnexpectedOutput) {
                    self.notify(Notification::warning(message));
                }
                DocumentPhase::UnexpectedOutput
            }
            LintOutcome::ExecutionError(error) if error.is_binary_not_found() => {
                tracing::error!(uri = %uri, "{error}");
                if self.warning.transition(WarningState::BinaryNotFound) {
                    self.notify(Notification::error(error.to_string()));
                }
                DocumentPhase::NotInstalled
            }
            LintOutcome::ExecutionError(error) => {
                tracing::error!(uri = %uri, elapsed_ms, "{error}");
                self.notify(Notification::error(error.to_string()));
                DocumentPhase::Failed
            }
        }
    }

    fn publish(&mut self, uri: &Url, version: i32, diagnostics: Vec<Diagnostic>) {
        self.diagnostics.replace(uri, diagnostics.clone());
        self.emit(EngineEvent::PublishDiagnostics {
            uri: uri.clone(),
            version: Some(version),
            diagnostics,
        });
    }

    fn notify(&self, notification: Notification) {
        self.emit(EngineEvent::Notify(notification));
    }

    fn refresh_status(&mut self) {
        let active = self.active.as_ref().and_then(|uri| {
            self.documents
                .get(uri)
                .map(|document| (document.phase, self.diagnostics.count(uri)))
        });
        let status = StatusIndicator::derive(self.warning.state(), active);
        if self.status != Some(status) {
            self.status = Some(status);
            self.emit(EngineEvent::Status(status));
        }
    }

    fn emit(&self, event: EngineEvent) {
        if self.disposed {
            return;
        }
        let _ = self.events.send(event);
    }

    fn dispose(&mut self) {
        for document in self.documents.values() {
            document.cancel();
        }
        self.documents.clear();
        self.diagnostics.clear();
        self.disposed = true;
        tracing::info!("Lint engine stopped");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
