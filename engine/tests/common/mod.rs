//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowlint_config::LintSettings;
use flowlint_engine::{EngineConfig, EngineEvent, SpawnedEngine, TextDocument, spawn_engine};
use flowlint_runner::{LintFut, LintRequest, LintRunner};
use flowlint_types::{LintOutcome, LintResult, RawFinding};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

pub const ROOT: &str = "/repo";

/// Generous upper bound on virtual time spent waiting for anything.
const WAIT: Duration = Duration::from_secs(60);

pub fn workflow_uri(name: &str) -> Url {
    Url::from_file_path(format!("{ROOT}/.github/workflows/{name}")).unwrap()
}

pub fn workflow(name: &str, text: &str) -> TextDocument {
    TextDocument::new(workflow_uri(name), "yaml", 1, text)
}

pub fn engine(runner: Arc<dyn LintRunner>, settings: LintSettings) -> SpawnedEngine {
    spawn_engine(
        runner,
        EngineConfig {
            settings: Arc::new(settings),
            workspace_roots: vec![PathBuf::from(ROOT)],
            open_documents: Vec::new(),
        },
    )
}

pub fn findings(count: usize) -> LintResult {
    let found = (1..=count)
        .map(|i| RawFinding::new(&format!("finding {i}"), i as i64, 1, 4, "expression"))
        .collect();
    LintResult::new(LintOutcome::Success(found))
}

pub fn clean() -> LintResult {
    LintResult::new(LintOutcome::Success(Vec::new()))
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an engine event")
        .expect("engine event channel closed")
}

/// Collect events up to and including the next `RunSettled` for `uri`.
pub async fn until_settled(
    events: &mut mpsc::UnboundedReceiver<EngineEvent>,
    uri: &Url,
) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(&event, EngineEvent::RunSettled { uri: settled } if settled == uri);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Collect events up to and including the first one matching `pred`.
pub async fn until<F>(events: &mut mpsc::UnboundedReceiver<EngineEvent>, pred: F) -> Vec<EngineEvent>
where
    F: Fn(&EngineEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Diagnostics counts published for `uri`, in order.
pub fn published_counts(events: &[EngineEvent], uri: &Url) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::PublishDiagnostics {
                uri: published,
                diagnostics,
                ..
            } if published == uri => Some(diagnostics.len()),
            _ => None,
        })
        .collect()
}

pub fn notifications(events: &[EngineEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, EngineEvent::Notify(_)))
        .count()
}

/// A pending run, answered by the test.
pub struct Call {
    pub request: LintRequest,
    pub cancel: CancellationToken,
    reply: oneshot::Sender<LintResult>,
}

impl Call {
    pub fn reply(self, result: LintResult) {
        let _ = self.reply.send(result);
    }

    pub fn document(&self) -> &str {
        self.request.document()
    }
}

/// Runner whose runs finish only when the test replies, in any order.
pub struct ManualRunner {
    calls: mpsc::UnboundedSender<Call>,
}

impl ManualRunner {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { calls }), rx)
    }
}

impl LintRunner for ManualRunner {
    fn execute<'a>(&'a self, request: &'a LintRequest, cancel: CancellationToken) -> LintFut<'a> {
        let (reply, rx) = oneshot::channel();
        let _ = self.calls.send(Call {
            request: request.clone(),
            cancel,
            reply,
        });
        Box::pin(async move { rx.await.unwrap_or_else(|_| LintResult::cancelled()) })
    }
}

pub async fn next_call(calls: &mut mpsc::UnboundedReceiver<Call>) -> Call {
    tokio::time::timeout(WAIT, calls.recv())
        .await
        .expect("timed out waiting for a lint run")
        .expect("runner dropped")
}

/// Runner that answers immediately and records every request.
pub struct FnRunner<F> {
    respond: F,
    calls: AtomicUsize,
    requests: Mutex<Vec<LintRequest>>,
}

impl<F> FnRunner<F>
where
    F: Fn(usize, &LintRequest) -> LintResult + Send + Sync + 'static,
{
    /// `respond` gets the 0-based call index and the request.
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LintRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl<F> LintRunner for FnRunner<F>
where
    F: Fn(usize, &LintRequest) -> LintResult + Send + Sync + 'static,
{
    fn execute<'a>(&'a self, request: &'a LintRequest, _cancel: CancellationToken) -> LintFut<'a> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let result = (self.respond)(index, request);
        Box::pin(async move { result })
    }
}
