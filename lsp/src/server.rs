//! Server loop: LSP messages in, engine commands out, engine events back out
//! as notifications.
//!
//! Message handlers only translate; every lint decision lives in the engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use flowlint_config::{
    ConfigSources, SettingsLayer, layer_from_json, load_layer, workspace_config_path,
};
use flowlint_engine::{EngineConfig, EngineEvent, EngineHandle, TextDocument, spawn_engine};
use flowlint_runner::LintRunner;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::codec::{CodecError, FrameReader, FrameWriter};
use crate::protocol::{
    ACTIVE_DOCUMENT_METHOD, ActiveDocumentParams, DidChangeConfigurationParams, DidChangeParams,
    DidChangeWorkspaceFoldersParams, DidCloseParams, DidOpenParams, DidSaveParams, INVALID_PARAMS,
    INVALID_REQUEST, Incoming, InitializeParams, METHOD_NOT_FOUND, Notification, Request,
    Response, SERVER_NOT_INITIALIZED, SHOW_OUTPUT_METHOD, STATUS_METHOD, file_uri_to_path,
    initialize_result, is_show_output_choice, parse_incoming, publish_diagnostics_params,
    show_message_params, show_message_request_id, status_params,
};

const WRITER_CHANNEL_CAPACITY: usize = 64;

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// User-level config file. `None` skips that layer.
    pub user_config: Option<PathBuf>,
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    /// `exit` after `shutdown`.
    Clean,
    /// `exit` without `shutdown`, or the client went away.
    Abrupt,
}

impl ServerExit {
    /// Process exit code the protocol asks for.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Abrupt => 1,
        }
    }
}

/// Serve one client over `input`/`output` until `exit` or end of input.
pub async fn serve<R, W>(
    input: R,
    output: W,
    runner: Arc<dyn LintRunner>,
    options: ServeOptions,
) -> Result<ServerExit>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
    let writer_handle = tokio::spawn(async move {
        let mut writer = FrameWriter::new(output);
        while let Some(cmd) = writer_rx.recv().await {
            match cmd {
                WriterCommand::Send(frame) => {
                    if let Err(e) = writer.write_frame(&frame).await {
                        tracing::warn!("LSP write error: {e}");
                        break;
                    }
                }
                WriterCommand::Shutdown => break,
            }
        }
    });

    let mut server = Server::new(runner, options, writer_tx.clone());
    let mut reader = FrameReader::new(input);
    let outcome = loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                if let Some(exit) = server.dispatch(&frame).await {
                    break Ok(exit);
                }
            }
            Ok(None) => {
                tracing::info!("Client closed the input stream");
                break Ok(ServerExit::Abrupt);
            }
            // The body was consumed, so the stream is still in sync.
            Err(CodecError::Json(e)) => {
                tracing::warn!("Ignoring unparsable frame: {e}");
            }
            Err(e) => break Err(e).context("reading from the client"),
        }
    };

    server.stop().await;
    let _ = writer_tx.send(WriterCommand::Shutdown).await;
    let _ = writer_handle.await;
    tracing::info!(exit = ?outcome.as_ref().ok(), "Language server stopped");
    outcome
}

struct Session {
    engine: EngineHandle,
    task: JoinHandle<()>,
    pump: JoinHandle<()>,
    sources: ConfigSources,
    trusted: bool,
    roots: Vec<PathBuf>,
}

struct Server {
    runner: Arc<dyn LintRunner>,
    options: ServeOptions,
    out: mpsc::Sender<WriterCommand>,
    session: Option<Session>,
    shutdown_requested: bool,
}

impl Server {
    fn new(
        runner: Arc<dyn LintRunner>,
        options: ServeOptions,
        out: mpsc::Sender<WriterCommand>,
    ) -> Self {
        Self {
            runner,
            options,
            out,
            session: None,
            shutdown_requested: false,
        }
    }

    async fn dispatch(&mut self, frame: &serde_json::Value) -> Option<ServerExit> {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame");
            return None;
        };

        match incoming {
            Incoming::Request { id, method, params } => {
                let response = self.handle_request(id, &method, params).await;
                self.send(&response).await;
                None
            }
            Incoming::Notification { method, params } => {
                self.handle_notification(&method, params).await
            }
            Incoming::Response { id, result } => {
                if is_show_output_choice(&id, &result) {
                    self.send(&Notification::new(SHOW_OUTPUT_METHOD, None)).await;
                }
                None
            }
        }
    }

    async fn handle_request(
        &mut self,
        id: serde_json::Value,
        method: &str,
        params: serde_json::Value,
    ) -> Response {
        tracing::debug!(method, "Request");
        if self.shutdown_requested {
            return Response::error(id, INVALID_REQUEST, "server is shutting down");
        }

        match method {
            "initialize" if self.session.is_some() => {
                Response::error(id, INVALID_REQUEST, "server already initialized")
            }
            "initialize" => {
                let parsed = if params.is_null() {
                    Ok(InitializeParams::default())
                } else {
                    serde_json::from_value::<InitializeParams>(params)
                };
                match parsed {
                    Ok(params) => {
                        self.initialize(params);
                        Response::ok(id, initialize_result())
                    }
                    Err(e) => Response::error(id, INVALID_PARAMS, e.to_string()),
                }
            }
            _ if self.session.is_none() => {
                Response::error(id, SERVER_NOT_INITIALIZED, "server not initialized")
            }
            "shutdown" => {
                self.shutdown_requested = true;
                self.stop().await;
                Response::ok(id, serde_json::Value::Null)
            }
            _ => Response::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}")),
        }
    }

    async fn handle_notification(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Option<ServerExit> {
        if method == "exit" {
            return Some(if self.shutdown_requested {
                ServerExit::Clean
            } else {
                ServerExit::Abrupt
            });
        }
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(method, "Ignoring notification outside a session");
            return None;
        };

        match method {
            "initialized" => tracing::info!("Client initialized"),
            "textDocument/didOpen" => {
                let params: DidOpenParams = parse_params(method, params)?;
                let item = params.text_document;
                let uri = parse_uri(&item.uri)?;
                session
                    .engine
                    .open(TextDocument::new(uri, item.language_id, item.version, item.text))
                    .await;
            }
            "textDocument/didChange" => {
                let DidChangeParams {
                    text_document,
                    mut content_changes,
                } = parse_params(method, params)?;
                let uri = parse_uri(&text_document.uri)?;
                // Full sync: the last change holds the whole text.
                let text = content_changes.pop()?.text;
                session.engine.change(uri, text_document.version, text).await;
            }
            "textDocument/didSave" => {
                let params: DidSaveParams = parse_params(method, params)?;
                let uri = parse_uri(&params.text_document.uri)?;
                session.engine.save(uri, params.text).await;
            }
            "textDocument/didClose" => {
                let params: DidCloseParams = parse_params(method, params)?;
                let uri = parse_uri(&params.text_document.uri)?;
                session.engine.close(uri).await;
            }
            "workspace/didChangeConfiguration" => {
                let params: DidChangeConfigurationParams = parse_params(method, params)?;
                session.sources.client = client_layer(&params.settings);
                session.apply_settings().await;
            }
            "workspace/didChangeWorkspaceFolders" => {
                let params: DidChangeWorkspaceFoldersParams = parse_params(method, params)?;
                let removed: Vec<PathBuf> = params
                    .event
                    .removed
                    .iter()
                    .filter_map(|folder| file_uri_to_path(&folder.uri))
                    .collect();
                session.roots.retain(|root| !removed.contains(root));
                for path in params
                    .event
                    .added
                    .iter()
                    .filter_map(|folder| file_uri_to_path(&folder.uri))
                {
                    if !session.roots.contains(&path) {
                        session.roots.push(path);
                    }
                }
                session.engine.set_workspace_roots(session.roots.clone()).await;

                let workspace = workspace_layer(&session.roots);
                if workspace != session.sources.workspace {
                    session.sources.workspace = workspace;
                    session.apply_settings().await;
                }
            }
            ACTIVE_DOCUMENT_METHOD => {
                let params: ActiveDocumentParams = parse_params(method, params)?;
                let uri = match params.uri {
                    Some(raw) => Some(parse_uri(&raw)?),
                    None => None,
                };
                session.engine.set_active(uri).await;
            }
            _ => tracing::trace!(method, "Ignoring notification"),
        }
        None
    }

    fn initialize(&mut self, params: InitializeParams) {
        let roots = params.workspace_roots();
        let options = params.initialization_options.unwrap_or_default();

        let sources = ConfigSources {
            user_file: self
                .options
                .user_config
                .as_deref()
                .and_then(|path| load_layer(path).ok().flatten()),
            client: options.settings.as_ref().and_then(client_layer),
            workspace: workspace_layer(&roots),
        };
        let resolved = sources.resolve(options.trusted);
        tracing::info!(
            trusted = options.trusted,
            roots = roots.len(),
            enabled = resolved.settings.enabled,
            executable = %resolved.settings.executable,
            "Initializing"
        );

        let engine = spawn_engine(
            Arc::clone(&self.runner),
            EngineConfig {
                settings: Arc::new(resolved.settings),
                workspace_roots: roots.clone(),
                open_documents: Vec::new(),
            },
        );
        let pump = tokio::spawn(pump_events(engine.events, self.out.clone()));

        self.session = Some(Session {
            engine: engine.handle,
            task: engine.task,
            pump,
            sources,
            trusted: options.trusted,
            roots,
        });
    }

    /// Stop the engine and wait for its last events to be queued for writing.
    async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.engine.shutdown().await;
        if let Err(e) = session.task.await {
            tracing::error!("Lint engine task failed: {e}");
        }
        let _ = session.pump.await;
    }

    async fn send(&self, message: &impl Serialize) {
        match serde_json::to_value(message) {
            Ok(frame) => {
                let _ = self.out.send(WriterCommand::Send(frame)).await;
            }
            Err(e) => tracing::error!("Failed to serialize message: {e}"),
        }
    }
}

impl Session {
    async fn apply_settings(&self) {
        let resolved = self.sources.resolve(self.trusted);
        self.engine.update_settings(Arc::new(resolved.settings)).await;
    }
}

/// Forward engine events to the client until the engine stops.
async fn pump_events(
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    out: mpsc::Sender<WriterCommand>,
) {
    let mut message_requests = 0u64;
    while let Some(event) = events.recv().await {
        let frame = match event {
            EngineEvent::PublishDiagnostics {
                uri,
                version,
                diagnostics,
            } => serde_json::to_value(Notification::new(
                "textDocument/publishDiagnostics",
                Some(publish_diagnostics_params(uri.as_str(), version, &diagnostics)),
            )),
            EngineEvent::Status(status) => serde_json::to_value(Notification::new(
                STATUS_METHOD,
                Some(status_params(status)),
            )),
            EngineEvent::Notify(notice) if notice.show_output() => {
                message_requests += 1;
                serde_json::to_value(Request::new(
                    show_message_request_id(message_requests),
                    "window/showMessageRequest",
                    show_message_params(&notice),
                ))
            }
            EngineEvent::Notify(notice) => serde_json::to_value(Notification::new(
                "window/showMessage",
                Some(show_message_params(&notice)),
            )),
            EngineEvent::RunSettled { .. } => continue,
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to serialize outgoing message: {e}");
                continue;
            }
        };
        if out.send(WriterCommand::Send(frame)).await.is_err() {
            break;
        }
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: serde_json::Value) -> Option<T> {
    match serde_json::from_value(params) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(method, "Ignoring malformed params: {e}");
            None
        }
    }
}

fn parse_uri(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(uri) => Some(uri),
        Err(e) => {
            tracing::warn!(uri = raw, "Ignoring invalid document URI: {e}");
            None
        }
    }
}

fn client_layer(settings: &serde_json::Value) -> Option<SettingsLayer> {
    match layer_from_json(settings) {
        Ok(layer) => Some(layer),
        Err(e) => {
            tracing::warn!("Ignoring client settings: {e}");
            None
        }
    }
}

/// The first root's `.github/flowlint.toml`, if present and readable.
fn workspace_layer(roots: &[PathBuf]) -> Option<SettingsLayer> {
    let root = roots.first()?;
    load_layer(&workspace_config_path(root)).ok().flatten()
}
