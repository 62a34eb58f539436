//! JSON-RPC message shapes for the server side of the protocol.

use std::path::{Path, PathBuf};

use flowlint_engine::{NoticeLevel, Notification as Notice, StatusIndicator};
use flowlint_types::Diagnostic;
use serde::{Deserialize, Serialize};

pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
pub(crate) const INVALID_PARAMS: i64 = -32602;
pub(crate) const SERVER_NOT_INITIALIZED: i64 = -32002;
pub(crate) const INVALID_REQUEST: i64 = -32600;

/// Custom notification: the editor's focused document changed.
pub const ACTIVE_DOCUMENT_METHOD: &str = "flowlint/didChangeActiveDocument";
/// Custom notification: the status indicator changed.
pub const STATUS_METHOD: &str = "flowlint/status";
/// Custom notification: the user asked to see the server's log output.
pub const SHOW_OUTPUT_METHOD: &str = "flowlint/showOutput";

/// Title of the action offered with every notice.
pub(crate) const SHOW_OUTPUT_ACTION: &str = "Show Output";
/// Ids of our `window/showMessageRequest`s, so their replies can be told apart.
const SHOW_MESSAGE_ID_PREFIX: &str = "flowlint/showMessage/";

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Response {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseError {
    pub code: i64,
    pub message: String,
}

impl Response {
    pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A request from the server to the client.
#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub method: &'static str,
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(id: serde_json::Value, method: &'static str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A frame from the client, classified.
#[derive(Debug)]
pub(crate) enum Incoming {
    Request {
        id: serde_json::Value,
        method: String,
        params: serde_json::Value,
    },
    Notification {
        method: String,
        params: serde_json::Value,
    },
    /// A reply to a request we sent. Errors carry a null result.
    Response {
        id: serde_json::Value,
        result: serde_json::Value,
    },
}

pub(crate) fn parse_incoming(frame: &serde_json::Value) -> Option<Incoming> {
    let id = frame.get("id").filter(|id| !id.is_null());
    let method = frame
        .get("method")
        .and_then(serde_json::Value::as_str)
        .map(String::from);
    let params = frame
        .get("params")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    match (id, method) {
        (Some(id), Some(method)) => Some(Incoming::Request {
            id: id.clone(),
            method,
            params,
        }),
        (None, Some(method)) => Some(Incoming::Notification { method, params }),
        (Some(id), None) if frame.get("result").is_some() || frame.get("error").is_some() => {
            Some(Incoming::Response {
                id: id.clone(),
                result: frame
                    .get("result")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            })
        }
        _ => None,
    }
}

pub(crate) fn initialize_result() -> serde_json::Value {
    serde_json::json!({
        "capabilities": {
            "textDocumentSync": {
                "openClose": true,
                "change": 1,
                "save": { "includeText": true }
            },
            "workspace": {
                "workspaceFolders": {
                    "supported": true,
                    "changeNotifications": true
                }
            }
        },
        "serverInfo": {
            "name": "flowlint",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

// ---- client → server params ----

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct InitializeParams {
    pub root_uri: Option<String>,
    pub workspace_folders: Option<Vec<WorkspaceFolder>>,
    pub initialization_options: Option<InitializationOptions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct InitializationOptions {
    /// Whether the editor trusts the workspace.
    pub trusted: bool,
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorkspaceFolder {
    pub uri: String,
}

impl InitializeParams {
    /// Workspace folder paths, falling back to `rootUri`.
    pub fn workspace_roots(&self) -> Vec<PathBuf> {
        match &self.workspace_folders {
            Some(folders) if !folders.is_empty() => folders
                .iter()
                .filter_map(|folder| file_uri_to_path(&folder.uri))
                .collect(),
            _ => self
                .root_uri
                .as_deref()
                .and_then(file_uri_to_path)
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionedDocument {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentId {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentChange {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidChangeParams {
    pub text_document: VersionedDocument,
    pub content_changes: Vec<ContentChange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidSaveParams {
    pub text_document: DocumentId,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidCloseParams {
    pub text_document: DocumentId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DidChangeConfigurationParams {
    pub settings: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DidChangeWorkspaceFoldersParams {
    pub event: WorkspaceFoldersChange,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WorkspaceFoldersChange {
    pub added: Vec<WorkspaceFolder>,
    pub removed: Vec<WorkspaceFolder>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ActiveDocumentParams {
    pub uri: Option<String>,
}

// ---- server → client params ----

pub(crate) fn lsp_diagnostic(diagnostic: &Diagnostic) -> serde_json::Value {
    serde_json::json!({
        "range": {
            "start": { "line": diagnostic.line(), "character": diagnostic.start_col() },
            "end": { "line": diagnostic.line(), "character": diagnostic.end_col() }
        },
        "severity": diagnostic.severity().to_lsp(),
        "source": diagnostic.source(),
        "code": diagnostic.code(),
        "message": diagnostic.message()
    })
}

pub(crate) fn publish_diagnostics_params(
    uri: &str,
    version: Option<i32>,
    diagnostics: &[Diagnostic],
) -> serde_json::Value {
    let items: Vec<serde_json::Value> = diagnostics.iter().map(lsp_diagnostic).collect();
    let mut params = serde_json::json!({ "uri": uri, "diagnostics": items });
    if let Some(version) = version {
        params["version"] = version.into();
    }
    params
}

/// Params for `window/showMessage`, or for `window/showMessageRequest` with a
/// "Show Output" action when the notice offers one.
pub(crate) fn show_message_params(notice: &Notice) -> serde_json::Value {
    let kind = match notice.level() {
        NoticeLevel::Error => 1,
        NoticeLevel::Warning => 2,
    };
    let mut params = serde_json::json!({ "type": kind, "message": notice.message() });
    if notice.show_output() {
        params["actions"] = serde_json::json!([{ "title": SHOW_OUTPUT_ACTION }]);
    }
    params
}

pub(crate) fn show_message_request_id(seq: u64) -> serde_json::Value {
    format!("{SHOW_MESSAGE_ID_PREFIX}{seq}").into()
}

/// Whether a reply is the user picking "Show Output" on one of our notices.
/// Dismissal replies with a null result.
pub(crate) fn is_show_output_choice(id: &serde_json::Value, result: &serde_json::Value) -> bool {
    id.as_str()
        .is_some_and(|id| id.starts_with(SHOW_MESSAGE_ID_PREFIX))
        && result.get("title").and_then(serde_json::Value::as_str) == Some(SHOW_OUTPUT_ACTION)
}

pub(crate) fn status_params(status: StatusIndicator) -> serde_json::Value {
    let mut params = serde_json::to_value(status).unwrap_or_else(|_| serde_json::json!({}));
    params["label"] = status.label().into();
    params
}

/// Absolute paths only.
pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}
