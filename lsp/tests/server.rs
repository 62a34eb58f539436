//! Drives the language server over in-memory pipes.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use flowlint_lsp::codec::{FrameReader, FrameWriter};
use flowlint_lsp::{SHOW_OUTPUT_METHOD, ServeOptions, ServerExit, serve};
use flowlint_runner::{LintFut, LintRequest, LintRunner};
use flowlint_types::{ExecutionError, LintOutcome, LintResult, RawFinding};
use serde_json::{Value, json};
use tokio::io::{DuplexStream, duplex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CI: &str = "file:///repo/.github/workflows/ci.yml";

/// Reports one finding on line 2 for any workflow.
struct OneFinding;

impl LintRunner for OneFinding {
    fn execute<'a>(&'a self, _request: &'a LintRequest, _cancel: CancellationToken) -> LintFut<'a> {
        Box::pin(async {
            LintResult::new(LintOutcome::Success(vec![RawFinding::new(
                "unexpected key \"job\" for \"workflow\" section",
                2,
                1,
                3,
                "syntax-check",
            )]))
        })
    }
}

/// Fails every run the way a crashing actionlint would.
struct ExitsWithTwo;

impl LintRunner for ExitsWithTwo {
    fn execute<'a>(&'a self, _request: &'a LintRequest, _cancel: CancellationToken) -> LintFut<'a> {
        Box::pin(async {
            LintResult::new(LintOutcome::ExecutionError(ExecutionError::ExitCode {
                code: 2,
                output: "flag provided but not defined".to_string(),
            }))
        })
    }
}

struct Client {
    writer: FrameWriter<DuplexStream>,
    reader: FrameReader<DuplexStream>,
    server: JoinHandle<anyhow::Result<ServerExit>>,
}

impl Client {
    fn start() -> Self {
        Self::start_with(Arc::new(OneFinding))
    }

    fn start_with(runner: Arc<dyn LintRunner>) -> Self {
        let (client_out, server_in) = duplex(64 * 1024);
        let (server_out, client_in) = duplex(64 * 1024);
        let server = tokio::spawn(serve(
            server_in,
            server_out,
            runner,
            ServeOptions::default(),
        ));
        Self {
            writer: FrameWriter::new(client_out),
            reader: FrameReader::new(client_in),
            server,
        }
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await
            .unwrap();
        self.until(|frame| frame["id"] == id && frame.get("method").is_none())
            .await
    }

    async fn notify(&mut self, method: &str, params: Value) {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
            .unwrap();
    }

    /// Next frame matching `pred`, skipping the rest.
    async fn until(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(10), self.reader.read_frame())
                .await
                .expect("timed out waiting for the server")
                .unwrap()
                .expect("server closed the stream");
            if pred(&frame) {
                return frame;
            }
        }
    }

    async fn diagnostics_for(&mut self, uri: &str) -> Value {
        self.until(|frame| {
            frame["method"] == "textDocument/publishDiagnostics" && frame["params"]["uri"] == uri
        })
        .await
    }

    async fn initialize(&mut self) {
        let response = self
            .request(
                1,
                "initialize",
                json!({
                    "rootUri": "file:///repo",
                    "initializationOptions": {
                        "trusted": false,
                        "settings": { "flowlint": { "trigger": "save" } }
                    }
                }),
            )
            .await;
        assert_eq!(
            response["result"]["capabilities"]["textDocumentSync"]["change"],
            1
        );
        self.notify("initialized", json!({})).await;
    }
}

#[tokio::test]
async fn workflow_lifecycle_over_the_wire() {
    let mut client = Client::start();
    client.initialize().await;

    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": CI,
                    "languageId": "yaml",
                    "version": 1,
                    "text": "on: push\njob:\n"
                }
            }),
        )
        .await;
    let published = client.diagnostics_for(CI).await;
    let diagnostics = published["params"]["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(published["params"]["version"], 1);
    assert_eq!(
        diagnostics[0]["range"],
        json!({
            "start": { "line": 1, "character": 0 },
            "end": { "line": 1, "character": 3 }
        })
    );
    assert_eq!(diagnostics[0]["source"], "actionlint");
    assert_eq!(diagnostics[0]["code"], "syntax-check");
    assert_eq!(diagnostics[0]["severity"], 1);

    client
        .notify("flowlint/didChangeActiveDocument", json!({ "uri": CI }))
        .await;
    let status = client
        .until(|frame| {
            frame["method"] == "flowlint/status" && frame["params"]["state"] == "findings"
        })
        .await;
    assert_eq!(status["params"]["count"], 1);

    let unknown = client
        .request(2, "textDocument/hover", json!({ "textDocument": { "uri": CI } }))
        .await;
    assert_eq!(unknown["error"]["code"], -32601);

    client
        .notify("textDocument/didClose", json!({ "textDocument": { "uri": CI } }))
        .await;
    let cleared = client.diagnostics_for(CI).await;
    assert_eq!(cleared["params"]["diagnostics"], json!([]));

    let shutdown = client.request(3, "shutdown", Value::Null).await;
    assert!(shutdown.get("error").is_none());
    assert_eq!(shutdown["result"], Value::Null);
    client.notify("exit", Value::Null).await;

    let exit = client.server.await.unwrap().unwrap();
    assert_eq!(exit, ServerExit::Clean);
}

#[tokio::test]
async fn non_workflow_documents_get_no_diagnostics() {
    let mut client = Client::start();
    client.initialize().await;

    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": "file:///repo/.github/dependabot.yml",
                    "languageId": "yaml",
                    "version": 1,
                    "text": "version: 2\n"
                }
            }),
        )
        .await;
    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": CI, "languageId": "yaml", "version": 1, "text": "on: push\n" }
            }),
        )
        .await;

    // Publishes arrive in command order, so the first one must be the workflow's.
    let first = client
        .until(|frame| frame["method"] == "textDocument/publishDiagnostics")
        .await;
    assert_eq!(first["params"]["uri"], CI);
}

#[tokio::test]
async fn failures_offer_the_log_output() {
    let mut client = Client::start_with(Arc::new(ExitsWithTwo));
    client.initialize().await;

    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": CI, "languageId": "yaml", "version": 1, "text": "on: push\n" }
            }),
        )
        .await;
    let prompt = client
        .until(|frame| frame["method"] == "window/showMessageRequest")
        .await;
    assert_eq!(prompt["params"]["type"], 1);
    assert!(
        prompt["params"]["message"]
            .as_str()
            .unwrap()
            .contains("exited with code 2")
    );
    assert_eq!(prompt["params"]["actions"], json!([{ "title": "Show Output" }]));

    client
        .writer
        .write_frame(&json!({
            "jsonrpc": "2.0",
            "id": prompt["id"].clone(),
            "result": { "title": "Show Output" }
        }))
        .await
        .unwrap();
    let reveal = client
        .until(|frame| frame["method"] == SHOW_OUTPUT_METHOD)
        .await;
    assert!(reveal.get("id").is_none());
}

#[tokio::test]
async fn requests_before_initialize_are_rejected() {
    let mut client = Client::start();
    let response = client.request(7, "shutdown", Value::Null).await;
    assert_eq!(response["error"]["code"], -32002);

    client.notify("exit", Value::Null).await;
    assert_eq!(client.server.await.unwrap().unwrap(), ServerExit::Abrupt);
}

#[tokio::test]
async fn closed_input_ends_the_session() {
    let mut client = Client::start();
    client.initialize().await;
    let Client { writer, server, .. } = client;
    drop(writer);
    assert_eq!(server.await.unwrap().unwrap(), ServerExit::Abrupt);
}
