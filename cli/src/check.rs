//! `flowlint check`: lint files once through the same engine the server uses.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use flowlint_config::{ConfigSources, load_layer, user_config_path, workspace_config_path};
use flowlint_engine::{EngineConfig, EngineEvent, TextDocument, WorkflowFilter, spawn_engine};
use flowlint_lsp::path_to_file_uri;
use flowlint_runner::ProcessRunner;
use flowlint_types::Diagnostic;
use url::Url;

pub const EXIT_CLEAN: u8 = 0;
pub const EXIT_FINDINGS: u8 = 1;
pub const EXIT_PROBLEM: u8 = 2;

/// Files are always read as YAML workflows.
const LANGUAGE_ID: &str = "yaml";

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Honor executable, helper and extra-argument settings from the workspace config
    #[arg(long)]
    pub trusted: bool,

    /// Workspace root [default: current directory]
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Workflow files to lint
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

pub async fn run(args: CheckArgs) -> Result<ExitCode> {
    let root = std::path::absolute(args.root.as_deref().unwrap_or(Path::new(".")))
        .context("resolving the workspace root")?;

    let user_file = match user_config_path() {
        Some(path) => load_layer(&path)?,
        None => None,
    };
    let sources = ConfigSources {
        user_file,
        client: None,
        workspace: load_layer(&workspace_config_path(&root))?,
    };
    let resolved = sources.resolve(args.trusted);
    crate::init_tracing(resolved.settings.log_level);
    for warning in &resolved.warnings {
        eprintln!("flowlint: warning: {warning}");
    }

    let filter = WorkflowFilter::new();
    let mut documents = Vec::new();
    let mut display_paths: BTreeMap<Url, PathBuf> = BTreeMap::new();
    for file in &args.files {
        let path = std::path::absolute(file)
            .with_context(|| format!("resolving {}", file.display()))?;
        let uri = path_to_file_uri(&path)?;
        if !filter.qualifies(&uri, LANGUAGE_ID) {
            eprintln!(
                "flowlint: skipping {}: not a workflow under .github/workflows/",
                file.display()
            );
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", file.display()))?;
        documents.push(TextDocument::new(uri.clone(), LANGUAGE_ID, 1, text));
        display_paths.insert(uri, file.clone());
    }
    if documents.is_empty() {
        return Ok(ExitCode::from(EXIT_CLEAN));
    }

    tracing::info!(files = documents.len(), root = %root.display(), "Checking");
    let mut engine = spawn_engine(
        Arc::new(ProcessRunner::default()),
        EngineConfig {
            settings: Arc::new(resolved.settings),
            workspace_roots: vec![root],
            open_documents: documents,
        },
    );

    let mut pending: HashSet<Url> = display_paths.keys().cloned().collect();
    let mut published: BTreeMap<Url, Vec<Diagnostic>> = BTreeMap::new();
    let mut problems = 0usize;
    while !pending.is_empty() {
        let Some(event) = engine.events.recv().await else {
            break;
        };
        match event {
            EngineEvent::PublishDiagnostics {
                uri, diagnostics, ..
            } => {
                published.insert(uri, diagnostics);
            }
            EngineEvent::Notify(notice) => {
                problems += 1;
                eprintln!("flowlint: {}", notice.message());
            }
            EngineEvent::RunSettled { uri } => {
                pending.remove(&uri);
            }
            EngineEvent::Status(_) => {}
        }
    }
    engine.handle.shutdown().await;
    let _ = engine.task.await;

    let mut findings = 0usize;
    for (uri, diagnostics) in &published {
        let Some(path) = display_paths.get(uri) else {
            continue;
        };
        for diagnostic in diagnostics {
            println!("{}", diagnostic.display_with_path(path));
            findings += 1;
        }
    }

    Ok(ExitCode::from(exit_status(findings, problems)))
}

/// Execution problems outrank findings.
fn exit_status(findings: usize, problems: usize) -> u8 {
    if problems > 0 {
        EXIT_PROBLEM
    } else if findings > 0 {
        EXIT_FINDINGS
    } else {
        EXIT_CLEAN
    }
}
