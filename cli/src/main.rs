//! flowlint: actionlint diagnostics for GitHub Actions workflows.
//!
//! ```text
//! flowlint [serve]                                 language server on stdio
//! flowlint check [--trusted] [--root DIR] FILE...  one-shot lint, exit 0/1/2
//! ```
//!
//! Logs always go to stderr. In server mode that is the editor's output
//! channel; in check mode it keeps stdout for findings.

mod check;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowlint_config::{LogLevel, load_layer, user_config_path};
use flowlint_lsp::{ServeOptions, serve};
use flowlint_runner::ProcessRunner;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Overrides every configured `log_level`.
const LOG_ENV: &str = "FLOWLINT_LOG";

#[derive(Parser)]
#[command(name = "flowlint", version)]
#[command(about = "Live actionlint diagnostics for GitHub Actions workflows")]
struct Cli {
    /// Accepted for editors that always pass it; stdio is the only transport.
    #[arg(long, hide = true, global = true)]
    stdio: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the language server on stdin/stdout (the default)
    Serve,
    /// Lint workflow files once and print findings
    Check(check::CheckArgs),
}

fn init_tracing(level: LogLevel) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
}

/// `log_level` from the user config file, before any session exists.
///
/// No subscriber is installed yet, so a broken file is reported on stderr.
fn user_log_level() -> LogLevel {
    let Some(path) = user_config_path() else {
        return LogLevel::default();
    };
    match load_layer(&path) {
        Ok(layer) => layer.and_then(|layer| layer.log_level).unwrap_or_default(),
        Err(err) => {
            eprintln!("flowlint: {err}");
            LogLevel::default()
        }
    }
}

async fn run_server(stdio_flag: bool) -> Result<ExitCode> {
    init_tracing(user_log_level());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        stdio_flag,
        "Starting language server"
    );

    let exit = serve(
        tokio::io::stdin(),
        tokio::io::stdout(),
        Arc::new(ProcessRunner::default()),
        ServeOptions {
            user_config: user_config_path(),
        },
    )
    .await?;
    Ok(ExitCode::from(u8::try_from(exit.code()).unwrap_or(1)))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Serve) => run_server(cli.stdio).await,
        Some(Commands::Check(args)) => check::run(args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("flowlint: {err:?}");
            ExitCode::from(check::EXIT_PROBLEM)
        }
    }
}
