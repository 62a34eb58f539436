//! Running `actionlint` against an in-memory buffer.
//!
//! A run pipes the document text to the tool's stdin, waits (bounded by a
//! timeout and a [`CancellationToken`]) for the process to exit, and
//! classifies what came back into exactly one [`LintOutcome`]. Runs never
//! touch the filesystem copy of the document.
//!
//! The [`LintRunner`] trait is the seam the engine is written against, so the
//! engine's behaviour can be exercised with scripted results.

#![allow(clippy::missing_errors_doc)]

mod args;
mod classify;
mod process;
mod request;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

pub use args::{JSON_FORMAT, build_args};
pub use classify::{MAX_QUOTED_OUTPUT_CHARS, classify, truncate_chars};
pub use request::LintRequest;

use flowlint_types::{ExecutionError, Invocation, LintOutcome, LintResult};
use process::{ChildGuard, set_new_session};

/// Wall-clock limit for one actionlint run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub type LintFut<'a> = Pin<Box<dyn Future<Output = LintResult> + Send + 'a>>;

/// Something that can lint one workflow buffer.
///
/// Implementations must not panic and must always produce a result: failures
/// are reported through [`LintOutcome::ExecutionError`], and a run observed
/// as cancelled yields [`LintResult::cancelled`].
pub trait LintRunner: Send + Sync + 'static {
    fn execute<'a>(&'a self, request: &'a LintRequest, cancel: CancellationToken) -> LintFut<'a>;
}

/// Runs the real `actionlint` executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl LintRunner for ProcessRunner {
    fn execute<'a>(&'a self, request: &'a LintRequest, cancel: CancellationToken) -> LintFut<'a> {
        Box::pin(run_actionlint(request, cancel, self.timeout))
    }
}

enum Waited {
    Cancelled,
    TimedOut,
    Exited(io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>),
}

async fn run_actionlint(
    request: &LintRequest,
    cancel: CancellationToken,
    timeout: Duration,
) -> LintResult {
    if cancel.is_cancelled() {
        tracing::debug!(document = request.document(), "Lint cancelled before spawn");
        return LintResult::cancelled();
    }

    let executable = request.settings().executable.as_str();
    let program = match resolve_program(executable, request.working_dir()) {
        Ok(program) => program,
        Err(err) => return LintResult::new(LintOutcome::ExecutionError(err)),
    };
    let args = build_args(request);
    let mut invocation = Invocation {
        program: program.display().to_string(),
        args: args.clone(),
        ..Invocation::default()
    };

    let mut command = Command::new(&program);
    command
        .args(&args)
        .current_dir(request.working_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    set_new_session(&mut command);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            let error = spawn_error(executable, &err);
            return LintResult::new(LintOutcome::ExecutionError(error)).with_invocation(invocation);
        }
    };
    let mut guard = ChildGuard::new(child);
    let stdin = guard.child_mut().stdin.take();
    let stdout = guard.child_mut().stdout.take();
    let stderr = guard.child_mut().stderr.take();

    let waited = tokio::select! {
        biased;
        () = cancel.cancelled() => Waited::Cancelled,
        () = tokio::time::sleep(timeout) => Waited::TimedOut,
        out = collect(guard.child_mut(), stdin, stdout, stderr, request.text()) => Waited::Exited(out),
    };

    match waited {
        Waited::Cancelled => {
            tracing::debug!(document = request.document(), "Lint cancelled, killing actionlint");
            drop(guard);
            LintResult::cancelled()
        }
        Waited::TimedOut => {
            tracing::warn!(
                document = request.document(),
                timeout_ms = timeout.as_millis(),
                "actionlint timed out"
            );
            drop(guard);
            let reason = format!("timed out after {}ms", timeout.as_millis());
            LintResult::new(LintOutcome::ExecutionError(ExecutionError::Terminated { reason }))
                .with_invocation(invocation)
        }
        Waited::Exited(Err(err)) => {
            drop(guard);
            let error = ExecutionError::Spawn {
                code: err.raw_os_error().unwrap_or(-1),
                message: err.to_string(),
            };
            LintResult::new(LintOutcome::ExecutionError(error)).with_invocation(invocation)
        }
        Waited::Exited(Ok((status, stdout, stderr))) => {
            guard.disarm();
            let stdout = String::from_utf8_lossy(&stdout);
            let stderr = String::from_utf8_lossy(&stderr);
            invocation.exit_code = status.code();
            invocation.stderr = truncate_chars(stderr.trim(), MAX_QUOTED_OUTPUT_CHARS);

            let outcome = match status.code() {
                Some(code) => classify(code, &stdout, &stderr),
                None => LintOutcome::ExecutionError(ExecutionError::Terminated {
                    reason: describe_signal(status),
                }),
            };
            LintResult::new(outcome).with_invocation(invocation)
        }
    }
}

/// Feed stdin and drain both pipes concurrently, then reap the child.
///
/// Draining while writing matters: a large buffer plus a chatty tool would
/// otherwise deadlock on full pipes.
async fn collect(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    text: &str,
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let write = async move {
        if let Some(mut stdin) = stdin {
            write_stdin(&mut stdin, text).await;
        }
    };
    let read_out = async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, io::Error>(buf)
    };
    let read_err = async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, io::Error>(buf)
    };

    let ((), out, err) = tokio::join!(write, read_out, read_err);
    let status = child.wait().await?;
    Ok((status, out?, err?))
}

/// The tool may exit before reading all of stdin (e.g. on a flag error), so a
/// failed write is logged and otherwise left to the exit code to explain.
async fn write_stdin(stdin: &mut ChildStdin, text: &str) {
    if let Err(err) = stdin.write_all(text.as_bytes()).await {
        if err.kind() == io::ErrorKind::BrokenPipe {
            tracing::debug!("actionlint closed stdin early");
        } else {
            tracing::debug!("Failed to write to actionlint stdin: {err}");
        }
        return;
    }
    let _ = stdin.shutdown().await;
}

/// Resolve the configured executable against `PATH`, relative to the
/// workspace for paths like `./bin/actionlint`.
fn resolve_program(executable: &str, working_dir: &Path) -> Result<PathBuf, ExecutionError> {
    if let Ok(found) = which::which_in(executable, std::env::var_os("PATH"), working_dir) {
        return Ok(found);
    }
    // Present but not runnable: let spawn report the real OS error.
    let candidate = working_dir.join(executable);
    if candidate.is_file() {
        return Ok(candidate);
    }
    tracing::debug!(executable, "actionlint executable not found");
    Err(ExecutionError::NotFound {
        path: executable.to_string(),
    })
}

fn spawn_error(executable: &str, err: &io::Error) -> ExecutionError {
    if err.kind() == io::ErrorKind::NotFound {
        return ExecutionError::NotFound {
            path: executable.to_string(),
        };
    }
    ExecutionError::Spawn {
        code: err.raw_os_error().unwrap_or(-1),
        message: err.to_string(),
    }
}

#[cfg(unix)]
fn describe_signal(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("killed by signal {signal}"),
        None => "exited without a status code".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_signal(_status: ExitStatus) -> String {
    "exited without a status code".to_string()
}
