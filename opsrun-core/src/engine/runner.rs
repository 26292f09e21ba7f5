//! Process Runner - spawns the interpreter and shepherds one execution to a
//! terminal result
//!
//! Each `run` owns exactly one child process and three concurrent activities:
//! the control flow (stdin feed, deadline wait), a stdout drainer, and a
//! stderr drainer. All state is private to the invocation; nothing is shared
//! across concurrent runs beyond the immutable interpreter handle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::interpreter::Interpreter;
use super::types::{ExecutionResult, INTERNAL_ERROR_EXIT_CODE, TIMEOUT_EXIT_CODE};

/// Callback invoked synchronously for each stdout line, in arrival order.
/// Treated as external code: a panicking callback is contained, but a slow
/// one stalls result delivery (spec'd caller obligation).
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Grace period for the stream drainers once the process has terminated. A
/// stream held open by an orphaned grandchild must not block finalization.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Runs composed scripts against one located interpreter.
pub struct Runner<'a> {
    interpreter: &'a Interpreter,
}

impl<'a> Runner<'a> {
    pub fn new(interpreter: &'a Interpreter) -> Self {
        Self { interpreter }
    }

    /// Run a composed script to a terminal result.
    ///
    /// Never returns an error: spawn and pipe failures are folded into a
    /// `failed` result with exit code -1, a timeout into exit code -2 with a
    /// synthetic message. Every call produces exactly one well-formed record.
    pub async fn run(
        &self,
        script: &str,
        timeout: Duration,
        on_line: Option<LineCallback>,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let start = Instant::now();

        match self.run_child(script, timeout, on_line).await {
            Ok((exit_code, output_lines, error_lines)) => ExecutionResult::finalize(
                exit_code,
                output_lines,
                error_lines,
                started_at,
                start.elapsed().as_secs_f64(),
            ),
            Err(e) => {
                warn!("Execution failed before completion: {:#}", e);
                ExecutionResult::internal_failure(
                    format!("Execution error: {e:#}"),
                    started_at,
                    start.elapsed().as_secs_f64(),
                )
            }
        }
    }

    async fn run_child(
        &self,
        script: &str,
        timeout: Duration,
        on_line: Option<LineCallback>,
    ) -> Result<(i32, Vec<String>, Vec<String>)> {
        debug!(
            "Spawning {} with {} byte script, deadline {:?}",
            self.interpreter.program(),
            script.len(),
            timeout
        );

        let mut child = Command::new(self.interpreter.program())
            .args(self.interpreter.run_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!("failed to spawn interpreter '{}'", self.interpreter.program())
            })?;

        let stdout = child.stdout.take().context("child stdout pipe missing")?;
        let stderr = child.stderr.take().context("child stderr pipe missing")?;

        // Buffers are shared with the drainer tasks so that lines captured
        // before an abandoned drain are still part of the result.
        let output_lines = Arc::new(Mutex::new(Vec::new()));
        let error_lines = Arc::new(Mutex::new(Vec::new()));

        // Drainers start before the script is fed: a script that floods
        // stdout while stdin is still being written must not deadlock
        // against a full pipe buffer.
        let stdout_task = tokio::spawn(drain_lines(stdout, Arc::clone(&output_lines), on_line));
        let stderr_task = tokio::spawn(drain_lines(stderr, Arc::clone(&error_lines), None));

        let mut stdin = child.stdin.take().context("child stdin pipe missing")?;
        stdin
            .write_all(script.as_bytes())
            .await
            .context("failed to write script to interpreter stdin")?;
        // Dropping the handle closes the pipe: end-of-input, the interpreter
        // starts executing.
        drop(stdin);

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let (exit_code, timed_out) = match waited {
            Ok(status) => {
                let status = status.context("failed to wait for interpreter")?;
                (status.code().unwrap_or(INTERNAL_ERROR_EXIT_CODE), false)
            }
            Err(_) => {
                debug!("Deadline of {:?} elapsed, killing interpreter", timeout);
                // Hard kill, and wait until the termination is observed so
                // no zombie outlives the call.
                child
                    .kill()
                    .await
                    .context("failed to kill timed-out interpreter")?;
                (TIMEOUT_EXIT_CODE, true)
            }
        };

        // Join both drainers under the grace period, concurrently. An
        // abandoned drainer forfeits only the lines it never read.
        let (stdout_join, stderr_join) = join(
            tokio::time::timeout(DRAIN_GRACE, stdout_task),
            tokio::time::timeout(DRAIN_GRACE, stderr_task),
        )
        .await;
        log_abandoned("stdout", stdout_join);
        log_abandoned("stderr", stderr_join);

        if timed_out {
            error_lines
                .lock()
                .await
                .push(format!("Execution timeout after {} seconds", timeout.as_secs()));
        }

        let output_lines = std::mem::take(&mut *output_lines.lock().await);
        let error_lines = std::mem::take(&mut *error_lines.lock().await);

        Ok((exit_code, output_lines, error_lines))
    }
}

/// Read one stream line-by-line into the shared buffer, relaying each line to
/// the callback first. Runs until the stream closes or errors.
async fn drain_lines(
    stream: impl AsyncRead + Unpin + Send + 'static,
    buffer: Arc<Mutex<Vec<String>>>,
    on_line: Option<LineCallback>,
) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(callback) = &on_line {
                    // External code: contain a panic, keep draining.
                    if catch_unwind(AssertUnwindSafe(|| callback(&line))).is_err() {
                        warn!("Line callback panicked; continuing to drain");
                    }
                }
                buffer.lock().await.push(line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stream read ended with error: {}", e);
                break;
            }
        }
    }
}

fn log_abandoned(
    stream_name: &str,
    joined: Result<Result<(), tokio::task::JoinError>, tokio::time::error::Elapsed>,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{} drainer task failed: {}", stream_name, e),
        Err(_) => warn!(
            "{} drainer did not finish within {:?}, abandoning stream",
            stream_name, DRAIN_GRACE
        ),
    }
}
