//! Interpreter location and version queries
//!
//! The interpreter is resolved once, at engine construction, and the handle
//! is immutable afterwards. If the binary disappears between calls the
//! affected call reports a spawn failure; there is no silent re-probing.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Candidate binaries, probed in order. PowerShell Core first since it is
/// cross-platform; Windows PowerShell as the fallback.
const CANDIDATES: &[&str] = &["pwsh", "powershell"];

/// Cap on each candidate probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on the version query.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholder returned when the version cannot be determined.
const UNKNOWN_VERSION: &str = "Unknown";

/// Interpreter resolution errors
#[derive(Error, Debug)]
pub enum InterpreterError {
    /// No candidate binary answered the version probe
    #[error("PowerShell Core (pwsh) not found.\n\nProbed candidates: {candidates:?}\n\nInstall PowerShell 7+, or construct the engine with an explicit handle via Interpreter::from_command.")]
    NotFound { candidates: Vec<String> },
}

/// An immutable handle to a located interpreter binary.
#[derive(Debug, Clone)]
pub struct Interpreter {
    program: String,
    run_args: Vec<String>,
    version_args: Vec<String>,
}

impl Interpreter {
    /// Probe the candidate list and adopt the first binary that answers a
    /// fast version query. Fails fatally when none does: without an
    /// interpreter no script can ever run.
    pub async fn locate() -> Result<Self, InterpreterError> {
        for candidate in CANDIDATES {
            if probe(candidate).await {
                debug!("Adopted interpreter: {}", candidate);
                return Ok(Self::powershell(candidate));
            }
            debug!("Interpreter candidate did not answer probe: {}", candidate);
        }

        Err(InterpreterError::NotFound {
            candidates: CANDIDATES.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// Explicit handle for a known program. Integration seam for callers that
    /// manage their own interpreter installation, and for tests that drive a
    /// stub interpreter.
    pub fn from_command(
        program: impl Into<String>,
        run_args: impl IntoIterator<Item = impl Into<String>>,
        version_args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            run_args: run_args.into_iter().map(Into::into).collect(),
            version_args: version_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Standard PowerShell invocation: no profile, non-interactive, program
    /// text read from standard input.
    fn powershell(program: &str) -> Self {
        Self::from_command(
            program,
            ["-NoProfile", "-NonInteractive", "-Command", "-"],
            ["-Command", "$PSVersionTable.PSVersion.ToString()"],
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn run_args(&self) -> &[String] {
        &self.run_args
    }

    /// Query the interpreter for its version string. Returns the fixed
    /// placeholder on any failure - a missing version must never fail a
    /// status endpoint.
    pub async fn version(&self) -> String {
        let mut query = Command::new(&self.program);
        query.args(&self.version_args).stdin(Stdio::null());

        match tokio::time::timeout(VERSION_TIMEOUT, query.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Ok(Ok(output)) => {
                warn!(
                    "Version query exited with {:?}",
                    output.status.code()
                );
                UNKNOWN_VERSION.to_string()
            }
            Ok(Err(e)) => {
                warn!("Version query failed to launch: {}", e);
                UNKNOWN_VERSION.to_string()
            }
            Err(_) => {
                warn!("Version query timed out after {:?}", VERSION_TIMEOUT);
                UNKNOWN_VERSION.to_string()
            }
        }
    }
}

/// Fast `-Version` invocation under a short timeout; adopted iff it exits 0.
async fn probe(candidate: &str) -> bool {
    let mut invocation = Command::new(candidate);
    invocation.arg("-Version").stdin(Stdio::null());

    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, invocation.output()).await,
        Ok(Ok(output)) if output.status.success()
    )
}
