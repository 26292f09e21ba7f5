//! The opsrun Engine - Execution orchestration module.
//!
//! Validate -> bind parameters -> run, producing exactly one structured
//! result record per request. The engine never raises out of `execute`;
//! every failure mode lands in the result's status, exit code, and error
//! output for the caller to persist.

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod binder;
pub mod interpreter;
pub mod runner;
pub mod types;

// Re-export types for public API
pub use interpreter::{Interpreter, InterpreterError};
pub use runner::{LineCallback, Runner};
pub use types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, INTERNAL_ERROR_EXIT_CODE,
    TIMEOUT_EXIT_CODE,
};

use crate::validator::{ScriptValidator, ValidationResult};

/// The main Engine struct - locate the interpreter once, then execute any
/// number of concurrent requests against the immutable handle.
pub struct Engine {
    interpreter: Interpreter,
    validator: ScriptValidator,
}

impl Engine {
    /// Create an engine by probing for an installed PowerShell. Fails when no
    /// interpreter answers: an engine that can never run a script is a
    /// deployment error, surfaced at startup rather than per request.
    pub async fn new() -> Result<Self, InterpreterError> {
        let interpreter = Interpreter::locate().await?;
        info!("Initializing opsrun engine");
        info!("Interpreter: {}", interpreter.program());

        Ok(Self::with_interpreter(interpreter))
    }

    /// Create an engine around an explicit interpreter handle.
    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            validator: ScriptValidator::new(),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Execute one request to a terminal result.
    ///
    /// A validator rejection short-circuits before any process is spawned;
    /// otherwise the composed script runs under the request's deadline. The
    /// optional callback receives each stdout line as it arrives.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
        on_line: Option<LineCallback>,
    ) -> ExecutionResult {
        let verdict = self
            .validator
            .check(&request.script, request.restrictions_enabled);
        if !verdict.passed() {
            warn!(
                "Script rejected by validator with {} issue(s)",
                verdict.issues().len()
            );
            return ExecutionResult::rejected(&verdict, Utc::now());
        }

        let composed = binder::compose(&request.script, &request.parameters);
        debug!(
            "Composed script: {} parameter(s), {} bytes",
            request.parameters.len(),
            composed.len()
        );

        let runner = Runner::new(&self.interpreter);
        runner
            .run(
                &composed,
                Duration::from_secs(request.timeout_seconds),
                on_line,
            )
            .await
    }

    /// Screen a script without executing it.
    pub fn validate_only(&self, script: &str, restrictions_enabled: bool) -> ValidationResult {
        self.validator.check(script, restrictions_enabled)
    }

    /// Version string of the located interpreter, `"Unknown"` on any failure.
    pub async fn interpreter_version(&self) -> String {
        self.interpreter.version().await
    }
}
