//! Execution request and result records exchanged with the surrounding system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::validator::ValidationResult;

/// Exit code reported when the engine failed before or while communicating
/// with the interpreter (spawn failure, pipe error, validation rejection).
pub const INTERNAL_ERROR_EXIT_CODE: i32 = -1;

/// Exit code reported when the deadline elapsed and the process was killed.
pub const TIMEOUT_EXIT_CODE: i32 = -2;

fn default_timeout_seconds() -> u64 {
    300
}

fn default_restrictions_enabled() -> bool {
    true
}

/// One execution call as handed in by the CRUD layer. Owned solely by the
/// call; the core persists nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Script text, immutable for the duration of the call
    pub script: String,

    /// Parameter name -> JSON value (string, number, boolean, or structured)
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Wall-clock deadline in seconds (default 300)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Whether the deny-list is enforced; privileged callers pass `false`
    #[serde(default = "default_restrictions_enabled")]
    pub restrictions_enabled: bool,
}

impl ExecutionRequest {
    /// Request with default timeout and restrictions enforced
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            parameters: Map::new(),
            timeout_seconds: default_timeout_seconds(),
            restrictions_enabled: default_restrictions_enabled(),
        }
    }
}

/// Terminal status of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// The single result record produced for each request, created exactly once
/// at process termination (or rejection) and immutable afterwards. The caller
/// persists it and maps it onto its own API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Identifier for the caller's execution history
    pub id: Uuid,

    /// `completed` iff the interpreter exited 0
    pub status: ExecutionStatus,

    /// Captured standard output, newline-joined, untruncated
    pub output: String,

    /// Captured error output plus any synthetic engine messages
    pub error_output: String,

    /// The interpreter's own exit code, or a sentinel (-1 internal, -2 timeout)
    pub exit_code: i32,

    /// Wall-clock duration of the call, >= 0
    pub duration_seconds: f64,

    /// UTC timestamp taken when the call started
    pub started_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Assemble the terminal record from a finished (or killed) process.
    pub(crate) fn finalize(
        exit_code: i32,
        output_lines: Vec<String>,
        error_lines: Vec<String>,
        started_at: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Self {
        let status = if exit_code == 0 {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };

        Self {
            id: Uuid::now_v7(),
            status,
            output: output_lines.join("\n"),
            error_output: error_lines.join("\n"),
            exit_code,
            duration_seconds,
            started_at,
        }
    }

    /// Record for a call that failed before producing any process output.
    pub(crate) fn internal_failure(
        message: String,
        started_at: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            status: ExecutionStatus::Failed,
            output: String::new(),
            error_output: message,
            exit_code: INTERNAL_ERROR_EXIT_CODE,
            duration_seconds,
            started_at,
        }
    }

    /// Record for a script the validator rejected; no process was spawned.
    pub(crate) fn rejected(verdict: &ValidationResult, started_at: DateTime<Utc>) -> Self {
        let message = format!(
            "Security validation failed:\n{}",
            verdict.issues().join("\n")
        );
        Self::internal_failure(message, started_at, 0.0)
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}
