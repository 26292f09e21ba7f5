//! Test helper functions for integration tests
//!
//! This module is shared across multiple test files using the tests/common/
//! pattern.

use opsrun_core::engine::Interpreter;
use std::sync::Once;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Stub interpreter handle backed by the POSIX shell. `sh -s` reads the
/// program from stdin exactly like the real interpreter invocation, so the
/// runner and engine paths are exercised end-to-end without PowerShell
/// installed.
#[allow(dead_code)]
pub fn sh_interpreter() -> Interpreter {
    Interpreter::from_command("sh", ["-s"], ["-c", "echo stub-shell"])
}
