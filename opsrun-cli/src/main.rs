//! opsrun - secure PowerShell script execution for infrastructure automation
//!
//! Thin CLI over opsrun-core: run a script with parameters and a deadline,
//! screen a script against the deny-list, or query the interpreter version.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use opsrun_core::engine::{Engine, ExecutionRequest, LineCallback};
use opsrun_core::params::{validate_parameters, ParameterDefinition};
use opsrun_core::validator::ScriptValidator;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "opsrun",
    about = "Secure PowerShell script execution for infrastructure automation",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Log level (overrides RUST_LOG)
    #[clap(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a script, streaming its output as it arrives
    Run {
        /// Path to the script file
        script: PathBuf,

        /// JSON file holding the parameter map (name -> value)
        #[clap(long)]
        params: Option<PathBuf>,

        /// JSON file holding declared parameter definitions to check first
        #[clap(long)]
        definitions: Option<PathBuf>,

        /// Wall-clock deadline in seconds
        #[clap(long, default_value_t = 300)]
        timeout: u64,

        /// Disable the deny-list (privileged callers only)
        #[clap(long)]
        unrestricted: bool,

        /// Print the full result record as JSON instead of a summary
        #[clap(long)]
        json: bool,
    },

    /// Screen a script against the deny-list without executing it
    Validate {
        /// Path to the script file
        script: PathBuf,

        /// Disable the deny-list (prints a passing result)
        #[clap(long)]
        unrestricted: bool,
    },

    /// Show the located interpreter version
    Version,
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Issue")]
    issue: String,
}

fn init_logging(log_level: Option<&LogLevel>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level.to_filter_directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_ref());

    match cli.command {
        Command::Run {
            script,
            params,
            definitions,
            timeout,
            unrestricted,
            json,
        } => run(script, params, definitions, timeout, unrestricted, json).await,
        Command::Validate {
            script,
            unrestricted,
        } => validate(script, unrestricted),
        Command::Version => version().await,
    }
}

async fn run(
    script_path: PathBuf,
    params_path: Option<PathBuf>,
    definitions_path: Option<PathBuf>,
    timeout: u64,
    unrestricted: bool,
    json: bool,
) -> Result<()> {
    let script = fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read script {script_path:?}"))?;

    let parameters = match &params_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read parameter file {path:?}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parameter file {path:?} is not a JSON object"))?
        }
        None => serde_json::Map::new(),
    };

    // Pre-execution definition check, the storage layer's schema contract.
    if let Some(path) = &definitions_path {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read definitions file {path:?}"))?;
        let definitions: Vec<ParameterDefinition> = serde_json::from_str(&raw)
            .with_context(|| format!("definitions file {path:?} is not a JSON array"))?;

        let verdict = validate_parameters(&parameters, &definitions);
        if !verdict.passed() {
            eprintln!("Parameter validation failed:");
            for issue in verdict.issues() {
                eprintln!("  {issue}");
            }
            std::process::exit(1);
        }
    }

    let engine = Engine::new().await?;
    debug!("Engine ready, executing {:?}", script_path);

    let mut request = ExecutionRequest::new(script);
    request.parameters = parameters;
    request.timeout_seconds = timeout;
    request.restrictions_enabled = !unrestricted;

    // Live relay: stdout lines appear as the script produces them.
    let on_line: LineCallback = Arc::new(|line: &str| println!("{line}"));
    let result = engine.execute(request, Some(on_line)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if !result.error_output.is_empty() {
            eprintln!("{}", result.error_output);
        }
        eprintln!(
            "status={:?} exit_code={} duration={:.2}s",
            result.status, result.exit_code, result.duration_seconds
        );
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn validate(script_path: PathBuf, unrestricted: bool) -> Result<()> {
    let script = fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read script {script_path:?}"))?;

    // Screening is static text matching, so no interpreter is required and
    // this subcommand works on hosts without PowerShell installed.
    let validator = ScriptValidator::new();
    let verdict = validator.check(&script, !unrestricted);

    if verdict.passed() {
        println!("OK: no deny-listed constructs found");
        return Ok(());
    }

    let rows: Vec<IssueRow> = verdict
        .issues()
        .iter()
        .enumerate()
        .map(|(i, issue)| IssueRow {
            index: i + 1,
            issue: issue.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::sharp())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    println!("{table}");

    std::process::exit(1)
}

async fn version() -> Result<()> {
    let engine = Engine::new().await?;
    println!("opsrun {}", env!("CARGO_PKG_VERSION"));
    println!("interpreter: {}", engine.interpreter().program());
    println!("interpreter version: {}", engine.interpreter_version().await);
    Ok(())
}
