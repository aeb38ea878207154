//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Effective session time limit for the current run (for JSON error details).
pub static MAX_DISPENSE_MS: OnceLock<u64> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "dispenser", version, about = "Rice dispenser node")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/dispenser.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node loop: sample, serve requests, report, until Ctrl-C
    Run,
    /// Dispense a target mass once and exit
    Dispense {
        /// Target grams to dispense
        #[arg(long)]
        grams: f32,
        /// Override safety.max_dispense_ms (0 disables the limit)
        #[arg(long, value_name = "MS")]
        max_dispense_ms: Option<u64>,
    },
    /// Read one weight sample and report it
    SelfCheck,
}
