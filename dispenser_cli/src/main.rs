#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! `dispenser` binary: node loop, one-shot dispense and self-check.

mod backend;
mod cli;
mod error_fmt;
mod node;

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use dispenser_config::{Config, Logging};
use dispenser_core::DispenseError;
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("color-eyre install failed: {e}");
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = dispenser_config::load_file(&cli.config)
        .map_err(|e| eyre::Report::new(DispenseError::Config(e.to_string())))?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;

    tracing::info!(
        config = %cli.config.display(),
        device_id = %cfg.device_id,
        backend = cfg.backend.is_some(),
        "config loaded"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Run => {
            let stats = node::run_node(&cfg, &shutdown)?;
            tracing::info!(
                cycles = stats.cycles,
                samples = stats.samples,
                sensor_misses = stats.sensor_misses,
                requests_started = stats.requests_started,
                requests_rejected = stats.requests_rejected,
                events_recorded = stats.events_recorded,
                events_failed = stats.events_failed,
                reports_sent = stats.reports_sent,
                reports_failed = stats.reports_failed,
                deliveries_dropped = stats.deliveries_dropped,
                "node stopped"
            );
            Ok(())
        }
        Commands::Dispense {
            grams,
            max_dispense_ms,
        } => {
            // A timeout surfaces as the error document alone.
            let summary =
                node::dispense_once(&cfg, grams, max_dispense_ms, &shutdown)?.ensure_complete()?;
            if cli.json {
                println!("{}", summary_json(&cfg, &summary));
            } else {
                println!(
                    "dispense complete: delivered={:.1}g target={:.1}g elapsed={}ms",
                    summary.delivered_g, summary.target_g, summary.elapsed_ms
                );
            }
            Ok(())
        }
        Commands::SelfCheck => {
            let grams = node::self_check(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "ok": true, "weight_g": grams }));
            } else {
                println!("self-check ok: weight={grams:.1}g");
            }
            Ok(())
        }
    }
}

fn summary_json(cfg: &Config, s: &dispenser_core::DispenseSummary) -> String {
    let outcome = match s.outcome {
        dispenser_core::DispenseOutcome::Complete => "complete",
        dispenser_core::DispenseOutcome::TimedOut => "timeout",
    };
    serde_json::json!({
        "outcome": outcome,
        "target_g": s.target_g,
        "delivered_g": s.delivered_g,
        "elapsed_ms": s.elapsed_ms,
        "device_id": cfg.device_id,
    })
    .to_string()
}

/// Console layer on stderr plus an optional JSON file layer.
///
/// Level precedence: RUST_LOG, then --log-level, then logging.level, then "info".
fn init_tracing(json: bool, cli_level: Option<&str>, logging: &Logging) -> Result<()> {
    let level = cli_level
        .or(logging.level.as_deref())
        .unwrap_or("info")
        .to_string();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))
}
