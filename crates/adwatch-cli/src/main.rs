//! # adwatch - command-line entry point
//!
//! - `adwatch check <URL>` loads the page in Chromium, runs one detection
//!   check and applies the configured enforcement policy.
//! - `adwatch simulate` runs the probes against an in-memory page filtered by
//!   an EasyList-syntax list.

mod cli;
mod commands;
mod output;

use adwatch_core::AppConfig;
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use output::Report;

// Exit codes
const EXIT_CLEAR: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_DETECTED: i32 = 3;

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,adwatch=debug"));

    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    std::process::exit(match run(cli).await {
        Ok(report) if report.blocked => EXIT_DETECTED,
        Ok(_) => EXIT_CLEAR,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

async fn run(cli: Cli) -> Result<Report> {
    let config = load_config(&cli)?;
    tracing::debug!(policy = ?config.detection.policy, methods = ?config.detection.methods, "configuration loaded");

    let (report, json) = match &cli.command {
        Command::Check(args) => (commands::check(config, args).await?, args.json),
        Command::Simulate(args) => (commands::simulate(config, args).await?, args.json),
    };

    if json {
        println!("{}", report.render_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(report)
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    AppConfig::resolve(cli.config.as_deref()).context("failed to load config")
}
