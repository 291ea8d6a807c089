//! CLI argument definitions

use adwatch_core::EnforcementPolicy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "adwatch",
    version,
    about = "Detect whether ad content is being blocked on a page",
    after_help = "\
EXIT CODES:
    0    no ad blocking detected
    3    ad blocking detected
    1    error

EXAMPLES:
    adwatch check https://example.com               Probe a live page
    adwatch check https://example.com --json        Machine-readable verdict
    adwatch simulate --filters easylist.txt         Check bait markup against a filter list"
)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a page in Chromium and run detection on it
    Check(CheckArgs),
    /// Run the probes against an in-memory page filtered by a list
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Page to check
    #[arg(value_name = "URL")]
    pub url: String,

    /// Probes to run, comma separated
    #[arg(long, value_delimiter = ',')]
    pub methods: Option<Vec<String>>,

    /// Enforcement policy applied to a positive verdict
    #[arg(long, value_parser = parse_policy)]
    pub policy: Option<EnforcementPolicy>,

    /// Show the browser window and leave enforcement in place
    #[arg(long)]
    pub headful: bool,

    /// Seconds to wait for an answer to the soft modal (headful only)
    #[arg(long, default_value = "60", requires = "headful")]
    pub wait: u64,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// EasyList-syntax filter list (defaults to a small built-in list)
    #[arg(long, value_name = "FILE")]
    pub filters: Option<PathBuf>,

    /// Probes to run, comma separated
    #[arg(long, value_delimiter = ',')]
    pub methods: Option<Vec<String>>,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_policy(value: &str) -> Result<EnforcementPolicy, String> {
    value.parse().map_err(|e: adwatch_core::AdwatchError| e.to_string())
}
