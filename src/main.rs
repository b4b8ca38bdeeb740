//! Sweep driver executable for edgesweep.

use anyhow::Result;
use clap::Parser;
use edgesweep_orchestrator::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
