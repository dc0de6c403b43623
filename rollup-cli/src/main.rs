//! Binary crate for the `weather-rollup` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Logging setup and human-friendly output

use clap::Parser;

mod cli;
mod logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logging::init(cmd.verbose);
    cmd.run().await
}
