//! netgraph - command-line harness for the model compiler
//!
//! Reads an editor graph payload from a file or stdin and writes the
//! generated PyTorch source, the handler-style response envelope, a
//! statistics report or the payload schema.

use anyhow::{Context, Result};
use clap::Parser;

mod commands;
mod config;
mod logging;
mod response;

use config::{Cli, Command, Config};

fn main() -> Result<()> {
    // 1. Load configuration
    let cli = Cli::parse();
    let config = Config::resolve(&cli).context("Failed to load configuration")?;

    // 2. Initialize logging
    logging::init(&config).context("Failed to initialize logging")?;
    logging::log_config(&config);

    // 3. Run the requested command
    match &cli.command {
        Command::Compile { input, output, .. } => {
            commands::compile(&config, input.as_deref(), output.as_deref())
        }
        Command::Check { input } => commands::check(&config, input),
        Command::Schema => commands::schema(None),
    }
}
