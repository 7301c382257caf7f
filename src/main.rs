use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use camsetup::commands;
use camsetup::config::SetupConfig;
use camsetup::logging;
use camsetup::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only a setup run writes a log file.
    let requested_log = match &cli.command {
        Commands::Setup(args) if !args.no_log_file => {
            Some(PathBuf::from(logging::log_file_name(chrono::Local::now())))
        }
        _ => None,
    };
    let log_file = logging::init(requested_log.as_deref());

    tracing::debug!(command = ?cli.command, "Parsed command line");

    let load_config = || SetupConfig::load(cli.config.as_deref());
    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args, &load_config()?),
        Commands::Fix(args) => commands::fix::run(args, &load_config()?),
        Commands::Setup(args) => commands::setup::run(args, &load_config()?, log_file),
        Commands::Devices(args) => commands::devices::run(args, &load_config()?),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
