//! CLI argument definitions for camsetup.
//!
//! Kept out of `main.rs` so shell completion generation can reference
//! these types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "camsetup")]
#[command(about = "Camsetup - bring a PipeWire/v4l2loopback virtual camera stack into a working state")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/camsetup/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find the systemd unit that provides a D-Bus service
    ///
    /// Tries the service manager directly, then scans unit files for
    /// BusName=/ExecStart=/D-BusService= lines, then known candidates.
    /// Nothing is started or modified.
    Resolve(commands::resolve::ResolveArgs),

    /// Resolve D-Bus services and unmask, start, and enable their units
    Fix(commands::fix::FixArgs),

    /// Run the full virtual camera setup
    ///
    /// Installs packages, repairs D-Bus services, loads v4l2loopback,
    /// starts PipeWire, and prints a troubleshooting report.
    Setup(commands::setup::SetupArgs),

    /// List capture devices and collect diagnostics
    Devices(commands::devices::DevicesArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}
