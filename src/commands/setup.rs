//! Setup command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::bus::ZbusProbe;
use crate::command_runner::RealCommandRunner;
use crate::config::SetupConfig;
use crate::host::Host;
use crate::output::Output;
use crate::report::print_setup_report;
use crate::setup::{SetupOptions, run_setup};

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Don't write a setup_log_<timestamp>.txt file
    #[arg(long)]
    pub no_log_file: bool,

    /// Skip system package installation
    #[arg(long)]
    pub skip_packages: bool,

    /// Skip building and loading v4l2loopback
    #[arg(long)]
    pub skip_kmod: bool,

    /// Skip Python dependency installation
    #[arg(long)]
    pub skip_python: bool,
}

/// `log_file` is the log actually opened for this run, if any.
pub fn run(args: SetupArgs, config: &SetupConfig, log_file: Option<PathBuf>) -> Result<()> {
    let runner = RealCommandRunner;
    let host = Host::new(&runner, config);
    let probe = ZbusProbe;
    let options = SetupOptions {
        skip_packages: args.skip_packages,
        skip_kmod: args.skip_kmod,
        skip_python: args.skip_python,
        log_file,
    };

    let summary = run_setup(&host, Some(&probe), &options)?;
    print_setup_report(&summary, config);

    if summary.issues().is_empty() {
        Output::success("Setup finished. Launch OBS and check the video capture sources.");
    } else {
        Output::warning("Setup finished with issues; review the report above.");
    }
    Ok(())
}
