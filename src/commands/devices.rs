//! Devices command implementation.
//!
//! Lists physical capture devices and prints the same diagnostics the setup
//! report uses, without changing anything.

use anyhow::Result;
use clap::Args;

use super::OutputFormat;
use crate::command_runner::RealCommandRunner;
use crate::config::SetupConfig;
use crate::host::Host;
use crate::host::devices::{collect_diagnostics, list_physical_video_devices};
use crate::output::Output;

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn run(args: DevicesArgs, config: &SetupConfig) -> Result<()> {
    let runner = RealCommandRunner;
    let host = Host::new(&runner, config);
    let physical = list_physical_video_devices(&host);
    let virtual_device = host.virtual_device();
    let diagnostics = collect_diagnostics(&host);

    if args.format == OutputFormat::Json {
        let json = serde_json::json!({
            "physical_devices": physical,
            "virtual_device": virtual_device,
            "virtual_device_present": virtual_device.exists(),
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    Output::header("Capture devices");
    if physical.is_empty() {
        Output::warning("No physical /dev/video* devices found");
    }
    for device in &physical {
        Output::step(device.display().to_string());
    }
    Output::check(
        format!("Virtual device {}", virtual_device.display()),
        virtual_device.exists(),
    );

    Output::header("v4l2-ctl --list-devices");
    Output::list_item(diagnostics.v4l2_devices.trim_end());
    Output::header("lsusb");
    Output::list_item(diagnostics.usb_devices.trim_end());

    if diagnostics.media_session_conflict {
        Output::warning("'pipewire-media-session' is installed alongside WirePlumber");
    }
    for journal in &diagnostics.journals {
        if journal.has_problems {
            Output::warning(format!(
                "{} logged errors or warnings in the last 24 hours",
                journal.unit
            ));
        }
    }
    Ok(())
}
