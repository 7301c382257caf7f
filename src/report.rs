//! Troubleshooting report printed at the end of a setup run.

use crate::bus::describe_ownership;
use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::host::devices::Diagnostics;
use crate::host::kmod::modprobe_args;
use crate::output::Output;
use crate::services::ServiceReport;
use crate::setup::SetupSummary;

/// Print one service's resolution and remediation outcome.
pub fn print_service_report(report: &ServiceReport) {
    Output::subheader(&report.service);
    let Some(unit) = &report.unit else {
        Output::kv("Unit", "not found");
        Output::hint("The service may be provided by a package that is not installed");
        return;
    };
    Output::kv("Unit", &unit.unit_name);
    Output::kv("Scope", unit.scope.to_string());
    Output::kv("Found by", unit.discovery_method.to_string());
    if let Some(result) = &report.remediation {
        Output::kv("Active", if result.final_active { "yes" } else { "no" });
        Output::kv("Bus name", describe_ownership(report.bus_owned));
        for line in result.diagnostic_text.lines().skip(1) {
            Output::list_item(line);
        }
    }
}

/// Print the final checks, per-service diagnostics, issues, and next steps.
pub fn print_setup_report(summary: &SetupSummary, config: &SetupConfig) {
    let device = summary.virtual_device.display().to_string();

    Output::header("Final checks");
    Output::check(
        format!("Virtual device {device} present"),
        summary.virtual_camera_present(),
    );
    Output::check("PipeWire video nodes detected", summary.pipewire.video_nodes);
    Output::check(
        "Physical /dev/video devices",
        !summary.physical_devices.is_empty(),
    );
    Output::check("No relogin needed for 'video' group", !summary.relogin_required());
    Output::check("xdg-desktop-portal running", summary.portal.running);

    Output::header("D-Bus services");
    for report in &summary.services {
        print_service_report(report);
        Output::blank();
    }

    if summary.physical_devices.is_empty() {
        print_no_devices(&summary.diagnostics);
    } else {
        print_device_diagnostics(summary);
    }

    if !summary.virtual_camera_present() {
        Output::warning(format!("Virtual camera {device} is not present"));
        if let Some(camera) = &summary.virtual_camera {
            for line in &camera.kernel_messages {
                Output::list_item(line);
            }
        }
        Output::hint("Check the build output above for v4l2loopback errors");
        Output::hint(format!(
            "Reload manually: {} {}",
            config.escalation,
            modprobe_args(config.virtual_video_nr, &config.card_label).join(" ")
        ));
    }

    print_issues(&summary.issues());

    Output::header("Next steps");
    if let Some(path) = &summary.log_file {
        Output::kv("Log file", path.display().to_string());
    }
    if summary.virtual_camera_present() {
        Output::hint(format!("Preview the virtual camera: ffplay -f v4l2 {device}"));
    }
    Output::hint("OBS log: Help -> Log Files -> View Current Log");
    Output::hint("System messages: journalctl --user -xe | grep pipewire");
    if summary.relogin_required()
        || !summary.pipewire.video_nodes
        || summary.portal.errors_persist
    {
        Output::warning(
            "Log out and back in (or reboot) so PipeWire and OBS pick up fresh connections",
        );
    }
    Output::hint("After a relogin or reboot, run 'camsetup setup' again to re-check");
}

fn print_no_devices(diagnostics: &Diagnostics) {
    Output::warning("No physical /dev/video* devices were found");
    Output::hint("Check cables and USB power");
    Output::subheader("lsusb");
    print_block(&diagnostics.usb_devices);
    Output::subheader("v4l2-ctl --list-devices");
    print_block(&diagnostics.v4l2_devices);
}

fn print_device_diagnostics(summary: &SetupSummary) {
    let diagnostics = &summary.diagnostics;
    Output::header("Device diagnostics");
    if summary.relogin_required() {
        Output::warning("Log out and back in for 'video' group membership to take effect");
    }
    Output::subheader("PipeWire nodes");
    print_block(&diagnostics.pipewire_nodes);

    if diagnostics.media_session_conflict {
        Output::warning("'pipewire-media-session' is installed alongside WirePlumber");
        Output::hint("Remove it: sudo dnf remove pipewire-media-session, then reboot");
    }

    for journal in &diagnostics.journals {
        if !journal.retrieved {
            Output::warning(format!("Could not read the journal for {}", journal.unit));
        } else if journal.has_problems {
            Output::warning(format!("{} logged errors or warnings:", journal.unit));
            print_block(&journal.output);
        } else {
            Output::info(format!("{}: no errors in the last 24 hours", journal.unit));
        }
    }

    if !summary.pipewire.video_nodes {
        Output::warning("PipeWire is still not reporting video nodes");
        Output::hint(
            "Check WirePlumber policy files in /usr/share/wireplumber or /etc/wireplumber",
        );
    }
}

fn print_issues(issues: &[SetupError]) {
    if issues.is_empty() {
        return;
    }
    Output::header("Issues");
    for issue in issues {
        Output::error(issue.to_string());
    }
}

fn print_block(text: &str) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        Output::list_item(line);
    }
}
