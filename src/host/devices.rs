//! Physical capture devices and the diagnostics gathered around them.

use std::path::PathBuf;

use serde::Serialize;

use super::Host;
use super::packages::media_session_installed;
use super::pipewire::list_nodes;
use crate::predicates;

/// Highest `/dev/video<N>` index probed.
const MAX_VIDEO_INDEX: u32 = 31;

/// `/dev/video0` through `/dev/video31` that exist, minus the virtual camera.
pub fn list_physical_video_devices(host: &Host<'_>) -> Vec<PathBuf> {
    let virtual_device = host.virtual_device();
    (0..=MAX_VIDEO_INDEX)
        .map(|n| host.dev_dir().join(format!("video{n}")))
        .filter(|path| path.exists() && *path != virtual_device)
        .collect()
}

/// Recent journal output for one user unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalExcerpt {
    pub unit: String,
    /// `journalctl` itself succeeded.
    pub retrieved: bool,
    pub has_problems: bool,
    pub output: String,
}

/// Everything collected for the troubleshooting report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub v4l2_devices: String,
    pub usb_devices: String,
    pub pipewire_nodes: String,
    /// `pipewire-media-session` is installed and may fight WirePlumber.
    pub media_session_conflict: bool,
    pub journals: Vec<JournalExcerpt>,
}

/// `v4l2-ctl --list-devices`.
pub fn v4l2_devices(host: &Host<'_>) -> String {
    capture_or(host, "v4l2-ctl", &["--list-devices"], "v4l2-ctl not found or failed.")
}

/// `lsusb`.
pub fn usb_devices(host: &Host<'_>) -> String {
    capture_or(host, "lsusb", &[], "lsusb not found or failed.")
}

/// Full PipeWire object listing.
pub fn pipewire_nodes(host: &Host<'_>) -> String {
    match list_nodes(host) {
        Some(outcome) if outcome.success() => outcome.output,
        Some(outcome) => format!("PipeWire node listing failed ({})", outcome.describe()),
        None => "pw-cli or pw-dump not found.".to_string(),
    }
}

/// Last 24 hours of a user unit's journal.
pub fn journal_excerpt(host: &Host<'_>, unit: &str) -> JournalExcerpt {
    let outcome = host.quiet(
        "journalctl",
        &["--user", "-u", unit, "--since", "24 hours ago", "--no-pager"],
    );
    let retrieved = outcome.success();
    let has_problems = retrieved
        && if unit.starts_with("wireplumber") {
            predicates::wireplumber_journal_has_warnings(&outcome.output)
        } else {
            predicates::journal_has_errors(&outcome.output)
        };
    JournalExcerpt {
        unit: unit.to_string(),
        retrieved,
        has_problems,
        output: outcome.output,
    }
}

/// Gather all diagnostics.
pub fn collect_diagnostics(host: &Host<'_>) -> Diagnostics {
    Diagnostics {
        v4l2_devices: v4l2_devices(host),
        usb_devices: usb_devices(host),
        pipewire_nodes: pipewire_nodes(host),
        media_session_conflict: media_session_installed(host),
        journals: ["pipewire.service", "wireplumber.service"]
            .into_iter()
            .map(|unit| journal_excerpt(host, unit))
            .collect(),
    }
}

fn capture_or(host: &Host<'_>, program: &str, args: &[&str], fallback: &str) -> String {
    let outcome = host.quiet(program, args);
    if outcome.success() {
        outcome.output
    } else {
        fallback.to_string()
    }
}
