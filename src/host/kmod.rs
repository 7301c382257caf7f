//! The v4l2loopback kernel module and the virtual camera node it creates.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::Host;
use super::groups::{VIDEO_GROUP, current_user};
use crate::output::Output;

pub const MODULE: &str = "v4l2loopback";

/// Scratch checkout used when the module has to be built from source.
pub const BUILD_DIR: &str = "/tmp/v4l2loopback";

/// Where the module came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleSource {
    /// `modinfo` already knows the module.
    Packaged,
    /// Built and installed from the upstream repository.
    Built,
    /// The clone failed, so no build was attempted.
    CloneFailed,
}

/// State of the virtual camera after loading the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtualCamera {
    pub loaded: bool,
    pub present: bool,
    /// Kernel log lines mentioning the module, captured when loading failed.
    pub kernel_messages: Vec<String>,
}

/// Whether the running kernel can find the module.
pub fn module_available(host: &Host<'_>) -> bool {
    host.quiet("modinfo", &[MODULE]).success()
}

/// Make the module available, building it from source when necessary.
pub fn ensure_v4l2loopback_module(host: &Host<'_>) -> ModuleSource {
    ensure_module_in(host, Path::new(BUILD_DIR))
}

/// [`ensure_v4l2loopback_module`] with an explicit build directory.
pub fn ensure_module_in(host: &Host<'_>, build_dir: &Path) -> ModuleSource {
    Output::info("Checking for the v4l2loopback kernel module...");
    if module_available(host) {
        info!("{} found via modinfo; using the packaged module", MODULE);
        Output::success("v4l2loopback module is available");
        return ModuleSource::Packaged;
    }

    Output::warning("v4l2loopback not found for the running kernel; building from source");
    let dir = build_dir.to_string_lossy().into_owned();
    if build_dir.exists() {
        info!("Removing previous build directory {}", dir);
        host.quiet_escalated(&["rm", "-rf", dir.as_str()]);
    }

    let repo = host.config().v4l2loopback_repo.as_str();
    let clone = host.live("git", &["clone", repo, dir.as_str()], None);
    if !clone.success() {
        Output::error("Failed to clone the v4l2loopback repository; skipping the build");
        return ModuleSource::CloneFailed;
    }

    if !host.live("make", &[], Some(build_dir)).success() {
        warn!("make failed; trying 'make install' anyway");
    }
    host.live_escalated(&["make", "install", "INSTALL_MOD_STRIP=1"], Some(build_dir));
    host.live_escalated(&["depmod", "-a"], None);
    Output::info("v4l2loopback build and install attempts complete");
    ModuleSource::Built
}

/// Arguments for the `modprobe` that creates the virtual camera.
pub fn modprobe_args(video_nr: u32, card_label: &str) -> Vec<String> {
    vec![
        "modprobe".to_string(),
        MODULE.to_string(),
        "devices=1".to_string(),
        format!("video_nr={video_nr}"),
        format!("card_label={card_label}"),
        "exclusive_caps=1".to_string(),
    ]
}

/// Reload the module and wait for the virtual camera node to appear.
pub fn load_virtual_camera_and_wait(host: &Host<'_>) -> VirtualCamera {
    let config = host.config();
    let device = host.virtual_device();
    let device_str = device.to_string_lossy().into_owned();

    Output::info("Loading v4l2loopback (creating the virtual camera)...");
    host.quiet_escalated(&["modprobe", "-r", MODULE]);

    let args = modprobe_args(config.virtual_video_nr, &config.card_label);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if !host.live_escalated(&args, None).success() {
        Output::error("Failed to load v4l2loopback; the virtual camera will not be available");
        let kernel_messages = kernel_messages(host);
        for line in &kernel_messages {
            Output::live(line);
        }
        Output::hint("Make sure kernel-devel matches the running kernel: kernel-devel-$(uname -r)");
        return VirtualCamera {
            loaded: false,
            present: false,
            kernel_messages,
        };
    }

    let wait = host.polling().device_wait;
    let spinner = Output::spinner(format!(
        "Waiting up to {}s for {}...",
        wait.as_secs(),
        device_str
    ));
    if !host.poll_until(wait, || device.exists()) {
        spinner.finish_warning(format!("{device_str} did not appear in time"));
        return VirtualCamera {
            loaded: true,
            present: false,
            kernel_messages: Vec::new(),
        };
    }
    spinner.finish_success(format!("{device_str} is present"));

    let owner = format!("{}:{}", current_user(), VIDEO_GROUP);
    host.quiet_escalated(&["chown", owner.as_str(), device_str.as_str()]);
    host.quiet_escalated(&["chmod", "0660", device_str.as_str()]);
    VirtualCamera {
        loaded: true,
        present: true,
        kernel_messages: Vec::new(),
    }
}

/// Kernel log lines that mention the module.
fn kernel_messages(host: &Host<'_>) -> Vec<String> {
    let mut outcome = host.quiet("dmesg", &[]);
    if !outcome.success() {
        outcome = host.quiet_escalated(&["dmesg"]);
    }
    if !outcome.success() {
        return Vec::new();
    }
    filter_module_lines(&outcome.output)
}

/// Lines of a kernel log that mention v4l2loopback.
pub fn filter_module_lines(log: &str) -> Vec<String> {
    log.lines()
        .filter(|line| line.contains(MODULE))
        .map(|line| line.trim_end().to_string())
        .collect()
}
