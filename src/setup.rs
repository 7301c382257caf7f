//! The end-to-end host setup run.
//!
//! Steps run strictly in order and none of them aborts the run, with one
//! exception: a missing privilege-escalation tool stops everything before
//! the first step, since nearly every mutation depends on it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::bus::BusProbe;
use crate::command_runner::find_executable;
use crate::error::SetupError;
use crate::host::Host;
use crate::host::devices::{self, Diagnostics};
use crate::host::groups::{self, GroupMembership};
use crate::host::kmod::{self, ModuleSource, VirtualCamera};
use crate::host::packages;
use crate::host::pipewire::{self, PipewireCheck, PortalStatus};
use crate::output::Output;
use crate::remediator::UnitRemediator;
use crate::resolver::UnitResolver;
use crate::scope::ServiceQuery;
use crate::services::{ServiceFixer, ServiceReport};

/// Which optional steps to run.
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub skip_packages: bool,
    pub skip_kmod: bool,
    pub skip_python: bool,
    /// Path of the run's log file, shown in the report.
    pub log_file: Option<PathBuf>,
}

/// Everything a setup run found and did.
#[derive(Debug, Clone, Serialize)]
pub struct SetupSummary {
    /// `None` when the step was skipped.
    pub packages_installed: Option<bool>,
    pub services: Vec<ServiceReport>,
    pub portal: PortalStatus,
    pub video_group: GroupMembership,
    pub module: Option<ModuleSource>,
    pub virtual_camera: Option<VirtualCamera>,
    pub pipewire_initial: PipewireCheck,
    /// Node check after the final restart.
    pub pipewire: PipewireCheck,
    pub python_installed: Option<bool>,
    pub physical_devices: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
    pub log_file: Option<PathBuf>,
    pub virtual_device: PathBuf,
}

impl SetupSummary {
    pub fn virtual_camera_present(&self) -> bool {
        self.virtual_camera.as_ref().is_some_and(|c| c.present)
    }

    pub fn relogin_required(&self) -> bool {
        self.video_group.relogin_required()
    }

    /// Every structured issue collected during the run.
    pub fn issues(&self) -> Vec<SetupError> {
        let mut issues: Vec<SetupError> =
            self.services.iter().flat_map(ServiceReport::issues).collect();
        if self.pipewire.tool_missing {
            issues.push(SetupError::ExternalToolMissing {
                tool: "pw-cli/pw-dump".to_string(),
            });
        }
        let mut unique = Vec::with_capacity(issues.len());
        for issue in issues {
            if !unique.contains(&issue) {
                unique.push(issue);
            }
        }
        unique
    }
}

/// Whether the escalation tool can be run. Absolute or relative paths are
/// checked directly, bare names are looked up on `PATH`.
pub fn escalation_available(tool: &str) -> bool {
    if tool.contains('/') {
        Path::new(tool).is_file()
    } else {
        find_executable(tool).is_some()
    }
}

/// Run every setup step against `host`.
pub fn run_setup(
    host: &Host<'_>,
    probe: Option<&dyn BusProbe>,
    options: &SetupOptions,
) -> Result<SetupSummary, SetupError> {
    let config = host.config();
    if !escalation_available(&config.escalation) {
        return Err(SetupError::PrivilegeEscalationMissing {
            tool: config.escalation.clone(),
        });
    }
    info!("Starting setup");

    Output::header("System packages");
    let packages_installed = if options.skip_packages {
        Output::info("Skipping package installation");
        None
    } else {
        Some(packages::install_system_packages(host).success())
    };

    Output::header("D-Bus services");
    let services = fix_services(host, probe);

    Output::header("Desktop portal");
    let portal = pipewire::ensure_portal_running(host);

    Output::header("Video group");
    let video_group = groups::ensure_video_group_membership(host);

    Output::header("Virtual camera");
    let (module, virtual_camera) = if options.skip_kmod {
        Output::info("Skipping the v4l2loopback module");
        (None, None)
    } else {
        let module = kmod::ensure_v4l2loopback_module(host);
        (Some(module), Some(kmod::load_virtual_camera_and_wait(host)))
    };

    Output::header("PipeWire");
    let pipewire_initial = pipewire::start_user_services_and_wait(host);
    pipewire::restart_user_services(host);
    let pipewire = pipewire::start_user_services_and_wait(host);

    Output::header("Python dependencies");
    let python_installed = if options.skip_python {
        Output::info("Skipping Python dependencies");
        None
    } else {
        Some(packages::install_python_dependencies(host))
    };

    Output::header("Devices");
    let physical_devices = devices::list_physical_video_devices(host);
    if physical_devices.is_empty() {
        Output::warning("No physical /dev/video* devices found");
    } else {
        for device in &physical_devices {
            Output::step(device.display().to_string());
        }
    }
    let diagnostics = devices::collect_diagnostics(host);

    let summary = SetupSummary {
        packages_installed,
        services,
        portal,
        video_group,
        module,
        virtual_camera,
        pipewire_initial,
        pipewire,
        python_installed,
        physical_devices,
        diagnostics,
        log_file: options.log_file.clone(),
        virtual_device: host.virtual_device(),
    };
    let issues = summary.issues();
    if !issues.is_empty() {
        warn!("Setup finished with {} issue(s)", issues.len());
    }
    Ok(summary)
}

/// Resolve and remediate every configured D-Bus service.
fn fix_services(host: &Host<'_>, probe: Option<&dyn BusProbe>) -> Vec<ServiceReport> {
    let config = host.config();
    let init = host.systemctl();
    let fixer = ServiceFixer::new(
        UnitResolver::new(&init, &config.heuristics, &config.unit_paths),
        UnitRemediator::new(&init),
        probe,
    );

    config
        .dbus_services
        .iter()
        .filter_map(|service| {
            match ServiceQuery::new(service.clone(), config.scope_order.clone()) {
                Ok(query) => Some(query),
                Err(e) => {
                    Output::error(e.to_string());
                    None
                }
            }
        })
        .map(|query| {
            Output::info(format!("Resolving {}...", query.service_name()));
            let report = fixer.fix(&query);
            match (&report.unit, &report.remediation) {
                (None, _) => Output::warning(format!(
                    "No systemd unit found for {}",
                    query.service_name()
                )),
                (Some(unit), Some(result)) if result.is_blocked() => Output::error(format!(
                    "{} is still masked; manual intervention required",
                    unit.unit_name
                )),
                (Some(unit), _) if report.is_active() => {
                    Output::success(format!("{} is active", unit.unit_name))
                }
                (Some(unit), _) => Output::warning(format!(
                    "{} is not active; a logout/login or reboot may be required",
                    unit.unit_name
                )),
            }
            report
        })
        .collect()
}
