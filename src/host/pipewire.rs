//! The desktop portal and the PipeWire user services.

use serde::Serialize;
use tracing::{info, warn};

use super::Host;
use crate::command_runner::CommandOutcome;
use crate::output::Output;
use crate::predicates;
use crate::scope::Scope;
use crate::systemctl::InitSystem;

pub const PORTAL_UNIT: &str = "xdg-desktop-portal.service";

/// Portal state after [`ensure_portal_running`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortalStatus {
    pub running: bool,
    /// The status output showed PipeWire connection errors.
    pub errors_detected: bool,
    pub restarted: bool,
    /// Errors were still present after the restart.
    pub errors_persist: bool,
}

/// State of one PipeWire user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceState {
    pub unit: String,
    pub running: bool,
}

/// Result of [`start_user_services_and_wait`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipewireCheck {
    pub services: Vec<ServiceState>,
    pub video_nodes: bool,
    /// Last node listing, empty when no listing tool was available.
    pub nodes_output: String,
    pub tool_missing: bool,
}

/// Start the portal user service; restart it once if its log shows PipeWire errors.
pub fn ensure_portal_running(host: &Host<'_>) -> PortalStatus {
    Output::info("Checking xdg-desktop-portal...");
    let init = host.systemctl();
    init.start(PORTAL_UNIT, Scope::User);

    let status = init.status(PORTAL_UNIT, Scope::User);
    let mut result = PortalStatus {
        running: is_running(&status),
        ..PortalStatus::default()
    };
    if !result.running {
        Output::warning("xdg-desktop-portal is not active; the desktop session may need a restart");
        return result;
    }
    info!("{} is active and running", PORTAL_UNIT);

    if !predicates::portal_log_has_errors(&status.output) {
        Output::success("xdg-desktop-portal is running");
        return result;
    }
    result.errors_detected = true;
    Output::warning("xdg-desktop-portal reports PipeWire connection errors; restarting it");
    init.restart(&[PORTAL_UNIT], Scope::User);
    result.restarted = true;

    let recheck = init.status(PORTAL_UNIT, Scope::User);
    result.running = is_running(&recheck);
    if !result.running {
        Output::error("xdg-desktop-portal did not come back after the restart");
    } else if predicates::portal_log_has_errors(&recheck.output) {
        result.errors_persist = true;
        Output::warning("Portal errors persist after the restart; a reboot may be necessary");
    } else {
        Output::success("xdg-desktop-portal restarted cleanly");
    }
    result
}

/// Enable and start each configured user service, then wait for video nodes.
pub fn start_user_services_and_wait(host: &Host<'_>) -> PipewireCheck {
    Output::info("Starting PipeWire and WirePlumber user services...");
    let init = host.systemctl();
    let services = host
        .config()
        .user_services
        .iter()
        .map(|unit| {
            init.enable(unit, Scope::User);
            init.start(unit, Scope::User);
            let status = init.status(unit, Scope::User);
            let running = is_running(&status);
            if running {
                Output::step(format!("{unit}: active"));
            } else {
                Output::warning(format!("{unit} is not active ({})", status.describe()));
                for line in status.output.lines().filter(|l| !l.trim().is_empty()) {
                    Output::live(line);
                }
            }
            ServiceState {
                unit: unit.clone(),
                running,
            }
        })
        .collect();

    let mut check = PipewireCheck {
        services,
        ..PipewireCheck::default()
    };

    let wait = host.polling().pipewire_wait;
    let spinner = Output::spinner(format!(
        "Waiting up to {}s for PipeWire to list video nodes...",
        wait.as_secs()
    ));
    let mut nodes_output = String::new();
    let mut tool_missing = false;
    let found = host.poll_until(wait, || match list_nodes(host) {
        Some(outcome) => {
            let found = outcome.success() && predicates::pipewire_lists_video(&outcome.output);
            nodes_output = outcome.output;
            found
        }
        None => {
            tool_missing = true;
            // Nothing to wait for.
            true
        }
    });
    check.video_nodes = found && !tool_missing;
    check.nodes_output = nodes_output;
    check.tool_missing = tool_missing;

    if check.tool_missing {
        spinner.finish_warning("pw-cli and pw-dump not found; skipping node enumeration");
    } else if check.video_nodes {
        spinner.finish_success("PipeWire lists video devices");
    } else {
        spinner.finish_warning("PipeWire did not report video nodes in time");
    }
    check
}

/// Restart every configured user service in one call.
pub fn restart_user_services(host: &Host<'_>) -> CommandOutcome {
    Output::info("Restarting PipeWire and WirePlumber user services...");
    let units: Vec<&str> = host
        .config()
        .user_services
        .iter()
        .map(String::as_str)
        .collect();
    let outcome = host.systemctl().restart(&units, Scope::User);
    if !outcome.success() {
        warn!("Restarting user services failed: {}", outcome.describe());
    }
    outcome
}

/// List PipeWire objects with `pw-cli`, falling back to `pw-dump`.
///
/// `None` when neither tool is installed.
pub fn list_nodes(host: &Host<'_>) -> Option<CommandOutcome> {
    let outcome = host.quiet("pw-cli", &["list-objects"]);
    if !outcome.is_not_found() {
        return Some(outcome);
    }
    let outcome = host.quiet("pw-dump", &[]);
    (!outcome.is_not_found()).then_some(outcome)
}

fn is_running(status: &CommandOutcome) -> bool {
    status.success() && predicates::status_reports_running(&status.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::testing::MockCommandRunner;
    use crate::config::SetupConfig;
    use crate::host::test_support::fast_polling;

    const RUNNING: &str = "     Active: active (running) since Mon\n";
    const PORTAL_ERROR: &str =
        "     Active: active (running)\nxdg-desktop-por[123]: Caught PipeWire error: connection error\n";

    #[test]
    fn test_healthy_portal_is_not_restarted() {
        let mock = MockCommandRunner::new();
        mock.ok("systemctl --user status xdg-desktop-portal.service", RUNNING);
        let config = SetupConfig::default();
        let status = ensure_portal_running(&Host::new(&mock, &config));
        assert!(status.running);
        assert!(!status.errors_detected);
        assert!(!mock.called_with("restart"));
    }

    #[test]
    fn test_portal_errors_trigger_one_restart() {
        let mock = MockCommandRunner::new();
        mock.ok("systemctl --user status xdg-desktop-portal.service", PORTAL_ERROR);
        mock.ok("systemctl --user status xdg-desktop-portal.service", RUNNING);
        let config = SetupConfig::default();
        let status = ensure_portal_running(&Host::new(&mock, &config));
        assert!(status.errors_detected && status.restarted && status.running);
        assert!(!status.errors_persist);
        assert_eq!(mock.count("restart xdg-desktop-portal.service"), 1);
    }

    #[test]
    fn test_inactive_portal() {
        let mock = MockCommandRunner::new();
        mock.on(
            "systemctl --user status xdg-desktop-portal.service",
            CommandOutcome::exited(3, "     Active: inactive (dead)\n"),
        );
        let config = SetupConfig::default();
        let status = ensure_portal_running(&Host::new(&mock, &config));
        assert!(!status.running);
        assert!(!mock.called_with("restart"));
    }

    #[test]
    fn test_services_started_and_nodes_found() {
        let mock = MockCommandRunner::new().with_fallback(CommandOutcome::exited(0, RUNNING));
        mock.ok(
            "pw-cli list-objects",
            "id 42, type PipeWire:Interface:Node\n  media.class = \"Video/Source\"\n",
        );
        mock.ok(
            "pw-cli list-objects",
            "id 43, type PipeWire:Interface:Node\n  api.v4l2.path = \"/dev/video0\"\n",
        );
        let config = SetupConfig::default();
        let host = Host::new(&mock, &config).with_polling(fast_polling());

        let check = start_user_services_and_wait(&host);
        assert_eq!(check.services.len(), 3);
        assert!(check.services.iter().all(|s| s.running));
        assert!(check.video_nodes);
        assert!(check.nodes_output.contains("/dev/video0"));
        let calls = mock.calls();
        let pos = |needle: &str| calls.iter().position(|c| c == needle).unwrap();
        assert!(
            pos("systemctl --user enable pipewire.service")
                < pos("systemctl --user start pipewire.service")
        );
    }

    #[test]
    fn test_missing_listing_tools() {
        let mock = MockCommandRunner::new().with_fallback(CommandOutcome::exited(0, RUNNING));
        mock.on("pw-cli list-objects", CommandOutcome::not_found());
        mock.on("pw-dump", CommandOutcome::not_found());
        let config = SetupConfig::default();
        let host = Host::new(&mock, &config).with_polling(fast_polling());

        let check = start_user_services_and_wait(&host);
        assert!(check.tool_missing);
        assert!(!check.video_nodes);
        assert_eq!(mock.count("pw-dump"), 1);
    }

    #[test]
    fn test_pw_dump_fallback() {
        let mock = MockCommandRunner::new();
        mock.on("pw-cli list-objects", CommandOutcome::not_found());
        mock.ok("pw-dump", "[{\"info\": {\"props\": {\"media.class\": \"Video/Device\"}}}]");
        let config = SetupConfig::default();
        let outcome = list_nodes(&Host::new(&mock, &config)).unwrap();
        assert!(predicates::pipewire_lists_video(&outcome.output));
    }

    #[test]
    fn test_restart_is_single_call() {
        let mock = MockCommandRunner::new();
        let config = SetupConfig::default();
        restart_user_services(&Host::new(&mock, &config));
        assert_eq!(
            mock.calls(),
            vec!["systemctl --user restart pipewire.service pipewire-pulse.service wireplumber.service"]
        );
    }
}
