//! Init-system primitives over the `systemctl` CLI.
//!
//! The resolver and remediator only talk to the service manager through
//! [`InitSystem`]. [`Systemctl`] implements it by shelling out through a
//! [`CommandRunner`], which keeps every call bounded by a timeout and
//! guarantees that no primitive raises: each returns a [`CommandOutcome`]
//! (or a value derived from one) that the caller inspects.
//!
//! All `systemctl` calls pass the scope flag explicitly (`--user` or
//! `--system`). The only escalated call is the system-wide unmask, which is
//! prefixed by the configured escalation tool (normally `sudo`).

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::command_runner::{CommandOptions, CommandOutcome, CommandRunner, ExitKind};
use crate::predicates;
use crate::scope::Scope;

/// Result of a mask check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskState {
    Masked,
    NotMasked,
    /// `systemctl` was missing or did not answer in time.
    Unknown,
}

impl MaskState {
    pub fn is_masked(self) -> bool {
        self == MaskState::Masked
    }
}

/// The service-manager operations needed to resolve and repair units.
pub trait InitSystem {
    /// Ask the service manager which unit backs a D-Bus service name.
    fn unit_for_service(&self, service: &str, scope: Scope) -> CommandOutcome;

    /// Whether a unit file with this exact name is installed in `scope`.
    fn unit_file_exists(&self, unit: &str, scope: Scope) -> bool;

    fn mask_state(&self, unit: &str, scope: Scope) -> MaskState;

    /// Unmask using the per-user manager.
    fn unmask_user(&self, unit: &str) -> CommandOutcome;

    /// Unmask system-wide with privilege escalation.
    fn unmask_system(&self, unit: &str) -> CommandOutcome;

    fn daemon_reload(&self, scope: Scope) -> CommandOutcome;

    fn start(&self, unit: &str, scope: Scope) -> CommandOutcome;

    fn enable(&self, unit: &str, scope: Scope) -> CommandOutcome;

    /// Restart one or more units in a single call.
    fn restart(&self, units: &[&str], scope: Scope) -> CommandOutcome;

    fn status(&self, unit: &str, scope: Scope) -> CommandOutcome;
}

/// [`InitSystem`] backed by the `systemctl` binary.
pub struct Systemctl<'a> {
    runner: &'a dyn CommandRunner,
    escalation: String,
    timeout: Duration,
}

impl<'a> Systemctl<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        escalation: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            escalation: escalation.into(),
            timeout,
        }
    }

    fn options(&self) -> CommandOptions {
        CommandOptions::with_timeout(self.timeout)
    }

    fn systemctl(&self, scope: Scope, args: &[&str]) -> CommandOutcome {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(scope.flag());
        full.extend_from_slice(args);
        let outcome = self.runner.run_captured("systemctl", &full, &self.options());
        if !outcome.success() {
            debug!(
                scope = %scope,
                args = ?args,
                result = %outcome.describe(),
                "systemctl call did not succeed"
            );
        }
        outcome
    }
}

impl InitSystem for Systemctl<'_> {
    fn unit_for_service(&self, service: &str, scope: Scope) -> CommandOutcome {
        self.systemctl(scope, &["show", service, "--property=Unit", "--value"])
    }

    fn unit_file_exists(&self, unit: &str, scope: Scope) -> bool {
        let outcome = self.systemctl(scope, &["list-unit-files", "--full", "--all", unit]);
        outcome.success() && predicates::unit_file_listed(&outcome.output, unit)
    }

    fn mask_state(&self, unit: &str, scope: Scope) -> MaskState {
        let outcome = self.systemctl(scope, &["is-enabled", unit]);
        match outcome.exit {
            ExitKind::NotFound | ExitKind::TimedOut => {
                warn!(unit, scope = %scope, "Cannot determine mask state: {}", outcome.describe());
                MaskState::Unknown
            }
            _ if predicates::mask_report_is_masked(&outcome.output) => MaskState::Masked,
            _ => MaskState::NotMasked,
        }
    }

    fn unmask_user(&self, unit: &str) -> CommandOutcome {
        self.systemctl(Scope::User, &["unmask", unit])
    }

    fn unmask_system(&self, unit: &str) -> CommandOutcome {
        self.runner.run_captured(
            &self.escalation,
            &["systemctl", "unmask", unit],
            &self.options(),
        )
    }

    fn daemon_reload(&self, scope: Scope) -> CommandOutcome {
        self.systemctl(scope, &["daemon-reload"])
    }

    fn start(&self, unit: &str, scope: Scope) -> CommandOutcome {
        self.systemctl(scope, &["start", unit])
    }

    fn enable(&self, unit: &str, scope: Scope) -> CommandOutcome {
        self.systemctl(scope, &["enable", unit])
    }

    fn restart(&self, units: &[&str], scope: Scope) -> CommandOutcome {
        let mut args = vec!["restart"];
        args.extend_from_slice(units);
        self.systemctl(scope, &args)
    }

    fn status(&self, unit: &str, scope: Scope) -> CommandOutcome {
        self.systemctl(scope, &["status", unit])
    }
}
