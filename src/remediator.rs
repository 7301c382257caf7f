//! Bring a resolved unit into an unmasked, active, enabled state.
//!
//! The protocol, in order:
//!
//! 1. Mask check in the unit's scope. An unmasked unit skips step 2.
//! 2. Unmask. User scope tries `systemctl --user unmask` and falls back to an
//!    escalated system-wide unmask (a unit found in user scope can be an
//!    alias of a system unit). System scope goes straight to the escalated
//!    unmask. If the unit is still masked, stop here.
//! 3. `daemon-reload` in the unit's scope.
//! 4. `start`, then `enable`. Both are always attempted.
//! 5. `status`. When running, re-check the mask: another agent may have
//!    masked it again, which is reported as a warning.
//!
//! Every step is best-effort and recorded; nothing here returns an error.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{info, warn};

use crate::command_runner::CommandOutcome;
use crate::error::SetupError;
use crate::predicates;
use crate::resolver::UnitCandidate;
use crate::scope::Scope;
use crate::systemctl::{InitSystem, MaskState};

/// A remediation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    MaskCheck,
    UnmaskUser,
    UnmaskSystem,
    DaemonReload,
    Start,
    Enable,
    Status,
    MaskRecheck,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::MaskCheck => "mask check",
            Step::UnmaskUser => "unmask (user)",
            Step::UnmaskSystem => "unmask (system-wide)",
            Step::DaemonReload => "daemon-reload",
            Step::Start => "start",
            Step::Enable => "enable",
            Step::Status => "status",
            Step::MaskRecheck => "mask re-check",
        }
    }
}

/// What happened during one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub ok: bool,
    pub detail: String,
    /// The underlying tool was missing.
    pub tool_missing: bool,
}

impl StepRecord {
    fn from_outcome(step: Step, outcome: &CommandOutcome) -> Self {
        Self {
            step,
            ok: outcome.success(),
            detail: outcome.describe(),
            tool_missing: outcome.is_not_found(),
        }
    }

    fn note(step: Step, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            step,
            ok,
            detail: detail.into(),
            tool_missing: false,
        }
    }
}

/// Final state of a remediation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationResult {
    pub unit: UnitCandidate,
    pub was_masked: bool,
    /// Raw mask check result; `Unknown` is treated as not masked.
    pub mask_state: MaskState,
    /// True when the unit is unmasked after step 2, including when no unmask was needed.
    pub unmask_succeeded: bool,
    pub started: bool,
    pub enabled: bool,
    pub final_active: bool,
    pub re_masked_after_start: bool,
    pub steps: Vec<StepRecord>,
    pub diagnostic_text: String,
}

impl RemediationResult {
    /// Masked and every unmask attempt failed.
    pub fn is_blocked(&self) -> bool {
        self.was_masked && !self.unmask_succeeded
    }

    /// Structured issues for the caller's report.
    pub fn issues(&self) -> Vec<SetupError> {
        let mut issues = Vec::new();
        if self.is_blocked() {
            issues.push(SetupError::RemediationBlocked {
                unit: self.unit.unit_name.clone(),
                scope: self.unit.scope,
            });
        }
        if self.steps.iter().any(|s| s.tool_missing) || self.mask_state == MaskState::Unknown {
            issues.push(SetupError::ExternalToolMissing {
                tool: "systemctl".to_string(),
            });
        }
        for record in self.steps.iter().filter(|s| !s.ok && !s.tool_missing) {
            // A failed user unmask that the system fallback fixed is not an issue.
            if record.step == Step::UnmaskUser && self.unmask_succeeded {
                continue;
            }
            if record.step == Step::MaskRecheck {
                continue;
            }
            issues.push(SetupError::TransientCommandFailure {
                command: format!("{} {}", record.step.label(), self.unit.unit_name),
                detail: record.detail.clone(),
            });
        }
        issues
    }
}

/// Runs the remediation protocol against an [`InitSystem`].
pub struct UnitRemediator<'a> {
    init: &'a dyn InitSystem,
}

impl<'a> UnitRemediator<'a> {
    pub fn new(init: &'a dyn InitSystem) -> Self {
        Self { init }
    }

    pub fn remediate_unit(&self, candidate: &UnitCandidate) -> RemediationResult {
        let unit = candidate.unit_name.as_str();
        let scope = candidate.scope;
        let mut steps = Vec::new();

        let mask_state = self.init.mask_state(unit, scope);
        steps.push(StepRecord::note(
            Step::MaskCheck,
            mask_state != MaskState::Unknown,
            match mask_state {
                MaskState::Masked => "masked",
                MaskState::NotMasked => "not masked",
                MaskState::Unknown => "unknown (treated as not masked)",
            },
        ));

        let mut result = RemediationResult {
            unit: candidate.clone(),
            was_masked: mask_state.is_masked(),
            mask_state,
            unmask_succeeded: true,
            started: false,
            enabled: false,
            final_active: false,
            re_masked_after_start: false,
            steps: Vec::new(),
            diagnostic_text: String::new(),
        };

        if result.was_masked {
            result.unmask_succeeded = self.unmask(unit, scope, &mut steps);
        }
        if !result.unmask_succeeded {
            warn!(
                "Failed to unmask '{}' in any scope; manual intervention may be required",
                unit
            );
            result.diagnostic_text = render_diagnostics(candidate, &steps, None);
            result.steps = steps;
            return result;
        }

        let reload = self.init.daemon_reload(scope);
        steps.push(StepRecord::from_outcome(Step::DaemonReload, &reload));

        let start = self.init.start(unit, scope);
        steps.push(StepRecord::from_outcome(Step::Start, &start));
        result.started = start.success();
        let enable = self.init.enable(unit, scope);
        steps.push(StepRecord::from_outcome(Step::Enable, &enable));
        result.enabled = enable.success();

        let status = self.init.status(unit, scope);
        result.final_active =
            status.success() && predicates::status_reports_running(&status.output);
        steps.push(StepRecord::note(
            Step::Status,
            result.final_active,
            if result.final_active {
                "active (running)".to_string()
            } else {
                format!("not running ({})", status.describe())
            },
        ));

        if result.final_active {
            info!("{} service '{}' is active and running", scope.label(), unit);
            result.re_masked_after_start = self.init.mask_state(unit, scope).is_masked();
            steps.push(StepRecord::note(
                Step::MaskRecheck,
                !result.re_masked_after_start,
                if result.re_masked_after_start {
                    "masked again after start; a reboot is recommended"
                } else {
                    "not masked"
                },
            ));
            if result.re_masked_after_start {
                warn!("'{}' is reported as masked again after starting", unit);
            }
        } else {
            warn!(
                "{} service '{}' is not active after remediation",
                scope.label(),
                unit
            );
        }

        result.diagnostic_text = render_diagnostics(candidate, &steps, Some(&status));
        result.steps = steps;
        result
    }

    /// Attempt the unmask paths for `scope`; true once any succeeds.
    fn unmask(&self, unit: &str, scope: Scope, steps: &mut Vec<StepRecord>) -> bool {
        info!("Attempting to unmask {} unit '{}'", scope, unit);
        if scope == Scope::User {
            let outcome = self.init.unmask_user(unit);
            steps.push(StepRecord::from_outcome(Step::UnmaskUser, &outcome));
            if outcome.success() {
                return true;
            }
            warn!(
                "User scope unmask failed for '{}'; falling back to system-wide unmask",
                unit
            );
        }
        let outcome = self.init.unmask_system(unit);
        steps.push(StepRecord::from_outcome(Step::UnmaskSystem, &outcome));
        outcome.success()
    }
}

/// Operator-facing summary. `status` is `None` when the sequence stopped at the unmask.
fn render_diagnostics(
    candidate: &UnitCandidate,
    steps: &[StepRecord],
    status: Option<&CommandOutcome>,
) -> String {
    let mut text = format!(
        "{} ({} scope, found by {})\n",
        candidate.unit_name, candidate.scope, candidate.discovery_method
    );
    for record in steps {
        let mark = if record.ok { "ok" } else { "!!" };
        let _ = writeln!(text, "  [{mark}] {}: {}", record.step.label(), record.detail);
    }
    match status {
        None => text.push_str("  Result: still masked; start and enable were not attempted\n"),
        Some(status) if predicates::status_reports_running(&status.output) && status.success() => {
            text.push_str("  Result: active\n")
        }
        Some(status) => {
            text.push_str("  Result: inactive; a logout/login or reboot may be required\n");
            for line in status.output.lines().filter(|l| !l.trim().is_empty()) {
                let _ = writeln!(text, "    | {line}");
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::testing::MockCommandRunner;
    use crate::resolver::DiscoveryMethod;
    use crate::systemctl::Systemctl;
    use std::time::Duration;

    const RUNNING: &str = "● a.service\n     Loaded: loaded\n     Active: active (running) since today\n";

    fn candidate(scope: Scope) -> UnitCandidate {
        UnitCandidate {
            unit_name: "a.service".to_string(),
            scope,
            discovery_method: DiscoveryMethod::Heuristic,
        }
    }

    fn remediate(mock: &MockCommandRunner, scope: Scope) -> RemediationResult {
        let init = Systemctl::new(mock, "sudo", Duration::from_secs(1));
        UnitRemediator::new(&init).remediate_unit(&candidate(scope))
    }

    #[test]
    fn test_unmasked_unit_never_unmasks() {
        let mock = MockCommandRunner::new();
        mock.ok("systemctl --user is-enabled a.service", "enabled\n");
        mock.ok("systemctl --user daemon-reload", "");
        mock.ok("systemctl --user start a.service", "");
        mock.ok("systemctl --user enable a.service", "");
        mock.ok("systemctl --user status a.service", RUNNING);

        let result = remediate(&mock, Scope::User);
        assert!(!result.was_masked);
        assert!(result.unmask_succeeded);
        assert!(result.started && result.enabled && result.final_active);
        assert!(!result.re_masked_after_start);
        assert!(!mock.called_with("unmask"));
        assert!(result.issues().is_empty());
        assert!(result.diagnostic_text.contains("Result: active"));
    }

    #[test]
    fn test_remediation_is_idempotent_for_active_unit() {
        let mock = MockCommandRunner::new().with_fallback(CommandOutcome::exited(0, ""));
        mock.ok("systemctl --user is-enabled a.service", "enabled\n");
        mock.ok("systemctl --user status a.service", RUNNING);

        let first = remediate(&mock, Scope::User);
        let second = remediate(&mock, Scope::User);
        assert!(first.final_active);
        assert!(second.final_active);
        assert_eq!(first, second);
        assert!(!mock.called_with("unmask"));
        assert!(first.issues().is_empty());
    }

    #[test]
    fn test_blocked_when_every_unmask_fails() {
        let mock = MockCommandRunner::new();
        mock.on(
            "systemctl --user is-enabled a.service",
            CommandOutcome::exited(1, "masked\n"),
        );
        mock.fail("systemctl --user unmask a.service", "Access denied");
        mock.fail("sudo systemctl unmask a.service", "sudo: a password is required");

        let result = remediate(&mock, Scope::User);
        assert!(result.was_masked);
        assert!(!result.unmask_succeeded);
        assert!(!result.started && !result.enabled && !result.final_active);
        assert!(result.is_blocked());
        assert!(!mock.called_with("start"));
        assert!(!mock.called_with("enable a.service"));
        assert!(!mock.called_with("daemon-reload"));
        assert!(result.issues().contains(&SetupError::RemediationBlocked {
            unit: "a.service".into(),
            scope: Scope::User
        }));
        assert!(result.diagnostic_text.contains("still masked"));
    }

    #[test]
    fn test_user_unmask_falls_back_to_system() {
        let mock = MockCommandRunner::new();
        mock.on(
            "systemctl --user is-enabled a.service",
            CommandOutcome::exited(1, "masked\n"),
        );
        mock.on(
            "systemctl --user is-enabled a.service",
            CommandOutcome::exited(0, "enabled\n"),
        );
        mock.fail("systemctl --user unmask a.service", "Unit file a.service does not exist.");
        mock.ok("sudo systemctl unmask a.service", "Removed /etc/systemd/system/a.service.");
        mock.ok("systemctl --user daemon-reload", "");
        mock.ok("systemctl --user start a.service", "");
        mock.ok("systemctl --user enable a.service", "");
        mock.ok("systemctl --user status a.service", RUNNING);

        let result = remediate(&mock, Scope::User);
        assert!(result.was_masked);
        assert!(result.unmask_succeeded);
        assert!(result.started && result.enabled && result.final_active);
        assert!(!result.re_masked_after_start);

        let calls = mock.calls();
        let pos = |needle: &str| calls.iter().position(|c| c == needle).unwrap();
        assert!(pos("systemctl --user unmask a.service") < pos("sudo systemctl unmask a.service"));
        assert!(pos("sudo systemctl unmask a.service") < pos("systemctl --user daemon-reload"));
        assert!(pos("systemctl --user start a.service") < pos("systemctl --user enable a.service"));
        assert!(result.issues().is_empty());
    }

    #[test]
    fn test_system_scope_goes_straight_to_escalated_unmask() {
        let mock = MockCommandRunner::new();
        mock.on(
            "systemctl --system is-enabled a.service",
            CommandOutcome::exited(1, "masked\n"),
        );
        mock.ok("systemctl --system is-enabled a.service", "enabled\n");
        mock.ok("sudo systemctl unmask a.service", "");
        mock.ok("systemctl --system status a.service", RUNNING);

        let result = remediate(&mock, Scope::System);
        assert!(result.unmask_succeeded);
        assert!(!mock.called_with("--user"));
        assert!(mock.called_with("systemctl --system daemon-reload"));
    }

    #[test]
    fn test_re_masked_after_start_is_a_warning() {
        let mock = MockCommandRunner::new().with_fallback(CommandOutcome::exited(0, ""));
        mock.ok("systemctl --user is-enabled a.service", "enabled\n");
        mock.on(
            "systemctl --user is-enabled a.service",
            CommandOutcome::exited(1, "masked\n"),
        );
        mock.ok("systemctl --user status a.service", RUNNING);

        let result = remediate(&mock, Scope::User);
        assert!(result.final_active);
        assert!(result.re_masked_after_start);
        assert!(!result.is_blocked());
        assert!(result.diagnostic_text.contains("masked again"));
    }

    #[test]
    fn test_start_failure_does_not_skip_enable() {
        let mock = MockCommandRunner::new();
        mock.ok("systemctl --user is-enabled a.service", "disabled\n");
        mock.fail("systemctl --user start a.service", "Job failed");
        mock.ok("systemctl --user enable a.service", "");
        mock.on(
            "systemctl --user status a.service",
            CommandOutcome::exited(3, "     Active: failed (Result: exit-code)\n"),
        );

        let result = remediate(&mock, Scope::User);
        assert!(!result.started);
        assert!(result.enabled);
        assert!(!result.final_active);
        assert!(mock.called_with("systemctl --user enable a.service"));
        assert!(result.diagnostic_text.contains("Active: failed"));
        assert!(result.issues().iter().any(|i| matches!(
            i,
            SetupError::TransientCommandFailure { command, .. } if command == "start a.service"
        )));
    }

    #[test]
    fn test_unknown_mask_state_proceeds() {
        let mock = MockCommandRunner::new();
        mock.on("systemctl --user is-enabled a.service", CommandOutcome::not_found());

        let result = remediate(&mock, Scope::User);
        assert_eq!(result.mask_state, MaskState::Unknown);
        assert!(!result.was_masked);
        assert!(!mock.called_with("unmask"));
        assert!(mock.called_with("systemctl --user start a.service"));
        assert!(result.issues().contains(&SetupError::ExternalToolMissing {
            tool: "systemctl".into()
        }));
    }
}
