//! Resolve-then-remediate for D-Bus services.
//!
//! [`ServiceFixer`] ties a [`UnitResolver`] and a [`UnitRemediator`]
//! together and, when a [`BusProbe`] is supplied, asks the bus afterwards
//! whether the service name is now owned.

use serde::Serialize;

use crate::bus::BusProbe;
use crate::error::SetupError;
use crate::remediator::{RemediationResult, UnitRemediator};
use crate::resolver::{UnitCandidate, UnitResolver};
use crate::scope::ServiceQuery;

/// What happened for one D-Bus service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReport {
    pub service: String,
    pub unit: Option<UnitCandidate>,
    pub remediation: Option<RemediationResult>,
    /// Name ownership on the unit's bus after remediation; `None` when unknown.
    pub bus_owned: Option<bool>,
}

impl ServiceReport {
    /// Structured issues, empty for a fully healthy service.
    pub fn issues(&self) -> Vec<SetupError> {
        match (&self.unit, &self.remediation) {
            (None, _) => vec![SetupError::NotFound {
                service: self.service.clone(),
            }],
            (Some(_), Some(result)) => result.issues(),
            (Some(_), None) => Vec::new(),
        }
    }

    /// The unit was found, unblocked, and is running.
    pub fn is_active(&self) -> bool {
        self.remediation
            .as_ref()
            .is_some_and(|r| r.final_active && !r.is_blocked())
    }
}

pub struct ServiceFixer<'a> {
    resolver: UnitResolver<'a>,
    remediator: UnitRemediator<'a>,
    probe: Option<&'a dyn BusProbe>,
}

impl<'a> ServiceFixer<'a> {
    pub fn new(
        resolver: UnitResolver<'a>,
        remediator: UnitRemediator<'a>,
        probe: Option<&'a dyn BusProbe>,
    ) -> Self {
        Self {
            resolver,
            remediator,
            probe,
        }
    }

    /// Resolve only.
    pub fn resolve(&self, query: &ServiceQuery) -> ServiceReport {
        ServiceReport {
            service: query.service_name().to_string(),
            unit: self.resolver.resolve_unit_for_service(query),
            remediation: None,
            bus_owned: None,
        }
    }

    /// Resolve, then remediate whatever was found.
    pub fn fix(&self, query: &ServiceQuery) -> ServiceReport {
        let mut report = self.resolve(query);
        if let Some(unit) = &report.unit {
            report.remediation = Some(self.remediator.remediate_unit(unit));
            report.bus_owned = self
                .probe
                .and_then(|probe| probe.name_has_owner(query.service_name(), unit.scope));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::MockBusProbe;
    use crate::command_runner::CommandOutcome;
    use crate::command_runner::testing::MockCommandRunner;
    use crate::config::UnitSearchPaths;
    use crate::heuristics::HeuristicTable;
    use crate::scope::Scope;
    use crate::systemctl::Systemctl;
    use std::path::PathBuf;
    use std::time::Duration;

    fn paths() -> UnitSearchPaths {
        UnitSearchPaths {
            user: vec![PathBuf::from("/nonexistent/camsetup/user")],
            system: vec![PathBuf::from("/nonexistent/camsetup/system")],
        }
    }

    #[test]
    fn test_unresolved_service_is_not_found() {
        let mock = MockCommandRunner::new();
        let init = Systemctl::new(&mock, "sudo", Duration::from_secs(1));
        let table = HeuristicTable::empty();
        let paths = paths();
        let fixer = ServiceFixer::new(
            UnitResolver::new(&init, &table, &paths),
            UnitRemediator::new(&init),
            None,
        );

        let report = fixer.fix(&ServiceQuery::with_default_order("org.example.Gone").unwrap());
        assert!(report.unit.is_none());
        assert!(report.remediation.is_none());
        assert_eq!(
            report.issues(),
            vec![SetupError::NotFound {
                service: "org.example.Gone".into()
            }]
        );
        assert!(!mock.called_with("start"));
    }

    #[test]
    fn test_fix_remediates_and_probes_bus() {
        let mock = MockCommandRunner::new().with_fallback(CommandOutcome::exited(0, ""));
        mock.ok(
            "systemctl --user show org.a11y.Bus --property=Unit --value",
            "at-spi-dbus-bus.service\n",
        );
        mock.ok("systemctl --user is-enabled at-spi-dbus-bus.service", "static\n");
        mock.ok(
            "systemctl --user status at-spi-dbus-bus.service",
            "     Active: active (running)\n",
        );
        let init = Systemctl::new(&mock, "sudo", Duration::from_secs(1));
        let table = HeuristicTable::empty();
        let paths = paths();
        let probe = MockBusProbe::new().with("org.a11y.Bus", Scope::User, true);
        let fixer = ServiceFixer::new(
            UnitResolver::new(&init, &table, &paths),
            UnitRemediator::new(&init),
            Some(&probe),
        );

        let report = fixer.fix(&ServiceQuery::with_default_order("org.a11y.Bus").unwrap());
        assert!(report.is_active());
        assert_eq!(report.bus_owned, Some(true));
        assert!(report.issues().is_empty());
    }

    #[test]
    fn test_resolve_does_not_touch_units() {
        let mock = MockCommandRunner::new();
        mock.ok(
            "systemctl --user show org.a11y.Bus --property=Unit --value",
            "at-spi-dbus-bus.service\n",
        );
        let init = Systemctl::new(&mock, "sudo", Duration::from_secs(1));
        let table = HeuristicTable::empty();
        let paths = paths();
        let fixer = ServiceFixer::new(
            UnitResolver::new(&init, &table, &paths),
            UnitRemediator::new(&init),
            None,
        );

        let report = fixer.resolve(&ServiceQuery::with_default_order("org.a11y.Bus").unwrap());
        assert!(report.unit.is_some());
        assert_eq!(mock.calls().len(), 1);
    }
}
