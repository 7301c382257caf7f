//! D-Bus service name to systemd unit resolution.
//!
//! For each scope in the query's order, three strategies are tried from most
//! to least precise:
//!
//! 1. **Direct query**: `systemctl show <name> --property=Unit --value`.
//!    Authoritative when it returns a usable unit name.
//! 2. **Unit-file scan**: search the scope's unit directories for a file that
//!    declares the service name on a `BusName=`/`ExecStart=`/`D-BusService=`
//!    line (see [`crate::unit_files`]).
//! 3. **Heuristic**: walk the [`HeuristicTable`] candidates for the name and
//!    return the first whose unit file is installed.
//!
//! The first scope that yields a unit wins. Finding nothing is an expected
//! outcome and is reported as `None`, not as an error.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::UnitSearchPaths;
use crate::heuristics::HeuristicTable;
use crate::predicates;
use crate::scope::{Scope, ServiceQuery};
use crate::systemctl::InitSystem;
use crate::unit_files;

/// Which strategy located a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMethod {
    DirectQuery,
    UnitFileGrep,
    Heuristic,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryMethod::DirectQuery => write!(f, "direct query"),
            DiscoveryMethod::UnitFileGrep => write!(f, "unit-file scan"),
            DiscoveryMethod::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// A unit believed to provide a D-Bus service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitCandidate {
    pub unit_name: String,
    pub scope: Scope,
    pub discovery_method: DiscoveryMethod,
}

/// Finds the unit behind a D-Bus service name.
pub struct UnitResolver<'a> {
    init: &'a dyn InitSystem,
    heuristics: &'a HeuristicTable,
    unit_paths: &'a UnitSearchPaths,
}

impl<'a> UnitResolver<'a> {
    pub fn new(
        init: &'a dyn InitSystem,
        heuristics: &'a HeuristicTable,
        unit_paths: &'a UnitSearchPaths,
    ) -> Self {
        Self {
            init,
            heuristics,
            unit_paths,
        }
    }

    /// Try every scope in the query's order; the first hit wins.
    pub fn resolve_unit_for_service(&self, query: &ServiceQuery) -> Option<UnitCandidate> {
        let found = query
            .scope_order()
            .iter()
            .find_map(|&scope| self.resolve(query.service_name(), scope));
        if found.is_none() {
            warn!(
                "No systemd unit found for D-Bus service '{}' in any scope",
                query.service_name()
            );
        }
        found
    }

    /// Resolve `service` within a single scope.
    pub fn resolve(&self, service: &str, scope: Scope) -> Option<UnitCandidate> {
        info!(
            "Searching for {} unit providing D-Bus service '{}'",
            scope, service
        );
        self.direct_query(service, scope)
            .or_else(|| self.unit_file_scan(service, scope))
            .or_else(|| self.heuristic(service, scope))
    }

    fn direct_query(&self, service: &str, scope: Scope) -> Option<UnitCandidate> {
        let outcome = self.init.unit_for_service(service, scope);
        if !outcome.success() {
            return None;
        }
        let unit_name = predicates::direct_query_hit(&outcome.output)?;
        info!(
            "systemd reports unit '{}' provides '{}' ({} scope)",
            unit_name, service, scope
        );
        Some(UnitCandidate {
            unit_name,
            scope,
            discovery_method: DiscoveryMethod::DirectQuery,
        })
    }

    fn unit_file_scan(&self, service: &str, scope: Scope) -> Option<UnitCandidate> {
        let path =
            unit_files::find_activating_unit_file(service, self.unit_paths.for_scope(scope))?;
        let unit_name = unit_files::unit_name(&path)?;
        info!(
            "Found candidate unit '{}' in '{}' for '{}'",
            unit_name,
            path.display(),
            service
        );
        Some(UnitCandidate {
            unit_name,
            scope,
            discovery_method: DiscoveryMethod::UnitFileGrep,
        })
    }

    fn heuristic(&self, service: &str, scope: Scope) -> Option<UnitCandidate> {
        let unit_name = self
            .heuristics
            .candidates(service)
            .iter()
            .find(|candidate| self.init.unit_file_exists(candidate, scope))?;
        info!(
            "Candidate {} unit '{}' exists; assuming it provides '{}'",
            scope, unit_name, service
        );
        Some(UnitCandidate {
            unit_name: unit_name.clone(),
            scope,
            discovery_method: DiscoveryMethod::Heuristic,
        })
    }
}
