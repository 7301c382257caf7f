//! Service-manager scopes and validated resolution queries.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Whether a unit is managed by the per-user service manager or system-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    User,
    System,
}

impl Scope {
    /// The `systemctl` flag selecting this scope.
    pub fn flag(self) -> &'static str {
        match self {
            Scope::User => "--user",
            Scope::System => "--system",
        }
    }

    /// Capitalized label for operator output.
    pub fn label(self) -> &'static str {
        match self {
            Scope::User => "User",
            Scope::System => "System",
        }
    }

    /// Default search order: user units shadow system units.
    pub fn default_order() -> Vec<Scope> {
        vec![Scope::User, Scope::System]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User => write!(f, "user"),
            Scope::System => write!(f, "system"),
        }
    }
}

/// A request to find the unit behind a D-Bus service name.
///
/// The scope order is guaranteed non-empty and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceQuery {
    dbus_service_name: String,
    scope_order: Vec<Scope>,
}

impl ServiceQuery {
    pub fn new(
        dbus_service_name: impl Into<String>,
        scope_order: Vec<Scope>,
    ) -> Result<Self, SetupError> {
        let dbus_service_name = dbus_service_name.into();
        if dbus_service_name.trim().is_empty() {
            return Err(SetupError::InvalidQuery(
                "D-Bus service name is empty".to_string(),
            ));
        }
        if scope_order.is_empty() {
            return Err(SetupError::InvalidQuery(
                "scope order must name at least one scope".to_string(),
            ));
        }
        for (i, scope) in scope_order.iter().enumerate() {
            if scope_order[..i].contains(scope) {
                return Err(SetupError::InvalidQuery(format!(
                    "scope '{scope}' listed more than once"
                )));
            }
        }
        Ok(Self {
            dbus_service_name,
            scope_order,
        })
    }

    /// Query with the default user-then-system order.
    pub fn with_default_order(dbus_service_name: impl Into<String>) -> Result<Self, SetupError> {
        Self::new(dbus_service_name, Scope::default_order())
    }

    pub fn service_name(&self) -> &str {
        &self.dbus_service_name
    }

    pub fn scope_order(&self) -> &[Scope] {
        &self.scope_order
    }
}
