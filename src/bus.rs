//! D-Bus name ownership probe.
//!
//! After remediation the CLI asks the bus daemon whether anything now owns
//! the service name. This is the one place the crate talks D-Bus directly;
//! unit management itself goes through `systemctl`.
//!
//! ## D-Bus Interface
//!
//! - **Bus**: session bus for user scope, system bus for system scope
//! - **Path**: `/org/freedesktop/DBus`
//! - **Interface**: `org.freedesktop.DBus`

use anyhow::{Context, Result};
use tracing::debug;
use zbus::blocking::Connection;

use crate::scope::Scope;

#[zbus::proxy(
    interface = "org.freedesktop.DBus",
    default_service = "org.freedesktop.DBus",
    default_path = "/org/freedesktop/DBus"
)]
trait BusDaemon {
    /// Whether `name` currently has an owner on this bus.
    fn name_has_owner(&self, name: &str) -> zbus::Result<bool>;
}

/// Checks whether a well-known name is owned on a scope's bus.
pub trait BusProbe {
    /// `None` when the bus could not be reached or did not answer.
    fn name_has_owner(&self, name: &str, scope: Scope) -> Option<bool>;
}

/// [`BusProbe`] over real bus connections.
pub struct ZbusProbe;

impl ZbusProbe {
    fn connect(scope: Scope) -> Result<Connection> {
        match scope {
            Scope::User => Connection::session().context("Failed to connect to session D-Bus"),
            Scope::System => Connection::system().context("Failed to connect to system D-Bus"),
        }
    }

    fn query(name: &str, scope: Scope) -> Result<bool> {
        let connection = Self::connect(scope)?;
        let proxy = BusDaemonProxyBlocking::new(&connection)
            .context("Failed to create org.freedesktop.DBus proxy")?;
        proxy
            .name_has_owner(name)
            .with_context(|| format!("NameHasOwner failed for '{}'", name))
    }
}

impl BusProbe for ZbusProbe {
    fn name_has_owner(&self, name: &str, scope: Scope) -> Option<bool> {
        match Self::query(name, scope) {
            Ok(owned) => Some(owned),
            Err(e) => {
                debug!("D-Bus ownership probe for '{}' ({}) failed: {:#}", name, scope, e);
                None
            }
        }
    }
}

/// Human-readable ownership state.
pub fn describe_ownership(owned: Option<bool>) -> &'static str {
    match owned {
        Some(true) => "owned",
        Some(false) => "not owned",
        None => "unknown (bus unreachable)",
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Answers from a fixed table; unknown names are `None`.
    #[derive(Default)]
    pub struct MockBusProbe {
        answers: HashMap<(String, Scope), bool>,
    }

    impl MockBusProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, name: &str, scope: Scope, owned: bool) -> Self {
            self.answers.insert((name.to_string(), scope), owned);
            self
        }
    }

    impl BusProbe for MockBusProbe {
        fn name_has_owner(&self, name: &str, scope: Scope) -> Option<bool> {
            self.answers.get(&(name.to_string(), scope)).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockBusProbe;
    use super::*;

    #[test]
    fn test_mock_probe_is_scope_specific() {
        let probe = MockBusProbe::new().with("org.a11y.Bus", Scope::User, true);
        assert_eq!(probe.name_has_owner("org.a11y.Bus", Scope::User), Some(true));
        assert_eq!(probe.name_has_owner("org.a11y.Bus", Scope::System), None);
    }

    #[test]
    fn test_describe_ownership() {
        assert_eq!(describe_ownership(Some(true)), "owned");
        assert_eq!(describe_ownership(Some(false)), "not owned");
        assert!(describe_ownership(None).starts_with("unknown"));
    }
}
