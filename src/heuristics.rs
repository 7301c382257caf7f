//! Well-known D-Bus service names and the units that usually provide them.
//!
//! Consulted only after the direct query and the unit-file scan come up
//! empty. The table is plain configuration: it is built once (from
//! defaults or the config file) and passed to the resolver by reference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from D-Bus service name to candidate unit names, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeuristicTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl HeuristicTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace the candidate list for a service.
    pub fn with_entry<S: Into<String>>(
        mut self,
        service: impl Into<String>,
        candidates: impl IntoIterator<Item = S>,
    ) -> Self {
        self.entries.insert(
            service.into(),
            candidates.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Candidate units for `service`, in priority order. Empty when unknown.
    pub fn candidates(&self, service: &str) -> &[String] {
        self.entries.get(service).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for HeuristicTable {
    fn default() -> Self {
        Self::empty()
            .with_entry(
                "org.a11y.Bus",
                ["at-spi-dbus-bus.service", "at-spi-bus-launcher.service"],
            )
            .with_entry(
                "org.freedesktop.impl.portal.PermissionStore",
                [
                    "xdg-desktop-portal.service",
                    "xdg-desktop-portal-gtk.service",
                    "xdg-desktop-portal-kde.service",
                    "xdg-desktop-portal-gnome.service",
                    "flatpak-portal.service",
                ],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_priority_order() {
        let table = HeuristicTable::default();
        let candidates = table.candidates("org.freedesktop.impl.portal.PermissionStore");
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0], "xdg-desktop-portal.service");
        assert_eq!(candidates[1], "xdg-desktop-portal-gtk.service");
        assert_eq!(candidates[4], "flatpak-portal.service");
    }

    #[test]
    fn test_unknown_service_has_no_candidates() {
        let table = HeuristicTable::default();
        assert!(table.candidates("org.example.Nothing").is_empty());
    }

    #[test]
    fn test_deserialize_preserves_candidate_order() {
        let table: HeuristicTable =
            serde_json::from_str(r#"{"org.example.Svc": ["b.service", "a.service"]}"#).unwrap();
        assert_eq!(table.candidates("org.example.Svc"), ["b.service", "a.service"]);
        // A table from config replaces the defaults rather than extending them.
        assert!(table.candidates("org.a11y.Bus").is_empty());
    }
}
