//! Unit-file scan for D-Bus activation lines.
//!
//! When the service manager cannot name the unit behind a D-Bus service
//! (typically because the unit is masked or only bus-activated), the unit
//! definitions themselves are searched for a line that assigns the service
//! name to `BusName=`, `ExecStart=`, or `D-BusService=`.
//!
//! Ordering: directories are visited in the order given (override before
//! vendor), and within a directory files are visited in lexical order of
//! their file names. The first matching file wins.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

/// Build the line matcher for `service`.
///
/// Matches a whole line of the form `KEY=VALUE` where KEY is `BusName`,
/// `ExecStart`, or `D-BusService`; VALUE is the service name (dots literal)
/// optionally followed by `.service`, optionally wrapped in double quotes,
/// with optional blanks after `=` and an optional trailing comment. Matching
/// is per line; blanks never span a line break.
pub fn activation_line_pattern(service: &str) -> Regex {
    let pattern = format!(
        r#"(?m)^(BusName|ExecStart|D-BusService)=[ \t]*"?{}(\.service)?"?[ \t\r]*(#.*)?$"#,
        regex::escape(service)
    );
    Regex::new(&pattern).expect("escaped service name yields a valid pattern")
}

/// List `*.service` files in `dirs`, directory order first, then lexical.
///
/// Missing directories are skipped silently; unreadable ones are logged.
pub fn list_service_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list directory {} for unit search: {}", dir.display(), e);
                continue;
            }
        };
        let mut in_dir: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".service"))
            })
            .collect();
        in_dir.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files.extend(in_dir);
    }
    files
}

/// Find the first unit file under `dirs` that activates `service`.
///
/// Returns the matching file's path.
pub fn find_activating_unit_file(service: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let files = list_service_files(dirs);
    if files.is_empty() {
        return None;
    }
    debug!(count = files.len(), service, "Scanning unit files");
    let pattern = activation_line_pattern(service);
    files.into_iter().find(|path| file_matches(path, &pattern))
}

fn file_matches(path: &Path, pattern: &Regex) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => pattern.is_match(&content),
        Err(e) => {
            debug!("Skipping unreadable unit file {}: {}", path.display(), e);
            false
        }
    }
}

/// Unit name for a unit file path (its file name component).
pub fn unit_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SERVICE: &str = "org.freedesktop.impl.portal.PermissionStore";

    #[test]
    fn test_pattern_accepts_variants() {
        let re = activation_line_pattern(SERVICE);
        assert!(re.is_match("BusName=org.freedesktop.impl.portal.PermissionStore"));
        assert!(re.is_match("BusName= org.freedesktop.impl.portal.PermissionStore"));
        assert!(re.is_match("BusName=\"org.freedesktop.impl.portal.PermissionStore\""));
        assert!(re.is_match("D-BusService=org.freedesktop.impl.portal.PermissionStore.service"));
        assert!(re.is_match("BusName=org.freedesktop.impl.portal.PermissionStore # portal"));
        assert!(re.is_match(
            "[Service]\nType=dbus\nBusName=org.freedesktop.impl.portal.PermissionStore\n"
        ));
    }

    #[test]
    fn test_pattern_rejects_near_misses() {
        let re = activation_line_pattern(SERVICE);
        // Dots are literal.
        assert!(!re.is_match("BusName=orgXfreedesktop.impl.portal.PermissionStore"));
        assert!(!re.is_match("BusName=org.freedesktop.impl.portal.PermissionStoreExtra"));
        assert!(!re.is_match("# BusName=org.freedesktop.impl.portal.PermissionStore"));
        assert!(!re.is_match("Description=org.freedesktop.impl.portal.PermissionStore"));
        assert!(!re.is_match("ExecStart=/usr/libexec/xdg-permission-store"));
    }

    #[test]
    fn test_scan_returns_first_lexical_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b-store.service"), format!("BusName={SERVICE}\n")).unwrap();
        fs::write(dir.path().join("a-store.service"), format!("BusName={SERVICE}\n")).unwrap();
        fs::write(dir.path().join("0-other.service"), "BusName=org.other\n").unwrap();
        // Not a .service file, never considered.
        fs::write(dir.path().join("0-store.socket"), format!("BusName={SERVICE}\n")).unwrap();

        let found = find_activating_unit_file(SERVICE, &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(unit_name(&found).unwrap(), "a-store.service");
    }

    #[test]
    fn test_scan_prefers_earlier_directory() {
        let override_dir = tempfile::tempdir().unwrap();
        let vendor_dir = tempfile::tempdir().unwrap();
        fs::write(vendor_dir.path().join("a.service"), format!("BusName={SERVICE}\n")).unwrap();
        fs::write(override_dir.path().join("z.service"), format!("BusName={SERVICE}\n")).unwrap();

        let dirs = vec![
            override_dir.path().to_path_buf(),
            vendor_dir.path().to_path_buf(),
        ];
        let found = find_activating_unit_file(SERVICE, &dirs).unwrap();
        assert_eq!(unit_name(&found).unwrap(), "z.service");
    }

    #[test]
    fn test_scan_missing_directories() {
        let dirs = vec![PathBuf::from("/nonexistent/camsetup/units")];
        assert!(list_service_files(&dirs).is_empty());
        assert!(find_activating_unit_file(SERVICE, &dirs).is_none());
    }
}
