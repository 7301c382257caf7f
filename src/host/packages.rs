//! System and Python package installation.

use tracing::{info, warn};

use super::Host;
use crate::command_runner::CommandOutcome;
use crate::output::Output;
use crate::predicates;

/// Generic kernel headers package, replaced by the running kernel's exact version.
const KERNEL_DEVEL: &str = "kernel-devel";

/// Session manager that conflicts with WirePlumber.
pub const MEDIA_SESSION_PACKAGE: &str = "pipewire-media-session";

/// `uname -r`, if it answers.
pub fn kernel_release(host: &Host<'_>) -> Option<String> {
    let outcome = host.quiet("uname", &["-r"]);
    if !outcome.success() {
        warn!("Could not determine kernel release: {}", outcome.describe());
        return None;
    }
    Some(outcome.trimmed().to_string()).filter(|r| !r.is_empty())
}

/// Package list with `kernel-devel` pinned to the running kernel.
///
/// When the release is unknown the list is returned unchanged.
pub fn resolve_package_list(packages: &[String], kernel_release: Option<&str>) -> Vec<String> {
    let Some(release) = kernel_release else {
        return packages.to_vec();
    };
    let pinned = format!("{KERNEL_DEVEL}-{release}");
    let mut resolved: Vec<String> = packages
        .iter()
        .filter(|p| p.as_str() != KERNEL_DEVEL)
        .cloned()
        .collect();
    if !resolved.contains(&pinned) {
        resolved.push(pinned);
    }
    resolved
}

/// Install the configured system packages with dnf.
///
/// Conflicts may be erased and unavailable packages skipped; a failed
/// install is tolerated and only reported.
pub fn install_system_packages(host: &Host<'_>) -> CommandOutcome {
    Output::info("Installing system packages (this may take several minutes)...");
    let release = kernel_release(host);
    let packages = resolve_package_list(&host.config().packages, release.as_deref());

    let mut args = vec![
        "dnf",
        "install",
        "-y",
        "--allowerasing",
        "--skip-broken",
        "--skip-unavailable",
    ];
    args.extend(packages.iter().map(String::as_str));
    let outcome = host.live_escalated(&args, None);
    if outcome.success() {
        Output::success(format!("Installed {} packages", packages.len()));
    } else {
        Output::warning(format!(
            "Package install finished with errors ({}); continuing",
            outcome.describe()
        ));
    }
    outcome
}

/// Upgrade pip and install the configured Python packages for the current user.
///
/// Returns whether the dependency install succeeded.
pub fn install_python_dependencies(host: &Host<'_>) -> bool {
    let deps = &host.config().python_deps;
    if deps.is_empty() {
        return true;
    }
    Output::info("Installing Python dependencies (user-level pip installs)...");
    let upgrade = host.quiet("python3", &["-m", "pip", "install", "--user", "--upgrade", "pip"]);
    if !upgrade.success() {
        warn!("pip self-upgrade failed: {}", upgrade.describe());
    }

    let mut args = vec!["-m", "pip", "install", "--user"];
    args.extend(deps.iter().map(String::as_str));
    let outcome = host.quiet("python3", &args);
    if outcome.success() {
        info!("Installed Python dependencies: {}", deps.join(", "));
        Output::success("Python dependencies installed");
        true
    } else {
        Output::warning(format!(
            "Python dependency install failed ({})",
            outcome.describe()
        ));
        false
    }
}

/// Whether `pipewire-media-session` is installed alongside WirePlumber.
pub fn media_session_installed(host: &Host<'_>) -> bool {
    let outcome = host.quiet("dnf", &["list", "installed", MEDIA_SESSION_PACKAGE]);
    outcome.success() && predicates::package_is_installed(&outcome.output, MEDIA_SESSION_PACKAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::testing::MockCommandRunner;
    use crate::config::SetupConfig;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kernel_devel_is_pinned() {
        let list = resolve_package_list(
            &strings(&["gcc", "kernel-devel", "make"]),
            Some("6.9.4-200.fc40.x86_64"),
        );
        assert_eq!(
            list,
            strings(&["gcc", "make", "kernel-devel-6.9.4-200.fc40.x86_64"])
        );
    }

    #[test]
    fn test_pinned_package_not_duplicated() {
        let list = resolve_package_list(&strings(&["kernel-devel-6.9"]), Some("6.9"));
        assert_eq!(list, strings(&["kernel-devel-6.9"]));
    }

    #[test]
    fn test_unknown_release_keeps_list() {
        let list = resolve_package_list(&strings(&["kernel-devel"]), None);
        assert_eq!(list, strings(&["kernel-devel"]));
    }

    #[test]
    fn test_install_uses_escalated_dnf() {
        let mock = MockCommandRunner::new();
        mock.ok("uname -r", "6.9.4\n");
        let config = SetupConfig {
            packages: strings(&["obs-studio", "kernel-devel"]),
            ..SetupConfig::default()
        };
        let host = Host::new(&mock, &config);
        let outcome = install_system_packages(&host);
        // Unmocked dnf falls back to exit 1; the failure is tolerated.
        assert!(!outcome.success());
        assert!(mock.called_with(
            "sudo dnf install -y --allowerasing --skip-broken --skip-unavailable obs-studio kernel-devel-6.9.4"
        ));
    }

    #[test]
    fn test_python_failure_is_reported_not_raised() {
        let mock = MockCommandRunner::new();
        mock.ok("python3 -m pip install --user --upgrade pip", "");
        mock.fail("python3 -m pip install --user requests", "no network");
        let config = SetupConfig {
            python_deps: strings(&["requests"]),
            ..SetupConfig::default()
        };
        let host = Host::new(&mock, &config);
        assert!(!install_python_dependencies(&host));
        assert_eq!(mock.count("pip install"), 2);
    }

    #[test]
    fn test_media_session_detection() {
        let mock = MockCommandRunner::new();
        mock.ok(
            "dnf list installed pipewire-media-session",
            "Installed Packages\npipewire-media-session.x86_64 0.4.2-1 @fedora\n",
        );
        let config = SetupConfig::default();
        assert!(media_session_installed(&Host::new(&mock, &config)));

        let mock = MockCommandRunner::new();
        mock.fail(
            "dnf list installed pipewire-media-session",
            "Error: No matching Packages to list\n",
        );
        assert!(!media_session_installed(&Host::new(&mock, &config)));
    }
}
