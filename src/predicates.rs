//! Text predicates over `systemctl`, PipeWire, and package-manager output.
//!
//! These literal substrings are a compatibility contract with the tools'
//! human-readable output. Keep the matching exactly as documented on each
//! function.

/// Marker `systemctl status` prints for a running unit.
pub const ACTIVE_RUNNING: &str = "Active: active (running)";

/// Portal log lines that indicate a broken PipeWire connection.
pub const PORTAL_ERROR_MARKERS: &[&str] = &[
    "Caught PipeWire error: connection error",
    "Realtime error: Could not get pidns",
];

/// Interpret `systemctl show <name> --property=Unit --value` output.
///
/// Returns the trimmed output when it is non-empty, is not the literal
/// `unit` (compared case-insensitively), and does not start with `No unit`.
pub fn direct_query_hit(output: &str) -> Option<String> {
    let value = output.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unit") || value.starts_with("No unit") {
        return None;
    }
    Some(value.to_string())
}

/// `systemctl status` output contains [`ACTIVE_RUNNING`].
pub fn status_reports_running(output: &str) -> bool {
    output.contains(ACTIVE_RUNNING)
}

/// `systemctl is-enabled` output reports a masked unit.
///
/// True iff the first non-blank line, trimmed, is `masked` or `masked-runtime`.
pub fn mask_report_is_masked(output: &str) -> bool {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line == "masked" || line == "masked-runtime")
}

/// `systemctl list-unit-files` output lists `unit`.
///
/// True iff some line's first whitespace-separated token equals `unit`.
pub fn unit_file_listed(output: &str, unit: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|token| token == unit)
}

/// Portal status output contains one of [`PORTAL_ERROR_MARKERS`].
pub fn portal_log_has_errors(output: &str) -> bool {
    PORTAL_ERROR_MARKERS.iter().any(|m| output.contains(m))
}

/// PipeWire object listing mentions a video device.
///
/// Matches `/dev/video`, `Video/Device`, or `v4l2` in any letter case.
pub fn pipewire_lists_video(output: &str) -> bool {
    output.contains("/dev/video")
        || output.contains("Video/Device")
        || output.to_lowercase().contains("v4l2")
}

/// Journal output mentions a failure (`error` or `fail`, any case).
pub fn journal_has_errors(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("error") || lower.contains("fail")
}

/// Journal output for WirePlumber mentions a failure or a significant warning.
///
/// Adds `masked` and `leaked proxy` to [`journal_has_errors`].
pub fn wireplumber_journal_has_warnings(output: &str) -> bool {
    let lower = output.to_lowercase();
    journal_has_errors(output) || lower.contains("masked") || lower.contains("leaked proxy")
}

/// `dnf list installed <name>` output shows the package as installed.
pub fn package_is_installed(output: &str, name: &str) -> bool {
    output.to_lowercase().contains("installed") && output.contains(name)
}
