//! `video` group membership for the current user.

use std::ffi::CString;

use nix::unistd::{Group, User, getgrouplist};
use serde::Serialize;
use tracing::{info, warn};

use super::Host;
use crate::output::Output;

pub const VIDEO_GROUP: &str = "video";

/// Outcome of the membership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupMembership {
    AlreadyMember,
    /// Added now; takes effect after a fresh login.
    Added,
    Failed,
    /// Group membership could not be determined.
    Unknown,
}

impl GroupMembership {
    pub fn relogin_required(self) -> bool {
        self == GroupMembership::Added
    }
}

/// Name of the user running the setup.
pub fn current_user() -> String {
    whoami::username()
}

/// Group names for `user` from the group database, including the primary group.
///
/// Only the database counts: a group the current process runs under (as
/// with `sg video`) does not make the user a member.
pub fn groups_from_database(user: &str) -> Option<Vec<String>> {
    let entry = User::from_name(user).ok().flatten()?;
    let name = CString::new(user).ok()?;
    let gids = getgrouplist(&name, entry.gid).ok()?;
    let mut groups: Vec<String> = gids
        .into_iter()
        .filter_map(|gid| Group::from_gid(gid).ok().flatten())
        .map(|group| group.name)
        .collect();
    groups.sort();
    groups.dedup();
    Some(groups)
}

/// Group names for `user` from the `groups` command.
pub fn groups_from_command(host: &Host<'_>, user: &str) -> Option<Vec<String>> {
    let outcome = host.quiet("groups", &[user]);
    if !outcome.success() {
        return None;
    }
    Some(parse_groups_output(&outcome.output))
}

/// Parse `groups` output, with or without the `user : ` prefix.
pub fn parse_groups_output(output: &str) -> Vec<String> {
    let list = match output.split_once(':') {
        Some((_, rest)) => rest,
        None => output,
    };
    list.split_whitespace().map(str::to_string).collect()
}

/// Make sure the current user is in the `video` group.
pub fn ensure_video_group_membership(host: &Host<'_>) -> GroupMembership {
    let user = current_user();
    let groups = groups_from_database(&user).or_else(|| {
        warn!("Group database lookup failed for '{}'; falling back to 'groups'", user);
        groups_from_command(host, &user)
    });
    ensure_membership(host, &user, groups)
}

/// Add `user` to `video` unless `groups` already lists it.
pub fn ensure_membership(
    host: &Host<'_>,
    user: &str,
    groups: Option<Vec<String>>,
) -> GroupMembership {
    let Some(groups) = groups else {
        Output::error(format!(
            "Could not determine groups for user '{user}'. Please check manually."
        ));
        return GroupMembership::Unknown;
    };
    if groups.iter().any(|g| g == VIDEO_GROUP) {
        info!("User '{}' is already in the '{}' group", user, VIDEO_GROUP);
        Output::success(format!("User '{user}' is in the '{VIDEO_GROUP}' group"));
        return GroupMembership::AlreadyMember;
    }

    Output::info(format!(
        "Adding '{user}' to the '{VIDEO_GROUP}' group (requires {})...",
        host.config().escalation
    ));
    let outcome = host.live_escalated(&["usermod", "-aG", VIDEO_GROUP, user], None);
    if outcome.success() {
        Output::warning(
            "Log out and back in (or reboot) for 'video' group membership to take effect",
        );
        GroupMembership::Added
    } else {
        Output::error(format!(
            "Failed to add '{user}' to the '{VIDEO_GROUP}' group ({})",
            outcome.describe()
        ));
        GroupMembership::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::testing::MockCommandRunner;
    use crate::config::SetupConfig;

    #[test]
    fn test_database_groups_ignore_process_gid() {
        let Some(nobody) = User::from_name("nobody").ok().flatten() else {
            return;
        };
        let process_gid = nix::unistd::getgid();
        if nobody.gid == process_gid {
            return;
        }
        let Some(process_group) = Group::from_gid(process_gid).ok().flatten() else {
            return;
        };
        if process_group.mem.iter().any(|m| m == "nobody") {
            return;
        }

        let groups = groups_from_database("nobody").unwrap();
        assert!(!groups.contains(&process_group.name), "{groups:?}");
        if let Some(primary) = Group::from_gid(nobody.gid).ok().flatten() {
            assert!(groups.contains(&primary.name));
        }
    }

    fn groups(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_groups_output() {
        assert_eq!(
            parse_groups_output("alice : alice wheel video\n"),
            vec!["alice", "wheel", "video"]
        );
        assert_eq!(parse_groups_output("alice wheel\n"), vec!["alice", "wheel"]);
    }

    #[test]
    fn test_member_is_left_alone() {
        let mock = MockCommandRunner::new();
        let config = SetupConfig::default();
        let host = Host::new(&mock, &config);
        let result = ensure_membership(&host, "alice", groups(&["wheel", "video"]));
        assert_eq!(result, GroupMembership::AlreadyMember);
        assert!(!result.relogin_required());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_non_member_is_added() {
        let mock = MockCommandRunner::new();
        mock.ok("sudo usermod -aG video alice", "");
        let config = SetupConfig::default();
        let host = Host::new(&mock, &config);
        let result = ensure_membership(&host, "alice", groups(&["wheel"]));
        assert_eq!(result, GroupMembership::Added);
        assert!(result.relogin_required());
    }

    #[test]
    fn test_usermod_failure() {
        let mock = MockCommandRunner::new();
        let config = SetupConfig::default();
        let host = Host::new(&mock, &config);
        assert_eq!(
            ensure_membership(&host, "alice", groups(&["wheel"])),
            GroupMembership::Failed
        );
    }

    #[test]
    fn test_unknown_groups_do_nothing() {
        let mock = MockCommandRunner::new();
        let config = SetupConfig::default();
        let host = Host::new(&mock, &config);
        assert_eq!(ensure_membership(&host, "alice", None), GroupMembership::Unknown);
        assert!(mock.calls().is_empty());
    }
}
