//! Error taxonomy for service resolution, remediation, and host setup.
//!
//! The library returns only [`SetupError::PrivilegeEscalationMissing`] and
//! [`SetupError::InvalidQuery`] as errors. The remaining variants describe
//! degraded outcomes that are carried as data inside results and aggregated
//! into the final report; the `resolve` command turns `NotFound` into its
//! exit error.

use thiserror::Error;

use crate::scope::Scope;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("No systemd unit found for D-Bus service '{service}'")]
    NotFound { service: String },

    #[error("Unit '{unit}' ({scope} scope) is still masked; remaining steps skipped")]
    RemediationBlocked { unit: String, scope: Scope },

    #[error("Required tool not found: {tool}")]
    ExternalToolMissing { tool: String },

    #[error("Command '{command}' failed ({detail})")]
    TransientCommandFailure { command: String, detail: String },

    #[error("Privilege escalation tool '{tool}' is required but was not found")]
    PrivilegeEscalationMissing { tool: String },

    #[error("Invalid service query: {0}")]
    InvalidQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_message_names_scope() {
        let err = SetupError::RemediationBlocked {
            unit: "xdg-desktop-portal.service".into(),
            scope: Scope::System,
        };
        assert_eq!(
            err.to_string(),
            "Unit 'xdg-desktop-portal.service' (system scope) is still masked; remaining steps skipped"
        );
    }
}
