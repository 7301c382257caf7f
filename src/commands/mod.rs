//! Subcommand implementations.

pub mod completions;
pub mod devices;
pub mod fix;
pub mod resolve;
pub mod setup;

use clap::ValueEnum;

use crate::config::SetupConfig;
use crate::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Scope order from the command line, falling back to the configured order.
pub(crate) fn scope_order(requested: &[Scope], config: &SetupConfig) -> Vec<Scope> {
    if requested.is_empty() {
        config.scope_order.clone()
    } else {
        requested.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_order_prefers_command_line() {
        let config = SetupConfig::default();
        assert_eq!(scope_order(&[], &config), vec![Scope::User, Scope::System]);
        assert_eq!(scope_order(&[Scope::System], &config), vec![Scope::System]);
    }
}
