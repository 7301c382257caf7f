//! Resolve command implementation.
//!
//! Read-only: finds the unit behind a D-Bus service without touching it.

use anyhow::Result;
use clap::Args;

use super::{OutputFormat, scope_order};
use crate::command_runner::RealCommandRunner;
use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::output::Output;
use crate::remediator::UnitRemediator;
use crate::resolver::UnitResolver;
use crate::scope::{Scope, ServiceQuery};
use crate::services::ServiceFixer;
use crate::systemctl::Systemctl;

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// D-Bus service name (e.g. org.freedesktop.impl.portal.PermissionStore)
    pub service: String,

    /// Scopes to search, in order (defaults to the configured order)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub scope: Vec<Scope>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn run(args: ResolveArgs, config: &SetupConfig) -> Result<()> {
    let query = ServiceQuery::new(args.service, scope_order(&args.scope, config))?;

    let runner = RealCommandRunner;
    let init = Systemctl::new(&runner, config.escalation.clone(), config.timeouts.short());
    let fixer = ServiceFixer::new(
        UnitResolver::new(&init, &config.heuristics, &config.unit_paths),
        UnitRemediator::new(&init),
        None,
    );
    let report = fixer.resolve(&query);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => match &report.unit {
            Some(unit) => {
                Output::success(format!("{} -> {}", report.service, unit.unit_name));
                Output::kv("Scope", unit.scope.to_string());
                Output::kv("Found by", unit.discovery_method.to_string());
            }
            None => Output::error(format!("No unit found for {}", report.service)),
        },
    }

    if report.unit.is_none() {
        return Err(SetupError::NotFound {
            service: report.service,
        }
        .into());
    }
    Ok(())
}
