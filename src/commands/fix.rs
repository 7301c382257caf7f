//! Fix command implementation.

use anyhow::{Result, bail};
use clap::Args;

use super::{OutputFormat, scope_order};
use crate::bus::ZbusProbe;
use crate::command_runner::RealCommandRunner;
use crate::config::SetupConfig;
use crate::output::Output;
use crate::remediator::UnitRemediator;
use crate::report::print_service_report;
use crate::resolver::UnitResolver;
use crate::scope::{Scope, ServiceQuery};
use crate::services::{ServiceFixer, ServiceReport};
use crate::systemctl::Systemctl;

#[derive(Debug, Args)]
pub struct FixArgs {
    /// D-Bus service names to repair
    #[arg(required = true)]
    pub services: Vec<String>,

    /// Scopes to search, in order (defaults to the configured order)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub scope: Vec<Scope>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn run(args: FixArgs, config: &SetupConfig) -> Result<()> {
    let order = scope_order(&args.scope, config);
    let queries = args
        .services
        .iter()
        .map(|service| ServiceQuery::new(service.clone(), order.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let runner = RealCommandRunner;
    let init = Systemctl::new(&runner, config.escalation.clone(), config.timeouts.short());
    let probe = ZbusProbe;
    let fixer = ServiceFixer::new(
        UnitResolver::new(&init, &config.heuristics, &config.unit_paths),
        UnitRemediator::new(&init),
        Some(&probe),
    );
    let reports: Vec<ServiceReport> = queries.iter().map(|q| fixer.fix(q)).collect();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Table => {
            Output::header("D-Bus service remediation");
            for report in &reports {
                print_service_report(report);
                for issue in report.issues() {
                    Output::warning(issue.to_string());
                }
                Output::blank();
            }
        }
    }

    let inactive = reports.iter().filter(|r| !r.is_active()).count();
    if inactive > 0 {
        bail!("{} of {} services are not active", inactive, reports.len());
    }
    if args.format == OutputFormat::Table {
        Output::success("All services are active");
    }
    Ok(())
}
