//! camsetup - bring a PipeWire/v4l2loopback virtual camera stack into a working state
//!
//! The core of the crate maps D-Bus service names to the systemd units that
//! provide them and repairs those units:
//!
//! - [`resolver::UnitResolver`] finds the unit behind a service name, per
//!   scope, by direct query, unit-file scan, and a table of known candidates.
//! - [`remediator::UnitRemediator`] unmasks, reloads, starts, and enables a
//!   unit, falling back to an escalated system-wide unmask when the per-user
//!   manager cannot.
//!
//! Around that core, [`setup`] drives the host steps in [`host`]: package
//! installation, the `video` group, the v4l2loopback module, and the
//! PipeWire user services.
//!
//! ## Scopes
//!
//! - **User**: the per-user service manager (`systemctl --user`)
//! - **System**: the system-wide manager (`systemctl --system`)
//!
//! All external tools run through [`command_runner::CommandRunner`], so
//! every step can be driven by a mock in tests.

pub mod bus;
pub mod cli;
pub mod command_runner;
pub mod commands;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod host;
pub mod logging;
pub mod output;
pub mod predicates;
pub mod remediator;
pub mod report;
pub mod resolver;
pub mod scope;
pub mod services;
pub mod setup;
pub mod systemctl;
pub mod unit_files;

pub use cli::{Cli, Commands};
pub use error::SetupError;
pub use scope::{Scope, ServiceQuery};
