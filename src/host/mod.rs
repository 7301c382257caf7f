//! Host configuration steps around the unit remediation core.
//!
//! Each step is a short, sequential run of external tools through the
//! [`CommandRunner`]. Steps never abort the run: failures are logged, shown
//! to the operator, and reported back as plain values.

pub mod devices;
pub mod groups;
pub mod kmod;
pub mod packages;
pub mod pipewire;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::command_runner::{CommandOptions, CommandOutcome, CommandRunner, display_command};
use crate::config::SetupConfig;
use crate::output::Output;
use crate::systemctl::Systemctl;

/// Bounds for the polling waits.
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    /// How long to wait for the virtual device node.
    pub device_wait: Duration,
    /// How long to wait for PipeWire to list video nodes.
    pub pipewire_wait: Duration,
    pub interval: Duration,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            device_wait: Duration::from_secs(20),
            pipewire_wait: Duration::from_secs(10),
            interval: Duration::from_millis(500),
        }
    }
}

/// Everything a host step needs: a runner, the configuration, and where to
/// look for device nodes.
pub struct Host<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a SetupConfig,
    dev_dir: PathBuf,
    polling: Polling,
}

impl<'a> Host<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a SetupConfig) -> Self {
        Self {
            runner,
            config,
            dev_dir: PathBuf::from("/dev"),
            polling: Polling::default(),
        }
    }

    /// Look for device nodes under `dir` instead of `/dev`.
    pub fn with_dev_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dir.into();
        self
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    pub fn config(&self) -> &SetupConfig {
        self.config
    }

    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }

    /// The virtual camera node, under the device directory.
    pub fn virtual_device(&self) -> PathBuf {
        self.dev_dir
            .join(format!("video{}", self.config.virtual_video_nr))
    }

    /// Init-system handle with the short timeout.
    pub fn systemctl(&self) -> Systemctl<'a> {
        Systemctl::new(
            self.runner,
            self.config.escalation.clone(),
            self.config.timeouts.short(),
        )
    }

    /// Run a query with the short timeout and capture its output.
    pub(crate) fn quiet(&self, program: &str, args: &[&str]) -> CommandOutcome {
        debug!("Running: {}", display_command(program, args));
        let outcome = self.runner.run_captured(
            program,
            args,
            &CommandOptions::with_timeout(self.config.timeouts.short()),
        );
        if !outcome.success() {
            debug!(
                "{} -> {}",
                display_command(program, args),
                outcome.describe()
            );
        }
        outcome
    }

    /// Run a query through the escalation tool.
    pub(crate) fn quiet_escalated(&self, args: &[&str]) -> CommandOutcome {
        self.quiet(&self.config.escalation, args)
    }

    /// Run a long operation, echoing each output line to the operator and the log.
    pub(crate) fn live(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> CommandOutcome {
        let line = display_command(program, args);
        Output::running(&line);
        info!("Running: {}", line);
        let mut options = CommandOptions::with_timeout(self.config.timeouts.long());
        if let Some(cwd) = cwd {
            options = options.cwd(cwd);
        }
        let outcome = self
            .runner
            .run_streamed(program, args, &options, &mut |text: &str| {
                Output::live(text);
                info!(target: "camsetup::live", "{}", text);
            });
        if outcome.success() {
            info!("Finished: {}", line);
        } else {
            info!("{} -> {}", line, outcome.describe());
        }
        outcome
    }

    pub(crate) fn live_escalated(&self, args: &[&str], cwd: Option<&Path>) -> CommandOutcome {
        self.live(&self.config.escalation, args, cwd)
    }

    /// Call `check` until it returns true or `limit` has elapsed. Always checks at least once.
    pub(crate) fn poll_until(&self, limit: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if check() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.polling.interval);
        }
    }

    pub(crate) fn polling(&self) -> Polling {
        self.polling
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Polling that never sleeps long, for tests.
    pub fn fast_polling() -> Polling {
        Polling {
            device_wait: Duration::from_millis(50),
            pipewire_wait: Duration::from_millis(50),
            interval: Duration::from_millis(5),
        }
    }
}
