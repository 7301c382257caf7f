//! Running external tools.
//!
//! Every tool camsetup drives (systemctl, dnf, modprobe, pw-cli, and the
//! rest) goes through the [`CommandRunner`] trait, so resolution,
//! remediation, and the host steps can all run against a mock.
//!
//! # Production Usage
//!
//! [`RealCommandRunner`] delegates to [`std::process::Command`]. Every call is
//! bounded by [`CommandOptions::timeout`] and never returns an error: a missing
//! executable, a spawn failure, or an expired timeout are all reported through
//! [`CommandOutcome`] so that callers can degrade instead of aborting.
//!
//! # Testing Usage
//!
//! `testing::MockCommandRunner` answers from a table of command lines and
//! keeps a log of what was run.

use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::debug;

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time allowed for the output readers to finish after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs external programs on behalf of the init-system and host helpers,
/// which hold it as `&dyn CommandRunner`.
///
/// - [`run_captured`](CommandRunner::run_captured): short queries, output buffered in full
/// - [`run_streamed`](CommandRunner::run_streamed): long operations, output delivered line by line
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its combined output (stdout, then stderr).
    fn run_captured(&self, program: &str, args: &[&str], options: &CommandOptions)
    -> CommandOutcome;

    /// Run a command, handing every output line to `on_line` as it arrives.
    ///
    /// The returned outcome still carries the full combined output.
    fn run_streamed(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
        on_line: &mut dyn FnMut(&str),
    ) -> CommandOutcome;
}

/// Per-call settings: working directory, extra environment, timeout.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Additional environment variables.
    pub env: Vec<(String, String)>,
    /// Upper bound on the command's wall-clock time.
    pub timeout: Duration,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl CommandOptions {
    /// Create options with the given timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set a working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    /// The process exited with a status code.
    Exited(i32),
    /// The process was terminated by a signal.
    Signaled,
    /// The executable does not exist.
    NotFound,
    /// The timeout elapsed and the process was killed.
    TimedOut,
    /// The process could not be spawned for another reason.
    SpawnFailed(String),
}

/// Result of running an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit: ExitKind,
    /// Combined stdout and stderr.
    pub output: String,
}

impl CommandOutcome {
    pub fn exited(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit: ExitKind::Exited(code),
            output: output.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            exit: ExitKind::NotFound,
            output: String::new(),
        }
    }

    /// True only for a zero exit status.
    pub fn success(&self) -> bool {
        self.exit == ExitKind::Exited(0)
    }

    /// True when the executable itself was missing.
    pub fn is_not_found(&self) -> bool {
        self.exit == ExitKind::NotFound
    }

    /// Shell-style exit code.
    pub fn code(&self) -> i32 {
        match &self.exit {
            ExitKind::Exited(code) => *code,
            ExitKind::NotFound => 127,
            ExitKind::TimedOut => 124,
            ExitKind::Signaled | ExitKind::SpawnFailed(_) => 1,
        }
    }

    /// Trimmed output, convenient for single-value queries.
    pub fn trimmed(&self) -> &str {
        self.output.trim()
    }

    /// One-line description of how the command ended.
    pub fn describe(&self) -> String {
        match &self.exit {
            ExitKind::Exited(0) => "ok".to_string(),
            ExitKind::Exited(code) => format!("exit code {code}"),
            ExitKind::Signaled => "killed by signal".to_string(),
            ExitKind::NotFound => "command not found".to_string(),
            ExitKind::TimedOut => "timed out".to_string(),
            ExitKind::SpawnFailed(reason) => format!("failed to start: {reason}"),
        }
    }
}

/// Render a command line for logs and operator output.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let parts = std::iter::once(program).chain(args.iter().copied());
    shlex::try_join(parts).unwrap_or_else(|_| {
        std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// Find an executable on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let raw = std::env::var("PATH").unwrap_or_default();
    raw.split(':')
        .filter(|s| !s.trim().is_empty())
        .map(|dir| PathBuf::from(dir).join(name))
        .find(|candidate| candidate.is_file())
}

/// [`CommandRunner`] that spawns real processes.
///
/// Each command runs in its own process group. On timeout the whole group
/// is killed, so helpers started by `sudo`, `dnf`, or `make` go with it.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl RealCommandRunner {
    fn build(program: &str, args: &[&str], options: &CommandOptions) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &options.env {
            cmd.env(k, v);
        }
        cmd
    }

    fn spawn_error(program: &str, err: std::io::Error) -> CommandOutcome {
        if err.kind() == std::io::ErrorKind::NotFound {
            debug!(program, "command not found");
            CommandOutcome::not_found()
        } else {
            CommandOutcome {
                exit: ExitKind::SpawnFailed(err.to_string()),
                output: String::new(),
            }
        }
    }

    /// Poll `child` until it exits or `deadline` passes, then kill its group.
    fn wait_until(child: &mut Child, deadline: Instant, mut idle: impl FnMut()) -> ExitKind {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return exit_kind(status),
                Ok(None) if Instant::now() >= deadline => {
                    kill_group(child);
                    return ExitKind::TimedOut;
                }
                Ok(None) => idle(),
                Err(e) => return ExitKind::SpawnFailed(e.to_string()),
            }
        }
    }
}

/// SIGKILL the child's process group and reap the child.
fn kill_group(child: &mut Child) {
    let group = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(group, Signal::SIGKILL) {
        debug!(pid = child.id(), "killpg failed ({}), killing the child only", e);
        let _ = child.kill();
    }
    let _ = child.wait();
}

/// How long to keep collecting output once the child is gone.
///
/// A descendant that escaped the group can hold the pipes open forever.
fn drain_deadline(exit: &ExitKind, deadline: Instant) -> Instant {
    let grace = Instant::now() + DRAIN_GRACE;
    match exit {
        ExitKind::TimedOut => grace,
        _ => deadline.max(grace),
    }
}

fn exit_kind(status: ExitStatus) -> ExitKind {
    match status.code() {
        Some(code) => ExitKind::Exited(code),
        None => ExitKind::Signaled,
    }
}

fn read_all(mut stream: impl Read) -> String {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

impl CommandRunner for RealCommandRunner {
    fn run_captured(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> CommandOutcome {
        debug!(command = %display_command(program, args), "running");
        let mut child = match Self::build(program, args, options).spawn() {
            Ok(child) => child,
            Err(e) => return Self::spawn_error(program, e),
        };

        // Drain both pipes on their own threads so a chatty child can't block on a full pipe.
        let (tx, rx) = mpsc::channel::<(Pipe, String)>();
        if let Some(out) = child.stdout.take() {
            let tx = tx.clone();
            thread::spawn(move || tx.send((Pipe::Stdout, read_all(out))));
        }
        if let Some(err) = child.stderr.take() {
            let tx = tx.clone();
            thread::spawn(move || tx.send((Pipe::Stderr, read_all(err))));
        }
        drop(tx);

        let deadline = Instant::now() + options.timeout;
        let exit = Self::wait_until(&mut child, deadline, || thread::sleep(POLL_INTERVAL));

        let limit = drain_deadline(&exit, deadline);
        let (mut stdout, mut stderr) = (String::new(), String::new());
        loop {
            let wait = limit.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok((Pipe::Stdout, text)) => stdout = text,
                Ok((Pipe::Stderr, text)) => stderr = text,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    debug!(program, "output pipes still open, returning without them");
                    break;
                }
            }
        }
        stdout.push_str(&stderr);
        CommandOutcome {
            exit,
            output: stdout,
        }
    }

    fn run_streamed(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
        on_line: &mut dyn FnMut(&str),
    ) -> CommandOutcome {
        debug!(command = %display_command(program, args), "running (streamed)");
        let mut child = match Self::build(program, args, options).spawn() {
            Ok(child) => child,
            Err(e) => return Self::spawn_error(program, e),
        };

        let (tx, rx) = mpsc::channel::<String>();
        if let Some(out) = child.stdout.take() {
            let tx = tx.clone();
            thread::spawn(move || {
                for line in BufReader::new(out).lines().map_while(Result::ok) {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(err) = child.stderr.take() {
            let tx = tx.clone();
            thread::spawn(move || {
                for line in BufReader::new(err).lines().map_while(Result::ok) {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut output = String::new();
        let mut collect = |line: String, output: &mut String| {
            on_line(&line);
            output.push_str(&line);
            output.push('\n');
        };

        let deadline = Instant::now() + options.timeout;
        let exit = Self::wait_until(&mut child, deadline, || {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => collect(line, &mut output),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            }
        });

        // Lines still buffered after exit.
        let limit = drain_deadline(&exit, deadline);
        loop {
            let wait = limit.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok(line) => collect(line, &mut output),
                Err(_) => break,
            }
        }

        CommandOutcome { exit, output }
    }
}
