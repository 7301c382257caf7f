//! Operator-facing output.
//!
//! Status lines carry a colored mark in front of the message. Long waits
//! (the virtual device node, PipeWire node enumeration) get a spinner that
//! ends on one of the same marks.
//!
//! ```rust,ignore
//! use camsetup::output::Output;
//!
//! Output::header("Installing packages");
//! Output::success("Installed 17 packages");
//! Output::warning("v4l2loopback not found, building from source");
//!
//! let spinner = Output::spinner("Waiting for /dev/video10...");
//! spinner.finish_success("/dev/video10 is present");
//! ```

use std::borrow::Cow;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Leading mark of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Pass,
    Fail,
    Warn,
    Note,
}

impl Mark {
    fn symbol(self) -> &'static str {
        match self {
            Mark::Pass => "✓",
            Mark::Fail => "✗",
            Mark::Warn => "⚠",
            Mark::Note => "→",
        }
    }

    fn paint(self) -> String {
        let symbol = self.symbol();
        match self {
            Mark::Pass => symbol.green().bold().to_string(),
            Mark::Fail => symbol.red().bold().to_string(),
            Mark::Warn => symbol.yellow().to_string(),
            Mark::Note => symbol.cyan().to_string(),
        }
    }

    fn line(self, msg: &str) -> String {
        format!("{} {}", self.paint(), msg)
    }
}

pub struct Output;

impl Output {
    /// `✓ Installed 17 packages`
    pub fn success(msg: impl AsRef<str>) {
        println!("{}", Mark::Pass.line(msg.as_ref()));
    }

    /// `✗ Failed to load v4l2loopback`, on stderr.
    pub fn error(msg: impl AsRef<str>) {
        eprintln!("{}", Mark::Fail.line(&msg.as_ref().red().to_string()));
    }

    /// `⚠ Unit is masked`
    pub fn warning(msg: impl AsRef<str>) {
        println!("{}", Mark::Warn.line(msg.as_ref()));
    }

    /// `→ Checking for v4l2loopback module...`
    pub fn info(msg: impl AsRef<str>) {
        println!("{}", Mark::Note.line(&msg.as_ref().dimmed().to_string()));
    }

    /// Indented hint under a warning, e.g. `  → Log out and back in`.
    pub fn hint(msg: impl AsRef<str>) {
        println!("  {}", Mark::Note.line(msg.as_ref()));
    }

    /// Pass/fail line for a final check.
    pub fn check(label: impl AsRef<str>, ok: bool) {
        let mark = if ok { Mark::Pass } else { Mark::Fail };
        println!("  {}", mark.line(label.as_ref()));
    }

    /// `  • /dev/video0`
    pub fn step(msg: impl AsRef<str>) {
        println!("  {} {}", "•".cyan(), msg.as_ref());
    }

    /// Section title for one stage of a setup run.
    pub fn header(title: impl AsRef<str>) {
        let title = title.as_ref();
        println!();
        println!("{}", title.bold().cyan());
        println!("{}", "─".repeat(title.chars().count()).cyan());
    }

    pub fn subheader(title: impl AsRef<str>) {
        println!("{}", title.as_ref().bold());
    }

    pub fn list_item(text: impl AsRef<str>) {
        println!("  {}", text.as_ref());
    }

    /// Aligned `Key: value` row.
    pub fn kv(key: impl AsRef<str>, value: impl AsRef<str>) {
        let label = format!("{}:", key.as_ref());
        println!("  {:<12} {}", label.cyan(), value.as_ref());
    }

    /// `$ sudo dnf install -y ...` before a streamed command.
    pub fn running(command_line: impl AsRef<str>) {
        println!("{}", format!("$ {}", command_line.as_ref()).dimmed());
    }

    /// One line of a streamed command's output.
    pub fn live(line: impl AsRef<str>) {
        println!("    {}", line.as_ref().dimmed());
    }

    pub fn blank() {
        println!();
    }

    /// Spinner that ticks until one of its `finish_*` methods is called.
    pub fn spinner(msg: impl Into<Cow<'static, str>>) -> Spinner {
        let bar = ProgressBar::new_spinner().with_message(msg);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .expect("valid template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Spinner { bar }
    }
}

/// A running wait, created by [`Output::spinner`].
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn finish(self, mark: Mark, msg: &str) {
        self.bar.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
        self.bar.finish_with_message(mark.line(msg));
    }

    pub fn finish_success(self, msg: impl AsRef<str>) {
        self.finish(Mark::Pass, msg.as_ref());
    }

    pub fn finish_warning(self, msg: impl AsRef<str>) {
        self.finish(Mark::Warn, msg.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_lines_keep_message() {
        for mark in [Mark::Pass, Mark::Fail, Mark::Warn, Mark::Note] {
            let line = mark.line("unit started");
            assert!(line.contains(mark.symbol()));
            assert!(line.ends_with("unit started"));
        }
    }

    #[test]
    fn test_every_helper_prints() {
        Output::success("ok");
        Output::error("failed");
        Output::warning("careful");
        Output::info("checking");
        Output::hint("try again");
        Output::check("device present", true);
        Output::check("device present", false);
        Output::step("/dev/video0");
        Output::header("Virtual camera");
        Output::subheader("lsusb");
        Output::list_item("Bus 001 Device 002");
        Output::kv("Unit", "pipewire.service");
        Output::running("sudo depmod -a");
        Output::live("DEPMOD 6.8.0");
        Output::blank();
    }

    #[test]
    fn test_spinner_finishes() {
        Output::spinner("Waiting for /dev/video10...").finish_success("present");
        Output::spinner("Waiting for PipeWire...").finish_warning("no video nodes");
    }
}
