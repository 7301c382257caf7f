//! Tracing setup for the binary.
//!
//! The console layer honors `RUST_LOG` (default `warn`). A setup run can add
//! a plain-text file layer that records every `camsetup` event at `info` and
//! above, including live command output.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use is_terminal::IsTerminal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// `setup_log_<YYYYmmdd_HHMMSS>.txt`
pub fn log_file_name(now: DateTime<Local>) -> String {
    format!("setup_log_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber. With `log_file`, also log to that file.
///
/// Returns the log file path when the file could be created. Failure to
/// create it is reported on stderr and the run continues without it.
pub fn init(log_file: Option<&Path>) -> Option<PathBuf> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        );

    let opened = log_file.and_then(|path| match File::create(path) {
        Ok(file) => Some((path.to_path_buf(), file)),
        Err(e) => {
            eprintln!("Could not create log file {}: {}", path.display(), e);
            None
        }
    });
    let (path, file_layer) = match opened {
        Some((path, file)) => (
            Some(path),
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new("camsetup=info")),
            ),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(now), "setup_log_20240309_070501.txt");
    }
}
