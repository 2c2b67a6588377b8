//! Tracing configuration and log routing.
//!
//! Every event goes to stdout through a compact formatter. A second, ANSI-free layer mirrors
//! events into a log file chosen by `DOCQA_LOG_FILE`:
//!
//! - unset: `logs/docqa.log` relative to the working directory;
//! - a path: appended to that file;
//! - `off`: no file output.
//!
//! File output goes through a non‑blocking writer so request handlers never wait on disk.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::TryInitError};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "docqa.log";

/// Where file logs should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFileTarget {
    /// `logs/docqa.log` under the working directory.
    Default,
    /// Explicit file path, opened in append mode.
    Path(PathBuf),
    /// File logging disabled.
    Disabled,
}

impl LogFileTarget {
    /// Interpret the raw `DOCQA_LOG_FILE` value.
    pub fn from_env_value(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            None | Some("") => Self::Default,
            Some(raw) if raw.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(raw) => Self::Path(PathBuf::from(raw)),
        }
    }
}

/// Install the global subscriber.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Fails only when a global subscriber was already installed.
pub fn init_tracing() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let target = LogFileTarget::from_env_value(std::env::var("DOCQA_LOG_FILE").ok());

    let file_layer = file_writer(&target).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
}

/// Build a non‑blocking writer for the requested file target.
///
/// Returns `None` when file logging is disabled or the file cannot be opened; the failure is
/// reported on stderr because the subscriber is not installed yet.
fn file_writer(target: &LogFileTarget) -> Option<NonBlocking> {
    let (writer, guard) = match target {
        LogFileTarget::Disabled => return None,
        LogFileTarget::Path(path) => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogFileTarget::Default => {
            if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
                eprintln!("Failed to create {DEFAULT_LOG_DIR} directory: {err}");
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_FILE,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_target_parsing() {
        assert_eq!(LogFileTarget::from_env_value(None), LogFileTarget::Default);
        assert_eq!(
            LogFileTarget::from_env_value(Some("  ".into())),
            LogFileTarget::Default
        );
        assert_eq!(
            LogFileTarget::from_env_value(Some("OFF".into())),
            LogFileTarget::Disabled
        );
        assert_eq!(
            LogFileTarget::from_env_value(Some("/tmp/docqa.log".into())),
            LogFileTarget::Path(PathBuf::from("/tmp/docqa.log"))
        );
    }
}
