//! File-backed tracing setup.
//!
//! The terminal belongs to the UI, so diagnostics only ever go to a file.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive; logs are flushed when dropped.
#[derive(Debug)]
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Installs a global subscriber appending to `path` at `filter` level.
///
/// An invalid filter falls back to `info`. Installing twice is not an error;
/// the first subscriber wins.
pub fn init_file_logging(path: &Path, filter: &str) -> io::Result<LogGuard> {
    if let Some(parent) = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter(filter))
        .with(file_layer)
        .try_init();

    Ok(LogGuard { _guard: guard })
}

fn env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_and_parent_directories_are_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs/codybot.log");

        let guard = init_file_logging(&path, "debug").expect("logging should initialize");
        tracing::info!("logging initialized for test");
        drop(guard);

        assert!(path.is_file());
    }

    #[test]
    fn invalid_filter_falls_back_to_info() {
        assert_eq!(env_filter("codybot=verbose").to_string(), "info");
        assert_eq!(env_filter("codybot=debug").to_string(), "codybot=debug");
    }

    #[test]
    fn unwritable_path_reports_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");

        assert!(init_file_logging(dir.path(), "info").is_err());
    }
}
