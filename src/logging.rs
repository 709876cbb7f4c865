//! Structured JSONL logging plus human-readable stderr output.
//!
//! Dual-output logging:
//! - **JSONL to file** (~/.autobyte/logs/autobyte.jsonl) - structured, append-only
//! - **Compact to stderr** - human-readable for developers
//!
//! Script output itself never goes through here; it is delivered to the
//! display sink. These logs cover controller lifecycle and failures.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard that must be kept alive for the duration of the program.
/// Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init() -> LoggingGuard {
    let log_dir = get_log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join("autobyte.jsonl");

    let file: Box<dyn Write + Send> = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Box::new(file),
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            Box::new(std::io::sink())
        }
    };

    // Non-blocking writer so slow disks never stall the drain thread
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file);

    // Default to info, allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ureq=warn,rustls=warn"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();

    tracing::debug!(log_path = %log_path.display(), "Logging initialized");

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Log directory (~/.autobyte/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".autobyte").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("autobyte-logs"))
}

/// Path of the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join("autobyte.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_points_into_log_dir() {
        let path = log_path();
        assert!(path.ends_with("autobyte.jsonl"));
        assert_eq!(path.parent(), Some(get_log_dir().as_path()));
    }
}
