use std::io;
use thiserror::Error;
use tracing::{error, warn};

/// Error severity for display treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // informational
    Warning,  // recoverable, user can simply retry
    Error,    // operation failed
}

/// Failures surfaced by [`crate::session::SessionController::start`].
#[derive(Error, Debug)]
pub enum StartError {
    #[error("a script is already running")]
    AlreadyRunning,

    #[error("download failed: {0}")]
    Fetch(#[source] anyhow::Error),

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("could not stage script file: {0}")]
    Io(#[from] io::Error),
}

/// Failures surfaced by [`crate::session::SessionController::send_input`].
#[derive(Error, Debug)]
pub enum SendError {
    #[error("no script is running")]
    NotRunning,

    #[error("could not write to script stdin: {0}")]
    Pipe(#[from] io::Error),
}

/// Failures surfaced by [`crate::session::SessionController::stop`].
#[derive(Error, Debug)]
pub enum StopError {
    #[error("no script is running")]
    NotRunning,
}

impl StartError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyRunning => ErrorSeverity::Warning,
            Self::Fetch(_) => ErrorSeverity::Error,
            Self::Launch { .. } => ErrorSeverity::Error,
            Self::Io(_) => ErrorSeverity::Error,
        }
    }
}

impl SendError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotRunning => ErrorSeverity::Warning,
            Self::Pipe(_) => ErrorSeverity::Error,
        }
    }
}

impl StopError {
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }
}

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the session must keep going.
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_severity() {
        assert_eq!(StartError::AlreadyRunning.severity(), ErrorSeverity::Warning);
        assert_eq!(
            StartError::Fetch(anyhow::anyhow!("boom")).severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            StartError::Launch {
                program: "pwsh".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "missing"),
            }
            .severity(),
            ErrorSeverity::Error
        );
    }

    #[test]
    fn send_error_severity() {
        assert_eq!(SendError::NotRunning.severity(), ErrorSeverity::Warning);
        let pipe = SendError::Pipe(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(pipe.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn display_messages_name_the_failure() {
        assert_eq!(
            StartError::AlreadyRunning.to_string(),
            "a script is already running"
        );
        assert_eq!(SendError::NotRunning.to_string(), "no script is running");
        assert!(StartError::Launch {
            program: "pwsh".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        }
        .to_string()
        .contains("pwsh"));
    }

    #[test]
    fn result_ext_returns_value_on_ok() {
        let ok: Result<i32, String> = Ok(7);
        assert_eq!(ok.log_err(), Some(7));
        let err: Result<i32, String> = Err("nope".into());
        assert_eq!(err.warn_on_err(), None);
    }
}
