use std::{fmt::Display, io, path::PathBuf, sync, time::Duration};

#[derive(Debug)]
pub enum Error {
    ExecutableNotFound(String),
    DataFileNotFound(PathBuf),
    InvalidDataFile(String),
    SourceUnavailable(String),
    StartupFailure(String),
    WaitTimeout { event: String, timeout: Duration },
    ProcessorNotRunning,
    MalformedLogEntry(String),
    AssertionFailed(String),
    IoError(io::Error),
    PoisonedLock,
}

impl Error {
    /// Errors raised while building a server, before anything is launched.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::ExecutableNotFound(_) | Error::DataFileNotFound(_) | Error::InvalidDataFile(_)
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ExecutableNotFound(name) => {
                write!(f, "{} is not available on the execution path", name)
            }
            Error::DataFileNotFound(path) => write!(
                f,
                "Mockoon server environment data file not found: {}",
                path.display()
            ),
            Error::InvalidDataFile(reason) => write!(f, "Invalid mock data file: {}", reason),
            Error::SourceUnavailable(reason) => write!(f, "Log source unavailable: {}", reason),
            Error::StartupFailure(reason) => write!(f, "Server failed to start: {}", reason),
            Error::WaitTimeout { event, timeout } => write!(
                f,
                "Event \"{}\" was not observed within {:.1} seconds",
                event,
                timeout.as_secs_f64()
            ),
            Error::ProcessorNotRunning => write!(f, "The log stream processor is not running"),
            Error::MalformedLogEntry(reason) => write!(f, "Malformed log entry: {}", reason),
            Error::AssertionFailed(message) => write!(f, "{}", message),
            Error::IoError(e) => write!(f, "IoError: {}", e),
            Error::PoisonedLock => write!(f, "The lock was poisoned"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedLogEntry(e.to_string())
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Self {
        Error::PoisonedLock
    }
}
