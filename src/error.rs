use std::io;

use serde::{Deserialize, Serialize};

/// Error type for tonic-metrics operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("System call error: {0}")]
    System(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scheduler is stopped")]
    SchedulerStopped,
}

/// The closed set of failure classes a metric source can report.
///
/// Every [`Error`] maps onto exactly one kind, which decides how the snapshot
/// store treats the failure: `Unavailable` hides the widget for good, every
/// other kind keeps the last good reading around and marks it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Hardware or service is absent (no battery, no SMC, unsupported OS)
    Unavailable,
    /// The user has not granted access yet
    PermissionDenied,
    /// The OS call exceeded its time bound
    Timeout,
    /// The OS answered with something unparseable
    InvalidData,
}

impl SourceErrorKind {
    /// Whether the failure is permanent for the lifetime of the process.
    pub fn is_permanent(self) -> bool {
        matches!(self, SourceErrorKind::Unavailable)
    }
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidData => write!(f, "invalid data"),
        }
    }
}

impl Error {
    pub(crate) fn unavailable<S: Into<String>>(msg: S) -> Self {
        Error::SourceUnavailable(msg.into())
    }

    pub(crate) fn permission_denied<S: Into<String>>(msg: S) -> Self {
        Error::PermissionDenied(msg.into())
    }

    pub(crate) fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    pub(crate) fn invalid_data<S: Into<String>>(msg: S) -> Self {
        Error::InvalidData(msg.into())
    }

    pub(crate) fn system<S: Into<String>>(msg: S) -> Self {
        Error::System(msg.into())
    }

    pub(crate) fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Classifies this error into the source failure taxonomy.
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            Error::SourceUnavailable(_) => SourceErrorKind::Unavailable,
            Error::PermissionDenied(_) => SourceErrorKind::PermissionDenied,
            Error::Timeout(_) => SourceErrorKind::Timeout,
            Error::Io(err) => match err.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::Unsupported => SourceErrorKind::Unavailable,
                io::ErrorKind::PermissionDenied => SourceErrorKind::PermissionDenied,
                io::ErrorKind::TimedOut => SourceErrorKind::Timeout,
                _ => SourceErrorKind::InvalidData,
            },
            Error::InvalidData(_)
            | Error::Serialization(_)
            | Error::System(_)
            | Error::InvalidConfig(_)
            | Error::SchedulerStopped => SourceErrorKind::InvalidData,
        }
    }
}

/// Result type for tonic-metrics operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_map_onto_taxonomy() {
        let not_found = Error::from(io::Error::new(io::ErrorKind::NotFound, "no /sys/class/power_supply"));
        assert_eq!(not_found.kind(), SourceErrorKind::Unavailable);

        let denied = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "smc"));
        assert_eq!(denied.kind(), SourceErrorKind::PermissionDenied);

        let slow = Error::from(io::Error::new(io::ErrorKind::TimedOut, "ioreg"));
        assert_eq!(slow.kind(), SourceErrorKind::Timeout);

        let garbage = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"));
        assert_eq!(garbage.kind(), SourceErrorKind::InvalidData);
    }

    #[test]
    fn test_only_unavailable_is_permanent() {
        assert!(Error::unavailable("no battery").kind().is_permanent());
        assert!(!Error::permission_denied("smc").kind().is_permanent());
        assert!(!Error::timeout("ioreg").kind().is_permanent());
        assert!(!Error::invalid_data("garbage").kind().is_permanent());
        assert!(!Error::system("host_statistics64 failed").kind().is_permanent());
    }
}
