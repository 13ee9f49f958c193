//! Error taxonomy for the logging core.
//!
//! Mirrors the five-way split from the component design: configuration
//! errors fail construction, I/O errors are tagged transient or permanent so
//! callers can decide whether to retry, data errors mean a record could not
//! be encoded or decoded, and invariant violations are programmer errors that
//! abort rather than propagate — the fifth category has no `LogCoreError`
//! variant of its own since it is never meant to be caught and handled, only
//! to panic; see the free function [`assert_invariant`].

use std::fmt;

/// Distinguishes a transient I/O failure (worth retrying) from a permanent
/// one (disk full, permission denied) that should mark a sink degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Transient,
    Permanent,
}

#[derive(Debug)]
pub enum LogCoreError {
    /// Invalid construction parameters: bad path, out-of-range size, etc.
    Configuration(String),
    /// I/O failure reading/writing a sink's backing storage.
    Io { kind: IoKind, message: String },
    /// A record could not be encoded or decoded.
    Data(String),
}

impl fmt::Display for LogCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogCoreError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            LogCoreError::Io { kind, message } => {
                let kind = match kind {
                    IoKind::Transient => "transient",
                    IoKind::Permanent => "permanent",
                };
                write!(f, "{kind} I/O error: {message}")
            }
            LogCoreError::Data(msg) => write!(f, "data error: {msg}"),
        }
    }
}

impl std::error::Error for LogCoreError {}

impl From<std::io::Error> for LogCoreError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::StorageFull => {
                IoKind::Permanent
            }
            _ => IoKind::Transient,
        };
        LogCoreError::Io {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LogCoreError {
    fn from(err: serde_json::Error) -> Self {
        LogCoreError::Data(err.to_string())
    }
}

impl From<rusqlite::Error> for LogCoreError {
    fn from(err: rusqlite::Error) -> Self {
        let kind = match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                IoKind::Transient
            }
            _ => IoKind::Permanent,
        };
        LogCoreError::Io {
            kind,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LogCoreError>;

/// Panics with a diagnostic message. Reserved for invariant violations
/// (spec §7.5: "Fatal; abort process") — never for recoverable conditions.
#[track_caller]
pub fn assert_invariant(condition: bool, message: &str) {
    if !condition {
        panic!("logcore invariant violated: {message}");
    }
}
