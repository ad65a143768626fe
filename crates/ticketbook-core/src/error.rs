use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::lock::LockError;

/// Machine-readable error codes for host-side reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidJson,
    NotAnObject,
    UnreadableBlob,
    SnapshotCorrupt,
    PersistFailed,
    QuotaExceeded,
    LockContention,
    RecordNotFound,
    ExportFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidJson => "E2001",
            Self::NotAnObject => "E2002",
            Self::UnreadableBlob => "E2003",
            Self::SnapshotCorrupt => "E2004",
            Self::PersistFailed => "E3001",
            Self::QuotaExceeded => "E3002",
            Self::LockContention => "E3003",
            Self::RecordNotFound => "E4001",
            Self::ExportFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and status lines.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidJson => "Invalid ticket JSON",
            Self::NotAnObject => "Ticket document is not a JSON object",
            Self::UnreadableBlob => "Ticket file could not be read",
            Self::SnapshotCorrupt => "Stored ticket snapshot is corrupt",
            Self::PersistFailed => "Failed to persist tickets",
            Self::QuotaExceeded => "Storage quota exceeded",
            Self::LockContention => "Lock contention",
            Self::RecordNotFound => "Ticket not found",
            Self::ExportFailed => "Ticket export failed",
        }
    }

    /// Optional remediation hint that can be surfaced to the user.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .ticketbook/config.toml and retry."),
            Self::InvalidJson => Some("Check that the file was exported by ticketbook."),
            Self::NotAnObject => Some("Each ticket file must hold exactly one JSON object."),
            Self::UnreadableBlob => Some("Check the file exists and is UTF-8 text."),
            Self::SnapshotCorrupt => None,
            Self::PersistFailed => Some("Export open tickets to files before closing."),
            Self::QuotaExceeded => Some("Export and remove old tickets to free storage."),
            Self::LockContention => Some("Retry after the other writer releases its lock."),
            Self::RecordNotFound => None,
            Self::ExportFailed => Some("Check disk space and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures turning text into ticket documents (import and snapshot load).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The source is not valid JSON.
    #[error("invalid JSON in {source_name}: {error}")]
    InvalidJson {
        source_name: String,
        #[source]
        error: serde_json::Error,
    },

    /// The source parsed but is not a JSON object.
    #[error("{source_name} holds a JSON {found}, expected an object")]
    NotAnObject {
        source_name: String,
        found: &'static str,
    },

    /// The source bytes are not UTF-8 text.
    #[error("{source_name} is not UTF-8 text")]
    NotText { source_name: String },

    /// The file could not be read at all.
    #[error("failed to read {}: {error}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
}

impl ParseError {
    /// Machine-readable code associated with this parse error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidJson { .. } => ErrorCode::InvalidJson,
            Self::NotAnObject { .. } => ErrorCode::NotAnObject,
            Self::NotText { .. } | Self::Unreadable { .. } => ErrorCode::UnreadableBlob,
        }
    }
}

/// Failures writing to the backing key-value store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The store refused the write because it would exceed its budget.
    #[error("quota exceeded writing {key}: {needed} bytes requested, {limit} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    /// I/O error from a file-backed store.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    /// Lock acquisition failed.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// The snapshot could not be serialized.
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Machine-readable code associated with this persistence error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::Lock(err) => err.code(),
            Self::Io(_) | Self::Serialize(_) => ErrorCode::PersistFailed,
        }
    }
}

/// An id that names no record in the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("no ticket with id {id}")]
    MissingRecord { id: String },
}

impl ReferenceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::RecordNotFound
    }
}

/// Failures producing or writing an exported ticket file.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to serialize ticket {id}: {error}")]
    Serialize {
        id: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("failed to write {}: {error}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
}

impl TransferError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::ExportFailed
    }
}
