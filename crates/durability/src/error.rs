//! Save errors
//!
//! A save fails for one of two reasons: a value does not fit the on-disk
//! layout, or the operating system refused an operation. Both abort the
//! whole save and leave no file behind.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::format::FieldError;

/// Result type alias for save operations
pub type SaveResult<T> = std::result::Result<T, SaveError>;

/// File operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    /// Creating or truncating the destination
    Open,
    /// Writing a record
    Write,
    /// A write that stored fewer bytes than requested
    ShortWrite,
    /// Flushing and releasing the destination
    Close,
    /// Removing the destination during rollback
    Unlink,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoOp::Open => "open",
            IoOp::Write => "write",
            IoOp::ShortWrite => "short write",
            IoOp::Close => "close",
            IoOp::Unlink => "unlink",
        })
    }
}

/// Errors that abort a save
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// A string does not fit its fixed-width field
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldError),

    /// A user refers to a domain that is not in the state
    #[error("User {user} refers to unknown domain #{domain}")]
    UnknownDomain {
        /// Username
        user: String,
        /// Dangling domain index
        domain: usize,
    },

    /// A userstore tracks more directories than the format can count
    #[error("User {user} has too many directories: {count}")]
    TooManyDirectories {
        /// Username
        user: String,
        /// Number of tracked directories
        count: usize,
    },

    /// The operating system refused a file operation
    #[error("{op}({}) failed: {source}", .path.display())]
    Io {
        /// Operation that failed
        op: IoOp,
        /// Destination path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl SaveError {
    pub(crate) fn io(op: IoOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        SaveError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Returns true if the save failed because of the data being saved
    ///
    /// Retrying will fail again until the offending value changes.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SaveError::Validation(_)
                | SaveError::UnknownDomain { .. }
                | SaveError::TooManyDirectories { .. }
        )
    }

    /// Returns true if the save failed in the operating system
    pub fn is_io(&self) -> bool {
        matches!(self, SaveError::Io { .. })
    }
}
