//! Fault injection for save testing
//!
//! A [`FailPoint`] makes the transactional writer fail at a chosen spot so
//! tests can check that a failed save never leaves a file behind.
//!
//! # Example
//!
//! ```ignore
//! use vusage_durability::testing::FailPoint;
//! use vusage_durability::SnapshotEncoder;
//!
//! let encoder = SnapshotEncoder::new(path).with_fail_point(FailPoint::ShortWriteAt(100));
//! assert!(encoder.save(&state).is_err());
//! assert!(!path.exists());
//! ```

use std::io;

/// Where the writer should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Opening the destination fails
    Open,
    /// The write crossing this absolute byte offset is cut short there
    ///
    /// Bytes before the offset reach the file, as a real short write would.
    ShortWriteAt(u64),
    /// The write crossing this absolute byte offset fails with an OS error
    WriteErrorAt(u64),
    /// Flushing the file on close fails
    Close,
}

impl FailPoint {
    /// Number of bytes of a `len`-byte write at `offset` that get through,
    /// or `None` if the write is unaffected.
    pub(crate) fn allowed(&self, offset: u64, len: usize) -> Option<usize> {
        let at = match *self {
            FailPoint::ShortWriteAt(at) | FailPoint::WriteErrorAt(at) => at,
            FailPoint::Open | FailPoint::Close => return None,
        };
        if offset + len as u64 <= at {
            return None;
        }
        Some(at.saturating_sub(offset) as usize)
    }

    pub(crate) fn injected_error() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "injected failure")
    }
}
