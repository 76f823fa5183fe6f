//! Snapshot file header
//!
//! # Binary Format (20 bytes)
//!
//! ```text
//! magic("VDB", 3) + version(1) + domain_count(8) + user_count(8)
//! ```
//!
//! Counts are in native byte order. Both counts are known before the first
//! record is written, so the header is never patched after the fact.

use super::field::{Packer, Unpacker};

/// Magic bytes at the start of every snapshot file
pub const VDB_MAGIC: [u8; 3] = *b"VDB";

/// Current format version
pub const VDB_FORMAT_VERSION: u8 = 0x02;

/// Size of a serialized [`VdbHeader`] in bytes
pub const VDB_HEADER_SIZE: usize = 3 + 1 + 8 + 8;

/// Snapshot file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdbHeader {
    /// Magic bytes
    pub magic: [u8; 3],
    /// Format version
    pub version: u8,
    /// Number of domain records that follow
    pub domain_count: u64,
    /// Number of user groups that follow the domain records
    pub user_count: u64,
}

impl VdbHeader {
    /// Create a header for the current format version
    pub fn new(domain_count: u64, user_count: u64) -> Self {
        VdbHeader {
            magic: VDB_MAGIC,
            version: VDB_FORMAT_VERSION,
            domain_count,
            user_count,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packer = Packer::new(VDB_HEADER_SIZE);
        packer.bytes(&self.magic);
        packer.bytes(&[self.version]);
        packer.u64(self.domain_count);
        packer.u64(self.user_count);
        packer.finish()
    }

    /// Deserialize from bytes without validating magic or version
    pub fn from_bytes(bytes: &[u8; VDB_HEADER_SIZE]) -> Self {
        let magic = [bytes[0], bytes[1], bytes[2]];
        let version = bytes[3];
        let mut unpacker = Unpacker::new(&bytes[4..]);
        VdbHeader {
            magic,
            version,
            domain_count: unpacker.u64(),
            user_count: unpacker.u64(),
        }
    }

    /// Validate magic and version
    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.magic != VDB_MAGIC {
            return Err(HeaderError::InvalidMagic {
                expected: VDB_MAGIC,
                actual: self.magic,
            });
        }
        if self.version != VDB_FORMAT_VERSION {
            return Err(HeaderError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Header validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// Not a snapshot file
    #[error("Invalid magic bytes: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Expected magic bytes
        expected: [u8; 3],
        /// Actual magic bytes
        actual: [u8; 3],
    },

    /// Written by a different format version
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),
}
