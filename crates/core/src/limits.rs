//! Fixed field widths
//!
//! Every string in the snapshot file lives in a null-padded field of a
//! fixed width. A value fits only if its byte length is strictly less than
//! the width, leaving room for at least one terminator.
//!
//! ## Contract
//!
//! These widths are part of the on-disk format. Changing any of them
//! requires a format version bump.

/// Width of a domain name field in bytes
pub const DOMAIN_NAME_WIDTH: usize = 256;

/// Width of a username field in bytes
pub const USERNAME_WIDTH: usize = 256;

/// Width of a path field (home directory, tracked directory) in bytes
pub const PATH_WIDTH: usize = 4096;

/// Size of the opaque filesystem metadata blob
///
/// Matches `struct stat` on 64-bit Linux.
pub const METADATA_BLOB_SIZE: usize = 144;

/// Returns true if a string of `len` bytes fits a field of `width` bytes.
#[inline]
pub fn fits(len: usize, width: usize) -> bool {
    len < width
}
