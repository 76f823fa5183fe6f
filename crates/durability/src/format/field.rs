//! Fixed-width field packing
//!
//! Strings are stored in null-padded fields with no length prefix.
//! Numbers are stored in native byte order at fixed offsets.
//!
//! [`Packer`] fills a zero-initialized record buffer front to back and
//! [`Unpacker`] walks a record buffer the same way. Both track their
//! position so record layouts read as a plain list of fields.

use byteorder::{ByteOrder, NativeEndian};
use std::borrow::Cow;
use std::fmt;
use vusage_core::limits::{fits, DOMAIN_NAME_WIDTH, PATH_WIDTH, USERNAME_WIDTH};
use vusage_core::{MetadataBlob, METADATA_BLOB_SIZE};

/// Identifies a bounded string field for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Domain record name
    DomainName,
    /// User record username
    Username,
    /// User record copy of the owning domain's name
    UserDomain,
    /// User record home directory
    HomeDirectory,
    /// Directory record path
    DirectoryPath,
}

impl Field {
    /// Width of the field on disk, terminator included
    pub const fn width(self) -> usize {
        match self {
            Field::DomainName | Field::UserDomain => DOMAIN_NAME_WIDTH,
            Field::Username => USERNAME_WIDTH,
            Field::HomeDirectory | Field::DirectoryPath => PATH_WIDTH,
        }
    }

    /// Human-readable field name
    pub const fn name(self) -> &'static str {
        match self {
            Field::DomainName => "domain name",
            Field::Username => "username",
            Field::UserDomain => "user domain",
            Field::HomeDirectory => "home directory",
            Field::DirectoryPath => "directory path",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A string value that cannot be stored in its fixed-width field
///
/// Any one of these aborts the whole save. The value is kept so the
/// offending record can be found from the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Value does not leave room for a terminator
    #[error("{field} too long: {value} ({len} bytes, field width {max})")]
    TooLong {
        /// Offending field
        field: Field,
        /// Offending value
        value: String,
        /// Byte length of the value
        len: usize,
        /// Field width
        max: usize,
    },

    /// Value contains a NUL byte and would decode truncated
    #[error("{field} contains a NUL byte: {value:?}")]
    InteriorNul {
        /// Offending field
        field: Field,
        /// Offending value
        value: String,
    },
}

impl FieldError {
    /// The field that failed validation
    pub fn field(&self) -> Field {
        match self {
            FieldError::TooLong { field, .. } | FieldError::InteriorNul { field, .. } => *field,
        }
    }

    /// The value that failed validation
    pub fn value(&self) -> &str {
        match self {
            FieldError::TooLong { value, .. } | FieldError::InteriorNul { value, .. } => value,
        }
    }
}

/// Check that `value` can be stored in `field` without truncation
pub fn validate_str(field: Field, value: &str) -> Result<(), FieldError> {
    let len = value.len();
    if !fits(len, field.width()) {
        return Err(FieldError::TooLong {
            field,
            value: value.to_string(),
            len,
            max: field.width(),
        });
    }
    if value.as_bytes().contains(&0) {
        return Err(FieldError::InteriorNul {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Record buffer under construction
pub(crate) struct Packer {
    buf: Vec<u8>,
    pos: usize,
}

impl Packer {
    pub(crate) fn new(size: usize) -> Self {
        Packer {
            buf: vec![0u8; size],
            pos: 0,
        }
    }

    fn advance(&mut self, len: usize) -> &mut [u8] {
        let start = self.pos;
        self.pos += len;
        &mut self.buf[start..self.pos]
    }

    pub(crate) fn str(&mut self, field: Field, value: &str) -> Result<(), FieldError> {
        validate_str(field, value)?;
        // Trailing bytes are already zero.
        self.advance(field.width())[..value.len()].copy_from_slice(value.as_bytes());
        Ok(())
    }

    pub(crate) fn u64(&mut self, value: u64) {
        NativeEndian::write_u64(self.advance(8), value);
    }

    pub(crate) fn i64(&mut self, value: i64) {
        NativeEndian::write_i64(self.advance(8), value);
    }

    pub(crate) fn u32(&mut self, value: u32) {
        NativeEndian::write_u32(self.advance(4), value);
    }

    pub(crate) fn bytes(&mut self, value: &[u8]) {
        self.advance(value.len()).copy_from_slice(value);
    }

    pub(crate) fn blob(&mut self, blob: &MetadataBlob) {
        self.bytes(blob.as_bytes());
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        debug_assert_eq!(self.pos, self.buf.len(), "record layout does not fill its buffer");
        self.buf
    }
}

/// String field that did not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnpackError {
    pub(crate) field: Field,
    /// Offset of the field within its record
    pub(crate) offset: usize,
}

/// Cursor over a complete record buffer
pub(crate) struct Unpacker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Unpacker { buf, pos: 0 }
    }

    fn advance(&mut self, len: usize) -> &'a [u8] {
        let start = self.pos;
        self.pos += len;
        &self.buf[start..self.pos]
    }

    /// Read a null-padded string; the field must contain a terminator
    pub(crate) fn str(&mut self, field: Field) -> Result<Cow<'static, str>, UnpackError> {
        let offset = self.pos;
        let raw = self.advance(field.width());
        let end = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or(UnpackError { field, offset })?;
        let value = std::str::from_utf8(&raw[..end]).map_err(|_| UnpackError { field, offset })?;
        Ok(Cow::Owned(value.to_string()))
    }

    pub(crate) fn u64(&mut self) -> u64 {
        NativeEndian::read_u64(self.advance(8))
    }

    pub(crate) fn i64(&mut self) -> i64 {
        NativeEndian::read_i64(self.advance(8))
    }

    pub(crate) fn u32(&mut self) -> u32 {
        NativeEndian::read_u32(self.advance(4))
    }

    pub(crate) fn blob(&mut self) -> MetadataBlob {
        let mut raw = [0u8; METADATA_BLOB_SIZE];
        raw.copy_from_slice(self.advance(METADATA_BLOB_SIZE));
        MetadataBlob::from_bytes(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_one_below_width() {
        let value = "a".repeat(DOMAIN_NAME_WIDTH - 1);
        assert!(validate_str(Field::DomainName, &value).is_ok());
    }

    #[test]
    fn test_validate_at_width_fails() {
        let value = "a".repeat(DOMAIN_NAME_WIDTH);
        let err = validate_str(Field::DomainName, &value).unwrap_err();
        assert!(matches!(
            err,
            FieldError::TooLong { field: Field::DomainName, len, max, .. }
                if len == DOMAIN_NAME_WIDTH && max == DOMAIN_NAME_WIDTH
        ));
        assert_eq!(err.value(), value);
    }

    #[test]
    fn test_validate_interior_nul() {
        let err = validate_str(Field::Username, "ali\0ce").unwrap_err();
        assert_eq!(err.field(), Field::Username);
        assert!(matches!(err, FieldError::InteriorNul { .. }));
    }

    #[test]
    fn test_error_message_names_field_and_value() {
        let value = "x".repeat(PATH_WIDTH + 5);
        let msg = validate_str(Field::HomeDirectory, &value)
            .unwrap_err()
            .to_string();
        assert!(msg.starts_with("home directory too long"));
        assert!(msg.contains(&value));
    }

    #[test]
    fn test_packed_string_is_null_padded() {
        let mut packer = Packer::new(USERNAME_WIDTH);
        packer.str(Field::Username, "alice").unwrap();
        let buf = packer.finish();

        assert_eq!(buf.len(), USERNAME_WIDTH);
        assert_eq!(&buf[..5], b"alice");
        assert!(buf[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_numbers_are_native_endian() {
        let mut packer = Packer::new(20);
        packer.u64(0x0102_0304_0506_0708);
        packer.i64(-2);
        packer.u32(7);
        let buf = packer.finish();

        assert_eq!(&buf[0..8], &0x0102_0304_0506_0708u64.to_ne_bytes());
        assert_eq!(&buf[8..16], &(-2i64).to_ne_bytes());
        assert_eq!(&buf[16..20], &7u32.to_ne_bytes());
    }

    #[test]
    fn test_unpack_reverses_pack() {
        let mut packer = Packer::new(DOMAIN_NAME_WIDTH + 8);
        packer.str(Field::DomainName, "example.com").unwrap();
        packer.u64(42);
        let buf = packer.finish();

        let mut unpacker = Unpacker::new(&buf);
        assert_eq!(unpacker.str(Field::DomainName).unwrap(), "example.com");
        assert_eq!(unpacker.u64(), 42);
    }

    #[test]
    fn test_unpack_rejects_unterminated_field() {
        let buf = vec![b'a'; DOMAIN_NAME_WIDTH];
        let err = Unpacker::new(&buf).str(Field::DomainName).unwrap_err();
        assert_eq!(err.field, Field::DomainName);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_unpack_rejects_invalid_utf8() {
        let mut buf = vec![0u8; USERNAME_WIDTH];
        buf[0] = 0xff;
        buf[1] = 0xfe;
        assert!(Unpacker::new(&buf).str(Field::Username).is_err());
    }
}
