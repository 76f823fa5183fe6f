//! Fixed-layout snapshot records
//!
//! # Binary Format
//!
//! ```text
//! DomainRecord      (272 bytes)  name[256] usage(8) count(8)
//! UserRecord        (4608 bytes) username[256] domain[256] home[4096]
//! UserStoreSnapshot (188 bytes)  stat[144] last_updated(8) time_taken(8)
//!                                last_auth(8) usage(8) count(8) num_directories(4)
//! DirectoryRecord   (4264 bytes) path[4096] last_update(8) stat[144] usage(8) count(8)
//! ```
//!
//! Every user record is followed by exactly one userstore snapshot, which
//! is followed by `num_directories` directory records.
//!
//! Records borrow their strings while encoding and own them after decoding.

use std::borrow::Cow;

use vusage_core::limits::{DOMAIN_NAME_WIDTH, PATH_WIDTH, USERNAME_WIDTH};
use vusage_core::{Directory, Domain, MetadataBlob, User, Userstore, METADATA_BLOB_SIZE};

use super::field::{Field, FieldError, Packer, UnpackError, Unpacker};

/// Per-domain usage record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord<'a> {
    /// Domain name
    pub name: Cow<'a, str>,
    /// Accumulated usage in bytes
    pub usage: u64,
    /// Accumulated file count
    pub count: u64,
}

impl<'a> DomainRecord<'a> {
    /// Serialized size
    pub const SIZE: usize = DOMAIN_NAME_WIDTH + 8 + 8;

    /// Pack into the fixed layout, rejecting a name that does not fit
    pub fn encode(&self) -> Result<Vec<u8>, FieldError> {
        let mut packer = Packer::new(Self::SIZE);
        packer.str(Field::DomainName, &self.name)?;
        packer.u64(self.usage);
        packer.u64(self.count);
        Ok(packer.finish())
    }

    /// Convert to the in-memory model
    pub fn to_domain(&self) -> Domain {
        Domain {
            name: self.name.to_string(),
            usage: self.usage,
            count: self.count,
        }
    }
}

impl DomainRecord<'static> {
    pub(crate) fn decode(buf: &[u8]) -> Result<Self, UnpackError> {
        let mut unpacker = Unpacker::new(buf);
        Ok(DomainRecord {
            name: unpacker.str(Field::DomainName)?,
            usage: unpacker.u64(),
            count: unpacker.u64(),
        })
    }
}

impl<'a> From<&'a Domain> for DomainRecord<'a> {
    fn from(domain: &'a Domain) -> Self {
        DomainRecord {
            name: Cow::Borrowed(&domain.name),
            usage: domain.usage,
            count: domain.count,
        }
    }
}

/// Per-user identity record
///
/// `domain` is a copy of the owning domain's name, not a reference into
/// the domain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord<'a> {
    /// Username
    pub name: Cow<'a, str>,
    /// Name of the domain the user belongs to
    pub domain: Cow<'a, str>,
    /// Home directory
    pub home: Cow<'a, str>,
}

impl<'a> UserRecord<'a> {
    /// Serialized size
    pub const SIZE: usize = USERNAME_WIDTH + DOMAIN_NAME_WIDTH + PATH_WIDTH;

    /// Build a record for `user`, copying the name of its `domain`
    pub fn new(user: &'a User, domain: &'a Domain) -> Self {
        UserRecord {
            name: Cow::Borrowed(&user.name),
            domain: Cow::Borrowed(&domain.name),
            home: Cow::Borrowed(&user.home),
        }
    }

    /// Pack into the fixed layout, rejecting any string that does not fit
    pub fn encode(&self) -> Result<Vec<u8>, FieldError> {
        let mut packer = Packer::new(Self::SIZE);
        packer.str(Field::Username, &self.name)?;
        packer.str(Field::UserDomain, &self.domain)?;
        packer.str(Field::HomeDirectory, &self.home)?;
        Ok(packer.finish())
    }
}

impl UserRecord<'static> {
    pub(crate) fn decode(buf: &[u8]) -> Result<Self, UnpackError> {
        let mut unpacker = Unpacker::new(buf);
        Ok(UserRecord {
            name: unpacker.str(Field::Username)?,
            domain: unpacker.str(Field::UserDomain)?,
            home: unpacker.str(Field::HomeDirectory)?,
        })
    }
}

/// Userstore statistics written after every user record
///
/// Always present on disk. A user without a computed userstore gets an
/// all-zero snapshot with no directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserStoreSnapshot {
    /// Filesystem metadata of the home directory
    pub metadata: MetadataBlob,
    /// When the statistics were last computed
    pub last_updated: i64,
    /// How long the last computation took
    pub time_taken: i64,
    /// Last authentication time
    pub last_auth: i64,
    /// Usage in bytes
    pub usage: u64,
    /// File count
    pub count: u64,
    /// Number of directory records that follow
    pub directory_count: u32,
}

impl UserStoreSnapshot {
    /// Serialized size
    pub const SIZE: usize = METADATA_BLOB_SIZE + 8 * 3 + 8 * 2 + 4;

    /// Snapshot written for a user without a userstore
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// Snapshot of a computed userstore
    ///
    /// `directory_count` is passed in so the caller decides how a count
    /// that overflows the on-disk width is reported.
    pub fn from_userstore(store: &Userstore, directory_count: u32) -> Self {
        UserStoreSnapshot {
            metadata: store.metadata,
            last_updated: store.last_updated,
            time_taken: store.time_taken,
            last_auth: store.last_auth,
            usage: store.usage,
            count: store.count,
            directory_count,
        }
    }

    /// Returns true if this is indistinguishable from an absent userstore
    pub fn is_zeroed(&self) -> bool {
        *self == Self::zeroed()
    }

    /// Pack into the fixed layout
    pub fn encode(&self) -> Vec<u8> {
        let mut packer = Packer::new(Self::SIZE);
        packer.blob(&self.metadata);
        packer.i64(self.last_updated);
        packer.i64(self.time_taken);
        packer.i64(self.last_auth);
        packer.u64(self.usage);
        packer.u64(self.count);
        packer.u32(self.directory_count);
        packer.finish()
    }

    pub(crate) fn decode(buf: &[u8]) -> Self {
        let mut unpacker = Unpacker::new(buf);
        UserStoreSnapshot {
            metadata: unpacker.blob(),
            last_updated: unpacker.i64(),
            time_taken: unpacker.i64(),
            last_auth: unpacker.i64(),
            usage: unpacker.u64(),
            count: unpacker.u64(),
            directory_count: unpacker.u32(),
        }
    }

    /// Convert to the in-memory model with the given directories
    pub fn to_userstore(&self, directories: Vec<Directory>) -> Userstore {
        Userstore {
            metadata: self.metadata,
            last_updated: self.last_updated,
            time_taken: self.time_taken,
            last_auth: self.last_auth,
            usage: self.usage,
            count: self.count,
            directories,
        }
    }
}

/// Per-directory statistics record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord<'a> {
    /// Directory path
    pub path: Cow<'a, str>,
    /// Last scan time
    pub last_update: i64,
    /// Filesystem metadata captured at the last scan
    pub metadata: MetadataBlob,
    /// Usage in bytes
    pub usage: u64,
    /// File count
    pub count: u64,
}

impl<'a> DirectoryRecord<'a> {
    /// Serialized size
    pub const SIZE: usize = PATH_WIDTH + 8 + METADATA_BLOB_SIZE + 8 + 8;

    /// Pack into the fixed layout, rejecting a path that does not fit
    pub fn encode(&self) -> Result<Vec<u8>, FieldError> {
        let mut packer = Packer::new(Self::SIZE);
        packer.str(Field::DirectoryPath, &self.path)?;
        packer.i64(self.last_update);
        packer.blob(&self.metadata);
        packer.u64(self.usage);
        packer.u64(self.count);
        Ok(packer.finish())
    }

    /// Convert to the in-memory model
    pub fn to_directory(&self) -> Directory {
        Directory {
            path: self.path.to_string(),
            last_update: self.last_update,
            metadata: self.metadata,
            usage: self.usage,
            count: self.count,
        }
    }
}

impl DirectoryRecord<'static> {
    pub(crate) fn decode(buf: &[u8]) -> Result<Self, UnpackError> {
        let mut unpacker = Unpacker::new(buf);
        Ok(DirectoryRecord {
            path: unpacker.str(Field::DirectoryPath)?,
            last_update: unpacker.i64(),
            metadata: unpacker.blob(),
            usage: unpacker.u64(),
            count: unpacker.u64(),
        })
    }
}

impl<'a> From<&'a Directory> for DirectoryRecord<'a> {
    fn from(dir: &'a Directory) -> Self {
        DirectoryRecord {
            path: Cow::Borrowed(&dir.path),
            last_update: dir.last_update,
            metadata: dir.metadata,
            usage: dir.usage,
            count: dir.count,
        }
    }
}
