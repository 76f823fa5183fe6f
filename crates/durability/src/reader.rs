//! Snapshot reader for restart recovery
//!
//! Loads a snapshot written by the encoder back into records and, from
//! there, into a [`UsageState`].
//!
//! The file has no checksum; validation is structural. The header must
//! carry the right magic and version, exactly the announced number of
//! records must follow, every string field must be terminated valid UTF-8,
//! and nothing may follow the last user group.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use vusage_core::{DomainId, UsageState, User};

use crate::format::field::UnpackError;
use crate::format::{
    DirectoryRecord, DomainRecord, Field, HeaderError, UserRecord, UserStoreSnapshot, VdbHeader,
    VDB_HEADER_SIZE,
};

/// Upper bound on capacity reserved from untrusted header counts
const MAX_PREALLOC: usize = 4096;

/// Snapshot reader
pub struct SnapshotReader;

impl SnapshotReader {
    /// Load and validate a snapshot file
    pub fn load(path: &Path) -> Result<LoadedSnapshot, SnapshotReadError> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Decode a snapshot held in memory
    pub fn decode(data: &[u8]) -> Result<LoadedSnapshot, SnapshotReadError> {
        Self::read_from(data)
    }

    /// Decode a snapshot from any byte stream
    pub fn read_from<R: Read>(reader: R) -> Result<LoadedSnapshot, SnapshotReadError> {
        let mut input = RecordInput { reader, offset: 0 };

        let mut header_bytes = [0u8; VDB_HEADER_SIZE];
        input.fill(&mut header_bytes, RecordKind::Header)?;
        let header = VdbHeader::from_bytes(&header_bytes);
        header.validate()?;

        let mut buf = Vec::new();

        let mut domains = Vec::with_capacity(prealloc(header.domain_count));
        for _ in 0..header.domain_count {
            let start = input.next(&mut buf, DomainRecord::SIZE, RecordKind::Domain)?;
            domains.push(DomainRecord::decode(&buf).map_err(|e| invalid_string(e, start))?);
        }

        let mut users = Vec::with_capacity(prealloc(header.user_count));
        for _ in 0..header.user_count {
            let start = input.next(&mut buf, UserRecord::SIZE, RecordKind::User)?;
            let record = UserRecord::decode(&buf).map_err(|e| invalid_string(e, start))?;

            input.next(&mut buf, UserStoreSnapshot::SIZE, RecordKind::Userstore)?;
            let store = UserStoreSnapshot::decode(&buf);

            let mut directories = Vec::with_capacity(prealloc(u64::from(store.directory_count)));
            for _ in 0..store.directory_count {
                let start = input.next(&mut buf, DirectoryRecord::SIZE, RecordKind::Directory)?;
                directories
                    .push(DirectoryRecord::decode(&buf).map_err(|e| invalid_string(e, start))?);
            }

            users.push(UserEntry {
                record,
                store,
                directories,
            });
        }

        input.expect_end()?;

        Ok(LoadedSnapshot {
            header,
            domains,
            users,
        })
    }
}

fn prealloc(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX).min(MAX_PREALLOC)
}

fn invalid_string(e: UnpackError, record_start: u64) -> SnapshotReadError {
    SnapshotReadError::InvalidString {
        field: e.field,
        offset: record_start + e.offset as u64,
    }
}

/// Byte stream with a running offset for error reporting
struct RecordInput<R> {
    reader: R,
    offset: u64,
}

impl<R: Read> RecordInput<R> {
    fn fill(&mut self, buf: &mut [u8], kind: RecordKind) -> Result<u64, SnapshotReadError> {
        let start = self.offset;
        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(start)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(SnapshotReadError::Truncated {
                record: kind,
                offset: start,
            }),
            Err(e) => Err(SnapshotReadError::Io(e)),
        }
    }

    /// Read the next `size`-byte record into `buf`, returning its offset
    fn next(
        &mut self,
        buf: &mut Vec<u8>,
        size: usize,
        kind: RecordKind,
    ) -> Result<u64, SnapshotReadError> {
        buf.resize(size, 0);
        self.fill(buf, kind)
    }

    fn expect_end(&mut self) -> Result<(), SnapshotReadError> {
        let extra = io::copy(&mut self.reader, &mut io::sink())?;
        if extra > 0 {
            return Err(SnapshotReadError::TrailingBytes {
                offset: self.offset,
                count: extra,
            });
        }
        Ok(())
    }
}

/// Decoded snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSnapshot {
    /// File header
    pub header: VdbHeader,
    /// Domain records in file order
    pub domains: Vec<DomainRecord<'static>>,
    /// User groups in file order
    pub users: Vec<UserEntry>,
}

/// One user record with its userstore snapshot and directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    /// User identity
    pub record: UserRecord<'static>,
    /// Userstore statistics (zeroed if the user had none)
    pub store: UserStoreSnapshot,
    /// Directory records in stored order
    pub directories: Vec<DirectoryRecord<'static>>,
}

impl UserEntry {
    /// Returns true if the user had a computed userstore when saved
    ///
    /// There is no presence flag on disk. A userstore that was present but
    /// entirely zero reads back as absent.
    pub fn has_userstore(&self) -> bool {
        self.store.directory_count > 0 || !self.store.is_zeroed()
    }
}

impl LoadedSnapshot {
    /// Total directory records across all users
    pub fn directory_count(&self) -> usize {
        self.users.iter().map(|u| u.directories.len()).sum()
    }

    /// Find a domain record by name
    pub fn find_domain(&self, name: &str) -> Option<&DomainRecord<'static>> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Rebuild the in-memory usage state
    ///
    /// Users are linked to the first domain with a matching name. A user
    /// whose domain name matches no domain record is an error.
    pub fn into_state(self) -> Result<UsageState, SnapshotReadError> {
        let mut state = UsageState::new();
        let mut by_name: HashMap<String, DomainId> = HashMap::with_capacity(self.domains.len());

        for record in &self.domains {
            let id = state.add_domain(record.to_domain());
            by_name.entry(record.name.to_string()).or_insert(id);
        }

        for entry in self.users {
            let domain = *by_name.get(&*entry.record.domain).ok_or_else(|| {
                SnapshotReadError::UnknownDomain {
                    user: entry.record.name.to_string(),
                    domain: entry.record.domain.to_string(),
                }
            })?;

            let userstore = if entry.has_userstore() {
                let directories = entry.directories.iter().map(|d| d.to_directory()).collect();
                Some(entry.store.to_userstore(directories))
            } else {
                None
            };

            state.add_user(User {
                name: entry.record.name.into_owned(),
                domain,
                home: entry.record.home.into_owned(),
                userstore,
            });
        }

        Ok(state)
    }
}

/// Record being read when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// File header
    Header,
    /// Domain record
    Domain,
    /// User record
    User,
    /// Userstore snapshot
    Userstore,
    /// Directory record
    Directory,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Header => "header",
            RecordKind::Domain => "domain record",
            RecordKind::User => "user record",
            RecordKind::Userstore => "userstore snapshot",
            RecordKind::Directory => "directory record",
        })
    }
}

/// Errors that can occur when reading a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotReadError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

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

    /// File ends inside a record
    #[error("Snapshot truncated in {record} at offset {offset}")]
    Truncated {
        /// Record being read
        record: RecordKind,
        /// Offset of the record start
        offset: u64,
    },

    /// String field without terminator or not UTF-8
    #[error("Invalid {field} at offset {offset}")]
    InvalidString {
        /// Field that failed to decode
        field: Field,
        /// Offset of the field
        offset: u64,
    },

    /// Data after the last announced record
    #[error("{count} trailing bytes at offset {offset}")]
    TrailingBytes {
        /// Offset where the data should have ended
        offset: u64,
        /// Number of extra bytes
        count: u64,
    },

    /// A user record names a domain with no domain record
    #[error("User {user} belongs to unknown domain {domain}")]
    UnknownDomain {
        /// Username
        user: String,
        /// Domain name from the user record
        domain: String,
    },
}

impl From<HeaderError> for SnapshotReadError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::InvalidMagic { expected, actual } => {
                SnapshotReadError::InvalidMagic { expected, actual }
            }
            HeaderError::UnsupportedVersion(v) => SnapshotReadError::UnsupportedVersion(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{VDB_FORMAT_VERSION, VDB_MAGIC};

    fn header_only(domain_count: u64, user_count: u64) -> Vec<u8> {
        VdbHeader::new(domain_count, user_count).to_bytes()
    }

    fn domain_bytes(name: &str, usage: u64) -> Vec<u8> {
        DomainRecord {
            name: name.into(),
            usage,
            count: 1,
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn test_decode_empty_snapshot() {
        let loaded = SnapshotReader::decode(&header_only(0, 0)).unwrap();
        assert_eq!(loaded.header.magic, VDB_MAGIC);
        assert_eq!(loaded.header.version, VDB_FORMAT_VERSION);
        assert!(loaded.domains.is_empty());
        assert!(loaded.users.is_empty());
        assert!(loaded.into_state().unwrap().is_empty());
    }

    #[test]
    fn test_decode_short_header() {
        let err = SnapshotReader::decode(b"VDB\x02").unwrap_err();
        assert!(matches!(
            err,
            SnapshotReadError::Truncated { record: RecordKind::Header, offset: 0 }
        ));
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut data = header_only(0, 0);
        data[0] = b'X';
        assert!(matches!(
            SnapshotReader::decode(&data),
            Err(SnapshotReadError::InvalidMagic { actual, .. }) if &actual == b"XDB"
        ));
    }

    #[test]
    fn test_decode_other_version() {
        let mut data = header_only(0, 0);
        data[3] = 0x01;
        assert!(matches!(
            SnapshotReader::decode(&data),
            Err(SnapshotReadError::UnsupportedVersion(0x01))
        ));
    }

    #[test]
    fn test_decode_missing_domain_record() {
        let mut data = header_only(2, 0);
        data.extend(domain_bytes("a.example", 1));

        let err = SnapshotReader::decode(&data).unwrap_err();
        assert!(matches!(
            err,
            SnapshotReadError::Truncated { record: RecordKind::Domain, offset }
                if offset == (VDB_HEADER_SIZE + DomainRecord::SIZE) as u64
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut data = header_only(1, 0);
        data.extend(domain_bytes("a.example", 1));
        data.extend([0u8; 3]);

        assert!(matches!(
            SnapshotReader::decode(&data),
            Err(SnapshotReadError::TrailingBytes { count: 3, .. })
        ));
    }

    #[test]
    fn test_decode_unterminated_name() {
        let mut data = header_only(1, 0);
        data.extend(vec![b'z'; DomainRecord::SIZE]);

        assert!(matches!(
            SnapshotReader::decode(&data),
            Err(SnapshotReadError::InvalidString { field: Field::DomainName, offset })
                if offset == VDB_HEADER_SIZE as u64
        ));
    }

    #[test]
    fn test_user_without_domain_record() {
        let mut data = header_only(0, 1);
        data.extend(
            UserRecord {
                name: "eve".into(),
                domain: "nowhere.example".into(),
                home: "/home/eve".into(),
            }
            .encode()
            .unwrap(),
        );
        data.extend(UserStoreSnapshot::zeroed().encode());

        let loaded = SnapshotReader::decode(&data).unwrap();
        assert_eq!(loaded.users.len(), 1);
        assert!(!loaded.users[0].has_userstore());
        assert!(matches!(
            loaded.into_state(),
            Err(SnapshotReadError::UnknownDomain { ref domain, .. }) if domain == "nowhere.example"
        ));
    }

    #[test]
    fn test_first_matching_domain_wins() {
        let mut data = header_only(2, 1);
        data.extend(domain_bytes("dup.example", 1));
        data.extend(domain_bytes("dup.example", 2));
        data.extend(
            UserRecord {
                name: "u".into(),
                domain: "dup.example".into(),
                home: "/home/u".into(),
            }
            .encode()
            .unwrap(),
        );
        data.extend(UserStoreSnapshot::zeroed().encode());

        let state = SnapshotReader::decode(&data).unwrap().into_state().unwrap();
        assert_eq!(state.users[0].domain, DomainId(0));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = SnapshotReader::load(&temp_dir.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, SnapshotReadError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
