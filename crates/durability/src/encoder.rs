//! Snapshot encoder
//!
//! Streams a [`UsageState`] into a fresh snapshot file.
//!
//! # Save Sequence
//!
//! ```text
//! Idle -> Opening -> WritingHeader -> WritingDomains -> WritingUsers -> Closed
//!            \              \               \               \
//!             `--------------`---------------`---------------`--> RolledBack
//! ```
//!
//! 1. Resolve the destination. No destination means persistence is
//!    disabled; the save succeeds without any I/O.
//! 2. Open (create or truncate) the destination.
//! 3. Write the header. Counts come from the collection sizes up front.
//! 4. Write every domain record in collection order.
//! 5. Write every user record in collection order, each followed by its
//!    userstore snapshot and that userstore's directory records.
//! 6. Flush and close.
//!
//! Any value that does not fit its field, and any I/O failure, aborts the
//! whole save and removes the file. Records are never skipped.
//!
//! # Concurrency
//!
//! Each save builds its own writer, so the encoder holds no file state
//! between calls. Callers must still not run two saves against the same
//! destination at once.

use std::path::PathBuf;

use tracing::{debug, info, warn};
use vusage_core::{UsageState, User};

use crate::config::DestinationResolver;
use crate::error::{SaveError, SaveResult};
use crate::format::{DirectoryRecord, DomainRecord, UserRecord, UserStoreSnapshot, VdbHeader};
use crate::testing::FailPoint;
use crate::writer::TransactionalWriter;

/// Result of a save that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No destination is configured; nothing was written
    Disabled,
    /// The snapshot was written in full
    Saved(SaveInfo),
}

impl SaveOutcome {
    /// Details of the written snapshot, if one was written
    pub fn info(&self) -> Option<&SaveInfo> {
        match self {
            SaveOutcome::Disabled => None,
            SaveOutcome::Saved(info) => Some(info),
        }
    }
}

/// Information about a written snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveInfo {
    /// Path to the snapshot file
    pub path: PathBuf,
    /// Domain records written
    pub domains: u64,
    /// User groups written
    pub users: u64,
    /// Directory records written across all users
    pub directories: u64,
    /// Total file size
    pub bytes_written: u64,
}

/// Writes usage snapshots with all-or-nothing semantics
pub struct SnapshotEncoder<R> {
    resolver: R,
    fail_point: Option<FailPoint>,
}

impl<R: DestinationResolver> SnapshotEncoder<R> {
    /// Create an encoder that asks `resolver` for the destination of each save
    pub fn new(resolver: R) -> Self {
        SnapshotEncoder {
            resolver,
            fail_point: None,
        }
    }

    /// Inject a writer failure into every save (testing)
    pub fn with_fail_point(mut self, fail_point: FailPoint) -> Self {
        self.fail_point = Some(fail_point);
        self
    }

    /// The destination resolver
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Save `state`, replacing any previous snapshot
    ///
    /// On error the destination does not exist when this returns.
    pub fn save(&self, state: &UsageState) -> SaveResult<SaveOutcome> {
        let Some(path) = self.resolver.destination() else {
            debug!(target: "vusage::vdb", "Persistence disabled, skipping save");
            return Ok(SaveOutcome::Disabled);
        };

        let mut writer = TransactionalWriter::new(path).with_fail_point(self.fail_point);
        writer.open()?;

        let directories = match write_snapshot(&mut writer, state) {
            Ok(directories) => directories,
            Err(e) => {
                if let SaveError::Validation(field_error) = &e {
                    warn!(
                        target: "vusage::vdb",
                        field = %field_error.field(),
                        value = field_error.value(),
                        "Snapshot aborted: value does not fit its field"
                    );
                } else if e.is_validation() {
                    warn!(target: "vusage::vdb", error = %e, "Snapshot aborted");
                }
                if writer.is_open() {
                    writer.rollback()?;
                }
                return Err(e);
            }
        };

        writer.close()?;

        let info = SaveInfo {
            path: writer.path().to_path_buf(),
            domains: state.domains.len() as u64,
            users: state.users.len() as u64,
            directories,
            bytes_written: writer.bytes_written(),
        };
        info!(
            target: "vusage::vdb",
            path = %info.path.display(),
            domains = info.domains,
            users = info.users,
            directories = info.directories,
            bytes = info.bytes_written,
            "Usage snapshot saved"
        );
        Ok(SaveOutcome::Saved(info))
    }
}

/// Write header, domains and users; returns the number of directory records
fn write_snapshot(writer: &mut TransactionalWriter, state: &UsageState) -> SaveResult<u64> {
    let header = VdbHeader::new(state.domains.len() as u64, state.users.len() as u64);
    writer.write_bytes(&header.to_bytes())?;

    for domain in &state.domains {
        writer.write_bytes(&DomainRecord::from(domain).encode()?)?;
    }

    let mut directories = 0;
    for user in &state.users {
        directories += write_user(writer, state, user)?;
    }
    Ok(directories)
}

fn write_user(writer: &mut TransactionalWriter, state: &UsageState, user: &User) -> SaveResult<u64> {
    let domain = state
        .domain_of(user)
        .ok_or_else(|| SaveError::UnknownDomain {
            user: user.name.clone(),
            domain: user.domain.0,
        })?;
    writer.write_bytes(&UserRecord::new(user, domain).encode()?)?;

    let Some(store) = &user.userstore else {
        writer.write_bytes(&UserStoreSnapshot::zeroed().encode())?;
        return Ok(0);
    };

    let count = u32::try_from(store.directories.len()).map_err(|_| {
        SaveError::TooManyDirectories {
            user: user.name.clone(),
            count: store.directories.len(),
        }
    })?;
    writer.write_bytes(&UserStoreSnapshot::from_userstore(store, count).encode())?;

    for dir in &store.directories {
        writer.write_bytes(&DirectoryRecord::from(dir).encode()?)?;
    }
    Ok(u64::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::IoOp;
    use crate::format::{VDB_HEADER_SIZE, VDB_MAGIC};
    use vusage_core::limits::{DOMAIN_NAME_WIDTH, USERNAME_WIDTH};
    use vusage_core::{Directory, Domain, DomainId, Userstore};

    fn two_user_state() -> UsageState {
        let mut state = UsageState::new();
        let d = state.add_domain(Domain::new("example.com").with_usage(9000, 90));
        state.add_user(User::new("alice", d, "/home/example.com/alice").with_userstore(
            Userstore {
                usage: 8000,
                count: 80,
                directories: vec![
                    Directory::new("/home/example.com/alice"),
                    Directory::new("/home/example.com/alice/Maildir"),
                ],
                ..Default::default()
            },
        ));
        state.add_user(User::new("bob", d, "/home/example.com/bob"));
        state
    }

    #[test]
    fn test_disabled_does_no_io() {
        let encoder = SnapshotEncoder::new(None::<PathBuf>);
        let outcome = encoder.save(&two_user_state()).unwrap();
        assert_eq!(outcome, SaveOutcome::Disabled);
        assert!(outcome.info().is_none());
    }

    #[test]
    fn test_empty_filename_is_not_disabled() {
        let encoder = SnapshotEncoder::new(StorageConfig::with_filename(""));
        let err = encoder.save(&two_user_state()).unwrap_err();
        assert!(matches!(err, SaveError::Io { op: IoOp::Open, .. }));
    }

    #[test]
    fn test_save_reports_counts_and_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");

        let outcome = SnapshotEncoder::new(path.clone())
            .save(&two_user_state())
            .unwrap();
        let info = outcome.info().unwrap();

        let expected_size = VDB_HEADER_SIZE
            + DomainRecord::SIZE
            + 2 * (UserRecord::SIZE + UserStoreSnapshot::SIZE)
            + 2 * DirectoryRecord::SIZE;
        assert_eq!(info.path, path);
        assert_eq!(info.domains, 1);
        assert_eq!(info.users, 2);
        assert_eq!(info.directories, 2);
        assert_eq!(info.bytes_written, expected_size as u64);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), expected_size as u64);
    }

    #[test]
    fn test_header_written_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");

        SnapshotEncoder::new(path.clone())
            .save(&two_user_state())
            .unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..3], &VDB_MAGIC);
        assert_eq!(&data[4..12], &1u64.to_ne_bytes());
        assert_eq!(&data[12..20], &2u64.to_ne_bytes());
        assert_eq!(&data[VDB_HEADER_SIZE..VDB_HEADER_SIZE + 11], b"example.com");
    }

    #[test]
    fn test_long_username_aborts_whole_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");

        let mut state = two_user_state();
        state.users[1].name = "b".repeat(USERNAME_WIDTH);

        let err = SnapshotEncoder::new(path.clone()).save(&state).unwrap_err();
        assert!(err.is_validation());
        assert!(!path.exists());
    }

    #[test]
    fn test_long_domain_aborts_after_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");

        let mut state = UsageState::new();
        state.add_domain(Domain::new("ok.example"));
        state.add_domain(Domain::new("d".repeat(DOMAIN_NAME_WIDTH)));

        assert!(SnapshotEncoder::new(path.clone()).save(&state).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_dangling_domain_aborts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");

        let mut state = two_user_state();
        state.add_user(User::new("mallory", DomainId(7), "/home/mallory"));

        let err = SnapshotEncoder::new(path.clone()).save(&state).unwrap_err();
        assert!(matches!(err, SaveError::UnknownDomain { domain: 7, .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_save_removes_previous_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");
        let encoder = SnapshotEncoder::new(path.clone());

        encoder.save(&two_user_state()).unwrap();
        assert!(path.exists());

        let mut state = two_user_state();
        state.users[0].home = "h".repeat(5000);
        assert!(encoder.save(&state).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_save_is_repeatable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("vusage.db");
        let encoder = SnapshotEncoder::new(path.clone());

        encoder.save(&two_user_state()).unwrap();
        let first = std::fs::read(&path).unwrap();
        encoder.save(&two_user_state()).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }
}
