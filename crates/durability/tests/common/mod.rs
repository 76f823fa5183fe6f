//! Shared fixtures for durability integration tests.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vusage_core::{
    Directory, Domain, MetadataBlob, UsageState, User, Userstore, METADATA_BLOB_SIZE,
};
use vusage_durability::{
    DirectoryRecord, DomainRecord, UserRecord, UserStoreSnapshot, VDB_HEADER_SIZE,
};

/// Temp directory holding one snapshot path
pub struct TestDir {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vusage.db");
        TestDir { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Vec<u8> {
        std::fs::read(&self.path).unwrap()
    }
}

/// Metadata blob with a recognizable byte pattern
pub fn patterned_blob(seed: u8) -> MetadataBlob {
    let mut raw = [0u8; METADATA_BLOB_SIZE];
    for (i, b) in raw.iter_mut().enumerate() {
        *b = seed.wrapping_add(i as u8);
    }
    MetadataBlob::from_bytes(raw)
}

/// Two domains, three users: one with directories, one with an empty
/// userstore, one never scanned.
pub fn sample_state() -> UsageState {
    let mut state = UsageState::new();
    let a = state.add_domain(Domain::new("a.example").with_usage(1_500_000, 3210));
    let b = state.add_domain(Domain::new("b.example").with_usage(42, 7));

    state.add_user(
        User::new("alice", a, "/srv/mail/a.example/alice").with_userstore(Userstore {
            metadata: patterned_blob(1),
            last_updated: 1_700_000_000,
            time_taken: 12,
            last_auth: 1_699_999_000,
            usage: 1_400_000,
            count: 3000,
            directories: vec![
                Directory {
                    path: "/srv/mail/a.example/alice/cur".into(),
                    last_update: 1_700_000_000,
                    metadata: patterned_blob(2),
                    usage: 1_000_000,
                    count: 2500,
                },
                Directory {
                    path: "/srv/mail/a.example/alice/new".into(),
                    last_update: -1,
                    metadata: patterned_blob(3),
                    usage: 400_000,
                    count: 500,
                },
            ],
        }),
    );
    state.add_user(
        User::new("carol", a, "/srv/mail/a.example/carol").with_userstore(Userstore {
            last_updated: 1_700_000_100,
            ..Default::default()
        }),
    );
    state.add_user(User::new("bob", b, "/srv/mail/b.example/bob"));
    state
}

/// Expected file size for a state
pub fn expected_size(state: &UsageState) -> u64 {
    let size = VDB_HEADER_SIZE
        + state.domains.len() * DomainRecord::SIZE
        + state.users.len() * (UserRecord::SIZE + UserStoreSnapshot::SIZE)
        + state.directory_count() * DirectoryRecord::SIZE;
    size as u64
}
