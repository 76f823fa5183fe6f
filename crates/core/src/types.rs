//! In-memory usage model
//!
//! These are the already-computed statistics that the daemon keeps in
//! memory. Domains and users are kept in ordered collections; the order a
//! caller builds them in is the order they are persisted in.

use crate::limits::METADATA_BLOB_SIZE;

/// Opaque snapshot of filesystem metadata
///
/// Copied byte-for-byte to and from disk. Nothing in vusage interprets it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataBlob([u8; METADATA_BLOB_SIZE]);

impl MetadataBlob {
    /// A blob with every byte zero
    pub const fn zeroed() -> Self {
        MetadataBlob([0u8; METADATA_BLOB_SIZE])
    }

    /// Wrap raw bytes
    pub const fn from_bytes(bytes: [u8; METADATA_BLOB_SIZE]) -> Self {
        MetadataBlob(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; METADATA_BLOB_SIZE] {
        &self.0
    }

    /// Returns true if every byte is zero
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl Default for MetadataBlob {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for MetadataBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_zeroed() {
            return write!(f, "MetadataBlob(zeroed)");
        }
        write!(f, "MetadataBlob(")?;
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..)")
    }
}

/// A billing/administrative grouping of users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Domain name, the natural unique key
    pub name: String,
    /// Accumulated usage in bytes
    pub usage: u64,
    /// Accumulated file count
    pub count: u64,
}

impl Domain {
    /// Create a domain with zero usage
    pub fn new(name: impl Into<String>) -> Self {
        Domain {
            name: name.into(),
            usage: 0,
            count: 0,
        }
    }

    /// Set accumulated usage and file count
    pub fn with_usage(mut self, usage: u64, count: u64) -> Self {
        self.usage = usage;
        self.count = count;
        self
    }
}

/// Position of a domain inside a [`UsageState`]
///
/// Users refer to their domain through this id. It is a lookup, not an
/// ownership edge: the domain is owned by the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub usize);

/// Per-directory statistics tracked under a userstore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    /// Absolute directory path
    pub path: String,
    /// Last time the directory was scanned (seconds since epoch)
    pub last_update: i64,
    /// Filesystem metadata captured at the last scan
    pub metadata: MetadataBlob,
    /// Usage in bytes
    pub usage: u64,
    /// File count
    pub count: u64,
}

impl Directory {
    /// Create a directory record with zeroed statistics
    pub fn new(path: impl Into<String>) -> Self {
        Directory {
            path: path.into(),
            last_update: 0,
            metadata: MetadataBlob::zeroed(),
            usage: 0,
            count: 0,
        }
    }
}

/// Cached computed usage statistics for one user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Userstore {
    /// Filesystem metadata of the home directory
    pub metadata: MetadataBlob,
    /// When the statistics were last computed (seconds since epoch)
    pub last_updated: i64,
    /// How long the last computation took (seconds)
    pub time_taken: i64,
    /// Last authentication time (seconds since epoch)
    pub last_auth: i64,
    /// Usage in bytes
    pub usage: u64,
    /// File count
    pub count: u64,
    /// Tracked directories, in stored order
    pub directories: Vec<Directory>,
}

/// An account with a home directory, belonging to one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Username
    pub name: String,
    /// The domain this user belongs to
    pub domain: DomainId,
    /// Home directory path
    pub home: String,
    /// Computed statistics, absent until the first scan
    pub userstore: Option<Userstore>,
}

impl User {
    /// Create a user without a computed userstore
    pub fn new(name: impl Into<String>, domain: DomainId, home: impl Into<String>) -> Self {
        User {
            name: name.into(),
            domain,
            home: home.into(),
            userstore: None,
        }
    }

    /// Attach a computed userstore
    pub fn with_userstore(mut self, userstore: Userstore) -> Self {
        self.userstore = Some(userstore);
        self
    }
}

/// The full in-memory usage state
///
/// Domain and user order is preserved exactly; nothing here sorts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsageState {
    /// Domains, in insertion order
    pub domains: Vec<Domain>,
    /// Users, in insertion order
    pub users: Vec<User>,
}

impl UsageState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a domain and return its id
    pub fn add_domain(&mut self, domain: Domain) -> DomainId {
        self.domains.push(domain);
        DomainId(self.domains.len() - 1)
    }

    /// Append a user
    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    /// Resolve a domain id
    pub fn domain(&self, id: DomainId) -> Option<&Domain> {
        self.domains.get(id.0)
    }

    /// Resolve the domain a user belongs to
    pub fn domain_of(&self, user: &User) -> Option<&Domain> {
        self.domain(user.domain)
    }

    /// Find the first domain with the given name
    pub fn find_domain(&self, name: &str) -> Option<DomainId> {
        self.domains
            .iter()
            .position(|d| d.name == name)
            .map(DomainId)
    }

    /// Total number of tracked directories across all userstores
    pub fn directory_count(&self) -> usize {
        self.users
            .iter()
            .filter_map(|u| u.userstore.as_ref())
            .map(|s| s.directories.len())
            .sum()
    }

    /// Returns true if there are no domains and no users
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.users.is_empty()
    }
}
