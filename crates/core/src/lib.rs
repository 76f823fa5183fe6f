//! Core types for vusage
//!
//! This crate defines the in-memory usage model that the persistence layer
//! snapshots to disk and rebuilds on restart:
//! - Domain: billing grouping with aggregate usage
//! - User: account with a home directory, belonging to one domain
//! - Userstore: cached per-user statistics and tracked directories
//! - MetadataBlob: opaque filesystem metadata copied verbatim
//! - UsageState: the ordered domain and user collections
//! - Limits: fixed field widths of the on-disk records

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod limits;
pub mod types;

pub use limits::{DOMAIN_NAME_WIDTH, METADATA_BLOB_SIZE, PATH_WIDTH, USERNAME_WIDTH};
pub use types::{Directory, Domain, DomainId, MetadataBlob, UsageState, User, Userstore};
