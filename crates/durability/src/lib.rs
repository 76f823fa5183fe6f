//! Persistence layer for the usage daemon
//!
//! This crate handles everything that touches disk:
//!
//! - Binary snapshot format (header, domain, user, userstore, directory records)
//! - Transactional writer: a failed save never leaves a file behind
//! - Snapshot encoder: streams the in-memory usage state to disk
//! - Snapshot reader: loads a snapshot back on restart
//! - Storage configuration (`[storage] filename`)
//! - Fault injection for save testing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config; // vusaged.toml storage section, destination resolution
pub mod encoder; // Save sequence over the transactional writer
pub mod error; // Save errors
pub mod format; // On-disk byte layout
pub mod reader; // Snapshot decoding for restart
pub mod testing; // Writer fault injection
pub mod writer; // All-or-nothing file writer

pub use config::{ConfigError, DestinationResolver, StorageConfig, CONFIG_FILE_NAME};
pub use encoder::{SaveInfo, SaveOutcome, SnapshotEncoder};
pub use error::{IoOp, SaveError, SaveResult};
pub use format::{
    validate_str, DirectoryRecord, DomainRecord, Field, FieldError, HeaderError, UserRecord,
    UserStoreSnapshot, VdbHeader, VDB_FORMAT_VERSION, VDB_HEADER_SIZE, VDB_MAGIC,
};
pub use reader::{LoadedSnapshot, RecordKind, SnapshotReadError, SnapshotReader, UserEntry};
pub use writer::TransactionalWriter;
