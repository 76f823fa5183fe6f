//! vusage - persistence for the usage-accounting daemon
//!
//! The daemon periodically saves its computed per-domain, per-user and
//! per-directory usage to a single binary snapshot so a restart does not
//! have to rescan every mailbox.
//!
//! # Quick Start
//!
//! ```ignore
//! use vusage::{SnapshotEncoder, SnapshotReader, StorageConfig, UsageState};
//!
//! let config = StorageConfig::from_file("vusaged.toml".as_ref())?;
//! let encoder = SnapshotEncoder::new(config);
//!
//! // Save: all-or-nothing, nothing on disk if it fails
//! encoder.save(&state)?;
//!
//! // Restart: load the last snapshot back
//! let state: UsageState = SnapshotReader::load(path)?.into_state()?;
//! ```
//!
//! # Architecture
//!
//! - `vusage-core`: the in-memory model (domains, users, userstores, directories)
//! - `vusage-durability`: on-disk format, transactional writer, encoder, reader, config

pub use vusage_core::*;
pub use vusage_durability::*;
