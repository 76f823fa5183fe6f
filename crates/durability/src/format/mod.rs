//! On-disk byte format of the usage snapshot.
//!
//! All layout logic lives here. The encoder decides what to write and
//! when; the writer owns the file.
//!
//! # File Structure
//!
//! ```text
//! header
//! domain_count  x DomainRecord
//! user_count    x (UserRecord, UserStoreSnapshot, num_directories x DirectoryRecord)
//! ```
//!
//! Records are concatenated with no padding or delimiters.
//!
//! # Module Structure
//!
//! - `field`: fixed-width string and number packing, field validation
//! - `header`: file header
//! - `records`: domain, user, userstore and directory records

pub mod field;
pub mod header;
pub mod records;

pub use field::{validate_str, Field, FieldError};
pub use header::{HeaderError, VdbHeader, VDB_FORMAT_VERSION, VDB_HEADER_SIZE, VDB_MAGIC};
pub use records::{DirectoryRecord, DomainRecord, UserRecord, UserStoreSnapshot};
