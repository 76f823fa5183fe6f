//! Transactional snapshot writer
//!
//! Wraps the one output file of a save. Every write either lands in full
//! or the file is removed.
//!
//! # Rollback
//!
//! Any failure (open, short write, OS write error, flush on close) removes
//! the destination before the error is returned. [`TransactionalWriter::rollback`]
//! can also be called directly at any point, any number of times. It
//! always closes the descriptor, and either removes the destination or
//! returns an [`IoOp::Unlink`] error.
//!
//! A writer dropped while still open rolls back, so a save that unwinds
//! midway leaves nothing behind either.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{IoOp, SaveError, SaveResult};
use crate::testing::FailPoint;

/// Permissions of a newly created snapshot file
#[cfg(unix)]
pub const SNAPSHOT_FILE_MODE: u32 = 0o600;

enum WriterState {
    Idle,
    Open(File),
    Closed,
    RolledBack,
}

/// Writer with all-or-nothing semantics over a single file
pub struct TransactionalWriter {
    path: PathBuf,
    state: WriterState,
    bytes_written: u64,
    fail_point: Option<FailPoint>,
}

impl TransactionalWriter {
    /// Create a writer for `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TransactionalWriter {
            path: path.into(),
            state: WriterState::Idle,
            bytes_written: 0,
            fail_point: None,
        }
    }

    /// Inject a failure (testing)
    pub fn with_fail_point(mut self, fail_point: Option<FailPoint>) -> Self {
        self.fail_point = fail_point;
        self
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written since open
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Returns true between a successful open and close or rollback
    pub fn is_open(&self) -> bool {
        matches!(self.state, WriterState::Open(_))
    }

    /// Create or truncate the destination
    ///
    /// New files are created readable and writable by the owner only.
    pub fn open(&mut self) -> SaveResult<()> {
        let opened = if self.fail_point == Some(FailPoint::Open) {
            Err(FailPoint::injected_error())
        } else {
            Self::open_options().open(&self.path)
        };

        match opened {
            Ok(file) => {
                self.state = WriterState::Open(file);
                self.bytes_written = 0;
                Ok(())
            }
            Err(e) => Err(self.fail(IoOp::Open, e)),
        }
    }

    fn open_options() -> OpenOptions {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(SNAPSHOT_FILE_MODE);
        }
        options
    }

    /// Write all of `buf` with a single write call
    ///
    /// A short write is treated exactly like an OS error: the file is
    /// rolled back and the save fails. There are no retries.
    pub fn write_bytes(&mut self, buf: &[u8]) -> SaveResult<()> {
        let offset = self.bytes_written;
        let written = match &mut self.state {
            WriterState::Open(file) => Self::write_once(file, buf, offset, self.fail_point),
            _ => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "snapshot file is not open",
            )),
        };

        match written {
            Ok(n) if n == buf.len() => {
                self.bytes_written += n as u64;
                Ok(())
            }
            Ok(n) => {
                self.bytes_written += n as u64;
                let short = io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", n, buf.len()),
                );
                Err(self.fail(IoOp::ShortWrite, short))
            }
            Err(e) => Err(self.fail(IoOp::Write, e)),
        }
    }

    fn write_once(
        file: &mut File,
        buf: &[u8],
        offset: u64,
        fail_point: Option<FailPoint>,
    ) -> io::Result<usize> {
        let injected = fail_point.and_then(|fp| fp.allowed(offset, buf.len()).map(|n| (fp, n)));
        match injected {
            None => file.write(buf),
            Some((FailPoint::WriteErrorAt(_), _)) => Err(FailPoint::injected_error()),
            Some((_, 0)) => Ok(0),
            Some((_, allowed)) => file.write(&buf[..allowed]),
        }
    }

    /// Flush to stable storage and release the descriptor
    ///
    /// Closing a writer that is not open does nothing.
    pub fn close(&mut self) -> SaveResult<()> {
        let file = match std::mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Open(file) => file,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let synced = if self.fail_point == Some(FailPoint::Close) {
            Err(FailPoint::injected_error())
        } else {
            file.sync_all()
        };
        drop(file);

        synced.map_err(|e| self.fail(IoOp::Close, e))
    }

    /// Release the descriptor and remove the destination
    ///
    /// A destination that is already gone is not an error. Any other
    /// unlink failure is returned as [`IoOp::Unlink`]: the file may still
    /// be on disk.
    pub fn rollback(&mut self) -> SaveResult<()> {
        // Dropping the file closes the descriptor before the unlink.
        self.state = WriterState::RolledBack;

        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(
                    target: "vusage::vdb",
                    path = %self.path.display(),
                    bytes_written = self.bytes_written,
                    "Snapshot rolled back"
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!(
                    target: "vusage::vdb",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove partial snapshot"
                );
                Err(SaveError::io(IoOp::Unlink, self.path.clone(), e))
            }
        }
    }

    fn fail(&mut self, op: IoOp, source: io::Error) -> SaveError {
        error!(
            target: "vusage::vdb",
            op = %op,
            path = %self.path.display(),
            bytes_written = self.bytes_written,
            error = %source,
            "Snapshot I/O failed"
        );
        // rollback logs its own failure
        let _ = self.rollback();
        SaveError::io(op, self.path.clone(), source)
    }
}

impl Drop for TransactionalWriter {
    fn drop(&mut self) {
        if self.is_open() {
            let _ = self.rollback();
        }
    }
}
