//! Storage configuration via `vusaged.toml`
//!
//! The only setting this layer reads is where to save the usage snapshot.
//! Leaving it out disables persistence: saves succeed without touching
//! the filesystem and the daemon recomputes everything on restart.
//!
//! ```toml
//! [storage]
//! filename = "/var/lib/vusage/vusage.db"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Config file name the daemon looks for
pub const CONFIG_FILE_NAME: &str = "vusaged.toml";

/// Supplies the destination of a save
///
/// `None` means persistence is disabled.
pub trait DestinationResolver {
    /// Destination path for the next save
    fn destination(&self) -> Option<PathBuf>;
}

impl DestinationResolver for PathBuf {
    fn destination(&self) -> Option<PathBuf> {
        Some(self.clone())
    }
}

impl DestinationResolver for Option<PathBuf> {
    fn destination(&self) -> Option<PathBuf> {
        self.clone()
    }
}

impl<T: DestinationResolver + ?Sized> DestinationResolver for &T {
    fn destination(&self) -> Option<PathBuf> {
        (**self).destination()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    storage: StorageConfig,
}

/// The `[storage]` section
///
/// An empty filename is not "disabled": [`validate`](Self::validate)
/// rejects it, and a save against it fails to open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    filename: Option<String>,
}

impl StorageConfig {
    /// Config with persistence disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Config saving to `filename`
    pub fn with_filename(filename: impl Into<String>) -> Self {
        StorageConfig {
            filename: Some(filename.into()),
        }
    }

    /// Configured snapshot file path, if any
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Returns true if a snapshot file is configured
    pub fn is_enabled(&self) -> bool {
        self.filename.is_some()
    }

    /// Reject a filename that is present but empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.filename.as_deref() {
            Some("") => Err(ConfigError::EmptyFilename),
            _ => Ok(()),
        }
    }

    /// Parse the `[storage]` section of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(ConfigError::Parse)?;
        let config = file.storage;
        config.validate()?;
        if !config.is_enabled() {
            info!(
                target: "vusage::vdb",
                "No storage.filename configured, not saving database"
            );
        }
        Ok(config)
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# vusaged configuration

[storage]
# Where to save computed usage so a restart does not rescan every user.
# The whole file is rewritten on each save. Comment out to disable.
filename = "/var/lib/vusage/vusage.db"
"#
    }
}

impl DestinationResolver for StorageConfig {
    fn destination(&self) -> Option<PathBuf> {
        self.filename.as_deref().map(PathBuf::from)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has the wrong shape
    #[error("Failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    /// `storage.filename` is present but empty
    #[error("Syntax error: storage.filename is empty")]
    EmptyFilename,
}
