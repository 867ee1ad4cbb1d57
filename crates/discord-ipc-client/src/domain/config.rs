//! Client configuration.
//!
//! [`ClientConfig`] controls how the socket locator finds the desktop
//! application's IPC endpoint.  It can be built in code, taken from
//! [`Default`], or read from a TOML file:
//!
//! ```toml
//! # Skip discovery entirely and connect here.
//! endpoint = "/run/user/1000/discord-ipc-0"
//!
//! # Otherwise probe discord-ipc-<first_id> ..= discord-ipc-<last_id>.
//! first_id = 0
//! last_id = 9
//! runtime_dir_vars = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
//! fallback_runtime_dir = "/tmp"
//! ```
//!
//! Every field is optional in the file; missing fields take the defaults
//! below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest endpoint id the desktop application ever listens on.
pub const MAX_IPC_ID: u8 = 9;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The candidate id range is empty or exceeds [`MAX_IPC_ID`].
    #[error("invalid endpoint id range {first}..={last} (ids must be within 0..=9)")]
    InvalidIdRange { first: u8, last: u8 },
}

/// Runtime configuration for socket discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Explicit endpoint path.  When set, discovery is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<PathBuf>,

    /// First endpoint id to probe.
    #[serde(default = "default_first_id")]
    pub first_id: u8,

    /// Last endpoint id to probe (inclusive).
    #[serde(default = "default_last_id")]
    pub last_id: u8,

    /// Environment variables consulted, in order, for the POSIX runtime
    /// directory.  The first one that is set and non-empty wins.
    #[serde(default = "default_runtime_dir_vars")]
    pub runtime_dir_vars: Vec<String>,

    /// Runtime directory used when none of `runtime_dir_vars` is set.
    #[serde(default = "default_fallback_runtime_dir")]
    pub fallback_runtime_dir: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_first_id() -> u8 {
    0
}
fn default_last_id() -> u8 {
    MAX_IPC_ID
}
fn default_runtime_dir_vars() -> Vec<String> {
    ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_fallback_runtime_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            first_id: default_first_id(),
            last_id: default_last_id(),
            runtime_dir_vars: default_runtime_dir_vars(),
            fallback_runtime_dir: default_fallback_runtime_dir(),
        }
    }
}

impl ClientConfig {
    /// Creates a config that connects straight to `endpoint`.
    pub fn with_endpoint(endpoint: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::InvalidIdRange`] for an unusable id range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`ClientConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that `first_id <= last_id <= MAX_IPC_ID`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIdRange`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_id > self.last_id || self.last_id > MAX_IPC_ID {
            return Err(ConfigError::InvalidIdRange {
                first: self.first_id,
                last: self.last_id,
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
