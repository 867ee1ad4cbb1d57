//! Socket discovery.
//!
//! The desktop application listens on the first free endpoint among
//! `discord-ipc-0` through `discord-ipc-9`.  On POSIX systems the endpoint is a
//! Unix socket inside the runtime directory (`$XDG_RUNTIME_DIR`, `$TMPDIR`,
//! `$TMP`, `$TEMP`, then `/tmp`); on Windows it is a named pipe.
//!
//! Discovery is a linear probe: each candidate path is checked for existence
//! in order.  [`SocketLocator::locate`] returns the first hit and
//! [`SocketLocator::locate_all`] every hit, so a caller can fall through a
//! stale socket file to the next live endpoint.  Nothing is connected here
//! and no shared state is touched.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::domain::config::ClientConfig;
use crate::error::RpcError;

/// File name prefix shared by every IPC endpoint.
pub const ENDPOINT_PREFIX: &str = "discord-ipc-";

/// Windows named-pipe namespace.
pub const PIPE_NAMESPACE: &str = r"\\.\pipe\";

/// Checks whether a candidate endpoint exists.
#[cfg_attr(test, mockall::automock)]
pub trait EndpointProbe {
    /// Returns `true` if something is listening (or at least present) at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// Win32 `ERROR_PIPE_BUSY`: every instance of the pipe is in use.
const ERROR_PIPE_BUSY: i32 = 231;

/// [`EndpointProbe`] backed by the real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl EndpointProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(_) => true,
            // A busy named pipe is still a live endpoint.
            Err(e) => cfg!(windows) && e.raw_os_error() == Some(ERROR_PIPE_BUSY),
        }
    }
}

/// Picks the POSIX runtime directory from the first set, non-empty variable
/// in `config.runtime_dir_vars`, falling back to `config.fallback_runtime_dir`.
pub fn resolve_runtime_dir<F>(config: &ClientConfig, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    config
        .runtime_dir_vars
        .iter()
        .filter_map(|var| lookup(var))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config.fallback_runtime_dir.clone())
}

/// Builds the endpoint path for `id` under `runtime_dir`.
///
/// `runtime_dir` is ignored on Windows, where the pipe namespace is fixed.
pub fn endpoint_path(runtime_dir: &Path, id: u8) -> PathBuf {
    let name = format!("{ENDPOINT_PREFIX}{id}");
    if cfg!(windows) {
        PathBuf::from(format!("{PIPE_NAMESPACE}{name}"))
    } else {
        runtime_dir.join(name)
    }
}

/// Discovers the IPC endpoint of the running desktop application.
pub struct SocketLocator<P = FsProbe> {
    config: ClientConfig,
    runtime_dir: PathBuf,
    probe: P,
}

impl SocketLocator<FsProbe> {
    /// Creates a locator that reads the process environment and probes the
    /// real file system.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Config`] if the id range in `config` is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, RpcError> {
        let runtime_dir = resolve_runtime_dir(&config, |var| std::env::var(var).ok());
        Self::with_parts(config, runtime_dir, FsProbe)
    }
}

impl<P: EndpointProbe> SocketLocator<P> {
    /// Creates a locator with an explicit runtime directory and probe.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Config`] if the id range in `config` is invalid.
    pub fn with_parts(
        config: ClientConfig,
        runtime_dir: PathBuf,
        probe: P,
    ) -> Result<Self, RpcError> {
        config.validate()?;
        Ok(Self {
            config,
            runtime_dir,
            probe,
        })
    }

    /// Runtime directory candidates are built under.
    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// All candidate paths, in probing order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        (self.config.first_id..=self.config.last_id)
            .map(|id| endpoint_path(&self.runtime_dir, id))
            .collect()
    }

    /// Returns the configured override, or the first candidate that exists.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::NoEndpointFound`] once every candidate has been
    /// probed without a hit.
    pub fn locate(&self) -> Result<PathBuf, RpcError> {
        if let Some(endpoint) = &self.config.endpoint {
            debug!("using configured IPC endpoint {}", endpoint.display());
            return Ok(endpoint.clone());
        }

        let candidates = self.candidates();
        for path in &candidates {
            trace!("probing {}", path.display());
            if self.probe.exists(path) {
                debug!("found IPC endpoint {}", path.display());
                return Ok(path.clone());
            }
        }

        Err(RpcError::NoEndpointFound {
            searched: candidates.len(),
        })
    }

    /// Returns the configured override, or every candidate that exists, in
    /// probing order.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::NoEndpointFound`] if no candidate exists.
    pub fn locate_all(&self) -> Result<Vec<PathBuf>, RpcError> {
        if let Some(endpoint) = &self.config.endpoint {
            return Ok(vec![endpoint.clone()]);
        }

        let candidates = self.candidates();
        let found: Vec<PathBuf> = candidates
            .iter()
            .filter(|path| {
                trace!("probing {}", path.display());
                self.probe.exists(path)
            })
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(RpcError::NoEndpointFound {
                searched: candidates.len(),
            });
        }
        debug!(count = found.len(), "found IPC endpoints");
        Ok(found)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{predicate::eq, Sequence};

    fn locator(
        config: ClientConfig,
        probe: MockEndpointProbe,
    ) -> SocketLocator<MockEndpointProbe> {
        SocketLocator::with_parts(config, PathBuf::from("/run/user/1000"), probe).unwrap()
    }

    #[test]
    fn test_runtime_dir_prefers_first_set_variable() {
        // Arrange: XDG_RUNTIME_DIR unset, TMPDIR set
        let cfg = ClientConfig::default();

        // Act
        let dir = resolve_runtime_dir(&cfg, |var| match var {
            "TMPDIR" => Some("/var/tmp".to_string()),
            "TMP" => Some("/ignored".to_string()),
            _ => None,
        });

        // Assert
        assert_eq!(dir, PathBuf::from("/var/tmp"));
    }

    #[test]
    fn test_runtime_dir_skips_empty_variables() {
        let cfg = ClientConfig::default();
        let dir = resolve_runtime_dir(&cfg, |var| match var {
            "XDG_RUNTIME_DIR" => Some(String::new()),
            "TEMP" => Some("/temp".to_string()),
            _ => None,
        });
        assert_eq!(dir, PathBuf::from("/temp"));
    }

    #[test]
    fn test_runtime_dir_falls_back_to_tmp() {
        let dir = resolve_runtime_dir(&ClientConfig::default(), |_| None);
        assert_eq!(dir, PathBuf::from("/tmp"));
    }

    #[cfg(unix)]
    #[test]
    fn test_endpoint_path_joins_without_double_slash() {
        assert_eq!(
            endpoint_path(Path::new("/run/user/1000/"), 3),
            PathBuf::from("/run/user/1000/discord-ipc-3")
        );
    }

    #[test]
    fn test_candidates_cover_configured_range_in_order() {
        let cfg = ClientConfig {
            first_id: 2,
            last_id: 4,
            ..ClientConfig::default()
        };
        let loc = locator(cfg, MockEndpointProbe::new());

        let names: Vec<_> = loc
            .candidates()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        assert_eq!(names.len(), 3);
        assert!(names[0].ends_with("discord-ipc-2"));
        assert!(names[2].ends_with("discord-ipc-4"));
    }

    #[test]
    fn test_locate_stops_at_first_existing_path() {
        // Arrange: ids 0 and 1 are missing, 2 exists; 3..=9 must never be probed
        let mut probe = MockEndpointProbe::new();
        let mut seq = Sequence::new();
        let base = PathBuf::from("/run/user/1000");
        for (id, present) in [(0u8, false), (1, false), (2, true)] {
            probe
                .expect_exists()
                .with(eq(endpoint_path(&base, id)))
                .times(1)
                .in_sequence(&mut seq)
                .return_const(present);
        }
        let loc = locator(ClientConfig::default(), probe);

        // Act
        let found = loc.locate().unwrap();

        // Assert
        assert_eq!(found, endpoint_path(&base, 2));
    }

    #[test]
    fn test_locate_exhausts_all_ten_ids() {
        let mut probe = MockEndpointProbe::new();
        probe.expect_exists().times(10).return_const(false);
        let loc = locator(ClientConfig::default(), probe);

        let result = loc.locate();

        assert!(matches!(result, Err(RpcError::NoEndpointFound { searched: 10 })));
    }

    #[test]
    fn test_locate_all_returns_every_existing_path_in_order() {
        // Arrange: ids 1 and 4 exist
        let base = PathBuf::from("/run/user/1000");
        let present = [endpoint_path(&base, 1), endpoint_path(&base, 4)];
        let mut probe = MockEndpointProbe::new();
        let expected = present.clone();
        probe
            .expect_exists()
            .times(10)
            .returning(move |path| expected.iter().any(|p| p == path));
        let loc = locator(ClientConfig::default(), probe);

        // Act
        let found = loc.locate_all().unwrap();

        // Assert
        assert_eq!(found, present.to_vec());
    }

    #[test]
    fn test_locate_all_with_nothing_present_is_no_endpoint_found() {
        let mut probe = MockEndpointProbe::new();
        probe.expect_exists().times(10).return_const(false);
        let loc = locator(ClientConfig::default(), probe);

        assert!(matches!(
            loc.locate_all(),
            Err(RpcError::NoEndpointFound { searched: 10 })
        ));
    }

    #[test]
    fn test_configured_endpoint_skips_probing() {
        let mut probe = MockEndpointProbe::new();
        probe.expect_exists().never();
        let loc = locator(ClientConfig::with_endpoint("/custom/ipc.sock"), probe);

        assert_eq!(loc.locate().unwrap(), PathBuf::from("/custom/ipc.sock"));
    }

    #[test]
    fn test_invalid_range_is_rejected_at_construction() {
        let cfg = ClientConfig {
            first_id: 7,
            last_id: 3,
            ..ClientConfig::default()
        };
        let result = SocketLocator::with_parts(cfg, PathBuf::from("/tmp"), FsProbe);
        assert!(matches!(result, Err(RpcError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_probe_finds_socket_file_in_runtime_dir() {
        // Arrange: a runtime dir where only discord-ipc-1 exists
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("discord-ipc-1"), b"").unwrap();
        let loc =
            SocketLocator::with_parts(ClientConfig::default(), dir.path().to_path_buf(), FsProbe)
                .unwrap();

        // Act
        let found = loc.locate().unwrap();

        // Assert
        assert_eq!(found, dir.path().join("discord-ipc-1"));
    }
}
