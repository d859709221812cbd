//! Backend drivers.
//!
//! A driver holds validated configuration for one listener and turns it into a [`StartFn`]: a
//! deferred task that opens whatever the listener needs and serves until it fails or the process
//! shuts down. Building a driver has no side effects. Everything happens once the `StartFn` is
//! called.
//!
//! The API listener is driven by an [`ApiDriver`] over the selected [`BackendConfig`], the
//! management listener by a storage-agnostic [`WebDriver`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytesize::ByteSize;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use minio_service::{StorageConfig, StorageService};

use crate::error::ConfigError;
use crate::process::ProcessInfo;
use crate::state::State;
use crate::transport::TransportConfig;
use crate::web::{self, App};

/// The smallest capacity accepted for the memory backend.
pub const MIN_MEMORY_CAPACITY: u64 = 10 * 1024 * 1024;

/// A deferred task that runs one listener until it stops or fails.
pub type StartFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Something that can produce a listener task.
pub trait Driver {
    /// A short name for the listener, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Consumes the driver and returns the task running its listener.
    fn into_start_fn(self) -> StartFn;
}

/// Validated configuration of the bounded memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    capacity: u64,
    expiration: Option<Duration>,
}

impl MemoryConfig {
    /// Validates the capacity and expiration of a memory backend.
    ///
    /// `literal` is the capacity as the user wrote it, for error messages.
    pub fn new(
        literal: &str,
        capacity: u64,
        expiration: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if capacity < MIN_MEMORY_CAPACITY {
            return Err(ConfigError::CapacityTooSmall {
                value: literal.to_owned(),
                minimum: ByteSize(MIN_MEMORY_CAPACITY),
            });
        }
        if expiration.is_some_and(|ttl| ttl.is_zero()) {
            return Err(ConfigError::ZeroExpiration);
        }

        Ok(Self {
            capacity,
            expiration,
        })
    }

    /// Maximum number of payload bytes held in memory.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Idle time after which objects are dropped, `None` if they never expire.
    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }
}

/// Configuration of the persistent multi-path backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonutConfig {
    paths: Vec<PathBuf>,
}

impl DonutConfig {
    /// Builds the path list from command line arguments.
    ///
    /// Arguments are trimmed and blank ones dropped. If nothing remains, the donut is placed at
    /// [`default_path`](Self::default_path) below `home`.
    pub fn new<I, S>(args: I, home: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths: Vec<PathBuf> = args
            .into_iter()
            .map(|arg| arg.as_ref().trim().to_owned())
            .filter(|arg| !arg.is_empty())
            .map(PathBuf::from)
            .collect();

        if paths.is_empty() {
            paths.push(Self::default_path(home));
        }

        Self { paths }
    }

    /// The donut location used when no path is given: `<home>/minio-storage/donut`.
    pub fn default_path(home: &Path) -> PathBuf {
        home.join("minio-storage").join("donut")
    }

    /// The configured paths, in order. Never empty.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// The storage backend selected for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Volatile, size-bounded storage.
    Memory(MemoryConfig),
    /// Persistent storage over one or more paths.
    Donut(DonutConfig),
}

impl BackendConfig {
    /// Opens the storage service for this backend.
    pub async fn open(&self) -> anyhow::Result<StorageService> {
        let config = match self {
            BackendConfig::Memory(memory) => StorageConfig::Memory {
                capacity: memory.capacity,
                expiration: memory.expiration,
            },
            BackendConfig::Donut(donut) => StorageConfig::Donut {
                paths: &donut.paths,
            },
        };

        StorageService::new(config)
            .await
            .context("failed to open storage backend")
    }
}

/// Drives the object API listener over the selected backend.
#[derive(Debug)]
pub struct ApiDriver {
    backend: BackendConfig,
    transport: TransportConfig,
}

impl ApiDriver {
    /// Creates a driver serving `backend` on `transport`.
    pub fn new(backend: BackendConfig, transport: TransportConfig) -> Self {
        Self { backend, transport }
    }
}

impl Driver for ApiDriver {
    fn name(&self) -> &'static str {
        "api"
    }

    fn into_start_fn(self) -> StartFn {
        let Self { backend, transport } = self;

        Box::new(move || {
            async move {
                let service = backend.open().await?;
                let state = Arc::new(State { service });
                web::serve(App::api(state), &transport).await
            }
            .boxed()
        })
    }
}

/// Drives the management listener.
///
/// The management listener never uses TLS, whatever the API listener does.
#[derive(Debug)]
pub struct WebDriver {
    transport: TransportConfig,
    info: Arc<ProcessInfo>,
}

impl WebDriver {
    /// Creates a driver serving the management API on `address`.
    pub fn new(address: impl Into<String>, info: Arc<ProcessInfo>) -> Self {
        Self {
            transport: TransportConfig::plaintext(address),
            info,
        }
    }

    /// The transport of the management listener.
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }
}

impl Driver for WebDriver {
    fn name(&self) -> &'static str {
        "web"
    }

    fn into_start_fn(self) -> StartFn {
        let Self { transport, info } = self;
        Box::new(move || {
            async move { web::serve(App::management(info), &transport).await }.boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn accepts_capacities_from_ten_mib() {
        for capacity in [10 * MIB, 10 * MIB + 1, 64 * MIB, 4096 * MIB] {
            let config = MemoryConfig::new("test", capacity, None).unwrap();
            assert_eq!(config.capacity(), capacity);
        }
    }

    #[test]
    fn rejects_capacities_below_ten_mib() {
        for capacity in [0, 1, MIB, 10 * MIB - 1] {
            let result = MemoryConfig::new("test", capacity, None);
            assert!(
                matches!(result, Err(ConfigError::CapacityTooSmall { .. })),
                "capacity {capacity}"
            );
        }
    }

    #[test]
    fn rejects_zero_expiration() {
        let result = MemoryConfig::new("64MB", 64 * MIB, Some(Duration::ZERO));
        assert!(matches!(result, Err(ConfigError::ZeroExpiration)));

        let config = MemoryConfig::new("64MB", 64 * MIB, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(config.expiration(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn defaults_donut_path_to_home() {
        let home = Path::new("/home/minio");

        let config = DonutConfig::new(Vec::<String>::new(), home);
        assert_eq!(config.paths(), [PathBuf::from("/home/minio/minio-storage/donut")]);

        let config = DonutConfig::new(["  "], home);
        assert_eq!(config.paths(), [PathBuf::from("/home/minio/minio-storage/donut")]);
    }

    #[test]
    fn keeps_donut_paths_in_order() {
        let home = Path::new("/home/minio");

        let config = DonutConfig::new(["/a", "/b"], home);
        assert_eq!(config.paths(), [PathBuf::from("/a"), PathBuf::from("/b")]);

        let config = DonutConfig::new(["/a", " /b ", "/a"], home);
        assert_eq!(
            config.paths(),
            [PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/a")]
        );
    }

    #[test]
    fn management_listener_is_plaintext() {
        let info = Arc::new(ProcessInfo::new(false));
        let driver = WebDriver::new(":9001", info);

        assert_eq!(driver.transport().address(), ":9001");
        assert!(!driver.transport().is_tls());
    }

    #[tokio::test]
    async fn opens_the_selected_backend() {
        let memory = BackendConfig::Memory(MemoryConfig::new("10MB", 10 * MIB, None).unwrap());
        assert_eq!(memory.open().await.unwrap().backend_name(), "memory");

        let tempdir = tempfile::tempdir().unwrap();
        let donut = BackendConfig::Donut(DonutConfig::new(
            [tempdir.path().to_str().unwrap()],
            Path::new("/unused"),
        ));
        assert_eq!(donut.open().await.unwrap().backend_name(), "donut");
    }
}
