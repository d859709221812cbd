//! Core storage service and configuration.
//!
//! This module contains [`StorageService`], the main entry point for storing and retrieving
//! objects, along with [`StorageConfig`] which selects the backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytesize::ByteSize;

use crate::PayloadStream;
use crate::backend::common::{BoxedBackend, GetResponse, ObjectInfo};
use crate::backend::donut::DonutBackend;
use crate::backend::in_memory::MemoryBackend;
use crate::error::Result;
use crate::path::ObjectPath;

/// High-level asynchronous service for storing and retrieving objects.
///
/// The service is cheap to clone and shares the underlying backend between clones.
#[derive(Clone, Debug)]
pub struct StorageService(Arc<StorageServiceInner>);

#[derive(Debug)]
struct StorageServiceInner {
    backend: BoxedBackend,
}

/// Configuration to initialize a [`StorageService`].
#[derive(Debug, Clone)]
pub enum StorageConfig<'a> {
    /// Keep objects in volatile memory.
    Memory {
        /// Maximum number of payload bytes held at once.
        capacity: u64,
        /// Idle time after which objects are dropped. `None` keeps objects until evicted.
        expiration: Option<Duration>,
    },
    /// Mirror objects across one or more directories.
    Donut {
        /// The directories backing the donut.
        paths: &'a [PathBuf],
    },
}

impl StorageService {
    /// Creates a new `StorageService` with the specified configuration.
    ///
    /// This must be called from within a tokio runtime.
    pub async fn new(config: StorageConfig<'_>) -> Result<Self> {
        let backend: BoxedBackend = match config {
            StorageConfig::Memory {
                capacity,
                expiration,
            } => {
                tracing::info!(
                    capacity = %ByteSize(capacity),
                    expiration = ?expiration,
                    "using memory storage"
                );
                Box::new(MemoryBackend::new(capacity, expiration))
            }
            StorageConfig::Donut { paths } => {
                tracing::info!(disks = paths.len(), "using donut storage");
                Box::new(DonutBackend::open(paths).await?)
            }
        };

        Ok(Self::from_backend(backend))
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(backend: BoxedBackend) -> Self {
        Self(Arc::new(StorageServiceInner { backend }))
    }

    /// The name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.0.backend.name()
    }

    /// Stores or overwrites an object at the given path.
    pub async fn put_object(&self, path: &ObjectPath, stream: PayloadStream) -> Result<ObjectInfo> {
        let info = self.0.backend.put_object(path, stream).await?;
        tracing::debug!(%path, size = info.size, "put object");
        Ok(info)
    }

    /// Streams the contents of the object stored at the given path.
    pub async fn get_object(&self, path: &ObjectPath) -> Result<GetResponse> {
        let response = self.0.backend.get_object(path).await?;
        tracing::debug!(%path, found = response.is_some(), "get object");
        Ok(response)
    }

    /// Deletes the object stored at the given path, if it exists.
    pub async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        self.0.backend.delete_object(path).await?;
        tracing::debug!(%path, "deleted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::stream;

    fn path() -> ObjectPath {
        ObjectPath::new("testing", "object").unwrap()
    }

    #[tokio::test]
    async fn stores_objects_in_memory() {
        let config = StorageConfig::Memory {
            capacity: 1024,
            expiration: None,
        };
        let service = StorageService::new(config).await.unwrap();
        assert_eq!(service.backend_name(), "memory");

        service
            .put_object(&path(), stream::from_bytes(&b"oh hai!"[..]))
            .await
            .unwrap();

        let (_info, payload) = service.get_object(&path()).await.unwrap().unwrap();
        assert_eq!(stream::collect(payload).await.unwrap().as_ref(), b"oh hai!");
    }

    #[tokio::test]
    async fn stores_objects_on_disk() {
        let tempdir = tempfile::tempdir().unwrap();
        let paths = [tempdir.path().to_path_buf()];
        let service = StorageService::new(StorageConfig::Donut { paths: &paths })
            .await
            .unwrap();
        assert_eq!(service.backend_name(), "donut");

        service
            .put_object(&path(), stream::from_bytes(&b"oh hai!"[..]))
            .await
            .unwrap();
        service.delete_object(&path()).await.unwrap();

        assert!(service.get_object(&path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn surfaces_capacity_errors() {
        let config = StorageConfig::Memory {
            capacity: 4,
            expiration: None,
        };
        let service = StorageService::new(config).await.unwrap();

        let result = service
            .put_object(&path(), stream::from_bytes(&b"too large"[..]))
            .await;
        assert!(matches!(result, Err(ServiceError::TooLarge { .. })));
    }
}
