//! Types shared by all storage backends.

use std::fmt::Debug;

use crate::PayloadStream;
use crate::error::Result;
use crate::path::ObjectPath;

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// Information about a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// The payload size in bytes.
    pub size: u64,
}

/// Backend response for [`Backend::get_object`].
pub type GetResponse = Option<(ObjectInfo, PayloadStream)>;

/// Storage engine behind a [`StorageService`](crate::StorageService).
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Stores an object at the given path, replacing any previous object.
    async fn put_object(&self, path: &ObjectPath, stream: PayloadStream) -> Result<ObjectInfo>;

    /// Retrieves the object at the given path, returning its info and a stream of bytes.
    async fn get_object(&self, path: &ObjectPath) -> Result<GetResponse>;

    /// Deletes the object at the given path. Deleting a missing object is not an error.
    async fn delete_object(&self, path: &ObjectPath) -> Result<()>;
}
