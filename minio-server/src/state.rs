use std::sync::Arc;

use minio_service::StorageService;

/// Shared reference to the object API [state](State).
pub type ServiceState = Arc<State>;

/// State shared by all handlers of the object API.
///
/// In request handlers, use `axum::extract::State<ServiceState>` to retrieve it.
#[derive(Debug)]
pub struct State {
    /// The storage service of the selected backend.
    pub service: StorageService,
}
