//! Exposes in-process test servers for use in integration tests.
//!
//! ```
//! use minio_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/health");
//!    // use the URL in tests...
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use minio_server::process::ProcessInfo;
use minio_server::state::State;
use minio_server::web::{self, App};
use minio_service::{StorageConfig, StorageService};
use tempfile::TempDir;

/// Capacity of the memory backend used by [`TestServer::new`].
pub const TEST_CAPACITY: u64 = 10 * 1024 * 1024;

/// An in-process test server for use in integration tests.
///
/// It listens on a random available port on localhost and is stopped when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    _tempdir: Option<TempDir>,
}

impl TestServer {
    /// Starts the object API over a memory backend of [`TEST_CAPACITY`] bytes.
    pub async fn new() -> Self {
        let config = StorageConfig::Memory {
            capacity: TEST_CAPACITY,
            expiration: None,
        };
        Self::with_storage(config).await
    }

    /// Starts the object API over a donut backend in a temporary directory.
    ///
    /// The directory is deleted when the server is dropped.
    pub async fn donut() -> Self {
        let tempdir = tempfile::tempdir().unwrap();
        let paths = [tempdir.path().join("disk1"), tempdir.path().join("disk2")];

        let mut server = Self::with_storage(StorageConfig::Donut { paths: &paths }).await;
        server._tempdir = Some(tempdir);
        server
    }

    /// Starts the object API over the given storage configuration.
    pub async fn with_storage(config: StorageConfig<'_>) -> Self {
        let service = StorageService::new(config).await.unwrap();
        Self::start(App::api(Arc::new(State { service })))
    }

    /// Starts the management API.
    pub fn management(info: Arc<ProcessInfo>) -> Self {
        Self::start(App::management(info))
    }

    fn start(app: App) -> Self {
        let listener = web::listen(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            app.serve(listener).await.unwrap();
        });

        Self {
            handle,
            socket,
            _tempdir: None,
        }
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://127.0.0.1:{}/{}", self.socket.port(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
