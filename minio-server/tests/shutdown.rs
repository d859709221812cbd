//! Graceful shutdown of the full listener set on a termination signal.
//!
//! Lives in its own test binary, as the signal and the shutdown state are process-wide.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use minio_server::bootstrap::{self, ServerSet};
use minio_server::driver::{ApiDriver, BackendConfig, MemoryConfig, WebDriver};
use minio_server::process::ProcessInfo;
use minio_server::transport::TransportConfig;
use nix::sys::signal::{self, Signal};
use tokio::signal::unix::{SignalKind, signal as unix_signal};

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_termination_drains_all_listeners() -> Result<()> {
    minio_test::tracing::init();

    // Replaces the default disposition of SIGTERM, so raising it can never kill the test binary.
    let _sigterm = unix_signal(SignalKind::terminate())?;

    let info = Arc::new(ProcessInfo::new(false));
    let drained = Arc::new(AtomicBool::new(false));
    let flag = drained.clone();

    let servers = ServerSet::new()
        .with_driver(ApiDriver::new(
            BackendConfig::Memory(MemoryConfig::new("10MB", 10 * 1024 * 1024, None)?),
            TransportConfig::plaintext(format!("127.0.0.1:{}", free_port())),
        ))
        .with_driver(WebDriver::new(format!("127.0.0.1:{}", free_port()), info))
        .with_server(
            "drain",
            bootstrap::start_fn(move || async move {
                let _flag = DropFlag(flag);
                elegant_departure::get_shutdown_guard().wait().await;
                Ok(())
            }),
        );

    // The signal handlers are installed once `run` is polled, so keep raising until it returns.
    let raiser = tokio::spawn(async {
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signal::raise(Signal::SIGTERM).ok();
        }
    });

    let result = tokio::time::timeout(Duration::from_secs(10), bootstrap::run(servers)).await;
    raiser.abort();

    result??;
    assert!(drained.load(Ordering::SeqCst));

    Ok(())
}
