use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::{TcpListener, TcpSocket};

use crate::transport::TransportConfig;
use crate::web::app::App;

/// The maximum backlog for TCP listen sockets before refusing connections.
const TCP_LISTEN_BACKLOG: u32 = 1024;

/// Binds the listener described by `transport` and serves `app` until shutdown.
///
/// Binding happens before anything is served, so an unavailable address fails right away.
pub async fn serve(app: App, transport: &TransportConfig) -> Result<()> {
    let addr = transport
        .resolve()
        .await
        .with_context(|| format!("failed to resolve address `{}`", transport.address()))?;
    let listener = listen(addr).with_context(|| format!("failed to listen on {addr}"))?;
    let app = app.graceful_shutdown(true);
    merni::counter!("server.start": 1, "listener" => app.listener());

    match transport.tls() {
        Some(tls) => {
            let config = RustlsConfig::from_pem_file(tls.cert(), tls.key())
                .await
                .with_context(|| {
                    format!(
                        "failed to load certificate `{}` and key `{}`",
                        tls.cert().display(),
                        tls.key().display()
                    )
                })?;
            tracing::info!("HTTPS server listening on {addr}");
            app.serve_tls(listener, config).await
        }
        None => {
            tracing::info!("HTTP server listening on {addr}");
            app.serve(listener).await
        }
    }
}

/// Opens a TCP listener on `addr`.
pub fn listen(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    // Allow quick restarts, but never share the port with another live process.
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(TCP_LISTEN_BACKLOG)
}
