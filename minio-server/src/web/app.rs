use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::Request;
use axum::{Router, ServiceExt};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::metrics::InFlightRequestsLayer;
use tower_http::metrics::in_flight_requests::InFlightRequestsCounter;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::process::ProcessInfo;
use crate::state::ServiceState;
use crate::web::middleware as m;
use crate::{endpoints, management};

/// Time granted to open connections of a TLS listener after shutdown was requested.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval for emitting the in-flight requests gauge metric.
const IN_FLIGHT_INTERVAL: Duration = Duration::from_secs(1);

/// A web application served by one of the listeners.
#[derive(Debug)]
pub struct App {
    listener: &'static str,
    router: Router,
    in_flight_requests: InFlightRequestsCounter,
    graceful_shutdown: bool,
}

impl App {
    /// Creates the object API application over the given state.
    pub fn api(state: ServiceState) -> Self {
        Self::new("api", endpoints::routes().with_state(state))
    }

    /// Creates the management application.
    pub fn management(info: Arc<ProcessInfo>) -> Self {
        Self::new("web", management::routes().with_state(info))
    }

    fn new(listener: &'static str, router: Router) -> Self {
        let (in_flight_layer, in_flight_requests) = InFlightRequestsLayer::pair();

        // Layers added first are called first: requests go from top to bottom, responses from
        // bottom to top.
        let middleware = ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                listener,
                m::emit_request_metrics,
            ))
            .layer(in_flight_layer)
            .layer(CatchPanicLayer::custom(m::handle_panic))
            .layer(m::set_server_header())
            .layer(NewSentryLayer::new_from_top())
            .layer(SentryHttpLayer::new().enable_transaction())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(m::make_http_span)
                    .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
            );

        App {
            listener,
            router: router.layer(middleware),
            in_flight_requests,
            graceful_shutdown: false,
        }
    }

    /// Name of the listener serving this application, used to tag logs and metrics.
    pub fn listener(&self) -> &'static str {
        self.listener
    }

    /// Enables or disables graceful shutdown for the server.
    ///
    /// By default, graceful shutdown is disabled.
    pub fn graceful_shutdown(mut self, enable: bool) -> Self {
        self.graceful_shutdown = enable;
        self
    }

    /// Serves plain HTTP on `listener` until graceful shutdown is triggered.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let Self {
            listener: name,
            router,
            in_flight_requests,
            graceful_shutdown,
        } = self;

        let service =
            ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(router);

        let guard = if graceful_shutdown {
            Some(elegant_departure::get_shutdown_guard())
        } else {
            None
        };

        let server = async {
            if let Some(ref guard) = guard {
                axum::serve(listener, service)
                    .with_graceful_shutdown(guard.wait_owned())
                    .await
            } else {
                axum::serve(listener, service).await
            }
        };

        let (serve_result, _) = tokio::join!(server, emit_in_flight(name, in_flight_requests));
        serve_result?;

        Ok(())
    }

    /// Serves HTTPS on `listener` until graceful shutdown is triggered.
    pub async fn serve_tls(self, listener: TcpListener, tls: RustlsConfig) -> Result<()> {
        let Self {
            listener: name,
            router,
            in_flight_requests,
            graceful_shutdown,
        } = self;

        let handle = Handle::new();
        if graceful_shutdown {
            let guard = elegant_departure::get_shutdown_guard();
            let handle = handle.clone();
            tokio::spawn(async move {
                guard.wait().await;
                handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
            });
        }

        let service = router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum_server::from_tcp_rustls(listener.into_std()?, tls)
            .handle(handle)
            .serve(service);

        let (serve_result, _) = tokio::join!(server, emit_in_flight(name, in_flight_requests));
        serve_result?;

        Ok(())
    }
}

/// Reports the number of in-flight requests until the application is dropped.
async fn emit_in_flight(listener: &'static str, counter: InFlightRequestsCounter) {
    counter
        .run_emitter(IN_FLIGHT_INTERVAL, move |count| async move {
            merni::gauge!("server.requests.in_flight": count, "listener" => listener);
        })
        .await;
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{self, StatusCode, header};
    use tower::ServiceExt as _;

    use super::*;

    #[tokio::test]
    async fn management_app_runs_through_middleware() {
        let app = App::management(Arc::new(ProcessInfo::new(false)));
        assert_eq!(app.listener(), "web");

        let request = http::Request::get("/health").body(Body::empty()).unwrap();
        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let server = response.headers()[header::SERVER].to_str().unwrap();
        assert!(server.starts_with("minio/"), "{server}");
    }

    #[tokio::test]
    async fn unknown_routes_pass_through_middleware() {
        let app = App::management(Arc::new(ProcessInfo::new(false)));

        let request = http::Request::get("/missing").body(Body::empty()).unwrap();
        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
