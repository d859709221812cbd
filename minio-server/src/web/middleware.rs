use std::any::Any;
use std::net::SocketAddr;

use axum::RequestExt;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;
use tower_http::set_header::SetResponseHeaderLayer;

/// The value for the `Server` HTTP header.
const SERVER: &str = concat!("minio/", env!("CARGO_PKG_VERSION"));

/// Create a `SetResponseHeaderLayer` that sets the `Server` header.
pub fn set_server_header() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(header::SERVER, HeaderValue::from_static(SERVER))
}

/// Creates the tracing span of an HTTP request, including the client address when known.
pub fn make_http_span(request: &Request) -> tracing::Span {
    let span = tracing::debug_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        client_addr = tracing::field::Empty,
    );

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        span.record("client_addr", tracing::field::display(addr.ip()));
    }

    span
}

/// A panic handler that logs the panic and turns it into a 500 response.
///
/// Use with the [`CatchPanicLayer`](tower_http::catch_panic::CatchPanicLayer) middleware.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("no error details");

    tracing::error!("panic in web handler: {detail}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// A middleware that records request counts and timings of one listener as metrics.
///
/// Use this with [`from_fn_with_state`](axum::middleware::from_fn_with_state), passing the name of
/// the listener as state.
pub async fn emit_request_metrics(
    State(listener): State<&'static str>,
    mut request: Request,
    next: Next,
) -> Response {
    let matched_path = request.extract_parts::<MatchedPath>().await;
    let route = matched_path.as_ref().map_or("unknown", |m| m.as_str());
    let guard = EmitMetricsGuard::new(listener, route, request.method());

    let response = next.run(request).await;

    guard.finish(response.status());
    response
}

/// Emits the metrics of one request when dropped.
///
/// A guard dropped without [`Self::finish`] reports status `499`, as the client went away before
/// a response was produced.
struct EmitMetricsGuard<'a> {
    listener: &'static str,
    route: &'a str,
    method: Method,
    start: Instant,
    status: Option<StatusCode>,
}

impl<'a> EmitMetricsGuard<'a> {
    fn new(listener: &'static str, route: &'a str, method: &Method) -> Self {
        merni::counter!(
            "server.requests": 1,
            "listener" => listener,
            "route" => route,
            "method" => method.as_str()
        );

        Self {
            listener,
            route,
            method: method.clone(),
            start: Instant::now(),
            status: None,
        }
    }

    fn finish(mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for EmitMetricsGuard<'_> {
    fn drop(&mut self) {
        merni::distribution!(
            "server.requests.duration"@s: self.start.elapsed(),
            "listener" => self.listener,
            "route" => self.route,
            "method" => self.method,
            "status" => self.status
                .map(|s| s.as_u16())
                .unwrap_or(499)
        );
    }
}
