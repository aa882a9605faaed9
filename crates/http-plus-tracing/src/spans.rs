//! Span builder helpers for outgoing HTTP requests.

/// Name of the instrumentation scope used for spans created through the
/// OpenTelemetry API rather than `tracing`.
pub const INSTRUMENTATION_SCOPE: &str = "http-plus";

/// Create the tracing span for an outgoing HTTP client request.
///
/// Usage: `let span = client_request_span!(request.method, request.uri);`
///
/// Peer identity fields recorded later, once known:
/// - `net.peer.name`: host from the request URI
/// - `net.peer.port`: explicit or scheme-default port
#[macro_export]
macro_rules! client_request_span {
    ($method:expr, $url:expr) => {
        tracing::info_span!(
            "http.client",
            otel.kind = "client",
            http.request.method = %$method,
            url.full = %$url,
            net.peer.name = tracing::field::Empty,
            net.peer.port = tracing::field::Empty,
        )
    };
}
