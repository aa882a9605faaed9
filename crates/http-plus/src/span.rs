//! The span contract the interceptors write to, and its OpenTelemetry
//! implementation.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use http_plus_tracing::spans::INSTRUMENTATION_SCOPE;
use opentelemetry::trace::{Span as _, SpanKind, Tracer as _};
use opentelemetry::{global, KeyValue};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::attributes::{is_peer_attribute, NET_PEER_IP, NET_PEER_NAME, NET_PEER_PORT};

/// A traced operation that accepts attributes and can parent short
/// auxiliary spans.
pub trait TraceSpan: Send + Sync {
    /// Add or overwrite one attribute.
    fn set_attribute(&self, attribute: KeyValue);

    /// Peer identity attributes (`net.peer.*`) known for this span.
    fn peer_attributes(&self) -> Vec<KeyValue>;

    /// Start and immediately end a child span covering `start..end`.
    fn record_child(
        &self,
        name: &'static str,
        start: SystemTime,
        end: SystemTime,
        attributes: Vec<KeyValue>,
    );

    /// The underlying `tracing` span, when there is one.
    fn tracing_span(&self) -> Option<&tracing::Span> {
        None
    }
}

/// Span handle shared between hooks and body interceptors.
pub type SharedSpan = Arc<dyn TraceSpan>;

/// Creates the span for an outgoing request.
pub trait SpanFactory: Send + Sync {
    fn start_span(&self, request: &http::request::Parts) -> SharedSpan;
}

/// A `tracing` span bridged to OpenTelemetry.
///
/// Peer identity attributes (`net.peer.*`) are also kept aside, whenever
/// they are set, so network phase spans can copy them.
pub struct OtelSpan {
    span: tracing::Span,
    peer: Mutex<Vec<KeyValue>>,
}

impl OtelSpan {
    pub fn new(span: tracing::Span) -> Self {
        Self {
            span,
            peer: Mutex::new(Vec::new()),
        }
    }

    pub fn with_peer(self, attribute: KeyValue) -> Self {
        self.set_attribute(attribute);
        self
    }
}

/// Insert `attribute` into `peer`, replacing an earlier value for its key.
pub(crate) fn upsert(peer: &mut Vec<KeyValue>, attribute: KeyValue) {
    match peer.iter_mut().find(|kv| kv.key == attribute.key) {
        Some(existing) => *existing = attribute,
        None => peer.push(attribute),
    }
}

impl TraceSpan for OtelSpan {
    fn set_attribute(&self, attribute: KeyValue) {
        if is_peer_attribute(attribute.key.as_str()) {
            if let Ok(mut peer) = self.peer.lock() {
                upsert(&mut peer, attribute.clone());
            }
        }
        self.span.set_attribute(attribute.key, attribute.value);
    }

    fn peer_attributes(&self) -> Vec<KeyValue> {
        self.peer.lock().map(|peer| peer.clone()).unwrap_or_default()
    }

    fn record_child(
        &self,
        name: &'static str,
        start: SystemTime,
        end: SystemTime,
        attributes: Vec<KeyValue>,
    ) {
        let tracer = global::tracer(INSTRUMENTATION_SCOPE);
        let parent = self.span.context();
        let mut child = tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_start_time(start)
            .with_attributes(attributes)
            .start_with_context(&tracer, &parent);
        child.end_with_timestamp(end);
    }

    fn tracing_span(&self) -> Option<&tracing::Span> {
        Some(&self.span)
    }
}

/// Default span factory: an `http.client` span carrying the peer identity
/// derived from the request URI.
#[derive(Debug, Default, Clone, Copy)]
pub struct OtelSpanFactory;

impl SpanFactory for OtelSpanFactory {
    fn start_span(&self, request: &http::request::Parts) -> SharedSpan {
        let span = http_plus_tracing::client_request_span!(request.method, request.uri);
        let mut otel = OtelSpan::new(span.clone());

        if let Some(host) = request.uri.host() {
            span.record("net.peer.name", host);
            otel = otel.with_peer(KeyValue::new(NET_PEER_NAME, host.to_string()));
            let bare = host.trim_start_matches('[').trim_end_matches(']');
            if let Ok(ip) = bare.parse::<IpAddr>() {
                otel = otel.with_peer(KeyValue::new(NET_PEER_IP, ip.to_string()));
            }
        }
        if let Some(port) = peer_port(&request.uri) {
            span.record("net.peer.port", port as i64);
            otel = otel.with_peer(KeyValue::new(NET_PEER_PORT, port as i64));
        }

        Arc::new(otel)
    }
}

fn peer_port(uri: &http::Uri) -> Option<u16> {
    uri.port_u16().or_else(|| match uri.scheme_str() {
        Some("https") => Some(443),
        Some("http") => Some(80),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(uri: &str) -> http::request::Parts {
        let (parts, _) = http::Request::get(uri).body(()).unwrap().into_parts();
        parts
    }

    fn peer_keys(span: &SharedSpan) -> Vec<String> {
        span.peer_attributes()
            .into_iter()
            .map(|kv| kv.key.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_peer_from_hostname_uses_scheme_port() {
        let span = OtelSpanFactory.start_span(&parts("https://example.com/users"));
        let peer = span.peer_attributes();
        assert_eq!(peer_keys(&span), vec![NET_PEER_NAME, NET_PEER_PORT]);
        assert_eq!(peer[1].value, opentelemetry::Value::I64(443));
    }

    #[test]
    fn test_peer_from_ip_literal() {
        let span = OtelSpanFactory.start_span(&parts("http://127.0.0.1:8080/"));
        assert_eq!(
            peer_keys(&span),
            vec![NET_PEER_NAME, NET_PEER_IP, NET_PEER_PORT]
        );
    }

    #[test]
    fn test_peer_ip_set_later_is_kept() {
        let span = OtelSpanFactory.start_span(&parts("https://example.com/users"));
        span.set_attribute(KeyValue::new(NET_PEER_IP, "93.184.216.34"));
        span.set_attribute(KeyValue::new(NET_PEER_IP, "93.184.216.35"));
        span.set_attribute(KeyValue::new("http.response.body", "ignored"));

        assert_eq!(
            peer_keys(&span),
            vec![NET_PEER_NAME, NET_PEER_PORT, NET_PEER_IP]
        );
        assert_eq!(
            span.peer_attributes()[2].value,
            opentelemetry::Value::from("93.184.216.35")
        );
    }

    #[test]
    fn test_record_child_without_pipeline_no_panic() {
        let span = OtelSpanFactory.start_span(&parts("http://localhost/"));
        let now = SystemTime::now();
        span.record_child("DNS Lookup", now, now, span.peer_attributes());
        span.set_attribute(KeyValue::new("net.dns.lookup.duration", 3_i64));
        assert!(span.tracing_span().is_some());
    }
}
