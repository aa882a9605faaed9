//! Network timing emitter: turns a finished timing record into duration
//! attributes and, optionally, one child span per network phase.

use std::time::Instant;

use opentelemetry::KeyValue;

use crate::attributes::{
    NET_CONTENT_TRANSFER_DURATION, NET_DNS_LOOKUP_DURATION, NET_TCP_CONNECT_DURATION,
    NET_TLS_HANDSHAKE_DURATION, NET_TTFB_DURATION,
};
use crate::span::TraceSpan;
use crate::timing::{millis_between, TimingRecord};

/// One measured interval between two observed milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPhase {
    pub attribute: &'static str,
    /// Name of the child span, `None` for phases that only get an attribute.
    pub span_name: Option<&'static str>,
    pub start: Instant,
    pub end: Instant,
}

impl NetworkPhase {
    pub fn duration_ms(&self) -> i64 {
        millis_between(self.start, self.end)
    }
}

fn phase(
    attribute: &'static str,
    span_name: Option<&'static str>,
    start: Option<Instant>,
    end: Option<Instant>,
) -> Option<NetworkPhase> {
    Some(NetworkPhase {
        attribute,
        span_name,
        start: start?,
        end: end?,
    })
}

/// The phases whose bounding milestones were both observed, in lifecycle
/// order. Phases skipped by a reused connection are simply absent.
pub fn network_phases(record: &TimingRecord) -> Vec<NetworkPhase> {
    // TTFB counts from the last connection milestone that happened.
    let connection_ready = record.tls_handshake_at.or(record.tcp_connection_at);

    [
        phase(
            NET_DNS_LOOKUP_DURATION,
            Some("DNS Lookup"),
            record.start_at,
            record.dns_lookup_at,
        ),
        phase(
            NET_TCP_CONNECT_DURATION,
            Some("TCP Connect"),
            record.dns_lookup_at,
            record.tcp_connection_at,
        ),
        phase(
            NET_TLS_HANDSHAKE_DURATION,
            Some("TLS Handshake"),
            record.tcp_connection_at,
            record.tls_handshake_at,
        ),
        phase(NET_TTFB_DURATION, None, connection_ready, record.first_byte_at),
        phase(
            NET_CONTENT_TRANSFER_DURATION,
            Some("Content Transfer"),
            record.first_byte_at,
            record.end_at,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Writes network phase durations onto a request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkTimingEmitter {
    trace_network_operations: bool,
}

impl NetworkTimingEmitter {
    pub fn new(trace_network_operations: bool) -> Self {
        Self {
            trace_network_operations,
        }
    }

    /// Set one integer-millisecond attribute per observed phase, and emit a
    /// child span with the literal phase timestamps when enabled.
    pub fn emit(&self, span: &dyn TraceSpan, record: &TimingRecord) {
        let phases = network_phases(record);
        let peer = if self.trace_network_operations {
            span.peer_attributes()
        } else {
            Vec::new()
        };

        for phase in &phases {
            span.set_attribute(KeyValue::new(phase.attribute, phase.duration_ms()));

            if !self.trace_network_operations {
                continue;
            }
            if let Some(name) = phase.span_name {
                span.record_child(
                    name,
                    record.wall_clock(phase.start),
                    record.wall_clock(phase.end),
                    peer.clone(),
                );
            }
        }

        if !phases.is_empty() {
            tracing::trace!(phases = phases.len(), "Network timings recorded");
        }
    }
}
