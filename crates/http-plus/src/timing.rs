//! Per-request network lifecycle timestamps.

use std::time::{Duration, Instant, SystemTime};

/// A point in the network lifecycle of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Start,
    DnsLookup,
    TcpConnection,
    TlsHandshake,
    FirstByte,
    End,
}

/// Monotonic timestamps for each lifecycle milestone of one request.
///
/// A field stays `None` when its milestone was never observed, which is the
/// normal case for DNS, TCP and TLS on a reused keep-alive connection.
/// Each field is written at most once.
#[derive(Debug, Clone)]
pub struct TimingRecord {
    pub start_at: Option<Instant>,
    pub dns_lookup_at: Option<Instant>,
    pub tcp_connection_at: Option<Instant>,
    pub tls_handshake_at: Option<Instant>,
    pub first_byte_at: Option<Instant>,
    pub end_at: Option<Instant>,
    /// Pairs a monotonic reading with the wall clock so milestones can be
    /// exported as absolute span timestamps.
    anchor: (Instant, SystemTime),
}

impl TimingRecord {
    pub fn new() -> Self {
        Self::anchored(Instant::now(), SystemTime::now())
    }

    /// Create an empty record whose `instant` corresponds to `wall`.
    pub fn anchored(instant: Instant, wall: SystemTime) -> Self {
        Self {
            start_at: None,
            dns_lookup_at: None,
            tcp_connection_at: None,
            tls_handshake_at: None,
            first_byte_at: None,
            end_at: None,
            anchor: (instant, wall),
        }
    }

    fn slot(&mut self, milestone: Milestone) -> &mut Option<Instant> {
        match milestone {
            Milestone::Start => &mut self.start_at,
            Milestone::DnsLookup => &mut self.dns_lookup_at,
            Milestone::TcpConnection => &mut self.tcp_connection_at,
            Milestone::TlsHandshake => &mut self.tls_handshake_at,
            Milestone::FirstByte => &mut self.first_byte_at,
            Milestone::End => &mut self.end_at,
        }
    }

    /// Stamp `milestone` with the current time unless already stamped.
    pub fn stamp(&mut self, milestone: Milestone) -> bool {
        self.stamp_at(milestone, Instant::now())
    }

    /// Stamp `milestone` with `at` unless already stamped. Returns whether
    /// the record changed.
    pub fn stamp_at(&mut self, milestone: Milestone, at: Instant) -> bool {
        let slot = self.slot(milestone);
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }

    pub fn get(&self, milestone: Milestone) -> Option<Instant> {
        match milestone {
            Milestone::Start => self.start_at,
            Milestone::DnsLookup => self.dns_lookup_at,
            Milestone::TcpConnection => self.tcp_connection_at,
            Milestone::TlsHandshake => self.tls_handshake_at,
            Milestone::FirstByte => self.first_byte_at,
            Milestone::End => self.end_at,
        }
    }

    /// Convert a monotonic timestamp to wall-clock time.
    pub fn wall_clock(&self, at: Instant) -> SystemTime {
        let (instant, wall) = self.anchor;
        match at.checked_duration_since(instant) {
            Some(after) => wall + after,
            None => wall - instant.saturating_duration_since(at),
        }
    }
}

impl Default for TimingRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole milliseconds between two instants, zero if `end` precedes `start`.
pub fn millis_between(start: Instant, end: Instant) -> i64 {
    let elapsed: Duration = end.saturating_duration_since(start);
    elapsed.as_millis() as i64
}
