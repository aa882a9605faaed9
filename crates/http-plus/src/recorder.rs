//! Socket timing recorder.
//!
//! Timing records live in a side-table keyed by [`RequestId`] rather than on
//! the span. A [`RequestTimer`] is the handle through which one request's
//! record is stamped and finally taken; the entry is dropped from the table
//! when it is taken or when the last handle goes away (aborted request).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use crate::message::RequestId;
use crate::timing::{Milestone, TimingRecord};

/// Lifecycle signal raised by the transport carrying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    NameResolved,
    Connected,
    SecureConnected,
    Closed,
}

impl ConnectionEvent {
    /// The milestone stamped when this event is observed, if any.
    pub fn milestone(self) -> Option<Milestone> {
        match self {
            ConnectionEvent::NameResolved => Some(Milestone::DnsLookup),
            ConnectionEvent::Connected => Some(Milestone::TcpConnection),
            ConnectionEvent::SecureConnected => Some(Milestone::TlsHandshake),
            ConnectionEvent::Closed => None,
        }
    }
}

/// Subscriber to transport connection lifecycle events.
pub trait ConnectionObserver: Send + Sync {
    fn on_connection_event(&self, event: ConnectionEvent);
}

struct TableEntry {
    record: TimingRecord,
    handle: Weak<TimerInner>,
}

/// Side-table of in-flight timing records. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct TimingTable {
    entries: Arc<Mutex<HashMap<RequestId, TableEntry>>>,
}

impl TimingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record for `id` with `startAt` stamped now.
    pub fn start(&self, id: RequestId) -> RequestTimer {
        let mut record = TimingRecord::new();
        record.stamp(Milestone::Start);
        self.insert(id, record)
    }

    /// Register a pre-built record for `id`, replacing any previous entry.
    pub fn insert(&self, id: RequestId, record: TimingRecord) -> RequestTimer {
        let inner = Arc::new(TimerInner {
            id,
            table: self.clone(),
        });
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                id,
                TableEntry {
                    record,
                    handle: Arc::downgrade(&inner),
                },
            );
        }
        RequestTimer { inner }
    }

    /// Handle to the record for `id`, if one is still registered.
    pub fn timer(&self, id: RequestId) -> Option<RequestTimer> {
        let handle = {
            let entries = self.entries.lock().ok()?;
            entries.get(&id)?.handle.clone()
        };
        handle.upgrade().map(|inner| RequestTimer { inner })
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stamp_at(&self, id: RequestId, milestone: Milestone, at: Instant) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => entries
                .get_mut(&id)
                .map(|entry| entry.record.stamp_at(milestone, at))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn snapshot(&self, id: RequestId) -> Option<TimingRecord> {
        let entries = self.entries.lock().ok()?;
        entries.get(&id).map(|entry| entry.record.clone())
    }

    fn remove(&self, id: RequestId) -> Option<TimingRecord> {
        let mut entries = self.entries.lock().ok()?;
        entries.remove(&id).map(|entry| entry.record)
    }
}

struct TimerInner {
    id: RequestId,
    table: TimingTable,
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        // Only remove the entry this handle registered; a later insert for
        // the same id owns its own entry.
        if let Ok(mut entries) = self.table.entries.lock() {
            let stale = entries
                .get(&self.id)
                .is_some_and(|entry| entry.handle.strong_count() == 0);
            if stale {
                entries.remove(&self.id);
            }
        }
    }
}

/// Handle to one request's timing record. Cheap to clone.
#[derive(Clone)]
pub struct RequestTimer {
    inner: Arc<TimerInner>,
}

impl RequestTimer {
    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    /// Stamp `milestone` now, unless already stamped.
    pub fn stamp(&self, milestone: Milestone) -> bool {
        self.stamp_at(milestone, Instant::now())
    }

    pub fn stamp_at(&self, milestone: Milestone, at: Instant) -> bool {
        self.inner.table.stamp_at(self.inner.id, milestone, at)
    }

    /// Copy of the record as it stands.
    pub fn snapshot(&self) -> Option<TimingRecord> {
        self.inner.table.snapshot(self.inner.id)
    }

    /// Remove and return the record. Later stamps are ignored.
    pub fn take(&self) -> Option<TimingRecord> {
        self.inner.table.remove(self.inner.id)
    }
}

impl ConnectionObserver for RequestTimer {
    fn on_connection_event(&self, event: ConnectionEvent) {
        if let Some(milestone) = event.milestone() {
            if self.stamp(milestone) {
                tracing::trace!(request_id = %self.id(), ?event, "Connection milestone recorded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_events_map_to_milestones() {
        assert_eq!(
            ConnectionEvent::NameResolved.milestone(),
            Some(Milestone::DnsLookup)
        );
        assert_eq!(
            ConnectionEvent::Connected.milestone(),
            Some(Milestone::TcpConnection)
        );
        assert_eq!(
            ConnectionEvent::SecureConnected.milestone(),
            Some(Milestone::TlsHandshake)
        );
        assert_eq!(ConnectionEvent::Closed.milestone(), None);
    }

    #[test]
    fn test_start_stamps_start_only() {
        let table = TimingTable::new();
        let timer = table.start(RequestId::new());

        let record = timer.snapshot().unwrap();
        assert!(record.start_at.is_some());
        assert!(record.dns_lookup_at.is_none());
        assert!(record.end_at.is_none());
    }

    #[test]
    fn test_repeated_event_keeps_first_stamp() {
        let table = TimingTable::new();
        let timer = table.start(RequestId::new());
        let first = Instant::now();

        assert!(timer.stamp_at(Milestone::TcpConnection, first));
        timer.on_connection_event(ConnectionEvent::Connected);

        let record = timer.snapshot().unwrap();
        assert_eq!(record.tcp_connection_at, Some(first));
    }

    #[test]
    fn test_closed_is_ignored() {
        let table = TimingTable::new();
        let timer = table.start(RequestId::new());
        let before = timer.snapshot().unwrap();

        timer.on_connection_event(ConnectionEvent::Closed);

        let after = timer.snapshot().unwrap();
        assert_eq!(before.start_at, after.start_at);
        assert!(after.dns_lookup_at.is_none());
        assert!(after.tcp_connection_at.is_none());
        assert!(after.tls_handshake_at.is_none());
    }

    #[test]
    fn test_timer_lookup_shares_record() {
        let table = TimingTable::new();
        let id = RequestId::new();
        let timer = table.start(id);

        let other = table.timer(id).unwrap();
        other.on_connection_event(ConnectionEvent::NameResolved);

        assert!(timer.snapshot().unwrap().dns_lookup_at.is_some());
        assert!(table.timer(RequestId::new()).is_none());
    }

    #[test]
    fn test_take_reads_once() {
        let table = TimingTable::new();
        let timer = table.start(RequestId::new());

        assert!(timer.take().is_some());
        assert!(timer.take().is_none());
        assert!(!timer.stamp(Milestone::End));
        assert!(table.is_empty());
    }

    #[test]
    fn test_dropping_last_handle_discards_record() {
        let table = TimingTable::new();
        let id = RequestId::new();
        let timer = table.start(id);
        let clone = timer.clone();

        drop(timer);
        assert_eq!(table.len(), 1);

        drop(clone);
        assert!(table.is_empty());
        assert!(table.timer(id).is_none());
    }

    #[test]
    fn test_insert_uses_given_record() {
        let table = TimingTable::new();
        let base = Instant::now();
        let mut record = TimingRecord::new();
        record.stamp_at(Milestone::Start, base);
        record.stamp_at(Milestone::DnsLookup, base + Duration::from_millis(3));

        let timer = table.insert(RequestId::new(), record);
        let stored = timer.snapshot().unwrap();
        assert_eq!(stored.start_at, Some(base));
        assert_eq!(stored.dns_lookup_at, Some(base + Duration::from_millis(3)));
    }
}
