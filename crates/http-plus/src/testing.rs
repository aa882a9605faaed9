//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use opentelemetry::{KeyValue, Value};

use crate::error::{CaptureError, Diagnostics};
use crate::attributes::is_peer_attribute;
use crate::span::{upsert, TraceSpan};

#[derive(Debug, Clone)]
pub struct ChildSpan {
    pub name: &'static str,
    pub start: SystemTime,
    pub end: SystemTime,
    pub attributes: Vec<KeyValue>,
}

/// Span that remembers everything written to it.
#[derive(Default)]
pub struct RecordingSpan {
    pub peer: Mutex<Vec<KeyValue>>,
    pub attributes: Mutex<Vec<KeyValue>>,
    pub children: Mutex<Vec<ChildSpan>>,
}

impl RecordingSpan {
    pub fn with_peer(peer: Vec<KeyValue>) -> Self {
        Self {
            peer: Mutex::new(peer),
            ..Self::default()
        }
    }

    /// Latest value written under `key`.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.attribute(key).map(|v| v.as_str().into_owned())
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.attribute(key) {
            Some(Value::I64(v)) => Some(v),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<ChildSpan> {
        self.children.lock().unwrap().clone()
    }
}

impl TraceSpan for RecordingSpan {
    fn set_attribute(&self, attribute: KeyValue) {
        if is_peer_attribute(attribute.key.as_str()) {
            upsert(&mut self.peer.lock().unwrap(), attribute.clone());
        }
        self.attributes.lock().unwrap().push(attribute);
    }

    fn peer_attributes(&self) -> Vec<KeyValue> {
        self.peer.lock().unwrap().clone()
    }

    fn record_child(
        &self,
        name: &'static str,
        start: SystemTime,
        end: SystemTime,
        attributes: Vec<KeyValue>,
    ) {
        self.children.lock().unwrap().push(ChildSpan {
            name,
            start,
            end,
            attributes,
        });
    }
}

/// Diagnostics sink that counts reports.
#[derive(Default)]
pub struct CountingDiagnostics {
    pub errors: AtomicUsize,
    pub messages: Mutex<Vec<String>>,
}

impl CountingDiagnostics {
    pub fn count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl Diagnostics for CountingDiagnostics {
    fn error(&self, message: &str, cause: &CaptureError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.messages
            .lock()
            .unwrap()
            .push(format!("{message} {cause}"));
    }
}
