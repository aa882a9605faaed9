//! All-or-nothing bounded body buffer.

use bytes::{Bytes, BytesMut};

/// Collects body chunks up to `max` bytes in total.
///
/// Once the running total exceeds `max` the buffer is invalidated for good
/// and everything collected so far is dropped. A partial body is never
/// produced.
#[derive(Debug)]
pub struct BoundedBuffer {
    chunks: Vec<Bytes>,
    total: usize,
    max: usize,
    overflowed: bool,
}

impl BoundedBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            chunks: Vec::new(),
            total: 0,
            max,
            overflowed: false,
        }
    }

    /// Append a chunk. Returns false once the buffer has been invalidated.
    pub fn push(&mut self, chunk: &Bytes) -> bool {
        if self.overflowed {
            return false;
        }
        if chunk.is_empty() {
            return true;
        }
        self.total = self.total.saturating_add(chunk.len());
        if self.total <= self.max {
            self.chunks.push(chunk.clone());
            true
        } else {
            self.chunks = Vec::new();
            self.overflowed = true;
            false
        }
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Running total of bytes offered, including any past the limit.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Concatenate the collected chunks, leaving the buffer empty.
    ///
    /// Returns `None` if the buffer overflowed or nothing was collected.
    pub fn take(&mut self) -> Option<Bytes> {
        if self.overflowed || self.chunks.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut self.chunks);
        if chunks.len() == 1 {
            return chunks.into_iter().next();
        }
        let mut joined = BytesMut::with_capacity(self.total);
        for chunk in &chunks {
            joined.extend_from_slice(chunk);
        }
        Some(joined.freeze())
    }
}
