//! Request and response body interceptors.
//!
//! Both only read chunk handles; what the application sends and receives is
//! never touched. Decode failures go to the diagnostics sink and leave the
//! attribute unset.

use bytes::Bytes;
use opentelemetry::KeyValue;

use crate::attributes::{HTTP_REQUEST_BODY, HTTP_RESPONSE_BODY};
use crate::body::BodyInterceptor;
use crate::buffer::BoundedBuffer;
use crate::config::RequestBodyMode;
use crate::emitter::NetworkTimingEmitter;
use crate::error::{CaptureError, SharedDiagnostics};
use crate::recorder::RequestTimer;
use crate::span::SharedSpan;
use crate::timing::Milestone;

/// Captures the outgoing payload into `http.request.body`.
pub struct RequestBodyCapture {
    span: SharedSpan,
    max_size: usize,
    diagnostics: SharedDiagnostics,
    /// Present in accumulate mode.
    buffer: Option<BoundedBuffer>,
}

impl RequestBodyCapture {
    pub fn new(
        span: SharedSpan,
        max_size: usize,
        mode: RequestBodyMode,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        let buffer = match mode {
            RequestBodyMode::LastWrite => None,
            RequestBodyMode::Accumulate => Some(BoundedBuffer::new(max_size)),
        };
        Self {
            span,
            max_size,
            diagnostics,
            buffer,
        }
    }

    fn attach(&self, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self
                .span
                .set_attribute(KeyValue::new(HTTP_REQUEST_BODY, text.to_string())),
            Err(e) => self.diagnostics.error(
                "Error occurred while capturing request body",
                &CaptureError::RequestBody(e),
            ),
        }
    }
}

impl BodyInterceptor for RequestBodyCapture {
    fn on_chunk(&mut self, chunk: &Bytes) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.push(chunk);
            return;
        }
        if !chunk.is_empty() && chunk.len() <= self.max_size {
            self.attach(chunk);
        }
    }

    fn on_end(&mut self) {
        let body = self.buffer.as_mut().and_then(BoundedBuffer::take);
        if let Some(body) = body {
            self.attach(&body);
        }
    }
}

/// Observes the incoming payload: stamps end of stream, emits network
/// timings, and captures `http.response.body`.
pub struct ResponseBodyCapture {
    span: SharedSpan,
    /// Present when response capture is enabled.
    buffer: Option<BoundedBuffer>,
    timer: Option<RequestTimer>,
    emitter: NetworkTimingEmitter,
    diagnostics: SharedDiagnostics,
}

impl ResponseBodyCapture {
    pub fn new(
        span: SharedSpan,
        buffer: Option<BoundedBuffer>,
        timer: Option<RequestTimer>,
        emitter: NetworkTimingEmitter,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        Self {
            span,
            buffer,
            timer,
            emitter,
            diagnostics,
        }
    }

    fn finish_timings(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        timer.stamp(Milestone::End);
        if let Some(record) = timer.take() {
            self.emitter.emit(&*self.span, &record);
        }
    }

    fn attach_body(&mut self) {
        let Some(body) = self.buffer.as_mut().and_then(BoundedBuffer::take) else {
            return;
        };
        match std::str::from_utf8(&body) {
            Ok(text) => self
                .span
                .set_attribute(KeyValue::new(HTTP_RESPONSE_BODY, text.to_string())),
            Err(e) => self.diagnostics.error(
                "Error occurred while capturing response body",
                &CaptureError::ResponseBody(e),
            ),
        }
    }
}

impl BodyInterceptor for ResponseBodyCapture {
    fn on_chunk(&mut self, chunk: &Bytes) {
        if let Some(buffer) = self.buffer.as_mut() {
            let was_overflowed = buffer.is_overflowed();
            buffer.push(chunk);
            if !was_overflowed && buffer.is_overflowed() {
                tracing::debug!(total = buffer.total(), "Response body exceeds capture limit");
            }
        }
    }

    fn on_end(&mut self) {
        self.finish_timings();
        self.attach_body();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::attributes::{NET_CONTENT_TRANSFER_DURATION, NET_DNS_LOOKUP_DURATION};
    use crate::message::RequestId;
    use crate::recorder::TimingTable;
    use crate::testing::{CountingDiagnostics, RecordingSpan};

    fn request_capture(
        max: usize,
        mode: RequestBodyMode,
    ) -> (RequestBodyCapture, Arc<RecordingSpan>, Arc<CountingDiagnostics>) {
        let span = Arc::new(RecordingSpan::default());
        let diagnostics = Arc::new(CountingDiagnostics::default());
        let capture = RequestBodyCapture::new(span.clone(), max, mode, diagnostics.clone());
        (capture, span, diagnostics)
    }

    fn response_capture(
        max: Option<usize>,
        timer: Option<RequestTimer>,
    ) -> (ResponseBodyCapture, Arc<RecordingSpan>, Arc<CountingDiagnostics>) {
        let span = Arc::new(RecordingSpan::default());
        let diagnostics = Arc::new(CountingDiagnostics::default());
        let capture = ResponseBodyCapture::new(
            span.clone(),
            max.map(BoundedBuffer::new),
            timer,
            NetworkTimingEmitter::new(false),
            diagnostics.clone(),
        );
        (capture, span, diagnostics)
    }

    #[test]
    fn test_last_write_overwrites() {
        let (mut capture, span, _) = request_capture(64, RequestBodyMode::LastWrite);
        capture.on_chunk(&Bytes::from_static(b"{\"first\":1}"));
        capture.on_chunk(&Bytes::from_static(b"{\"second\":2}"));
        capture.on_end();

        assert_eq!(
            span.string(HTTP_REQUEST_BODY).as_deref(),
            Some("{\"second\":2}")
        );
    }

    #[test]
    fn test_last_write_skips_oversized_and_empty_chunks() {
        let (mut capture, span, _) = request_capture(4, RequestBodyMode::LastWrite);
        capture.on_chunk(&Bytes::from_static(b"abcd"));
        capture.on_chunk(&Bytes::from_static(b"too long"));
        capture.on_chunk(&Bytes::new());

        assert_eq!(span.string(HTTP_REQUEST_BODY).as_deref(), Some("abcd"));
    }

    #[test]
    fn test_accumulate_attaches_whole_payload_at_end() {
        let (mut capture, span, _) = request_capture(64, RequestBodyMode::Accumulate);
        capture.on_chunk(&Bytes::from_static(b"{\"name\":"));
        capture.on_chunk(&Bytes::from_static(b"\"John\"}"));
        assert_eq!(span.string(HTTP_REQUEST_BODY), None);

        capture.on_end();
        assert_eq!(
            span.string(HTTP_REQUEST_BODY).as_deref(),
            Some("{\"name\":\"John\"}")
        );
    }

    #[test]
    fn test_accumulate_over_limit_attaches_nothing() {
        let (mut capture, span, _) = request_capture(8, RequestBodyMode::Accumulate);
        capture.on_chunk(&Bytes::from_static(b"12345"));
        capture.on_chunk(&Bytes::from_static(b"6789"));
        capture.on_end();

        assert_eq!(span.string(HTTP_REQUEST_BODY), None);
    }

    #[test]
    fn test_invalid_request_utf8_is_reported() {
        let (mut capture, span, diagnostics) = request_capture(64, RequestBodyMode::LastWrite);
        capture.on_chunk(&Bytes::from(vec![0xf0, 0x28, 0x8c, 0x28]));

        assert_eq!(span.string(HTTP_REQUEST_BODY), None);
        assert_eq!(diagnostics.count(), 1);
        assert!(diagnostics.messages.lock().unwrap()[0]
            .starts_with("Error occurred while capturing request body"));
    }

    #[test]
    fn test_response_body_at_exact_limit() {
        let (mut capture, span, _) = response_capture(Some(10), None);
        capture.on_chunk(&Bytes::from_static(b"hello"));
        capture.on_chunk(&Bytes::from_static(b"world"));
        capture.on_end();

        assert_eq!(
            span.string(HTTP_RESPONSE_BODY).as_deref(),
            Some("helloworld")
        );
    }

    #[test]
    fn test_response_body_one_over_limit() {
        let (mut capture, span, _) = response_capture(Some(10), None);
        capture.on_chunk(&Bytes::from_static(b"hello"));
        capture.on_chunk(&Bytes::from_static(b"world!"));
        capture.on_end();

        assert_eq!(span.string(HTTP_RESPONSE_BODY), None);
    }

    #[test]
    fn test_response_capture_disabled() {
        let (mut capture, span, _) = response_capture(None, None);
        capture.on_chunk(&Bytes::from_static(b"ignored"));
        capture.on_end();

        assert!(span.attributes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_response_utf8_reported_once() {
        let (mut capture, span, diagnostics) = response_capture(Some(64), None);
        capture.on_chunk(&Bytes::from(vec![b'o', b'k', 0xff]));
        capture.on_chunk(&Bytes::from(vec![0xfe]));
        capture.on_end();

        assert_eq!(span.string(HTTP_RESPONSE_BODY), None);
        assert_eq!(diagnostics.count(), 1);
    }

    #[test]
    fn test_end_emits_timings_and_discards_record() {
        let table = TimingTable::new();
        let id = RequestId::new();
        let timer = table.start(id);
        timer.stamp(Milestone::DnsLookup);
        timer.stamp(Milestone::FirstByte);

        let (mut capture, span, _) = response_capture(Some(64), Some(timer));
        capture.on_chunk(&Bytes::from_static(b"done"));
        capture.on_end();

        assert!(span.int(NET_DNS_LOOKUP_DURATION).is_some());
        assert!(span.int(NET_CONTENT_TRANSFER_DURATION).is_some());
        assert_eq!(span.string(HTTP_RESPONSE_BODY).as_deref(), Some("done"));
        assert!(table.timer(id).is_none());
    }
}
