//! The configured instrumentation: capture switches, composed hooks, span
//! factory and the timing side-table, shared by every request it serves.

use std::sync::Arc;

use crate::config::CaptureConfig;
use crate::error::{SharedDiagnostics, TracingDiagnostics};
use crate::hooks::{ComposedHooks, HttpHooks, NetworkHooks, RequestHook, ResponseHook};
use crate::layer::HttpPlusLayer;
use crate::message::{ClientRequest, ClientResponse};
use crate::recorder::TimingTable;
use crate::span::{OtelSpanFactory, SharedSpan, SpanFactory};

pub struct HttpPlusInstrumentation {
    config: CaptureConfig,
    hooks: ComposedHooks<NetworkHooks>,
    span_factory: Arc<dyn SpanFactory>,
    timings: TimingTable,
}

impl HttpPlusInstrumentation {
    pub fn new(config: CaptureConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> HttpPlusInstrumentationBuilder {
        HttpPlusInstrumentationBuilder::default()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn hooks(&self) -> &dyn HttpHooks {
        &self.hooks
    }

    pub fn span_factory(&self) -> &dyn SpanFactory {
        &*self.span_factory
    }

    /// Timing records of requests currently in flight.
    pub fn timings(&self) -> &TimingTable {
        &self.timings
    }

    /// Tower layer applying this instrumentation to an HTTP client service.
    pub fn layer(self) -> HttpPlusLayer {
        HttpPlusLayer::new(Arc::new(self))
    }
}

/// Builder for the parts of [`HttpPlusInstrumentation`] that cannot come
/// from a config file.
#[derive(Default)]
pub struct HttpPlusInstrumentationBuilder {
    config: CaptureConfig,
    request_hook: Option<RequestHook>,
    response_hook: Option<ResponseHook>,
    diagnostics: Option<SharedDiagnostics>,
    span_factory: Option<Arc<dyn SpanFactory>>,
}

impl HttpPlusInstrumentationBuilder {
    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Hook called for every request, after body capture is installed.
    pub fn request_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SharedSpan, &mut ClientRequest) + Send + Sync + 'static,
    {
        self.request_hook = Some(Arc::new(hook));
        self
    }

    /// Hook called for every response head, after body capture is installed.
    pub fn response_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SharedSpan, &mut ClientResponse) + Send + Sync + 'static,
    {
        self.response_hook = Some(Arc::new(hook));
        self
    }

    /// Where capture failures are reported. Defaults to `tracing::error!`.
    pub fn diagnostics(mut self, diagnostics: SharedDiagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn span_factory(mut self, factory: impl SpanFactory + 'static) -> Self {
        self.span_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> HttpPlusInstrumentation {
        let config = self.config;
        tracing::info!(
            capture_request_body = config.capture_request_body,
            max_request_body_size = config.request_body_limit(),
            request_body_mode = ?config.request_body_mode,
            capture_response_body = config.capture_response_body,
            max_response_body_size = config.response_body_limit(),
            trace_network_operations = config.trace_network_operations,
            "HTTP client instrumentation configured"
        );

        let timings = TimingTable::new();
        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(TracingDiagnostics));
        let core = NetworkHooks::new(config.clone(), timings.clone(), diagnostics);

        HttpPlusInstrumentation {
            config,
            hooks: ComposedHooks::new(core, self.request_hook, self.response_hook),
            span_factory: self
                .span_factory
                .unwrap_or_else(|| Arc::new(OtelSpanFactory)),
            timings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::message::RequestId;
    use crate::testing::RecordingSpan;

    struct Fixed(Arc<RecordingSpan>);

    impl SpanFactory for Fixed {
        fn start_span(&self, _request: &http::request::Parts) -> SharedSpan {
            self.0.clone()
        }
    }

    #[test]
    fn test_builder_defaults() {
        let instrumentation = HttpPlusInstrumentation::new(CaptureConfig::default());
        assert!(!instrumentation.config().capture_request_body);
        assert!(instrumentation.timings().is_empty());
    }

    #[test]
    fn test_builder_wires_hooks_and_factory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let span = Arc::new(RecordingSpan::default());
        let instrumentation = HttpPlusInstrumentation::builder()
            .config(CaptureConfig {
                capture_request_body: true,
                ..CaptureConfig::default()
            })
            .request_hook(move |_, request| {
                assert_eq!(request.body_interceptor_count(), 1);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .span_factory(Fixed(span.clone()))
            .build();

        let (parts, _) = http::Request::put("http://localhost/items/1")
            .body(())
            .unwrap()
            .into_parts();
        let shared = instrumentation.span_factory().start_span(&parts);
        assert!(Arc::ptr_eq(&shared, &(span as SharedSpan)));

        let mut request = ClientRequest::new(RequestId::new(), parts);
        instrumentation.hooks().on_request(&shared, &mut request);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(instrumentation.timings().len(), 1);
    }
}
