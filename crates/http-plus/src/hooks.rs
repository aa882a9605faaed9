//! Request/response hooks.
//!
//! [`HttpHooks`] is the injection point the middleware calls for every
//! client request and response. [`NetworkHooks`] is the core implementation;
//! [`ComposedHooks`] runs it and then hands the same span and message to the
//! user's own hooks.

use std::sync::Arc;

use hyper_util::client::legacy::connect::HttpInfo;
use opentelemetry::KeyValue;

use crate::attributes::NET_PEER_IP;
use crate::buffer::BoundedBuffer;
use crate::capture::{RequestBodyCapture, ResponseBodyCapture};
use crate::config::CaptureConfig;
use crate::emitter::NetworkTimingEmitter;
use crate::error::SharedDiagnostics;
use crate::message::{ClientRequest, ClientResponse};
use crate::recorder::TimingTable;
use crate::span::SharedSpan;
use crate::timing::Milestone;

/// User-supplied request hook.
pub type RequestHook = Arc<dyn Fn(&SharedSpan, &mut ClientRequest) + Send + Sync>;

/// User-supplied response hook.
pub type ResponseHook = Arc<dyn Fn(&SharedSpan, &mut ClientResponse) + Send + Sync>;

/// Lifecycle hooks invoked by the middleware.
pub trait HttpHooks: Send + Sync {
    /// Called before the request is sent.
    fn on_request(&self, span: &SharedSpan, request: &mut ClientRequest);

    /// Called once the response head has arrived, before its body is read.
    fn on_response(&self, span: &SharedSpan, response: &mut ClientResponse);
}

/// Installs body capture and network timing on every client exchange.
pub struct NetworkHooks {
    config: CaptureConfig,
    timings: TimingTable,
    diagnostics: SharedDiagnostics,
}

impl NetworkHooks {
    pub fn new(config: CaptureConfig, timings: TimingTable, diagnostics: SharedDiagnostics) -> Self {
        Self {
            config,
            timings,
            diagnostics,
        }
    }
}

impl HttpHooks for NetworkHooks {
    fn on_request(&self, span: &SharedSpan, request: &mut ClientRequest) {
        let timer = self.timings.start(request.id());
        request.on_connection(Arc::new(timer));

        if self.config.capture_request_body {
            request.prepend_body_interceptor(RequestBodyCapture::new(
                span.clone(),
                self.config.request_body_limit(),
                self.config.request_body_mode,
                self.diagnostics.clone(),
            ));
        }
    }

    fn on_response(&self, span: &SharedSpan, response: &mut ClientResponse) {
        let buffer = self
            .config
            .capture_response_body
            .then(|| BoundedBuffer::new(self.config.response_body_limit()));
        let timer = self.timings.timer(response.id());
        // The head has arrived; how long the application takes to read the
        // body is not part of the time to first byte.
        if let Some(timer) = &timer {
            timer.stamp(Milestone::FirstByte);
        }

        if let Some(info) = response.parts.extensions.get::<HttpInfo>() {
            span.set_attribute(KeyValue::new(
                NET_PEER_IP,
                info.remote_addr().ip().to_string(),
            ));
        }

        response.prepend_body_interceptor(ResponseBodyCapture::new(
            span.clone(),
            buffer,
            timer,
            NetworkTimingEmitter::new(self.config.trace_network_operations),
            self.diagnostics.clone(),
        ));
    }
}

/// Runs `core` first, then the user hooks, with identical arguments.
pub struct ComposedHooks<C> {
    core: C,
    request_hook: Option<RequestHook>,
    response_hook: Option<ResponseHook>,
}

impl<C: HttpHooks> ComposedHooks<C> {
    pub fn new(
        core: C,
        request_hook: Option<RequestHook>,
        response_hook: Option<ResponseHook>,
    ) -> Self {
        Self {
            core,
            request_hook,
            response_hook,
        }
    }
}

impl<C: HttpHooks> HttpHooks for ComposedHooks<C> {
    fn on_request(&self, span: &SharedSpan, request: &mut ClientRequest) {
        self.core.on_request(span, request);
        if let Some(hook) = &self.request_hook {
            hook(span, request);
        }
    }

    fn on_response(&self, span: &SharedSpan, response: &mut ClientResponse) {
        self.core.on_response(span, response);
        if let Some(hook) = &self.response_hook {
            hook(span, response);
        }
    }
}
