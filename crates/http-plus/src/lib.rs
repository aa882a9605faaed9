//! http-plus: body capture and network timing for traced HTTP client
//! requests.
//!
//! [`HttpPlusInstrumentation`] records the outgoing and incoming payloads as
//! span attributes and breaks each request down into DNS, TCP, TLS,
//! time-to-first-byte and content-transfer durations. Apply it to a client
//! with [`HttpPlusLayer`]; connection milestones are picked up by wrapping
//! the client's resolver and connector in [`TimingResolver`] and
//! [`TimingConnector`].

pub mod attributes;
pub mod body;
pub mod buffer;
pub mod capture;
pub mod config;
pub mod emitter;
pub mod error;
pub mod hooks;
pub mod instrumentation;
pub mod layer;
pub mod message;
pub mod recorder;
pub mod span;
pub mod timing;
pub mod transport;

#[cfg(test)]
mod testing;

pub use body::{BodyInterceptor, InterceptedBody};
pub use config::{CaptureConfig, RequestBodyMode, Settings};
pub use error::{CaptureError, Diagnostics, TracingDiagnostics};
pub use hooks::{HttpHooks, RequestHook, ResponseHook};
pub use instrumentation::{HttpPlusInstrumentation, HttpPlusInstrumentationBuilder};
pub use layer::{HttpPlusLayer, HttpPlusService};
pub use message::{ClientRequest, ClientResponse, RequestId};
pub use span::{OtelSpan, OtelSpanFactory, SharedSpan, SpanFactory, TraceSpan};
pub use timing::{Milestone, TimingRecord};
pub use transport::{ConnectionObservers, TimingConnector, TimingResolver};
