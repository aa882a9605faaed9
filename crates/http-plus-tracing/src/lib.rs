//! Tracing bootstrap for services instrumented with http-plus.
//!
//! Installs the `tracing` subscriber stack (fmt logging plus optional OTLP
//! export) and provides the span builder used for outgoing HTTP requests.

pub mod config;
pub mod otlp;
pub mod spans;

pub use config::{OtlpProtocol, TracingConfig};
pub use otlp::{init_tracing, TracingGuard};
