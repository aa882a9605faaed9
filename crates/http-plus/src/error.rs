//! Capture failures and the diagnostic sink they are reported to.
//!
//! Nothing here is ever returned to the application: a failed capture means
//! the attribute is not set, and the failure is reported to [`Diagnostics`].

use std::str::Utf8Error;
use std::sync::Arc;

/// A body could not be captured as a span attribute.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("request body is not valid UTF-8")]
    RequestBody(#[source] Utf8Error),

    #[error("response body is not valid UTF-8")]
    ResponseBody(#[source] Utf8Error),
}

/// Fire-and-forget sink for instrumentation failures.
pub trait Diagnostics: Send + Sync {
    fn error(&self, message: &str, cause: &CaptureError);
}

/// Shared handle to a diagnostics sink.
pub type SharedDiagnostics = Arc<dyn Diagnostics>;

/// Reports failures through `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn error(&self, message: &str, cause: &CaptureError) {
        let source = std::error::Error::source(cause)
            .map(|s| s.to_string())
            .unwrap_or_default();
        tracing::error!(error = %cause, source = %source, "{message}");
    }
}
