//! Configuration types and loading logic.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use http_plus_tracing::TracingConfig;
use serde::Deserialize;

/// Default capture limit for request and response bodies (4 KiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024;

/// How request body chunks are turned into the `http.request.body` attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestBodyMode {
    /// Each qualifying chunk overwrites the attribute; the span ends up with
    /// the most recent one.
    #[default]
    LastWrite,
    /// Chunks are buffered like the response body (all-or-nothing) and the
    /// whole payload is attached once the body ends.
    Accumulate,
}

/// Capture and timing switches. Immutable once an instrumentation is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub capture_request_body: bool,

    /// Largest request chunk (or accumulated body) captured, in bytes.
    /// Zero means the default.
    pub max_request_body_size: usize,

    pub request_body_mode: RequestBodyMode,

    pub capture_response_body: bool,

    /// Largest response body captured, in bytes. Zero means the default.
    pub max_response_body_size: usize,

    /// Emit a child span per network phase in addition to the duration
    /// attributes.
    pub trace_network_operations: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_request_body: false,
            max_request_body_size: DEFAULT_MAX_BODY_SIZE,
            request_body_mode: RequestBodyMode::default(),
            capture_response_body: false,
            max_response_body_size: DEFAULT_MAX_BODY_SIZE,
            trace_network_operations: false,
        }
    }
}

impl CaptureConfig {
    pub fn request_body_limit(&self) -> usize {
        non_zero_or_default(self.max_request_body_size)
    }

    pub fn response_body_limit(&self) -> usize {
        non_zero_or_default(self.max_response_body_size)
    }
}

fn non_zero_or_default(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_MAX_BODY_SIZE
    } else {
        limit
    }
}

/// Top-level settings: instrumentation switches plus tracing bootstrap.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub instrumentation: CaptureConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Settings {
    /// Load settings from a TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (HTTP_PLUS_ prefix, __ for nesting)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("HTTP_PLUS_").split("__"))
            .extract()?;

        Ok(settings)
    }
}
