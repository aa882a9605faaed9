//! Request and response views handed to hooks.
//!
//! Hooks see the head of the message and register interceptors on it; the
//! body itself is held by the middleware and wrapped once the hooks have run.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::body::{BodyInterceptor, InterceptorChain};
use crate::recorder::ConnectionObserver;

/// Identifier for one outgoing request, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An outgoing request before it is sent.
pub struct ClientRequest {
    id: RequestId,
    pub parts: http::request::Parts,
    body_interceptors: InterceptorChain,
    connection_observers: Vec<Arc<dyn ConnectionObserver>>,
}

impl ClientRequest {
    pub fn new(id: RequestId, parts: http::request::Parts) -> Self {
        Self {
            id,
            parts,
            body_interceptors: InterceptorChain::new(),
            connection_observers: Vec::new(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Observe outgoing body chunks ahead of interceptors already registered.
    pub fn prepend_body_interceptor(&mut self, interceptor: impl BodyInterceptor + 'static) {
        self.body_interceptors.prepend(interceptor);
    }

    pub fn add_body_interceptor(&mut self, interceptor: impl BodyInterceptor + 'static) {
        self.body_interceptors.push(interceptor);
    }

    /// Subscribe to lifecycle events of the connection that carries this
    /// request, once the transport acquires one.
    pub fn on_connection(&mut self, observer: Arc<dyn ConnectionObserver>) {
        self.connection_observers.push(observer);
    }

    pub fn body_interceptor_count(&self) -> usize {
        self.body_interceptors.len()
    }

    pub fn into_parts(
        self,
    ) -> (
        http::request::Parts,
        InterceptorChain,
        Vec<Arc<dyn ConnectionObserver>>,
    ) {
        (self.parts, self.body_interceptors, self.connection_observers)
    }
}

/// A response as soon as its head has arrived, before the body is read.
pub struct ClientResponse {
    id: RequestId,
    pub parts: http::response::Parts,
    body_interceptors: InterceptorChain,
}

impl ClientResponse {
    pub fn new(id: RequestId, parts: http::response::Parts) -> Self {
        Self {
            id,
            parts,
            body_interceptors: InterceptorChain::new(),
        }
    }

    /// Id of the request this response answers.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Observe incoming body chunks ahead of interceptors already registered.
    pub fn prepend_body_interceptor(&mut self, interceptor: impl BodyInterceptor + 'static) {
        self.body_interceptors.prepend(interceptor);
    }

    pub fn add_body_interceptor(&mut self, interceptor: impl BodyInterceptor + 'static) {
        self.body_interceptors.push(interceptor);
    }

    pub fn body_interceptor_count(&self) -> usize {
        self.body_interceptors.len()
    }

    pub fn into_parts(self) -> (http::response::Parts, InterceptorChain) {
        (self.parts, self.body_interceptors)
    }
}
