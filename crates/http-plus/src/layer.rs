//! Tower middleware applying [`HttpPlusInstrumentation`] to an HTTP client.
//!
//! Wrap a hyper-util client (or any `Service<Request<_>>` returning
//! `Response<_>`) in [`HttpPlusLayer`]. Each call gets its own span and
//! [`RequestId`]; the request and response bodies come back wrapped in
//! [`InterceptedBody`] with the hooks' interceptors attached.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{Request, Response};
use tower::{Layer, Service};
use tracing::Instrument;

use crate::body::InterceptedBody;
use crate::instrumentation::HttpPlusInstrumentation;
use crate::message::{ClientRequest, ClientResponse, RequestId};
use crate::transport::ConnectionObservers;

#[derive(Clone)]
pub struct HttpPlusLayer {
    instrumentation: Arc<HttpPlusInstrumentation>,
}

impl HttpPlusLayer {
    pub fn new(instrumentation: Arc<HttpPlusInstrumentation>) -> Self {
        Self { instrumentation }
    }
}

impl<S> Layer<S> for HttpPlusLayer {
    type Service = HttpPlusService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpPlusService {
            inner,
            instrumentation: self.instrumentation.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HttpPlusService<S> {
    inner: S,
    instrumentation: Arc<HttpPlusInstrumentation>,
}

impl<S> HttpPlusService<S> {
    pub fn instrumentation(&self) -> &HttpPlusInstrumentation {
        &self.instrumentation
    }
}

impl<S, B, RB> Service<Request<B>> for HttpPlusService<S>
where
    S: Service<Request<InterceptedBody<B>>, Response = Response<RB>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    RB: Send + 'static,
{
    type Response = Response<InterceptedBody<RB>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let instrumentation = self.instrumentation.clone();
        let (parts, body) = req.into_parts();

        let span = instrumentation.span_factory().start_span(&parts);
        let mut request = ClientRequest::new(RequestId::new(), parts);
        let id = request.id();
        instrumentation.hooks().on_request(&span, &mut request);

        let (parts, chain, observers) = request.into_parts();
        let observers = ConnectionObservers::new(observers);
        let req = Request::from_parts(parts, InterceptedBody::new(body, chain));
        let responding = observers.clone().sync_scope(|| self.inner.call(req));

        let tracing_span = span.tracing_span().cloned();
        let fut = async move {
            // `observers` keeps this request's timer registered until the
            // response hooks have picked it up.
            let response = observers.clone().scope(responding).await?;

            let (parts, body) = response.into_parts();
            let mut response = ClientResponse::new(id, parts);
            instrumentation.hooks().on_response(&span, &mut response);
            drop(observers);

            let (parts, chain) = response.into_parts();
            tracing::debug!(request_id = %id, status = %parts.status, "Response head received");
            Ok(Response::from_parts(parts, InterceptedBody::new(body, chain)))
        };

        match tracing_span {
            Some(tracing_span) => Box::pin(fut.instrument(tracing_span)),
            None => Box::pin(fut),
        }
    }
}
