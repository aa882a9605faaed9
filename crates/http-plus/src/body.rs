//! Body interceptor chain.
//!
//! `InterceptedBody` passes every frame of the wrapped body through
//! unchanged while letting interceptors observe the data. Interceptors see
//! copies of the chunk handles (`Bytes` clones), never the frames themselves,
//! so they cannot alter what the consumer receives.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// Observer of the data flowing through a request or response body.
pub trait BodyInterceptor: Send {
    /// Called once, before the first data chunk is observed.
    fn on_first_byte(&mut self) {}

    /// Called for every data frame, in stream order.
    fn on_chunk(&mut self, chunk: &Bytes);

    /// Called once when the body has been fully produced.
    fn on_end(&mut self) {}
}

/// Ordered list of interceptors; earlier entries run first.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn BodyInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert ahead of every interceptor already registered.
    pub fn prepend(&mut self, interceptor: impl BodyInterceptor + 'static) {
        self.interceptors.insert(0, Box::new(interceptor));
    }

    pub fn push(&mut self, interceptor: impl BodyInterceptor + 'static) {
        self.interceptors.push(Box::new(interceptor));
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

/// A body wrapper that drives an [`InterceptorChain`] as frames are polled.
pub struct InterceptedBody<B> {
    inner: Pin<Box<B>>,
    chain: InterceptorChain,
    first_byte_seen: bool,
    ended: bool,
}

impl<B> InterceptedBody<B> {
    pub fn new(inner: B, chain: InterceptorChain) -> Self {
        Self {
            inner: Box::pin(inner),
            chain,
            first_byte_seen: false,
            ended: false,
        }
    }

    /// Wrap without any interceptors.
    pub fn passthrough(inner: B) -> Self {
        Self::new(inner, InterceptorChain::new())
    }

    fn observe(&mut self, chunk: &Bytes) {
        if !self.first_byte_seen {
            self.first_byte_seen = true;
            for interceptor in self.chain.interceptors.iter_mut() {
                interceptor.on_first_byte();
            }
        }
        for interceptor in self.chain.interceptors.iter_mut() {
            interceptor.on_chunk(chunk);
        }
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        for interceptor in self.chain.interceptors.iter_mut() {
            interceptor.on_end();
        }
    }
}

impl<B> Body for InterceptedBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(chunk) = frame.data_ref() {
                    this.observe(chunk);
                }
                // Consumers may stop polling once the inner body reports its
                // end, so the chain is finished here rather than on `None`.
                if this.inner.is_end_stream() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
