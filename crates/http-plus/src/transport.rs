//! Transport wrappers that report connection milestones.
//!
//! The middleware runs each request inside a task-local scope holding the
//! request's [`ConnectionObservers`]. [`TimingResolver`] and
//! [`TimingConnector`] wrap the resolver and connector of a hyper-util
//! client, pick the observers up when they are called, and notify them as
//! each step of acquiring a connection completes. A pooled connection never
//! reaches the connector, so nothing is reported for it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use crate::recorder::{ConnectionEvent, ConnectionObserver};

tokio::task_local! {
    static CONNECTION_OBSERVERS: ConnectionObservers;
}

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// The observers subscribed to the connection of the request in flight.
#[derive(Clone, Default)]
pub struct ConnectionObservers {
    observers: Arc<Vec<Arc<dyn ConnectionObserver>>>,
}

impl ConnectionObservers {
    pub fn new(observers: Vec<Arc<dyn ConnectionObserver>>) -> Self {
        Self {
            observers: Arc::new(observers),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify(&self, event: ConnectionEvent) {
        for observer in self.observers.iter() {
            observer.on_connection_event(event);
        }
    }

    /// Observers of the enclosing [`scope`](Self::scope), if any.
    pub fn current() -> Option<Self> {
        CONNECTION_OBSERVERS.try_with(Clone::clone).ok()
    }

    /// Run `fut` with these observers visible to the transport wrappers.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CONNECTION_OBSERVERS.scope(self, fut).await
    }

    /// Run `f` synchronously with these observers visible.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CONNECTION_OBSERVERS.sync_scope(self, f)
    }
}

/// DNS resolver wrapper raising [`ConnectionEvent::NameResolved`].
#[derive(Debug, Clone)]
pub struct TimingResolver<R> {
    inner: R,
}

impl<R> TimingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R, Req> Service<Req> for TimingResolver<R>
where
    R: Service<Req>,
    R::Future: Send + 'static,
    R::Response: Send + 'static,
    R::Error: Send + 'static,
{
    type Response = R::Response;
    type Error = R::Error;
    type Future = BoxFuture<R::Response, R::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, name: Req) -> Self::Future {
        let observers = ConnectionObservers::current();
        let lookup = self.inner.call(name);
        Box::pin(async move {
            let addrs = lookup.await?;
            if let Some(observers) = observers {
                observers.notify(ConnectionEvent::NameResolved);
            }
            Ok(addrs)
        })
    }
}

/// Which milestone a [`TimingConnector`] reports on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectStage {
    Tcp,
    Tls,
}

/// Connector wrapper raising [`ConnectionEvent::Connected`] or
/// [`ConnectionEvent::SecureConnected`] once the inner connector yields a
/// stream, and [`ConnectionEvent::Closed`] when it fails.
#[derive(Debug, Clone)]
pub struct TimingConnector<C> {
    inner: C,
    stage: ConnectStage,
}

impl<C> TimingConnector<C> {
    /// Wrap a plain TCP connector.
    pub fn tcp(inner: C) -> Self {
        Self {
            inner,
            stage: ConnectStage::Tcp,
        }
    }

    /// Wrap a connector that completes the TLS handshake. Only `https`
    /// destinations report a secure connection.
    pub fn tls(inner: C) -> Self {
        Self {
            inner,
            stage: ConnectStage::Tls,
        }
    }

    fn success_event(&self, dst: &http::Uri) -> Option<ConnectionEvent> {
        match self.stage {
            ConnectStage::Tcp => Some(ConnectionEvent::Connected),
            ConnectStage::Tls if dst.scheme_str() == Some("https") => {
                Some(ConnectionEvent::SecureConnected)
            }
            ConnectStage::Tls => None,
        }
    }
}

impl<C> Service<http::Uri> for TimingConnector<C>
where
    C: Service<http::Uri>,
    C::Future: Send + 'static,
    C::Response: Send + 'static,
    C::Error: Send + 'static,
{
    type Response = C::Response;
    type Error = C::Error;
    type Future = BoxFuture<C::Response, C::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: http::Uri) -> Self::Future {
        let Some(observers) = ConnectionObservers::current() else {
            return Box::pin(self.inner.call(dst));
        };
        let event = self.success_event(&dst);
        let connecting = self.inner.call(dst);

        // The client may finish connecting on a background task, outside the
        // request's scope; carry the observers along for the resolver.
        Box::pin(observers.clone().scope(async move {
            match connecting.await {
                Ok(stream) => {
                    if let Some(event) = event {
                        observers.notify(event);
                    }
                    Ok(stream)
                }
                Err(e) => {
                    observers.notify(ConnectionEvent::Closed);
                    Err(e)
                }
            }
        }))
    }
}
