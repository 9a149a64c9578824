// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Tower middleware running a [`Recycler`] around each request

use http::{Request, Response};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use tower::{Layer, Service};

use super::body::{RecycleBody, RecycleGuard};
use super::{Recycler, RecyclerConfig};
use crate::registry::ConnectionRegistry;

/// Request extension marking a test invocation.
///
/// Requests carrying it never recycle connections; test fixtures manage the
/// pool themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestRequest;

/// Layer applying [`RefreshConnection`] to a service
pub struct RefreshConnectionLayer<R, T = R>
where
    T: ConnectionRegistry,
{
    recycler: Arc<Recycler<R, T>>,
}

impl<R, T> RefreshConnectionLayer<R, T>
where
    R: ConnectionRegistry,
    T: ConnectionRegistry,
{
    pub fn new(config: RecyclerConfig<R, T>) -> Self {
        Self::from_recycler(Arc::new(Recycler::new(config)))
    }

    /// Shares an existing recycler, e.g. to read its stats elsewhere
    pub fn from_recycler(recycler: Arc<Recycler<R, T>>) -> Self {
        Self { recycler }
    }

    pub fn recycler(&self) -> &Arc<Recycler<R, T>> {
        &self.recycler
    }
}

impl<R, T> Clone for RefreshConnectionLayer<R, T>
where
    T: ConnectionRegistry,
{
    fn clone(&self) -> Self {
        Self {
            recycler: self.recycler.clone(),
        }
    }
}

impl<S, R, T> Layer<S> for RefreshConnectionLayer<R, T>
where
    T: ConnectionRegistry,
{
    type Service = RefreshConnection<S, R, T>;

    fn layer(&self, inner: S) -> Self::Service {
        RefreshConnection {
            inner,
            recycler: self.recycler.clone(),
        }
    }
}

/// Middleware recycling pooled connections once each request is finished.
///
/// The recycle runs after the response body has been fully read (or dropped),
/// or before an error from the inner service is returned.
pub struct RefreshConnection<S, R, T = R>
where
    T: ConnectionRegistry,
{
    inner: S,
    recycler: Arc<Recycler<R, T>>,
}

impl<S: Clone, R, T> Clone for RefreshConnection<S, R, T>
where
    T: ConnectionRegistry,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            recycler: self.recycler.clone(),
        }
    }
}

impl<S, R, T, ReqBody, ResBody> Service<Request<ReqBody>> for RefreshConnection<S, R, T>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    R: ConnectionRegistry,
    T: ConnectionRegistry,
{
    type Response = Response<RecycleBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let testing = req.extensions().get::<TestRequest>().is_some();

        self.recycler.restore_schema_cache();

        // Armed before the inner call so a panic there still recycles
        let guard = if testing {
            RecycleGuard::skipping(self.recycler.clone())
        } else {
            RecycleGuard::recycling(self.recycler.clone())
        };

        ResponseFuture {
            inner: self.inner.call(req),
            guard: Some(guard),
        }
    }
}

pin_project! {
    /// Response future for [`RefreshConnection`]
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        guard: Option<RecycleGuard>,
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<RecycleBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));
        let guard = this.guard.take();

        match result {
            Ok(response) => Poll::Ready(Ok(response.map(|body| RecycleBody::new(body, guard)))),
            Err(err) => {
                // Release connections before the caller sees the error
                drop(guard);
                Poll::Ready(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TrackedPool;
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn layer(max_requests: usize) -> (RefreshConnectionLayer<TrackedPool>, Arc<TrackedPool>) {
        let pool = Arc::new(TrackedPool::new("primary"));
        let layer =
            RefreshConnectionLayer::new(RecyclerConfig::new(pool.clone()).max_requests(max_requests));
        (layer, pool)
    }

    #[tokio::test]
    async fn test_error_recycles_before_returning() {
        let (layer, pool) = layer(1);
        let observed = pool.clone();
        let service = layer.clone().layer(tower::service_fn(move |_req: Request<()>| {
            let pool = observed.clone();
            async move {
                drop(pool.checkout());
                Err::<Response<()>, _>("boom")
            }
        }));

        let err = service.oneshot(Request::new(())).await.err().unwrap();

        assert_eq!(err, "boom");
        assert_eq!(layer.recycler().stats().full(), 1);
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test]
    async fn test_dropped_future_still_recycles() {
        let (layer, _) = layer(1);
        let service = layer
            .clone()
            .layer(tower::service_fn(|_req: Request<()>| async {
                std::future::pending::<Result<Response<()>, Infallible>>().await
            }));

        let future = service.oneshot(Request::new(()));
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), future).await;

        assert!(timed_out.is_err());
        assert_eq!(layer.recycler().stats().full(), 1);
    }

    #[tokio::test]
    async fn test_marker_skips_error_recycle() {
        let (layer, _) = layer(1);
        let service = layer.clone().layer(tower::service_fn(|_req: Request<()>| async {
            Err::<Response<()>, _>("boom")
        }));

        let mut req = Request::new(());
        req.extensions_mut().insert(TestRequest);
        let _ = service.oneshot(req).await;

        assert_eq!(layer.recycler().stats().full(), 0);
        assert_eq!(layer.recycler().stats().skipped(), 1);
    }
}
