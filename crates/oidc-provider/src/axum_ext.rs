//! Axum/tower integration: wraps [`crate::dispatcher::dispatch`] as a
//! `tower::Layer`/`Service` pair so applications can mount this crate into
//! their own router with `.layer(OidcAuthServerLayer::new(options))`,
//! alongside whatever else their router already serves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use tower::{Layer, Service};

use crate::options::Options;

/// Layer that intercepts requests matching this server's well-known paths
/// and answers them directly; everything else passes through to the
/// wrapped service unchanged.
#[derive(Clone)]
pub struct OidcAuthServerLayer {
    options: Options,
}

impl OidcAuthServerLayer {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

impl<S> Layer<S> for OidcAuthServerLayer {
    type Service = OidcAuthServerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OidcAuthServerService {
            inner,
            options: self.options.clone(),
        }
    }
}

#[derive(Clone)]
pub struct OidcAuthServerService<S> {
    inner: S,
    options: Options,
}

impl<S> Service<Request<Body>> for OidcAuthServerService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let options = self.options.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        // Matching is done on path/method alone, before the request (and
        // its body) is handed to either dispatch() or the inner service —
        // dispatch() consumes the request, so this check must come first.
        let is_ours = crate::dispatcher::is_known_route(&options, request.uri().path(), request.method());

        Box::pin(async move {
            if is_ours {
                Ok(crate::dispatcher::dispatch(&options, request).await)
            } else {
                ready_inner.call(request).await
            }
        })
    }
}

/// Shared, cheaply-cloned handle to [`Options`] for applications that want
/// to store it in their own `axum::Router` state rather than as a layer.
pub type SharedOptions = Arc<Options>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct Passthrough;

    impl Service<Request<Body>> for Passthrough {
        type Response = Response;
        type Error = std::convert::Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Body>) -> Self::Future {
            Box::pin(async { Ok(StatusCode::NOT_FOUND.into_response()) })
        }
    }

    #[tokio::test]
    async fn discovery_path_is_answered_by_the_layer() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let mut service = OidcAuthServerLayer::new(options).layer(Passthrough);
        let request = Request::builder()
            .uri(crate::dispatcher::paths::DISCOVERY)
            .body(Body::empty())
            .unwrap();
        let response = service.ready().await.unwrap().call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
