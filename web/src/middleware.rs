//! Axum middleware for request tracking.
//!
//! The correlation-id layer:
//!
//! 1. **Extracts** the correlation ID from `X-Correlation-ID` (or generates a new UUID)
//! 2. **Creates** an `http_request` tracing span carrying it, so handler logs
//!    are tagged without handlers reading the id themselves
//! 3. **Injects** it into the response `X-Correlation-ID` header
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/admin/bookings", get(list_bookings))
//!     .layer(correlation_id_layer());
//! ```

use axum::{extract::Request, http::HeaderValue, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Create a layer that adds correlation ID tracking to all requests.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/bookings", get(|| async { "ok" }))
            .layer(correlation_id_layer())
    }

    async fn echoed(header: Option<&str>) -> String {
        let mut request = Request::builder().uri("/bookings");
        if let Some(value) = header {
            request = request.header(CORRELATION_ID_HEADER, value);
        }
        let response = app().oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("correlation id header on every response")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn caller_id_is_echoed() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(echoed(Some(&id)).await, id);
    }

    #[tokio::test]
    async fn missing_or_malformed_id_is_replaced() {
        for header in [None, Some("not-a-uuid")] {
            let id = echoed(header).await;
            assert!(Uuid::parse_str(&id).is_ok(), "{id}");
        }
    }
}
