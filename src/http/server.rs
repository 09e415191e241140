//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::handler::{check, health};
use crate::error::Result;
use crate::ratelimit::RateLimiter;

/// Build the service router around a limiter.
pub fn router<R: RateLimiter + ?Sized + 'static>(rate_limiter: Arc<R>) -> Router {
    Router::new()
        .route("/check", post(check::<R>))
        .route("/healthz", get(health))
        .with_state(rate_limiter)
}

/// HTTP server for the quota check service.
pub struct HttpServer<R: RateLimiter + ?Sized + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<R>,
}

impl<R: RateLimiter + ?Sized + 'static> HttpServer<R> {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<R>) -> Self {
        Self { addr, rate_limiter }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        info!(
            addr = %self.addr,
            "Starting HTTP server for quota checks with graceful shutdown"
        );

        axum::serve(listener, router(self.rate_limiter))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::CheckResponse;
    use crate::ratelimit::{FixedWindowLimiter, StoreError};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    struct BrokenLimiter;

    #[async_trait]
    impl RateLimiter for BrokenLimiter {
        async fn allow(&self, _key: &str) -> std::result::Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn check_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/check")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn local_router(limit: u64) -> Router {
        let limiter: Arc<dyn RateLimiter> =
            Arc::new(FixedWindowLimiter::new(limit, Duration::from_secs(60)).unwrap());
        router(limiter)
    }

    #[tokio::test]
    async fn test_allowed_then_denied() {
        let app = local_router(1);

        let response = app.clone().oneshot(check_request(r#"{"key":"user1"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let decision: CheckResponse = serde_json::from_slice(&body).unwrap();
        assert!(decision.allowed);

        let response = app.oneshot(check_request(r#"{"key":"user1"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
            serde_json::json!({ "allowed": false })
        );
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let response = local_router(5)
            .oneshot(check_request(r#"{"key":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_key_rejected() {
        let response = local_router(5).oneshot(check_request("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let response = local_router(5)
            .oneshot(check_request("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_limiter_error_is_server_error() {
        let app = router(Arc::new(BrokenLimiter));
        let response = app.oneshot(check_request(r#"{"key":"user1"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_get_on_check_not_allowed() {
        let request = Request::builder()
            .method("GET")
            .uri("/check")
            .body(Body::empty())
            .unwrap();
        let response = local_router(5).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = local_router(5).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_serve_with_shutdown_stops() {
        let limiter = Arc::new(FixedWindowLimiter::new(5, Duration::from_secs(1)).unwrap());
        let server = HttpServer::new("127.0.0.1:0".parse().unwrap(), limiter);
        server.serve_with_shutdown(async {}).await.unwrap();
    }
}
