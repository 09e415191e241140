//! Quota check request handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::ratelimit::RateLimiter;

/// Body of a `POST /check` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// The caller whose quota is being spent
    #[serde(default)]
    pub key: String,
}

/// Body of a successful `POST /check` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// Spend one unit of quota for the request's key.
///
/// Responds `400` for a malformed body or empty key, `500` when the limiter
/// could not reach its store, and `200` with the decision otherwise. A denied
/// request is still a `200`.
#[instrument(skip_all)]
pub async fn check<R: RateLimiter + ?Sized>(
    State(limiter): State<Arc<R>>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Received malformed check request");
            return (StatusCode::BAD_REQUEST, "invalid json").into_response();
        }
    };

    if request.key.is_empty() {
        warn!("Received check request with empty key");
        return (StatusCode::BAD_REQUEST, "key is required").into_response();
    }

    match limiter.allow(&request.key).await {
        Ok(allowed) => {
            debug!(key = %request.key, allowed = allowed, "Quota decision made");
            Json(CheckResponse { allowed }).into_response()
        }
        Err(err) => {
            error!(key = %request.key, error = %err, "Quota check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
