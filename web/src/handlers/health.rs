//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies (database, etc.).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Readiness {
    /// `ready` or `unavailable`.
    pub status: &'static str,
    /// Whether the inventory database answered.
    pub database: bool,
}

/// Readiness check: opens and closes a read-only transaction.
///
/// # Status Codes
///
/// - 200 OK: the database is reachable
/// - 503 Service Unavailable: it is not
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    match state.service().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                database: true,
            }),
        ),
        Err(error) => {
            tracing::warn!(error = %error, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "unavailable",
                    database: false,
                }),
            )
        }
    }
}
