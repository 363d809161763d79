//! HTTP interface of the Stockroom inventory.
//!
//! A single action endpoint fronts [`InventoryService`]:
//!
//! ```text
//! GET  /api/inventory?action=list           reads, query parameters
//! POST /api/inventory  (multipart/form-data) every action
//! GET  /health                               liveness
//! GET  /ready                                database reachability
//! ```
//!
//! # Request Flow
//!
//! 1. **Correlate**: the request gets a correlation id and a tracing span
//! 2. **Authenticate**: [`Caller`] resolves the gateway-forwarded user to a
//!    [`Principal`](stockroom_core::Principal)
//! 3. **Parse**: query string and multipart body become an [`ActionForm`]
//! 4. **Dispatch**: the action runs against the service
//! 5. **Respond**: JSON, a file download, or an [`ActionError`]
//!
//! # Example
//!
//! ```ignore
//! use stockroom_web::{AppState, router};
//!
//! let state = AppState::new(service, identities, gateway_token);
//! let app = router(state);
//! axum::serve(listener, app).await?;
//! ```
//!
//! [`InventoryService`]: stockroom_core::InventoryService

pub mod error;
pub mod extractors;
pub mod form;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::ActionError;
pub use extractors::{Caller, GATEWAY_TOKEN_HEADER, USER_ID_HEADER};
pub use form::{ActionForm, UploadedFile};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlate};
pub use state::AppState;

use axum::{Router, extract::DefaultBodyLimit, middleware::from_fn, routing::get};
use tower_http::limit::RequestBodyLimitLayer;

/// Build the application router.
///
/// Request bodies are capped at [`AppState::body_limit`].
pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit();

    let api = Router::new()
        .route(
            "/api/inventory",
            get(handlers::get_action).post(handlers::post_action),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    Router::new()
        .merge(api)
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .layer(from_fn(correlate))
        .with_state(state)
}
