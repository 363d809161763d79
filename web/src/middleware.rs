//! Request correlation.
//!
//! Every request gets a correlation id: the one sent in `X-Correlation-ID`
//! when it is a valid UUID, a fresh v4 UUID otherwise. The id is stored in
//! the request extensions, recorded on the request span, and echoed back in
//! the response header.
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn};
//! use stockroom_web::middleware::correlate;
//!
//! let app = Router::new()
//!     .route("/api/inventory", get(get_action))
//!     .layer(from_fn(correlate));
//! ```

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Correlation id of the current request, available from the request
/// extensions once [`correlate`] ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Read the id from a header value, or generate one.
    #[must_use]
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        let id = value
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .unwrap_or_else(Uuid::new_v4);
        Self(id)
    }
}

/// Middleware function assigning a [`CorrelationId`] to every request.
pub async fn correlate(mut req: Request, next: Next) -> Response {
    let correlation_id = CorrelationId::from_header(req.headers().get(CORRELATION_ID_HEADER));
    req.extensions_mut().insert(correlation_id);

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id.0,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.0.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
