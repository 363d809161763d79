//! Custom Axum extractors.
//!
//! - [`Caller`]: the authenticated [`Principal`] of the request
//! - [`CorrelationId`]: the id assigned by the correlation middleware
//!
//! Sessions are handled by an upstream gateway. It forwards the user id in
//! `X-User-Id` together with the shared secret in `X-Gateway-Token`; the
//! role is then read from the identity directory, so a demoted user loses
//! access immediately.

use crate::error::ActionError;
use crate::middleware::{CORRELATION_ID_HEADER, CorrelationId};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use constant_time_eq::constant_time_eq;
use stockroom_core::identity::{Principal, UserId};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the gateway secret.
pub const GATEWAY_TOKEN_HEADER: &str = "X-Gateway-Token";

/// The principal making the request.
///
/// Rejects with 401 when the gateway token is missing or wrong, the user
/// id is malformed, or the user is unknown.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ActionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = header(&parts.headers, GATEWAY_TOKEN_HEADER).unwrap_or_default();
        if token.is_empty() || !constant_time_eq(token.as_bytes(), state.gateway_token().as_bytes())
        {
            tracing::debug!("Rejected request without a valid gateway token");
            return Err(ActionError::unauthorized());
        }

        let user_id = header(&parts.headers, USER_ID_HEADER)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(UserId::new)
            .ok_or_else(ActionError::unauthorized)?;

        let role = state
            .identities()
            .role_of(user_id)
            .await
            .map_err(|e| ActionError::internal().with_source(anyhow::Error::new(e)))?
            .ok_or_else(ActionError::unauthorized)?;

        Ok(Self(Principal::new(user_id, role)))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .unwrap_or_else(|| Self::from_header(parts.headers.get(CORRELATION_ID_HEADER))))
    }
}
