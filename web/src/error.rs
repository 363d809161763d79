//! Error type for action handlers.
//!
//! [`ActionError`] bridges [`InventoryError`] and HTTP: it picks the status
//! code and renders the `{success: false, message}` body clients expect.
//! Storage failures are logged with their source and reported with a
//! generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use stockroom_core::InventoryError;
use stockroom_core::resolver::UpdateConflict;

/// Message shown for every server-side failure.
pub const INTERNAL_MESSAGE: &str = "Error: The request could not be completed. Please try again.";

/// Error returned by action handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Response, ActionError> {
///     let item = state.service.get(&principal, id).await?;
///     Ok(Json(item).into_response())
/// }
/// ```
#[derive(Debug)]
pub struct ActionError {
    status: StatusCode,
    message: String,
    code: &'static str,
    conflict: Option<Box<UpdateConflict>>,
    source: Option<anyhow::Error>,
}

impl ActionError {
    /// Create a new action error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            conflict: None,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: Please log in",
            "UNAUTHORIZED",
        )
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN")
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// 405 Method Not Allowed.
    #[must_use]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, message, "METHOD_NOT_ALLOWED")
    }

    /// 409 Conflict carrying both items and the quantity a merge would give.
    #[must_use]
    pub fn conflict(conflict: UpdateConflict) -> Self {
        let mut error = Self::new(StatusCode::CONFLICT, conflict.to_string(), "CONFLICT");
        error.conflict = Some(Box::new(conflict));
        error
    }

    /// 422 Unprocessable Entity.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// 500 Internal Server Error with the generic message.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_MESSAGE,
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable error code, also used as the metrics outcome.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<InventoryError> for ActionError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::Validation(message) => Self::validation(message),
            InventoryError::NotFound(what) => Self::not_found(format!("Error: {what} not found")),
            InventoryError::Conflict(conflict) => Self::conflict(*conflict),
            InventoryError::Authorization(message) => Self::forbidden(message),
            InventoryError::ImportFormat(e) => Self::validation(e.to_string()),
            e @ (InventoryError::Export(_) | InventoryError::Storage(_)) => {
                Self::internal().with_source(anyhow::Error::new(e))
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflict: Option<bool>,
    #[serde(flatten)]
    details: Option<Box<UpdateConflict>>,
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Inventory action failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Inventory action failed"
                ),
            }
        }

        let body = ErrorBody {
            success: false,
            message: self.message,
            code: self.code,
            conflict: self.conflict.is_some().then_some(true),
            details: self.conflict,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use stockroom_core::store::StoreError;
    use stockroom_core::types::{ItemId, ItemRecord};

    fn record(id: i64, name: &str, quantity: i64) -> ItemRecord {
        ItemRecord {
            id: ItemId::new(id),
            item_name: name.into(),
            category: "Wiring".into(),
            quantity,
            item_image: None,
        }
    }

    #[test]
    fn test_error_display() {
        let err = ActionError::bad_request("Invalid action");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid action");
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (InventoryError::validation("Warning: x"), StatusCode::UNPROCESSABLE_ENTITY),
            (InventoryError::NotFound("Item"), StatusCode::NOT_FOUND),
            (
                InventoryError::Authorization("Forbidden: Admin access required".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                InventoryError::Storage(StoreError::DatabaseError("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ActionError::from(error).status(), status);
        }
    }

    #[test]
    fn not_found_message_matches_the_client_wording() {
        let err = ActionError::from(InventoryError::NotFound("Source item"));
        assert_eq!(err.message(), "Error: Source item not found");
    }

    #[test]
    fn storage_failures_hide_details() {
        let err = ActionError::from(InventoryError::Storage(StoreError::DatabaseError(
            "password authentication failed for user".into(),
        )));
        assert_eq!(err.message(), INTERNAL_MESSAGE);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn conflict_body_carries_both_items() {
        let conflict = UpdateConflict::between(&record(1, "Wire", 5), &record(2, "Wire", 2));
        let err = ActionError::conflict(conflict);
        let body = ErrorBody {
            success: false,
            message: err.message.clone(),
            code: err.code,
            conflict: Some(true),
            details: err.conflict,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["conflict"], true);
        assert_eq!(json["combinedQuantity"], 7);
        assert_eq!(json["sourceItem"]["id"], 1);
        assert_eq!(json["targetItem"]["item_name"], "Wire");
    }
}
