//! The inventory action endpoint.
//!
//! One URL serves every action, selected by the `action` parameter. Reads
//! are accepted on `GET` with query parameters; everything is accepted on
//! `POST` with a multipart body. Successful responses are JSON objects with
//! `success: true` (exports are file downloads), failures go through
//! [`ActionError`].

use crate::error::ActionError;
use crate::extractors::Caller;
use crate::form::ActionForm;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;
use stockroom_core::identity::Principal;
use stockroom_core::operations::{
    AddImage, AddItem, ClearOutcome, ItemFields, UpdateImage, UpdateItem,
};
use stockroom_core::transfer::{ExportFile, ExportFormat};

/// Actions understood by the endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Add an item or top up its duplicate.
    Add,
    /// Replace the fields of an item.
    Update,
    /// Fold one item into another.
    Merge,
    /// Remove an item.
    Delete,
    /// One item by id.
    Get,
    /// Every item with summary figures.
    List,
    /// Validate a reservation amount.
    CheckReservation,
    /// The default picture catalogue.
    GetDefaultImages,
    /// Download the inventory.
    Export,
    /// Upload an inventory file.
    Import,
    /// Remove every item.
    Clear,
}

impl Action {
    /// Parse the `action` parameter.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.trim() {
            "add" => Self::Add,
            "update" => Self::Update,
            "merge" => Self::Merge,
            "delete" => Self::Delete,
            "get" => Self::Get,
            "list" => Self::List,
            "checkReservation" => Self::CheckReservation,
            "getDefaultImages" => Self::GetDefaultImages,
            "export" => Self::Export,
            "import" => Self::Import,
            "clear" => Self::Clear,
            _ => return None,
        })
    }

    /// Wire name, also used as a metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Merge => "merge",
            Self::Delete => "delete",
            Self::Get => "get",
            Self::List => "list",
            Self::CheckReservation => "checkReservation",
            Self::GetDefaultImages => "getDefaultImages",
            Self::Export => "export",
            Self::Import => "import",
            Self::Clear => "clear",
        }
    }

    /// Whether the action leaves the inventory untouched.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(
            self,
            Self::Get | Self::List | Self::CheckReservation | Self::GetDefaultImages | Self::Export
        )
    }
}

fn parse_action(form: &ActionForm) -> Result<Action, ActionError> {
    form.text("action")
        .and_then(Action::parse)
        .ok_or_else(|| ActionError::bad_request("Invalid action"))
}

/// `GET /api/inventory?action=...`
///
/// # Errors
///
/// Returns 400 for unknown actions and 405 for actions that modify the
/// inventory.
pub async fn get_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ActionError> {
    let form = ActionForm::from_query(query);
    let action = parse_action(&form)?;
    if !action.is_read() {
        return Err(ActionError::method_not_allowed(
            "Error: This action must be sent with POST",
        ));
    }
    Ok(run(&state, &principal, action, form).await)
}

/// `POST /api/inventory` with a multipart body.
///
/// # Errors
///
/// Returns 400 for unknown actions or malformed bodies.
pub async fn post_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<Response, ActionError> {
    let form = ActionForm::read(multipart).await?.with_query(query);
    let action = parse_action(&form)?;
    Ok(run(&state, &principal, action, form).await)
}

async fn run(state: &AppState, principal: &Principal, action: Action, form: ActionForm) -> Response {
    let started = Instant::now();
    let result = dispatch(state, principal, action, form).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(error) => error.code(),
    };
    metrics::counter!(
        "inventory_actions_total",
        "action" => action.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("inventory_action_duration_seconds", "action" => action.as_str())
        .record(started.elapsed().as_secs_f64());

    result.unwrap_or_else(IntoResponse::into_response)
}

async fn dispatch(
    state: &AppState,
    principal: &Principal,
    action: Action,
    mut form: ActionForm,
) -> Result<Response, ActionError> {
    let service = state.service();

    let body = match action {
        Action::Add => {
            let image_type = form.text("image_type").unwrap_or("default").to_string();
            let image = match image_type.as_str() {
                "upload" => form
                    .take_file("item_image")
                    .map_or(AddImage::None, |file| AddImage::Upload(file.into_image())),
                _ => match form.text_or_empty("default_image") {
                    "" => AddImage::None,
                    name => AddImage::Default(name.to_string()),
                },
            };
            let request = AddItem {
                fields: item_fields(&form),
                image,
            };
            let outcome = service.add(principal, request).await?;
            let message = if outcome.updated {
                format!(
                    "Success: Item already exists. Updated quantity to {}",
                    outcome.item.quantity
                )
            } else {
                "Success: Item added successfully!".to_string()
            };
            json!({
                "success": true,
                "message": message,
                "updated": outcome.updated,
                "item": outcome.item,
            })
        }

        Action::Update => {
            let image_type = form.text("image_type").unwrap_or("keep").to_string();
            let image = match image_type.as_str() {
                "upload" => form
                    .take_file("item_image")
                    .map_or(UpdateImage::Keep, |file| UpdateImage::Upload(file.into_image())),
                "default" => match form.text_or_empty("default_image") {
                    "" => UpdateImage::Keep,
                    name => UpdateImage::Default(name.to_string()),
                },
                _ => UpdateImage::Keep,
            };
            let request = UpdateItem {
                id: form.item_id("item_id"),
                fields: item_fields(&form),
                image,
            };
            let outcome = service.update(principal, request).await?;
            json!({
                "success": true,
                "message": "Item updated successfully",
                "item": outcome.item,
            })
        }

        Action::Merge => {
            let outcome = service
                .merge(principal, form.item_id("source_id"), form.item_id("target_id"))
                .await?;
            json!({
                "success": true,
                "message": format!(
                    "Items merged! '{}' now has quantity {}",
                    outcome.item.item_name, outcome.item.quantity
                ),
                "item": outcome.item,
            })
        }

        Action::Delete => {
            service.delete(principal, form.item_id("item_id")).await?;
            json!({
                "success": true,
                "message": "Success: Item deleted successfully",
            })
        }

        Action::Get => {
            let item = service.get(principal, form.item_id("item_id")).await?;
            json!({ "success": true, "item": item })
        }

        Action::List => {
            let listing = service.list(principal).await?;
            json!({
                "success": true,
                "items": listing.items,
                "summary": listing.summary,
            })
        }

        Action::CheckReservation => {
            let check = service
                .check_reservation(principal, form.item_id("item_id"), form.int("amount"))
                .await?;
            json!({
                "success": true,
                "item": check.item,
                "amount": check.amount,
                "maxAmount": check.max_amount,
            })
        }

        Action::GetDefaultImages => {
            let images = service.default_images(principal).await?;
            json!({ "success": true, "images": images })
        }

        Action::Export => {
            let format = ExportFormat::from_param(form.text("format"));
            let file = service.export(principal, format).await?;
            return download(file);
        }

        Action::Import => {
            let Some(file) = form.take_file("import_file") else {
                return Err(ActionError::validation("Error: No file was uploaded"));
            };
            if file.bytes.len() > state.import_max_bytes() {
                return Err(ActionError::validation(
                    "Error: File exceeds server upload limit",
                ));
            }
            let report = service.import(principal, file.into_import()).await?;
            json!({
                "success": true,
                "message": report.message(),
                "details": report,
            })
        }

        Action::Clear => match service.clear(principal, form.text_or_empty("password")).await? {
            ClearOutcome::Cleared { deleted_count } => json!({
                "success": true,
                "message": format!("Success: Inventory cleared! {deleted_count} items deleted."),
                "deleted_count": deleted_count,
            }),
            ClearOutcome::AlreadyEmpty => json!({
                "success": false,
                "message": "Warning: Inventory is already empty",
            }),
        },
    };

    Ok(Json(body).into_response())
}

fn item_fields(form: &ActionForm) -> ItemFields {
    ItemFields::new(
        form.text_or_empty("item_name"),
        form.text_or_empty("category"),
        form.int("quantity"),
    )
}

fn download(file: ExportFile) -> Result<Response, ActionError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name))
        .map_err(|e| ActionError::internal().with_source(anyhow::Error::new(e)))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(file.format.content_type()),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, must-revalidate"),
            ),
        ],
        file.body,
    )
        .into_response())
}
