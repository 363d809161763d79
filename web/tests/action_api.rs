//! End-to-end tests of the action endpoint over in-memory backends.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;
use std::sync::Arc;
use stockroom_core::identity::{Role, UserId};
use stockroom_testing::fixtures::ADMIN_PASSWORD;
use stockroom_testing::{TestInventory, admin, member, new_item, visitor};
use stockroom_web::{AppState, GATEWAY_TOKEN_HEADER, USER_ID_HEADER, router};

const TOKEN: &str = "gateway-secret";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn server(inventory: &TestInventory) -> TestServer {
    let state = AppState::new(
        inventory.service.clone(),
        Arc::new(inventory.identities.clone()),
        TOKEN,
    )
    .with_import_max_bytes(1024);
    TestServer::new(router(state)).unwrap()
}

fn user_header(user: UserId) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user.to_string()).unwrap(),
    )
}

fn token_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-gateway-token"),
        HeaderValue::from_str(token).unwrap(),
    )
}

async fn post(server: &TestServer, user: UserId, form: MultipartForm) -> (StatusCode, Value) {
    let (user_name, user_value) = user_header(user);
    let (token_name, token_value) = token_header(TOKEN);
    let response = server
        .post("/api/inventory")
        .add_header(user_name, user_value)
        .add_header(token_name, token_value)
        .multipart(form)
        .await;
    (response.status_code(), response.json::<Value>())
}

async fn get(server: &TestServer, user: UserId, query: &[(&str, &str)]) -> (StatusCode, Value) {
    let (user_name, user_value) = user_header(user);
    let (token_name, token_value) = token_header(TOKEN);
    let mut request = server
        .get("/api/inventory")
        .add_header(user_name, user_value)
        .add_header(token_name, token_value);
    for (key, value) in query {
        request = request.add_query_param(key, value);
    }
    let response = request.await;
    (response.status_code(), response.json::<Value>())
}

fn add_form(name: &str, category: &str, quantity: i64) -> MultipartForm {
    MultipartForm::new()
        .add_text("action", "add")
        .add_text("item_name", name)
        .add_text("category", category)
        .add_text("quantity", quantity)
}

#[test]
fn header_constants_match_the_test_headers() {
    assert_eq!(USER_ID_HEADER.to_ascii_lowercase(), "x-user-id");
    assert_eq!(GATEWAY_TOKEN_HEADER.to_ascii_lowercase(), "x-gateway-token");
}

#[tokio::test]
async fn add_then_add_again_accumulates() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let (status, body) = post(&server, admin().user_id, add_form("Servo", "Motors", 3)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["updated"], false);
    assert_eq!(body["message"], "Success: Item added successfully!");
    assert_eq!(body["item"]["id"], 1);

    let (_, body) = post(&server, admin().user_id, add_form("servo", "motors", 4)).await;
    assert_eq!(body["updated"], true);
    assert_eq!(
        body["message"],
        "Success: Item already exists. Updated quantity to 7"
    );
    assert_eq!(inventory.store.len().await, 1);
}

#[tokio::test]
async fn add_with_default_image_stores_its_path() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let form = add_form("Resistor", "Passive", 10)
        .add_text("image_type", "default")
        .add_text("default_image", "resistor.webp");
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["item_image"], "/assets/res/material/resistor.webp");
}

#[tokio::test]
async fn add_with_upload_stores_the_file() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let form = add_form("Camera", "Sensors", 1)
        .add_text("image_type", "upload")
        .add_part(
            "item_image",
            Part::bytes(PNG.to_vec())
                .file_name("camera.png")
                .mime_type("image/png"),
        );
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(inventory.images.uploads(), vec!["upload_1.png".to_string()]);
}

#[tokio::test]
async fn invalid_fields_are_unprocessable() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let (status, body) = post(&server, admin().user_id, add_form("   ", "Misc", 1)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(inventory.store.is_empty().await);
}

#[tokio::test]
async fn update_collision_reports_conflict_without_changes() {
    let inventory = TestInventory::with_items([
        new_item("Wire", "Cables", 5),
        new_item("Wire", "Wiring", 2),
    ]);
    let server = server(&inventory);

    let form = MultipartForm::new()
        .add_text("action", "update")
        .add_text("item_id", 1)
        .add_text("item_name", "Wire")
        .add_text("category", "Wiring")
        .add_text("quantity", 5);
    let (status, body) = post(&server, admin().user_id, form).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["conflict"], true);
    assert_eq!(body["combinedQuantity"], 7);
    assert_eq!(body["sourceItem"]["id"], 1);
    assert_eq!(body["targetItem"]["id"], 2);

    let rows = inventory.store.snapshot().await;
    assert_eq!(rows[0].category, "Cables");
    assert_eq!(rows[1].quantity, 2);
}

#[tokio::test]
async fn merge_reports_the_surviving_item() {
    let inventory = TestInventory::with_items([
        new_item("Wire", "Cables", 5),
        new_item("Wire", "Wiring", 2),
    ]);
    let server = server(&inventory);

    let form = MultipartForm::new()
        .add_text("action", "merge")
        .add_text("source_id", 2)
        .add_text("target_id", 1);
    let (status, body) = post(&server, admin().user_id, form).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Items merged! 'Wire' now has quantity 7");
    assert_eq!(body["item"]["quantity"], 7);
    assert_eq!(inventory.store.ids().await, vec![1]);
}

#[tokio::test]
async fn delete_renumbers_and_missing_items_are_not_found() {
    let inventory = TestInventory::with_items([
        new_item("A", "", 1),
        new_item("B", "", 2),
        new_item("C", "", 3),
    ]);
    let server = server(&inventory);

    let form = MultipartForm::new()
        .add_text("action", "delete")
        .add_text("item_id", 1);
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Success: Item deleted successfully");
    assert_eq!(inventory.store.ids().await, vec![1, 2]);

    let (status, body) = get(&server, admin().user_id, &[("action", "get"), ("item_id", "9")]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Error: Item not found");
}

#[tokio::test]
async fn members_can_list_and_check_reservations() {
    let inventory = TestInventory::with_items([new_item("Servo", "Motors", 3), new_item("Fan", "", 0)]);
    let server = server(&inventory);

    let (status, body) = get(&server, member().user_id, &[("action", "list")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["summary"]["availableItems"], 1);
    assert_eq!(body["summary"]["totalQuantity"], 3);

    let (status, body) = get(
        &server,
        member().user_id,
        &[("action", "checkReservation"), ("item_id", "1"), ("amount", "3")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 3);
    assert_eq!(body["maxAmount"], 3);

    let (status, _) = get(
        &server,
        member().user_id,
        &[("action", "checkReservation"), ("item_id", "1"), ("amount", "4")],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn roles_are_enforced() {
    let inventory = TestInventory::with_items([new_item("Servo", "Motors", 3)]);
    let server = server(&inventory);

    let (status, _) = post(&server, member().user_id, add_form("Fan", "", 1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&server, visitor().user_id, &[("action", "list")]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Role changes take effect on the next request.
    inventory
        .identities
        .set_user(member().user_id, Role::Admin, "member password");
    let (status, _) = post(&server, member().user_id, add_form("Fan", "", 1)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn requests_without_a_valid_identity_are_unauthorized() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let response = server
        .get("/api/inventory")
        .add_query_param("action", "list")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let (user_name, user_value) = user_header(admin().user_id);
    let (token_name, token_value) = token_header("wrong-secret");
    let response = server
        .get("/api/inventory")
        .add_query_param("action", "list")
        .add_header(user_name, user_value)
        .add_header(token_name, token_value)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let (status, body) = get(&server, UserId::new(99), &[("action", "list")]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Please log in");
}

#[tokio::test]
async fn unknown_actions_and_mutations_over_get_are_rejected() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let (status, body) = get(&server, admin().user_id, &[("action", "explode")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid action");

    let (status, _) = get(&server, admin().user_id, &[("action", "delete"), ("item_id", "1")]).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn export_is_a_download() {
    let inventory = TestInventory::with_items([new_item("Servo", "Motors", 3)]);
    let server = server(&inventory);

    let (user_name, user_value) = user_header(admin().user_id);
    let (token_name, token_value) = token_header(TOKEN);
    let response = server
        .get("/api/inventory")
        .add_query_param("action", "export")
        .add_query_param("format", "json")
        .add_header(user_name, user_value)
        .add_header(token_name, token_value)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"inventory_2025-01-01_00-00-00.json\""
    );
    assert_eq!(response.header("cache-control"), "no-cache, must-revalidate");
    let body: Value = response.json();
    assert_eq!(body["inventory"][0]["item_name"], "Servo");
}

#[tokio::test]
async fn import_reports_counts() {
    let inventory = TestInventory::with_items([new_item("Servo", "Motors", 3)]);
    let server = server(&inventory);

    let csv = "Item Name,Category,Quantity\nServo,Motors,2\nFan,Cooling,5\n";
    let form = MultipartForm::new().add_text("action", "import").add_part(
        "import_file",
        Part::bytes(csv.as_bytes().to_vec())
            .file_name("stock.csv")
            .mime_type("text/csv"),
    );
    let (status, body) = post(&server, admin().user_id, form).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["details"]["added"], 1);
    assert_eq!(body["details"]["updated"], 1);
    assert_eq!(body["details"]["total"], 2);
    assert_eq!(
        body["message"],
        "Import complete: 1 items added, 1 items updated"
    );
}

#[tokio::test]
async fn import_needs_a_file_within_the_limit() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let form = MultipartForm::new().add_text("action", "import");
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Error: No file was uploaded");

    let form = MultipartForm::new().add_text("action", "import").add_part(
        "import_file",
        Part::bytes(vec![b'a'; 2048]).file_name("big.csv"),
    );
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Error: File exceeds server upload limit");
}

#[tokio::test]
async fn clear_checks_the_password() {
    let inventory = TestInventory::with_items([new_item("A", "", 1), new_item("B", "", 2)]);
    let server = server(&inventory);

    let form = MultipartForm::new()
        .add_text("action", "clear")
        .add_text("password", "guess");
    let (status, _) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(inventory.store.len().await, 2);

    let form = MultipartForm::new()
        .add_text("action", "clear")
        .add_text("password", ADMIN_PASSWORD);
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 2);
    assert_eq!(body["message"], "Success: Inventory cleared! 2 items deleted.");

    let form = MultipartForm::new()
        .add_text("action", "clear")
        .add_text("password", ADMIN_PASSWORD);
    let (status, body) = post(&server, admin().user_id, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Warning: Inventory is already empty");
}

#[tokio::test]
async fn default_images_have_display_names() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let (status, body) = get(&server, admin().user_id, &[("action", "getDefaultImages")]).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|image| image["displayName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Resistor", "RGB LED", "Servo Motor"]);
}

#[tokio::test]
async fn health_and_readiness() {
    let inventory = TestInventory::new();
    let server = server(&inventory);

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");

    let response = server.get("/ready").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "ready");
}
