//! Inventory service behaviour over the in-memory backends.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use stockroom_core::InventoryError;
use stockroom_core::images::ImageUpload;
use stockroom_core::operations::{
    AddImage, AddItem, ClearOutcome, ItemFields, UpdateImage, UpdateItem,
};
use stockroom_core::types::{ItemId, ItemImage, NewItem};
use stockroom_testing::fixtures::ADMIN_PASSWORD;
use stockroom_testing::{FailPoint, TestInventory, admin, member, new_item, visitor};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn add(name: &str, category: &str, quantity: i64) -> AddItem {
    AddItem {
        fields: ItemFields::new(name, category, quantity),
        image: AddImage::None,
    }
}

fn png_upload() -> ImageUpload {
    ImageUpload {
        file_name: "photo.png".into(),
        content_type: Some("image/png".into()),
        bytes: PNG.to_vec(),
    }
}

fn ten_items() -> TestInventory {
    TestInventory::with_items((1..=10).map(|n| new_item(&format!("Part {n}"), "Spares", n)))
}

// ============================================================================
// Add
// ============================================================================

#[tokio::test]
async fn adding_the_same_item_accumulates_quantity() {
    let inventory = TestInventory::new();

    let first = inventory.service.add(&admin(), add("Servo", "Motors", 2)).await.unwrap();
    assert!(!first.updated);
    assert_eq!(first.item.id, ItemId::FIRST);

    let second = inventory
        .service
        .add(&admin(), add("  SERVO ", "motors", 3))
        .await
        .unwrap();
    assert!(second.updated);
    assert_eq!(second.item.id, ItemId::FIRST);
    assert_eq!(second.item.quantity, 5);
    assert_eq!(second.item.item_name, "Servo");

    assert_eq!(inventory.store.len().await, 1);
}

#[tokio::test]
async fn same_name_in_another_category_is_a_new_item() {
    let inventory = TestInventory::new();
    inventory.service.add(&admin(), add("Fan", "Cooling", 1)).await.unwrap();
    let outcome = inventory.service.add(&admin(), add("Fan", "", 1)).await.unwrap();

    assert!(!outcome.updated);
    assert_eq!(outcome.item.id, ItemId::new(2));
}

#[tokio::test]
async fn add_validates_its_fields() {
    let inventory = TestInventory::new();

    let blank = inventory.service.add(&admin(), add("   ", "x", 1)).await.unwrap_err();
    assert_eq!(blank.to_string(), "Warning: Item name is required");

    let negative = inventory.service.add(&admin(), add("Fan", "x", -1)).await.unwrap_err();
    assert_eq!(negative.to_string(), "Warning: Quantity cannot be negative");

    assert!(inventory.store.is_empty().await);
}

#[tokio::test]
async fn only_admins_may_add() {
    let inventory = TestInventory::new();
    for principal in [member(), visitor()] {
        let error = inventory.service.add(&principal, add("Fan", "", 1)).await.unwrap_err();
        assert!(matches!(error, InventoryError::Authorization(_)));
    }
    assert!(inventory.store.is_empty().await);
}

#[tokio::test]
async fn default_images_must_exist_in_the_library() {
    let inventory = TestInventory::new();

    let ok = inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Resistor", "Passive", 100),
                image: AddImage::Default("/assets/res/material/resistor.webp".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        ok.item.item_image,
        Some(ItemImage::Default("resistor.webp".into()))
    );

    let missing = inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Capacitor", "Passive", 10),
                image: AddImage::Default("capacitor.webp".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, InventoryError::Validation(_)));
    assert_eq!(inventory.store.len().await, 1);
}

#[tokio::test]
async fn uploads_are_kept_once_the_add_commits() {
    let inventory = TestInventory::new();
    let outcome = inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: AddImage::Upload(png_upload()),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.item.item_image,
        Some(ItemImage::Uploaded("upload_1.png".into()))
    );
    assert_eq!(inventory.images.uploads(), vec!["upload_1.png".to_string()]);
    assert!(inventory.images.removed().is_empty());
}

#[tokio::test]
async fn uploads_are_removed_when_the_add_rolls_back() {
    let inventory = TestInventory::new();
    inventory.store.fail_at(FailPoint::Insert);

    let result = inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: AddImage::Upload(png_upload()),
            },
        )
        .await;

    assert!(matches!(result, Err(InventoryError::Storage(_))));
    assert!(inventory.images.uploads().is_empty());
    assert_eq!(
        inventory.images.removed(),
        vec![ItemImage::Uploaded("upload_1.png".into())]
    );
}

#[tokio::test]
async fn rejected_uploads_store_nothing() {
    let inventory = TestInventory::new();
    let error = inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: AddImage::Upload(ImageUpload {
                    file_name: "script.svg".into(),
                    content_type: Some("image/svg+xml".into()),
                    bytes: b"<svg/>".to_vec(),
                }),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "Error: Invalid file type. Allowed: JPG, PNG, GIF, WEBP"
    );
    assert!(inventory.images.uploads().is_empty());
    assert!(inventory.store.is_empty().await);
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn update_replaces_fields() {
    let inventory = TestInventory::with_items([new_item("Servo", "Motors", 2)]);
    let outcome = inventory
        .service
        .update(
            &admin(),
            UpdateItem {
                id: ItemId::FIRST,
                fields: ItemFields::new("Micro Servo", "Motors", 7),
                image: UpdateImage::Keep,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.previous.item_name, "Servo");
    assert_eq!(outcome.item.item_name, "Micro Servo");
    assert_eq!(outcome.item.quantity, 7);
}

#[tokio::test]
async fn update_that_collides_reports_a_conflict_and_changes_nothing() {
    let inventory = TestInventory::with_items([
        new_item("Servo", "Motors", 2),
        new_item("Stepper", "Motors", 4),
    ]);
    let before = inventory.store.snapshot().await;

    let error = inventory
        .service
        .update(
            &admin(),
            UpdateItem {
                id: ItemId::new(2),
                fields: ItemFields::new("servo", "MOTORS", 3),
                image: UpdateImage::Keep,
            },
        )
        .await
        .unwrap_err();

    let InventoryError::Conflict(conflict) = error else {
        panic!("expected a conflict, got {error:?}");
    };
    assert_eq!(conflict.source_item.id, ItemId::new(2));
    assert_eq!(conflict.target_item.id, ItemId::FIRST);
    assert_eq!(conflict.combined_quantity, 6);
    assert_eq!(inventory.store.snapshot().await, before);
}

#[tokio::test]
async fn merging_a_conflict_yields_its_combined_quantity() {
    let inventory = TestInventory::with_items([
        new_item("Wire", "Cables", 5),
        new_item("Wire", "Wiring", 2),
    ]);

    let error = inventory
        .service
        .update(
            &admin(),
            UpdateItem {
                id: ItemId::FIRST,
                fields: ItemFields::new("Wire", "Wiring", 10),
                image: UpdateImage::Keep,
            },
        )
        .await
        .unwrap_err();
    let InventoryError::Conflict(conflict) = error else {
        panic!("expected a conflict, got {error:?}");
    };
    assert_eq!(conflict.source_item.quantity, 5);
    assert_eq!(conflict.combined_quantity, 7);

    let merged = inventory
        .service
        .merge(&admin(), conflict.source_item.id, conflict.target_item.id)
        .await
        .unwrap();
    assert_eq!(merged.item.quantity, conflict.combined_quantity);
}

#[tokio::test]
async fn update_may_keep_its_own_name_with_different_case() {
    let inventory = TestInventory::with_items([new_item("Servo", "Motors", 2)]);
    let outcome = inventory
        .service
        .update(
            &admin(),
            UpdateItem {
                id: ItemId::FIRST,
                fields: ItemFields::new("SERVO", "Motors", 2),
                image: UpdateImage::Keep,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.item.item_name, "SERVO");
}

#[tokio::test]
async fn replacing_an_upload_removes_the_old_file_after_commit() {
    let inventory = TestInventory::with_items([NewItem {
        item_image: Some(ItemImage::Uploaded("old.png".into())),
        ..new_item("Camera", "Sensors", 1)
    }]);
    inventory.images.seed_upload("old.png");

    let replace = |image| UpdateItem {
        id: ItemId::FIRST,
        fields: ItemFields::new("Camera", "Sensors", 1),
        image,
    };
    inventory
        .service
        .update(&admin(), replace(UpdateImage::Upload(png_upload())))
        .await
        .unwrap();
    inventory
        .service
        .update(&admin(), replace(UpdateImage::Default("rgbLed.webp".into())))
        .await
        .unwrap();

    assert_eq!(
        inventory.images.removed(),
        vec![
            ItemImage::Uploaded("old.png".into()),
            ItemImage::Uploaded("upload_1.png".into()),
        ]
    );
    assert!(inventory.images.uploads().is_empty());
}

#[tokio::test]
async fn failed_update_keeps_the_old_picture() {
    let inventory = TestInventory::with_items([NewItem {
        item_image: Some(ItemImage::Uploaded("old.png".into())),
        ..new_item("Camera", "Sensors", 1)
    }]);
    inventory.images.seed_upload("old.png");
    inventory.store.fail_at(FailPoint::Update);

    let result = inventory
        .service
        .update(
            &admin(),
            UpdateItem {
                id: ItemId::FIRST,
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: UpdateImage::Upload(png_upload()),
            },
        )
        .await;

    assert!(result.is_err());
    assert_eq!(inventory.images.uploads(), vec!["old.png".to_string()]);
    assert_eq!(
        inventory.store.snapshot().await[0].item_image,
        Some(ItemImage::Uploaded("old.png".into()))
    );
}

#[tokio::test]
async fn update_of_a_missing_item_is_not_found() {
    let inventory = TestInventory::new();
    let error = inventory
        .service
        .update(
            &admin(),
            UpdateItem {
                id: ItemId::new(4),
                fields: ItemFields::new("Fan", "", 1),
                image: UpdateImage::Keep,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Item not found");
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn delete_renumbers_the_remaining_items() {
    let inventory = TestInventory::with_items([
        new_item("A", "", 1),
        new_item("B", "", 1),
        new_item("C", "", 1),
    ]);

    let removed = inventory.service.delete(&admin(), ItemId::new(2)).await.unwrap();
    assert_eq!(removed.item_name, "B");

    let rows = inventory.store.snapshot().await;
    let layout: Vec<_> = rows.iter().map(|r| (r.id.get(), r.item_name.as_str())).collect();
    assert_eq!(layout, vec![(1, "A"), (2, "C")]);
    assert_eq!(inventory.store.next_id().await, ItemId::new(3));

    let added = inventory.service.add(&admin(), add("D", "", 1)).await.unwrap();
    assert_eq!(added.item.id, ItemId::new(3));
}

#[tokio::test]
async fn delete_rejects_invalid_and_unknown_ids() {
    let inventory = TestInventory::with_items([new_item("A", "", 1)]);

    let invalid = inventory.service.delete(&admin(), ItemId::new(0)).await.unwrap_err();
    assert_eq!(invalid.to_string(), "Error: Invalid item ID");

    let unknown = inventory.service.delete(&admin(), ItemId::new(9)).await.unwrap_err();
    assert!(matches!(unknown, InventoryError::NotFound(_)));
    assert_eq!(inventory.store.ids().await, vec![1]);
}

#[tokio::test]
async fn delete_removes_the_upload_only_after_commit() {
    let inventory = TestInventory::new();
    inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: AddImage::Upload(png_upload()),
            },
        )
        .await
        .unwrap();

    inventory.store.fail_at(FailPoint::Commit);
    assert!(inventory.service.delete(&admin(), ItemId::FIRST).await.is_err());
    assert!(inventory.images.removed().is_empty());
    assert_eq!(inventory.images.uploads(), vec!["upload_1.png".to_string()]);
    assert_eq!(inventory.store.ids().await, vec![1]);

    inventory.service.delete(&admin(), ItemId::FIRST).await.unwrap();
    assert_eq!(
        inventory.images.removed(),
        vec![ItemImage::Uploaded("upload_1.png".into())]
    );
    assert!(inventory.images.uploads().is_empty());
}

#[tokio::test]
async fn delete_never_removes_default_pictures() {
    let inventory = TestInventory::with_items([NewItem {
        item_image: Some(ItemImage::Default("resistor.webp".into())),
        ..new_item("Resistor", "Passive", 10)
    }]);

    inventory.service.delete(&admin(), ItemId::FIRST).await.unwrap();
    assert!(inventory.store.is_empty().await);
    assert!(inventory.images.removed().is_empty());
}

#[tokio::test]
async fn failed_reindex_keeps_the_deleted_row() {
    let inventory = TestInventory::with_items([new_item("A", "", 1), new_item("B", "", 1)]);
    inventory.store.fail_at(FailPoint::Renumber);

    assert!(inventory.service.delete(&admin(), ItemId::FIRST).await.is_err());
    assert_eq!(inventory.store.ids().await, vec![1, 2]);
}

// ============================================================================
// Merge
// ============================================================================

#[tokio::test]
async fn merge_combines_quantities_and_renumbers() {
    let inventory = TestInventory::with_items([
        new_item("Servo", "Motors", 2),
        new_item("Servo (old)", "Motors", 3),
        new_item("Fan", "Cooling", 1),
    ]);

    let outcome = inventory
        .service
        .merge(&admin(), ItemId::FIRST, ItemId::new(3))
        .await
        .unwrap();

    assert_eq!(outcome.source.item_name, "Servo");
    assert_eq!(outcome.item.item_name, "Fan");
    assert_eq!(outcome.item.quantity, 3);
    assert_eq!(outcome.item.id, ItemId::new(2));
    assert_eq!(inventory.store.ids().await, vec![1, 2]);
}

#[tokio::test]
async fn merge_is_atomic() {
    let inventory = TestInventory::with_items([new_item("A", "", 2), new_item("B", "", 3)]);
    let before = inventory.store.snapshot().await;
    inventory.store.fail_at(FailPoint::Delete);

    let result = inventory.service.merge(&admin(), ItemId::FIRST, ItemId::new(2)).await;

    assert!(matches!(result, Err(InventoryError::Storage(_))));
    assert_eq!(inventory.store.snapshot().await, before);
}

#[tokio::test]
async fn merge_removes_the_source_upload_only_after_commit() {
    let inventory = TestInventory::new();
    inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: AddImage::Upload(png_upload()),
            },
        )
        .await
        .unwrap();
    inventory.service.add(&admin(), add("Webcam", "Sensors", 2)).await.unwrap();
    let before = inventory.store.snapshot().await;

    inventory.store.fail_at(FailPoint::Commit);
    let result = inventory.service.merge(&admin(), ItemId::FIRST, ItemId::new(2)).await;
    assert!(matches!(result, Err(InventoryError::Storage(_))));
    assert!(inventory.images.removed().is_empty());
    assert_eq!(inventory.images.uploads(), vec!["upload_1.png".to_string()]);
    assert_eq!(inventory.store.snapshot().await, before);

    let merged = inventory
        .service
        .merge(&admin(), ItemId::FIRST, ItemId::new(2))
        .await
        .unwrap();
    assert_eq!(merged.item.quantity, 3);
    assert_eq!(
        inventory.images.removed(),
        vec![ItemImage::Uploaded("upload_1.png".into())]
    );
    assert!(inventory.images.uploads().is_empty());
}

#[tokio::test]
async fn merge_validates_its_ids() {
    let inventory = TestInventory::with_items([new_item("A", "", 2)]);

    let same = inventory
        .service
        .merge(&admin(), ItemId::FIRST, ItemId::FIRST)
        .await
        .unwrap_err();
    assert_eq!(same.to_string(), "Error: Cannot merge item with itself");

    let invalid = inventory
        .service
        .merge(&admin(), ItemId::new(-1), ItemId::FIRST)
        .await
        .unwrap_err();
    assert_eq!(invalid.to_string(), "Error: Invalid item IDs");

    let missing = inventory
        .service
        .merge(&admin(), ItemId::new(5), ItemId::FIRST)
        .await
        .unwrap_err();
    assert_eq!(missing.to_string(), "Source item not found");
}

// ============================================================================
// Clear
// ============================================================================

#[tokio::test]
async fn clear_requires_the_admin_password() {
    let inventory = ten_items();

    let empty = inventory.service.clear(&admin(), "").await.unwrap_err();
    assert_eq!(
        empty.to_string(),
        "Error: Password is required to clear inventory"
    );

    let wrong = inventory.service.clear(&admin(), "guess").await.unwrap_err();
    assert!(matches!(wrong, InventoryError::Authorization(_)));
    assert_eq!(wrong.to_string(), "Error: Incorrect password");

    assert_eq!(inventory.store.len().await, 10);
}

#[tokio::test]
async fn clear_removes_everything_and_restarts_ids() {
    let inventory = ten_items();

    let outcome = inventory.service.clear(&admin(), ADMIN_PASSWORD).await.unwrap();
    assert_eq!(outcome, ClearOutcome::Cleared { deleted_count: 10 });
    assert!(inventory.store.is_empty().await);

    let added = inventory.service.add(&admin(), add("Fresh", "", 1)).await.unwrap();
    assert_eq!(added.item.id, ItemId::FIRST);

    inventory.service.delete(&admin(), ItemId::FIRST).await.unwrap();
    let again = inventory.service.clear(&admin(), ADMIN_PASSWORD).await.unwrap();
    assert_eq!(again, ClearOutcome::AlreadyEmpty);
}

#[tokio::test]
async fn clear_removes_uploaded_pictures() {
    let inventory = TestInventory::new();
    inventory
        .service
        .add(
            &admin(),
            AddItem {
                fields: ItemFields::new("Camera", "Sensors", 1),
                image: AddImage::Upload(png_upload()),
            },
        )
        .await
        .unwrap();

    inventory.service.clear(&admin(), ADMIN_PASSWORD).await.unwrap();
    assert!(inventory.images.uploads().is_empty());
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn list_reports_availability() {
    let inventory = TestInventory::with_items([
        new_item("A", "", 0),
        new_item("B", "", 4),
        new_item("C", "", 6),
    ]);

    let listing = inventory.service.list(&member()).await.unwrap();
    assert_eq!(listing.items.len(), 3);
    assert_eq!(listing.summary.total_items, 3);
    assert_eq!(listing.summary.available_items, 2);
    assert_eq!(listing.summary.unavailable_items, 1);
    assert_eq!(listing.summary.total_quantity, 10);

    assert!(matches!(
        inventory.service.list(&visitor()).await,
        Err(InventoryError::Authorization(_))
    ));
}

#[tokio::test]
async fn get_is_admin_only() {
    let inventory = TestInventory::with_items([new_item("A", "", 1)]);
    assert_eq!(
        inventory.service.get(&admin(), ItemId::FIRST).await.unwrap().item_name,
        "A"
    );
    assert!(inventory.service.get(&member(), ItemId::FIRST).await.is_err());
}

#[tokio::test]
async fn default_images_are_listed_with_display_names() {
    let inventory = TestInventory::new();
    let images = inventory.service.default_images(&admin()).await.unwrap();
    let names: Vec<_> = images.iter().map(|i| i.display_name.as_str()).collect();
    assert_eq!(names, vec!["Resistor", "RGB LED", "Servo Motor"]);
}

#[tokio::test]
async fn reservation_amount_must_fit_the_stock() {
    let inventory = TestInventory::with_items([new_item("Drill", "Tools", 3), new_item("Saw", "Tools", 0)]);

    let check = inventory
        .service
        .check_reservation(&member(), ItemId::FIRST, 3)
        .await
        .unwrap();
    assert_eq!(check.max_amount, 3);

    assert!(
        inventory
            .service
            .check_reservation(&member(), ItemId::FIRST, 4)
            .await
            .is_err()
    );
    let sold_out = inventory
        .service
        .check_reservation(&member(), ItemId::new(2), 1)
        .await
        .unwrap_err();
    assert_eq!(sold_out.to_string(), "Warning: 'Saw' is out of stock");
}

#[tokio::test]
async fn ping_reaches_the_store() {
    let inventory = TestInventory::new();
    assert!(inventory.service.ping().await.is_ok());
    inventory.store.fail_at(FailPoint::Begin);
    assert!(inventory.service.ping().await.is_err());
}
