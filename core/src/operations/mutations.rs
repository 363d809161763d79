//! Add, update, delete, merge and clear.

use super::{FileEffects, InventoryService, require_valid_id};
use crate::error::InventoryError;
use crate::identity::Principal;
use crate::images::{ImageError, ImageUpload};
use crate::reindex::reindex;
use crate::resolver::{self, Reconciliation, UpdateConflict};
use crate::store::{InventoryTx, TxMode};
use crate::types::{ItemChanges, ItemId, ItemImage, ItemRecord, NewItem, is_plain_file_name};
use tracing::{info, warn};

/// Name, category and quantity as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFields {
    /// Item name, trimmed before use.
    pub item_name: String,
    /// Category, trimmed before use.
    pub category: String,
    /// Quantity, must not be negative.
    pub quantity: i64,
}

impl ItemFields {
    /// Bundle raw client input.
    pub fn new(item_name: impl Into<String>, category: impl Into<String>, quantity: i64) -> Self {
        Self {
            item_name: item_name.into(),
            category: category.into(),
            quantity,
        }
    }

    fn validated(self) -> Result<Self, InventoryError> {
        let item_name = self.item_name.trim().to_string();
        let category = self.category.trim().to_string();
        if item_name.is_empty() {
            return Err(InventoryError::validation("Warning: Item name is required"));
        }
        if self.quantity < 0 {
            return Err(InventoryError::validation(
                "Warning: Quantity cannot be negative",
            ));
        }
        Ok(Self {
            item_name,
            category,
            quantity: self.quantity,
        })
    }
}

/// Picture for a new item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AddImage {
    /// No picture; the placeholder is shown.
    #[default]
    None,
    /// A file from the default library, by name.
    Default(String),
    /// A new upload.
    Upload(ImageUpload),
}

/// Picture change for an existing item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UpdateImage {
    /// Leave the current picture in place.
    #[default]
    Keep,
    /// Switch to a file from the default library, by name.
    Default(String),
    /// Replace with a new upload.
    Upload(ImageUpload),
}

/// Input of [`InventoryService::add`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddItem {
    /// Submitted fields.
    pub fields: ItemFields,
    /// Picture for the item if it turns out to be new.
    pub image: AddImage,
}

/// Input of [`InventoryService::update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateItem {
    /// Row to update.
    pub id: ItemId,
    /// Replacement fields.
    pub fields: ItemFields,
    /// Picture change.
    pub image: UpdateImage,
}

/// Result of an add.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    /// The stored row.
    pub item: ItemRecord,
    /// `true` when the quantity was folded into an existing row.
    pub updated: bool,
}

/// Result of an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The row after the update.
    pub item: ItemRecord,
    /// The row before the update.
    pub previous: ItemRecord,
}

/// Result of a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The surviving row with its combined quantity and renumbered id.
    pub item: ItemRecord,
    /// The absorbed row as it was before the merge.
    pub source: ItemRecord,
}

/// Result of a clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Every row was removed.
    Cleared {
        /// Rows removed.
        deleted_count: usize,
    },
    /// There was nothing to remove.
    AlreadyEmpty,
}

impl InventoryService {
    /// Add an item, or top up the quantity of the item with the same name
    /// and category.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, the fields or picture
    /// are invalid, or storage fails.
    #[tracing::instrument(skip(self, request), fields(user = %principal.user_id))]
    pub async fn add(
        &self,
        principal: &Principal,
        request: AddItem,
    ) -> Result<AddOutcome, InventoryError> {
        principal.require_admin()?;
        let fields = request.fields.validated()?;

        let mut effects = FileEffects::default();
        let mut tx = self.store.begin(TxMode::Shared).await?;
        let result = self
            .add_in_tx(tx.as_mut(), &fields, request.image, &mut effects)
            .await;
        let outcome = self.complete(tx, result, effects).await?;

        if outcome.updated {
            info!(
                admin_id = %principal.user_id,
                item_id = %outcome.item.id,
                item_name = %outcome.item.item_name,
                added = fields.quantity,
                quantity = outcome.item.quantity,
                "Admin topped up existing inventory item"
            );
        } else {
            info!(
                admin_id = %principal.user_id,
                item_id = %outcome.item.id,
                item_name = %outcome.item.item_name,
                category = outcome.item.category_label(),
                quantity = outcome.item.quantity,
                "Admin added inventory item"
            );
        }
        Ok(outcome)
    }

    async fn add_in_tx(
        &self,
        tx: &mut dyn InventoryTx,
        fields: &ItemFields,
        image: AddImage,
        effects: &mut FileEffects,
    ) -> Result<AddOutcome, InventoryError> {
        let duplicate =
            resolver::find_duplicate(tx, &fields.item_name, &fields.category, None).await?;

        match resolver::reconcile(duplicate, fields.quantity) {
            Reconciliation::Accumulate { existing, quantity } => {
                let item = tx
                    .set_quantity(existing.id, quantity)
                    .await?
                    .ok_or(InventoryError::NotFound("Item"))?;
                Ok(AddOutcome {
                    item,
                    updated: true,
                })
            }
            Reconciliation::Insert => {
                let item_image = match image {
                    AddImage::None => None,
                    AddImage::Default(name) => Some(self.resolve_default(&name).await?),
                    AddImage::Upload(upload) => Some(self.stage_upload(upload, effects).await?),
                };
                let item = tx
                    .insert(&NewItem {
                        item_name: fields.item_name.clone(),
                        category: fields.category.clone(),
                        quantity: fields.quantity,
                        item_image,
                    })
                    .await?;
                Ok(AddOutcome {
                    item,
                    updated: false,
                })
            }
        }
    }

    /// Replace the fields of an item.
    ///
    /// Never merges: if another row already has the requested name and
    /// category the update is rejected with [`InventoryError::Conflict`]
    /// and nothing changes.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, the input is invalid,
    /// the item does not exist, the update conflicts, or storage fails.
    #[tracing::instrument(skip(self, request), fields(user = %principal.user_id, item_id = %request.id))]
    pub async fn update(
        &self,
        principal: &Principal,
        request: UpdateItem,
    ) -> Result<UpdateOutcome, InventoryError> {
        principal.require_admin()?;
        require_valid_id(request.id)?;
        let fields = request.fields.validated()?;

        let mut effects = FileEffects::default();
        let mut tx = self.store.begin(TxMode::Shared).await?;
        let result = self
            .update_in_tx(tx.as_mut(), request.id, &fields, request.image, &mut effects)
            .await;
        let outcome = self.complete(tx, result, effects).await?;

        info!(
            admin_id = %principal.user_id,
            item_id = %outcome.item.id,
            old_name = %outcome.previous.item_name,
            item_name = %outcome.item.item_name,
            old_quantity = outcome.previous.quantity,
            quantity = outcome.item.quantity,
            "Admin updated inventory item"
        );
        Ok(outcome)
    }

    async fn update_in_tx(
        &self,
        tx: &mut dyn InventoryTx,
        id: ItemId,
        fields: &ItemFields,
        image: UpdateImage,
        effects: &mut FileEffects,
    ) -> Result<UpdateOutcome, InventoryError> {
        let current = tx.get(id).await?.ok_or(InventoryError::NotFound("Item"))?;

        let duplicate =
            resolver::find_duplicate(tx, &fields.item_name, &fields.category, Some(id)).await?;
        if let Some(target) = duplicate {
            return Err(UpdateConflict::between(&current, &target).into());
        }

        let item_image = match image {
            UpdateImage::Keep => current.item_image.clone(),
            UpdateImage::Default(name) => Some(self.resolve_default(&name).await?),
            UpdateImage::Upload(upload) => Some(self.stage_upload(upload, effects).await?),
        };
        if item_image != current.item_image {
            effects.discard_after_commit(current.item_image.as_ref());
        }

        let changes = ItemChanges {
            item_name: fields.item_name.clone(),
            category: fields.category.clone(),
            quantity: fields.quantity,
            item_image,
        };
        let item = tx
            .update(id, &changes)
            .await?
            .ok_or(InventoryError::NotFound("Item"))?;

        Ok(UpdateOutcome {
            item,
            previous: current,
        })
    }

    /// Delete an item and renumber the rest.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, the id is invalid or
    /// unknown, or storage fails.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn delete(
        &self,
        principal: &Principal,
        id: ItemId,
    ) -> Result<ItemRecord, InventoryError> {
        principal.require_admin()?;
        require_valid_id(id)?;

        let mut effects = FileEffects::default();
        let mut tx = self.store.begin(TxMode::Structural).await?;
        let result = delete_in_tx(tx.as_mut(), id, &mut effects).await;
        let removed = self.complete(tx, result, effects).await?;

        info!(
            admin_id = %principal.user_id,
            item_id = %removed.id,
            item_name = %removed.item_name,
            "Admin deleted inventory item"
        );
        Ok(removed)
    }

    /// Fold the quantity of `source_id` into `target_id`, delete the source
    /// and renumber.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, the ids are invalid,
    /// equal or unknown, or storage fails. On error nothing changes.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn merge(
        &self,
        principal: &Principal,
        source_id: ItemId,
        target_id: ItemId,
    ) -> Result<MergeOutcome, InventoryError> {
        principal.require_admin()?;
        if !source_id.is_valid() || !target_id.is_valid() {
            return Err(InventoryError::validation("Error: Invalid item IDs"));
        }
        if source_id == target_id {
            return Err(InventoryError::validation(
                "Error: Cannot merge item with itself",
            ));
        }

        let mut effects = FileEffects::default();
        let mut tx = self.store.begin(TxMode::Structural).await?;
        let result = merge_in_tx(tx.as_mut(), source_id, target_id, &mut effects).await;
        let outcome = self.complete(tx, result, effects).await?;

        info!(
            admin_id = %principal.user_id,
            source_id = %source_id,
            source_name = %outcome.source.item_name,
            target_id = %outcome.item.id,
            target_name = %outcome.item.item_name,
            quantity = outcome.item.quantity,
            "Admin merged inventory items"
        );
        Ok(outcome)
    }

    /// Remove every item after re-checking the caller's password.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, the password is empty
    /// or wrong, or storage fails.
    #[tracing::instrument(skip(self, password), fields(user = %principal.user_id))]
    pub async fn clear(
        &self,
        principal: &Principal,
        password: &str,
    ) -> Result<ClearOutcome, InventoryError> {
        principal.require_admin()?;
        if password.is_empty() {
            return Err(InventoryError::validation(
                "Error: Password is required to clear inventory",
            ));
        }
        if !self
            .identities
            .verify_password(principal.user_id, password)
            .await?
        {
            warn!(admin_id = %principal.user_id, "Inventory clear rejected: incorrect password");
            return Err(InventoryError::Authorization(
                "Error: Incorrect password".to_string(),
            ));
        }

        let mut effects = FileEffects::default();
        let mut tx = self.store.begin(TxMode::Structural).await?;
        let result = clear_in_tx(tx.as_mut(), &mut effects).await;
        let outcome = self.complete(tx, result, effects).await?;

        if let ClearOutcome::Cleared { deleted_count } = outcome {
            warn!(
                admin_id = %principal.user_id,
                deleted_count,
                "Admin cleared entire inventory"
            );
        }
        Ok(outcome)
    }

    /// A picture from the default library, which must exist.
    async fn resolve_default(&self, requested: &str) -> Result<ItemImage, InventoryError> {
        // Only the final path component names a library file.
        let name = requested
            .trim()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();
        if !is_plain_file_name(name) {
            return Err(ImageError::UnknownDefault(requested.to_string()).into());
        }
        let image = ItemImage::Default(name.to_string());
        if !self.images.contains(&image).await? {
            return Err(ImageError::UnknownDefault(name.to_string()).into());
        }
        Ok(image)
    }

    /// Validate and store an upload, remembering it in case the
    /// transaction does not commit.
    async fn stage_upload(
        &self,
        upload: ImageUpload,
        effects: &mut FileEffects,
    ) -> Result<ItemImage, InventoryError> {
        let validated = self.upload_rules.validate(upload)?;
        let image = self.images.store_upload(&validated).await?;
        effects.stage(&image);
        Ok(image)
    }
}

async fn delete_in_tx(
    tx: &mut dyn InventoryTx,
    id: ItemId,
    effects: &mut FileEffects,
) -> Result<ItemRecord, InventoryError> {
    let removed = tx.delete(id).await?.ok_or(InventoryError::NotFound("Item"))?;
    reindex(tx).await?;
    effects.discard_after_commit(removed.item_image.as_ref());
    Ok(removed)
}

async fn merge_in_tx(
    tx: &mut dyn InventoryTx,
    source_id: ItemId,
    target_id: ItemId,
    effects: &mut FileEffects,
) -> Result<MergeOutcome, InventoryError> {
    let source = tx
        .get(source_id)
        .await?
        .ok_or(InventoryError::NotFound("Source item"))?;
    let target = tx
        .get(target_id)
        .await?
        .ok_or(InventoryError::NotFound("Target item"))?;

    let combined = target.quantity.saturating_add(source.quantity);
    tx.set_quantity(target.id, combined)
        .await?
        .ok_or(InventoryError::NotFound("Target item"))?;
    tx.delete(source.id)
        .await?
        .ok_or(InventoryError::NotFound("Source item"))?;

    let plan = reindex(tx).await?;
    let surviving_id = plan.new_id_for(target.id).unwrap_or(target.id);
    let item = tx
        .get(surviving_id)
        .await?
        .ok_or(InventoryError::NotFound("Target item"))?;

    effects.discard_after_commit(source.item_image.as_ref());
    Ok(MergeOutcome { item, source })
}

async fn clear_in_tx(
    tx: &mut dyn InventoryTx,
    effects: &mut FileEffects,
) -> Result<ClearOutcome, InventoryError> {
    let removed = tx.delete_all().await?;
    if removed.is_empty() {
        return Ok(ClearOutcome::AlreadyEmpty);
    }
    tx.set_next_id(ItemId::FIRST).await?;
    for row in &removed {
        effects.discard_after_commit(row.item_image.as_ref());
    }
    Ok(ClearOutcome::Cleared {
        deleted_count: removed.len(),
    })
}
