//! The inventory service.
//!
//! [`InventoryService`] is the only writer of the inventory. Each operation
//! takes the calling [`Principal`], checks its role, and runs against the
//! store inside a single transaction. File removals are collected while the
//! transaction runs and performed only once it has committed.

mod bulk;
mod mutations;

pub use mutations::{
    AddImage, AddItem, AddOutcome, ClearOutcome, ItemFields, MergeOutcome, UpdateImage, UpdateItem,
    UpdateOutcome,
};

use crate::environment::Clock;
use crate::error::InventoryError;
use crate::identity::{IdentityDirectory, Principal};
use crate::images::{DefaultImage, ImageLibrary, UploadRules};
use crate::store::{InventoryStore, InventoryTx, TxMode};
use crate::types::{InventorySummary, ItemId, ItemImage, ItemRecord};
use std::sync::Arc;
use tracing::{debug, warn};

/// Every inventory row with the figures shown above the list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryListing {
    /// Rows ascending by id.
    pub items: Vec<ItemRecord>,
    /// Totals over `items`.
    pub summary: InventorySummary,
}

/// Inventory operations over injected storage, identities and pictures.
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    identities: Arc<dyn IdentityDirectory>,
    images: Arc<dyn ImageLibrary>,
    clock: Arc<dyn Clock>,
    upload_rules: UploadRules,
}

impl std::fmt::Debug for InventoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryService")
            .field("upload_rules", &self.upload_rules)
            .finish_non_exhaustive()
    }
}

impl InventoryService {
    /// Create a service with the default upload limits.
    pub fn new(
        store: Arc<dyn InventoryStore>,
        identities: Arc<dyn IdentityDirectory>,
        images: Arc<dyn ImageLibrary>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identities,
            images,
            clock,
            upload_rules: UploadRules::default(),
        }
    }

    /// Replace the upload limits.
    #[must_use]
    pub const fn with_upload_rules(mut self, upload_rules: UploadRules) -> Self {
        self.upload_rules = upload_rules;
        self
    }

    /// Limits applied to picture uploads.
    #[must_use]
    pub const fn upload_rules(&self) -> UploadRules {
        self.upload_rules
    }

    /// Fetch one item.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, the id is invalid or
    /// unknown, or storage fails.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn get(&self, principal: &Principal, id: ItemId) -> Result<ItemRecord, InventoryError> {
        principal.require_admin()?;
        require_valid_id(id)?;

        self.read_item(id)
            .await?
            .ok_or(InventoryError::NotFound("Item"))
    }

    /// Every item with availability totals. Open to members.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is a visitor or storage fails.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn list(&self, principal: &Principal) -> Result<InventoryListing, InventoryError> {
        principal.require_member()?;

        let items = self.snapshot().await?;
        let summary = InventorySummary::of(&items);
        Ok(InventoryListing { items, summary })
    }

    /// The default picture catalogue.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin or the library cannot be
    /// read.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn default_images(
        &self,
        principal: &Principal,
    ) -> Result<Vec<DefaultImage>, InventoryError> {
        principal.require_admin()?;
        Ok(self.images.default_images().await?)
    }

    /// Check that storage is reachable.
    ///
    /// # Errors
    ///
    /// Returns error if a transaction cannot be opened.
    pub async fn ping(&self) -> Result<(), InventoryError> {
        let tx = self.store.begin(TxMode::ReadOnly).await?;
        tx.rollback().await?;
        Ok(())
    }

    /// One row from a read-only transaction.
    pub(crate) async fn read_item(&self, id: ItemId) -> Result<Option<ItemRecord>, InventoryError> {
        let mut tx = self.store.begin(TxMode::ReadOnly).await?;
        let found = tx.get(id).await.map_err(InventoryError::from);
        finish(tx, found).await
    }

    /// All rows from a read-only transaction.
    async fn snapshot(&self) -> Result<Vec<ItemRecord>, InventoryError> {
        let mut tx = self.store.begin(TxMode::ReadOnly).await?;
        let rows = tx.list().await.map_err(InventoryError::from);
        finish(tx, rows).await
    }

    /// Resolve the outcome of a transaction together with its file effects.
    async fn complete<T>(
        &self,
        tx: Box<dyn InventoryTx>,
        result: Result<T, InventoryError>,
        effects: FileEffects,
    ) -> Result<T, InventoryError> {
        match finish(tx, result).await {
            Ok(value) => {
                effects.after_commit(self.images.as_ref()).await;
                Ok(value)
            }
            Err(error) => {
                effects.after_rollback(self.images.as_ref()).await;
                Err(error)
            }
        }
    }
}

pub(crate) fn require_valid_id(id: ItemId) -> Result<(), InventoryError> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(InventoryError::validation("Error: Invalid item ID"))
    }
}

/// Commit on success, roll back on failure.
pub(crate) async fn finish<T>(
    tx: Box<dyn InventoryTx>,
    result: Result<T, InventoryError>,
) -> Result<T, InventoryError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}

/// Picture files touched by a transaction.
///
/// `staged` uploads were written while the transaction ran and must go if
/// it does not commit. `obsolete` uploads were detached from their rows
/// and must go once it has committed.
#[derive(Debug, Default)]
#[must_use]
pub(crate) struct FileEffects {
    staged: Vec<ItemImage>,
    obsolete: Vec<ItemImage>,
}

impl FileEffects {
    fn stage(&mut self, image: &ItemImage) {
        self.staged.push(image.clone());
    }

    fn discard_after_commit(&mut self, image: Option<&ItemImage>) {
        if let Some(image) = image.filter(|image| image.is_uploaded()) {
            self.obsolete.push(image.clone());
        }
    }

    async fn after_commit(self, images: &dyn ImageLibrary) {
        remove_all(images, self.obsolete).await;
    }

    async fn after_rollback(self, images: &dyn ImageLibrary) {
        remove_all(images, self.staged).await;
    }
}

async fn remove_all(images: &dyn ImageLibrary, files: Vec<ItemImage>) {
    for image in files {
        match images.remove_upload(&image).await {
            Ok(()) => debug!(file = %image, "Removed image file"),
            Err(e) => warn!(file = %image, error = %e, "Failed to remove image file"),
        }
    }
}
