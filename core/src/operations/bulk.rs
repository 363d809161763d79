//! Import and export.

use super::{InventoryService, finish};
use crate::error::InventoryError;
use crate::identity::Principal;
use crate::resolver::{self, Reconciliation};
use crate::store::{InventoryTx, TxMode};
use crate::transfer::{ExportFile, ExportFormat, ImportCandidate, ImportFile, ImportReport, parse_import};
use crate::types::{ItemImage, NewItem};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowOutcome {
    Added,
    Updated,
}

impl RowOutcome {
    const fn verb(self) -> &'static str {
        match self {
            Self::Added => "add",
            Self::Updated => "update",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
        }
    }
}

impl InventoryService {
    /// Serialise every item.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, storage fails, or
    /// serialisation fails.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn export(
        &self,
        principal: &Principal,
        format: ExportFormat,
    ) -> Result<ExportFile, InventoryError> {
        principal.require_admin()?;

        let rows = self.snapshot().await?;
        let file = ExportFile::build(format, &rows, self.clock.now())?;

        info!(
            admin_id = %principal.user_id,
            format = format.extension(),
            rows = rows.len(),
            "Admin exported inventory"
        );
        Ok(file)
    }

    /// Import a CSV or JSON file.
    ///
    /// Every row is stored in its own transaction with the same
    /// accumulation policy as [`InventoryService::add`]. Rows that fail are
    /// counted and reported; they never abort the import.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is not an admin, or the file is not a
    /// supported format, cannot be parsed, or contains no valid rows.
    #[tracing::instrument(skip(self, file), fields(user = %principal.user_id, file = %file.file_name))]
    pub async fn import(
        &self,
        principal: &Principal,
        file: ImportFile,
    ) -> Result<ImportReport, InventoryError> {
        principal.require_admin()?;
        let (format, candidates) = parse_import(&file)?;

        let mut report = ImportReport {
            total: candidates.len(),
            ..ImportReport::default()
        };

        for candidate in &candidates {
            let item = self.import_item(candidate).await;
            let mut attempted = RowOutcome::Added;
            match self.store_import_row(&item, &mut attempted).await {
                Ok(RowOutcome::Added) => report.added += 1,
                Ok(RowOutcome::Updated) => report.updated += 1,
                Err(error) => {
                    warn!(
                        item_name = %item.item_name,
                        attempted = attempted.verb(),
                        error = %error,
                        "Import row failed"
                    );
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("Failed to {}: {}", attempted.verb(), item.item_name));
                    metrics::counter!("inventory_import_rows_total", "result" => "failed")
                        .increment(1);
                    continue;
                }
            }
            metrics::counter!("inventory_import_rows_total", "result" => attempted.label())
                .increment(1);
        }

        info!(
            admin_id = %principal.user_id,
            format = format.label(),
            added = report.added,
            updated = report.updated,
            failed = report.failed,
            "Admin imported inventory data"
        );
        Ok(report)
    }

    /// Normalise a candidate: trimmed text, no negative quantity, and only
    /// pictures that exist in one of the libraries.
    async fn import_item(&self, candidate: &ImportCandidate) -> NewItem {
        let mut item_image = candidate
            .item_image
            .as_deref()
            .and_then(ItemImage::from_path);
        if let Some(image) = &item_image {
            let known = match self.images.contains(image).await {
                Ok(known) => known,
                Err(e) => {
                    warn!(path = %image, error = %e, "Failed to check import image");
                    false
                }
            };
            if !known {
                debug!(path = %image, "Dropping unknown image from import row");
                item_image = None;
            }
        }

        NewItem {
            item_name: candidate.item_name.trim().to_string(),
            category: candidate.category.trim().to_string(),
            quantity: candidate.quantity.max(0),
            item_image,
        }
    }

    async fn store_import_row(
        &self,
        item: &NewItem,
        attempted: &mut RowOutcome,
    ) -> Result<RowOutcome, InventoryError> {
        if item.item_name.is_empty() {
            return Err(InventoryError::validation("Warning: Item name is required"));
        }
        let mut tx = self.store.begin(TxMode::Shared).await?;
        let result = accumulate_or_insert(tx.as_mut(), item, attempted).await;
        finish(tx, result).await
    }
}

async fn accumulate_or_insert(
    tx: &mut dyn InventoryTx,
    item: &NewItem,
    attempted: &mut RowOutcome,
) -> Result<RowOutcome, InventoryError> {
    let duplicate = resolver::find_duplicate(tx, &item.item_name, &item.category, None).await?;
    match resolver::reconcile(duplicate, item.quantity) {
        Reconciliation::Accumulate { existing, quantity } => {
            *attempted = RowOutcome::Updated;
            tx.set_quantity(existing.id, quantity)
                .await?
                .ok_or(InventoryError::NotFound("Item"))?;
            Ok(RowOutcome::Updated)
        }
        Reconciliation::Insert => {
            tx.insert(item).await?;
            Ok(RowOutcome::Added)
        }
    }
}
