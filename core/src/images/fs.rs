//! Picture libraries on the local filesystem.

use super::{DefaultImage, ImageError, ImageFuture, ImageLibrary, ValidatedUpload, is_catalogue_file};
use crate::environment::Clock;
use crate::types::ItemImage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Attempts at finding an unused upload name before giving up.
const MAX_NAME_ATTEMPTS: usize = 4;

/// Libraries rooted at the web server's document root.
///
/// Default pictures live in `<root>/assets/res/material/`, uploads in
/// `<root>/assets/res/material/uploads/`, matching the public paths of
/// [`ItemImage`].
#[derive(Clone)]
pub struct FsImageLibrary {
    default_dir: PathBuf,
    upload_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsImageLibrary {
    /// Libraries below `document_root`.
    pub fn new(document_root: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        let default_dir = document_root.as_ref().join("assets/res/material");
        let upload_dir = default_dir.join("uploads");
        Self {
            default_dir,
            upload_dir,
            clock,
        }
    }

    /// Directory of the default library.
    #[must_use]
    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    /// Directory of the upload library.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn location(&self, image: &ItemImage) -> PathBuf {
        match image {
            ItemImage::Default(name) => self.default_dir.join(name),
            ItemImage::Uploaded(name) => self.upload_dir.join(name),
        }
    }

    fn fresh_upload_name(&self, upload: &ValidatedUpload) -> String {
        format!(
            "item_{}_{:016x}.{}",
            self.clock.now().timestamp(),
            rand::random::<u64>(),
            upload.kind().extension()
        )
    }
}

impl std::fmt::Debug for FsImageLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsImageLibrary")
            .field("default_dir", &self.default_dir)
            .field("upload_dir", &self.upload_dir)
            .finish_non_exhaustive()
    }
}

impl ImageLibrary for FsImageLibrary {
    fn default_images(&self) -> ImageFuture<'_, Vec<DefaultImage>> {
        Box::pin(async move {
            let mut entries = match tokio::fs::read_dir(&self.default_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut names = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if is_catalogue_file(name) {
                        names.push(name.to_string());
                    }
                }
            }
            names.sort();

            Ok(names.iter().map(|name| DefaultImage::for_file(name)).collect())
        })
    }

    fn contains<'a>(&'a self, image: &'a ItemImage) -> ImageFuture<'a, bool> {
        Box::pin(async move {
            match tokio::fs::metadata(self.location(image)).await {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn store_upload<'a>(&'a self, upload: &'a ValidatedUpload) -> ImageFuture<'a, ItemImage> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.upload_dir).await?;

            let mut last_error = None;
            for _ in 0..MAX_NAME_ATTEMPTS {
                let name = self.fresh_upload_name(upload);
                let path = self.upload_dir.join(&name);
                let file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await;
                match file {
                    Ok(mut file) => {
                        file.write_all(upload.bytes()).await?;
                        file.flush().await?;
                        debug!(file = %name, bytes = upload.bytes().len(), "Stored uploaded image");
                        return Ok(ItemImage::Uploaded(name));
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => last_error = Some(e),
                    Err(e) => return Err(e.into()),
                }
            }

            Err(ImageError::Io(last_error.unwrap_or_else(|| {
                std::io::Error::new(ErrorKind::AlreadyExists, "no unused upload name")
            })))
        })
    }

    fn remove_upload<'a>(&'a self, image: &'a ItemImage) -> ImageFuture<'a, ()> {
        Box::pin(async move {
            if !image.is_uploaded() {
                return Ok(());
            }
            match tokio::fs::remove_file(self.location(image)).await {
                Ok(()) => {
                    debug!(file = image.file_name(), "Removed uploaded image");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
