//! In-memory picture library.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use stockroom_core::images::{DefaultImage, ImageError, ImageFuture, ImageLibrary, ValidatedUpload};
use stockroom_core::types::ItemImage;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Files {
    defaults: BTreeSet<String>,
    uploads: HashMap<String, Vec<u8>>,
    removed: Vec<ItemImage>,
    sequence: u64,
    broken_lookups: bool,
}

/// Picture library that keeps everything in memory and records removals.
///
/// Uploads are named `upload_<n>.<ext>` in the order they are stored.
#[derive(Clone, Debug, Default)]
pub struct InMemoryImageLibrary {
    files: Arc<Mutex<Files>>,
}

impl InMemoryImageLibrary {
    /// Create a library with the given default pictures.
    #[must_use]
    pub fn with_defaults<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let library = Self::default();
        library
            .files
            .lock()
            .unwrap()
            .defaults
            .extend(names.into_iter().map(Into::into));
        library
    }

    /// Place an uploaded picture in the library as if stored earlier.
    pub fn seed_upload(&self, name: &str) -> ItemImage {
        self.files
            .lock()
            .unwrap()
            .uploads
            .insert(name.to_string(), Vec::new());
        ItemImage::Uploaded(name.to_string())
    }

    /// Make every later existence check fail with an I/O error.
    pub fn break_lookups(&self) {
        self.files.lock().unwrap().broken_lookups = true;
    }

    /// Names of uploads currently present, sorted.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().uploads.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every picture the service asked to remove, in order.
    #[must_use]
    pub fn removed(&self) -> Vec<ItemImage> {
        self.files.lock().unwrap().removed.clone()
    }
}

impl ImageLibrary for InMemoryImageLibrary {
    fn default_images(&self) -> ImageFuture<'_, Vec<DefaultImage>> {
        let images = self
            .files
            .lock()
            .unwrap()
            .defaults
            .iter()
            .map(|name| DefaultImage::for_file(name))
            .collect();
        Box::pin(async move { Ok(images) })
    }

    fn contains<'a>(&'a self, image: &'a ItemImage) -> ImageFuture<'a, bool> {
        let files = self.files.lock().unwrap();
        let found = if files.broken_lookups {
            Err(ImageError::Io(io::Error::other("library unavailable")))
        } else {
            Ok(match image {
                ItemImage::Default(name) => files.defaults.contains(name),
                ItemImage::Uploaded(name) => files.uploads.contains_key(name),
            })
        };
        drop(files);
        Box::pin(async move { found })
    }

    fn store_upload<'a>(&'a self, upload: &'a ValidatedUpload) -> ImageFuture<'a, ItemImage> {
        let mut files = self.files.lock().unwrap();
        files.sequence += 1;
        let name = format!("upload_{}.{}", files.sequence, upload.kind().extension());
        files.uploads.insert(name.clone(), upload.bytes().to_vec());
        drop(files);
        Box::pin(async move { Ok(ItemImage::Uploaded(name)) })
    }

    fn remove_upload<'a>(&'a self, image: &'a ItemImage) -> ImageFuture<'a, ()> {
        let mut files = self.files.lock().unwrap();
        if let ItemImage::Uploaded(name) = image {
            files.uploads.remove(name);
        }
        files.removed.push(image.clone());
        drop(files);
        Box::pin(async move { Ok(()) })
    }
}
