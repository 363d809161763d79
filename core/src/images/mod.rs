//! Item pictures: upload validation and the picture libraries.
//!
//! The default library is a curated, read-only set of pictures; the
//! upload library holds files administrators attached to individual items.
//! Files are only ever removed from the upload library, and only after the
//! transaction that detached them has committed.

mod display_name;
mod fs;

pub use display_name::{ABBREVIATIONS, display_name};
pub use fs::FsImageLibrary;

use crate::types::{ItemImage, is_plain_file_name};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Upload size limit applied when nothing else is configured (2 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Placeholder shown for items without a picture. Never offered as a choice.
pub const PLACEHOLDER_IMAGE: &str = "no-item.webp";

/// Errors raised while validating or storing pictures.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The upload is larger than allowed.
    #[error("Error: File size exceeds {}MB limit", .max_bytes / (1024 * 1024))]
    TooLarge {
        /// Size of the rejected upload.
        size: usize,
        /// Configured limit.
        max_bytes: usize,
    },

    /// The upload is not one of the accepted picture types.
    #[error("Error: Invalid file type. Allowed: JPG, PNG, GIF, WEBP")]
    UnsupportedType(String),

    /// The upload contained no data.
    #[error("Error: Uploaded image is empty")]
    Empty,

    /// The requested default picture is not in the library.
    #[error("Error: Unknown default image '{0}'")]
    UnknownDefault(String),

    /// Reading or writing the library failed.
    #[error("Image I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed future returned by [`ImageLibrary`].
pub type ImageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ImageError>> + Send + 'a>>;

/// Accepted picture types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/gif`
    Gif,
    /// `image/webp`
    Webp,
}

impl ImageKind {
    /// Recognise a MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect the type from the leading bytes of the file.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    /// File extension used for stored uploads.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// A picture received from a client, not yet stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    /// File name supplied by the client.
    pub file_name: String,
    /// MIME type supplied by the client.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// An upload that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedUpload {
    kind: ImageKind,
    bytes: Vec<u8>,
}

impl ValidatedUpload {
    /// Detected picture type.
    #[must_use]
    pub const fn kind(&self) -> ImageKind {
        self.kind
    }

    /// File contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Limits applied to uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadRules {
    /// Largest accepted upload in bytes.
    pub max_bytes: usize,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadRules {
    /// Check size and type of an upload.
    ///
    /// The type is taken from the file contents; a client-declared MIME
    /// type is only used when the contents are not recognised, and even
    /// then it must be one of the accepted types.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Empty`], [`ImageError::TooLarge`] or
    /// [`ImageError::UnsupportedType`].
    pub fn validate(&self, upload: ImageUpload) -> Result<ValidatedUpload, ImageError> {
        if upload.bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                size: upload.bytes.len(),
                max_bytes: self.max_bytes,
            });
        }

        let declared = upload.content_type.as_deref().and_then(ImageKind::from_mime);
        let kind = ImageKind::sniff(&upload.bytes).or(declared).ok_or_else(|| {
            ImageError::UnsupportedType(
                upload
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            )
        })?;

        Ok(ValidatedUpload {
            kind,
            bytes: upload.bytes,
        })
    }
}

/// An entry of the default picture catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultImage {
    /// File name inside the library.
    pub name: String,
    /// Public path.
    pub path: String,
    /// Generated human-readable name.
    pub display_name: String,
}

impl DefaultImage {
    /// Catalogue entry for a library file.
    #[must_use]
    pub fn for_file(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: ItemImage::Default(name.to_string()).path(),
            display_name: display_name(name),
        }
    }
}

/// Whether a directory entry belongs in the default catalogue.
#[must_use]
pub fn is_catalogue_file(name: &str) -> bool {
    if name == PLACEHOLDER_IMAGE || !is_plain_file_name(name) {
        return false;
    }
    name.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty()
            && ["webp", "png", "jpg", "jpeg", "gif"]
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    })
}

/// Storage for item pictures.
pub trait ImageLibrary: Send + Sync {
    /// The default catalogue, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be listed.
    fn default_images(&self) -> ImageFuture<'_, Vec<DefaultImage>>;

    /// Whether `image` exists in its library.
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be inspected.
    fn contains<'a>(&'a self, image: &'a ItemImage) -> ImageFuture<'a, bool>;

    /// Store an upload under a fresh unique name.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    fn store_upload<'a>(&'a self, upload: &'a ValidatedUpload) -> ImageFuture<'a, ItemImage>;

    /// Remove an uploaded picture. Default pictures are never removed;
    /// missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be removed.
    fn remove_upload<'a>(&'a self, image: &'a ItemImage) -> ImageFuture<'a, ()>;
}
