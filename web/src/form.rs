//! Action parameters from multipart bodies and query strings.

use crate::error::ActionError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::collections::HashMap;
use stockroom_core::images::ImageUpload;
use stockroom_core::transfer::{ImportFile, parse_lenient_int};
use stockroom_core::types::ItemId;

/// A file part of a multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-side file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: Option<String>,
    /// Contents.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Treat the file as a picture upload.
    #[must_use]
    pub fn into_image(self) -> ImageUpload {
        ImageUpload {
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }

    /// Treat the file as an inventory import.
    #[must_use]
    pub fn into_import(self) -> ImportFile {
        ImportFile {
            file_name: self.file_name,
            bytes: self.bytes,
        }
    }
}

/// Text fields and files submitted with an action.
#[derive(Clone, Debug, Default)]
pub struct ActionForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl ActionForm {
    /// Form made of query parameters only.
    #[must_use]
    pub fn from_query(query: HashMap<String, String>) -> Self {
        Self {
            fields: query,
            files: HashMap::new(),
        }
    }

    /// Read every part of a multipart body.
    ///
    /// File inputs left empty by the browser are skipped, so they count as
    /// "no file".
    ///
    /// # Errors
    ///
    /// Returns 413 if the body exceeds the request limit and 400 for any
    /// other malformed body.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ActionError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Fill in parameters only present in the query string.
    #[must_use]
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        for (name, value) in query {
            self.fields.entry(name).or_insert(value);
        }
        self
    }

    /// A text parameter.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// A text parameter, or `""` when absent.
    #[must_use]
    pub fn text_or_empty(&self, name: &str) -> &str {
        self.text(name).unwrap_or_default()
    }

    /// An integer parameter read leniently; absent or garbled values are 0.
    #[must_use]
    pub fn int(&self, name: &str) -> i64 {
        self.text(name).map_or(0, parse_lenient_int)
    }

    /// An item id parameter. Absent or garbled values yield an invalid id
    /// that the service rejects.
    #[must_use]
    pub fn item_id(&self, name: &str) -> ItemId {
        ItemId::new(self.int(name))
    }

    /// Remove a file part.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> ActionError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ActionError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Error: File exceeds server upload limit",
            "PAYLOAD_TOO_LARGE",
        )
    } else {
        ActionError::bad_request(format!("Error: Malformed form data: {}", error.body_text()))
    }
}
