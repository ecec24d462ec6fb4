use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A file to send as multipart form data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name reported to the service.
    pub file_name: String,
    /// MIME type of the contents.
    pub mime_type: String,
    /// Raw contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Create an attachment from in-memory contents; the MIME type is guessed from the name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Read an attachment from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::validation(
                    format!("{} has no usable file name", path.display()),
                    Some("path".to_string()),
                )
            })?;
        Ok(Self::new(file_name, bytes))
    }

    /// True when the MIME type is an image type.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// The service's answer to an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Whether the service accepted the upload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub success: Option<bool>,

    /// Human-readable status.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,

    /// Every other field the service sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadResponse {
    /// Where the service stored the upload, for use in a later streamed message.
    pub fn stored_path(&self) -> Option<&str> {
        ["file_path", "image_path", "path"]
            .iter()
            .find_map(|key| self.extra.get(*key).and_then(Value::as_str))
            .filter(|path| !path.is_empty())
    }
}
