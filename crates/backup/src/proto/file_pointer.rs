//! Attachment pointers as they appear in backup frames

use serde::{Deserialize, Serialize};

use super::bytes;

/// Everything a restoring client needs to render and fetch an attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePointer {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub blur_hash: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub locator: Locator,
}

impl FilePointer {
    pub fn new(locator: Locator) -> Self {
        Self {
            content_type: None,
            file_name: None,
            caption: None,
            blur_hash: None,
            width: None,
            height: None,
            locator,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Where the attachment bytes can be found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Locator {
    BackupLocator(BackupLocator),
    AttachmentLocator(AttachmentLocator),
    /// The exporting client had no usable location for the bytes
    InvalidAttachmentLocator,
}

/// Pointer into the backup media tier, optionally with the transit
/// upload it came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupLocator {
    #[serde(default)]
    pub media_name: String,
    #[serde(default)]
    pub cdn_number: Option<u32>,
    #[serde(default, with = "bytes")]
    pub key: Vec<u8>,
    #[serde(default, with = "bytes")]
    pub digest: Vec<u8>,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub transit_cdn_key: Option<String>,
    #[serde(default)]
    pub transit_cdn_number: Option<u32>,
}

/// Pointer into the message transit tier only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentLocator {
    #[serde(default)]
    pub cdn_key: String,
    #[serde(default)]
    pub cdn_number: u32,
    #[serde(default)]
    pub upload_timestamp: Option<u64>,
    #[serde(default, with = "bytes")]
    pub key: Vec<u8>,
    #[serde(default, with = "bytes")]
    pub digest: Vec<u8>,
    #[serde(default)]
    pub size: u32,
}
