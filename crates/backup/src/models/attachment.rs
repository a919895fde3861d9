//! Attachment rows, owner references, orphan markers and download queue rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local row id of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachmentRowId(pub i64);

/// Upload location on the short-lived message-transit CDN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitTierInfo {
    pub cdn_key: String,
    pub cdn_number: u32,
    pub upload_timestamp: u64,
    pub digest: Vec<u8>,
    pub unencrypted_byte_count: Option<u32>,
}

/// Location on the long-term backup media tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTierInfo {
    /// `None` until the cdn number is discovered
    pub cdn_number: Option<u32>,
    pub digest: Vec<u8>,
    pub unencrypted_byte_count: u32,
}

/// Local file information, present once the bytes exist on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// SHA-256 of the plaintext; the content address
    pub sha256_content_hash: Vec<u8>,
    /// SHA-256 of the stored bytes
    pub digest: Vec<u8>,
    pub encrypted_byte_count: u32,
    pub unencrypted_byte_count: u32,
    /// Path relative to the attachments directory
    pub local_relative_path: String,
}

/// Everything about an attachment except its row id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub mime_type: String,
    pub blur_hash: Option<String>,
    pub encryption_key: Vec<u8>,
    /// Plaintext hash, known for local streams
    pub sha256_content_hash: Option<Vec<u8>>,
    /// Backup media name, known for backup-restored attachments
    pub media_name: Option<String>,
    pub transit_tier: Option<TransitTierInfo>,
    pub media_tier: Option<MediaTierInfo>,
    pub stream: Option<StreamInfo>,
    /// For quoted-reply thumbnails: the attachment the thumbnail is
    /// derived from once it is downloaded
    pub original_attachment_id_for_quoted_reply: Option<AttachmentRowId>,
}

impl NewAttachment {
    /// An attachment with no remote or local location yet
    pub fn blank(mime_type: impl Into<String>, encryption_key: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            blur_hash: None,
            encryption_key,
            sha256_content_hash: None,
            media_name: None,
            transit_tier: None,
            media_tier: None,
            stream: None,
            original_attachment_id_for_quoted_reply: None,
        }
    }

    pub fn with_id(self, id: AttachmentRowId) -> Attachment {
        Attachment {
            id,
            mime_type: self.mime_type,
            blur_hash: self.blur_hash,
            encryption_key: self.encryption_key,
            sha256_content_hash: self.sha256_content_hash,
            media_name: self.media_name,
            transit_tier: self.transit_tier,
            media_tier: self.media_tier,
            stream: self.stream,
            original_attachment_id_for_quoted_reply: self.original_attachment_id_for_quoted_reply,
        }
    }
}

/// A content-addressed binary object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentRowId,
    pub mime_type: String,
    pub blur_hash: Option<String>,
    pub encryption_key: Vec<u8>,
    pub sha256_content_hash: Option<Vec<u8>>,
    pub media_name: Option<String>,
    pub transit_tier: Option<TransitTierInfo>,
    pub media_tier: Option<MediaTierInfo>,
    pub stream: Option<StreamInfo>,
    pub original_attachment_id_for_quoted_reply: Option<AttachmentRowId>,
}

impl Attachment {
    /// Whether the bytes are available locally
    pub fn is_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the mime type is an image or video
    pub fn is_visual_media(&self) -> bool {
        self.mime_type.starts_with("image/") || self.mime_type.starts_with("video/")
    }
}

/// The slot that references an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    MessageBody,
    MessageOversizeText,
    QuotedReplyThumbnail,
    LinkPreview,
    ContactAvatar,
    Sticker,
}

impl OwnerKind {
    /// Only message bodies may have more than one attachment
    pub fn allows_multiple(&self) -> bool {
        matches!(self, OwnerKind::MessageBody)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::MessageBody => "message_body",
            OwnerKind::MessageOversizeText => "message_oversize_text",
            OwnerKind::QuotedReplyThumbnail => "quoted_reply_thumbnail",
            OwnerKind::LinkPreview => "link_preview",
            OwnerKind::ContactAvatar => "contact_avatar",
            OwnerKind::Sticker => "sticker",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "message_body" => Some(OwnerKind::MessageBody),
            "message_oversize_text" => Some(OwnerKind::MessageOversizeText),
            "quoted_reply_thumbnail" => Some(OwnerKind::QuotedReplyThumbnail),
            "link_preview" => Some(OwnerKind::LinkPreview),
            "contact_avatar" => Some(OwnerKind::ContactAvatar),
            "sticker" => Some(OwnerKind::Sticker),
            _ => None,
        }
    }
}

/// Identifies an owner without the slot position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachmentOwnerId {
    pub kind: OwnerKind,
    /// Row id of the owning object (message row id for message owners)
    pub owner_row_id: i64,
}

impl AttachmentOwnerId {
    pub fn new(kind: OwnerKind, owner_row_id: i64) -> Self {
        Self { kind, owner_row_id }
    }
}

/// Full owner slot: (kind, owner, position)
///
/// `(kind, owner_row_id, order_in_owner)` is unique across references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachmentOwner {
    pub id: AttachmentOwnerId,
    /// Sibling position, only for message body owners
    pub order_in_owner: Option<u32>,
}

impl AttachmentOwner {
    pub fn single(kind: OwnerKind, owner_row_id: i64) -> Self {
        Self {
            id: AttachmentOwnerId::new(kind, owner_row_id),
            order_in_owner: None,
        }
    }

    pub fn body(message_row_id: i64, order_in_owner: u32) -> Self {
        Self {
            id: AttachmentOwnerId::new(OwnerKind::MessageBody, message_row_id),
            order_in_owner: Some(order_in_owner),
        }
    }
}

/// Per-owner rendering hint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingFlag {
    #[default]
    Default,
    VoiceMessage,
    Borderless,
    ShouldLoop,
}

impl RenderingFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderingFlag::Default => "default",
            RenderingFlag::VoiceMessage => "voice_message",
            RenderingFlag::Borderless => "borderless",
            RenderingFlag::ShouldLoop => "should_loop",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "voice_message" => RenderingFlag::VoiceMessage,
            "borderless" => RenderingFlag::Borderless,
            "should_loop" => RenderingFlag::ShouldLoop,
            _ => RenderingFlag::Default,
        }
    }
}

/// Owner-side data of a reference, before it is bound to an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReferenceParams {
    pub owner: AttachmentOwner,
    pub rendering_flag: RenderingFlag,
    pub client_uuid: Option<Uuid>,
    pub source_filename: Option<String>,
    pub source_unencrypted_byte_count: Option<u32>,
    /// (width, height) in pixels
    pub source_media_size_pixels: Option<(u32, u32)>,
    pub caption: Option<String>,
}

impl AttachmentReferenceParams {
    pub fn new(owner: AttachmentOwner) -> Self {
        Self {
            owner,
            rendering_flag: RenderingFlag::Default,
            client_uuid: None,
            source_filename: None,
            source_unencrypted_byte_count: None,
            source_media_size_pixels: None,
            caption: None,
        }
    }

    pub fn bind(self, attachment_row_id: AttachmentRowId) -> AttachmentReference {
        AttachmentReference {
            attachment_row_id,
            owner: self.owner,
            rendering_flag: self.rendering_flag,
            client_uuid: self.client_uuid,
            source_filename: self.source_filename,
            source_unencrypted_byte_count: self.source_unencrypted_byte_count,
            source_media_size_pixels: self.source_media_size_pixels,
            caption: self.caption,
        }
    }
}

/// Many-to-one link from an owner slot to an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReference {
    pub attachment_row_id: AttachmentRowId,
    pub owner: AttachmentOwner,
    pub rendering_flag: RenderingFlag,
    pub client_uuid: Option<Uuid>,
    pub source_filename: Option<String>,
    pub source_unencrypted_byte_count: Option<u32>,
    pub source_media_size_pixels: Option<(u32, u32)>,
    pub caption: Option<String>,
}

/// Local row id of an orphan marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrphanRecordId(pub i64);

/// Marks a locally written file that no reference owns yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanAttachmentRecord {
    pub id: OrphanRecordId,
    pub local_relative_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPriority {
    Default,
    High,
}

impl DownloadPriority {
    pub fn as_i64(&self) -> i64 {
        match self {
            DownloadPriority::Default => 0,
            DownloadPriority::High => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value > 0 {
            DownloadPriority::High
        } else {
            DownloadPriority::Default
        }
    }
}

/// A download handed to the external downloader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAttachmentDownload {
    pub attachment_row_id: AttachmentRowId,
    pub owner: AttachmentOwnerId,
    pub priority: DownloadPriority,
    /// Clone the original's bytes into a quoted-reply thumbnail instead of
    /// fetching from a CDN
    pub is_thumbnail_clone: bool,
    pub enqueued_at: DateTime<Utc>,
}
