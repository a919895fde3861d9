//! Backup wire payload shapes
//!
//! These mirror the backup schema field by field. The outer container
//! (framing, compression, encryption) is handled by the caller; byte
//! fields serialize as base64 strings.

pub(crate) mod bytes;
mod file_pointer;

pub use file_pointer::{AttachmentLocator, BackupLocator, FilePointer, Locator};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Recipient id, stable within one backup file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat id, stable within one backup file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub u64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One backup frame for a single interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatItem {
    pub chat_id: ChatId,
    pub author_id: RecipientId,
    pub date_sent: u64,
    #[serde(default)]
    pub expire_start_date: Option<u64>,
    #[serde(default)]
    pub expires_in_ms: Option<u64>,
    pub directional_details: DirectionalDetails,
    pub item: ChatItemPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectionalDetails {
    Incoming(IncomingMessageDetails),
    Outgoing(OutgoingMessageDetails),
    Directionless,
}

impl DirectionalDetails {
    pub fn name(&self) -> &'static str {
        match self {
            DirectionalDetails::Incoming(_) => "incoming",
            DirectionalDetails::Outgoing(_) => "outgoing",
            DirectionalDetails::Directionless => "directionless",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessageDetails {
    pub date_received: u64,
    #[serde(default)]
    pub date_server_sent: Option<u64>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub sealed_sender: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessageDetails {
    #[serde(default)]
    pub send_statuses: Vec<SendStatus>,
}

/// Delivery state of an outgoing message for one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendStatus {
    pub recipient_id: RecipientId,
    pub delivery_status: DeliveryStatus,
    #[serde(default)]
    pub network_failure: bool,
    #[serde(default)]
    pub identity_key_mismatch: bool,
    #[serde(default)]
    pub sealed_sender: bool,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum DeliveryStatus {
    Unknown,
    Pending,
    Sent,
    Delivered,
    Read,
    Viewed,
    Failed,
    Skipped,
}

impl From<String> for DeliveryStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => DeliveryStatus::Pending,
            "SENT" => DeliveryStatus::Sent,
            "DELIVERED" => DeliveryStatus::Delivered,
            "READ" => DeliveryStatus::Read,
            "VIEWED" => DeliveryStatus::Viewed,
            "FAILED" => DeliveryStatus::Failed,
            "SKIPPED" => DeliveryStatus::Skipped,
            _ => DeliveryStatus::Unknown,
        }
    }
}

impl From<DeliveryStatus> for &'static str {
    fn from(value: DeliveryStatus) -> Self {
        match value {
            DeliveryStatus::Unknown => "UNKNOWN",
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Read => "READ",
            DeliveryStatus::Viewed => "VIEWED",
            DeliveryStatus::Failed => "FAILED",
            DeliveryStatus::Skipped => "SKIPPED",
        }
    }
}

/// The typed payload of a chat item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatItemPayload {
    StandardMessage(StandardMessage),
    UpdateMessage(ChatUpdateMessage),
}

impl ChatItemPayload {
    pub fn name(&self) -> &'static str {
        match self {
            ChatItemPayload::StandardMessage(_) => "standardMessage",
            ChatItemPayload::UpdateMessage(_) => "updateMessage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdateMessage {
    #[serde(rename = "type")]
    pub update_type: SimpleChatUpdateType,
}

/// Fixed set of simple (content-free) chat updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum SimpleChatUpdateType {
    /// Any value this client does not recognize
    Unknown,
    JoinedSignal,
    IdentityUpdate,
    IdentityVerified,
    IdentityDefault,
    ChangeNumber,
    ReleaseChannelDonationRequest,
    EndSession,
    ChatSessionRefresh,
    BadDecrypt,
    PaymentsActivated,
    PaymentActivationRequest,
    UnsupportedProtocolMessage,
    ReportedSpam,
}

impl SimpleChatUpdateType {
    /// Every recognized type
    pub const ALL: [SimpleChatUpdateType; 13] = [
        SimpleChatUpdateType::JoinedSignal,
        SimpleChatUpdateType::IdentityUpdate,
        SimpleChatUpdateType::IdentityVerified,
        SimpleChatUpdateType::IdentityDefault,
        SimpleChatUpdateType::ChangeNumber,
        SimpleChatUpdateType::ReleaseChannelDonationRequest,
        SimpleChatUpdateType::EndSession,
        SimpleChatUpdateType::ChatSessionRefresh,
        SimpleChatUpdateType::BadDecrypt,
        SimpleChatUpdateType::PaymentsActivated,
        SimpleChatUpdateType::PaymentActivationRequest,
        SimpleChatUpdateType::UnsupportedProtocolMessage,
        SimpleChatUpdateType::ReportedSpam,
    ];

    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

impl From<String> for SimpleChatUpdateType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "JOINED_SIGNAL" => SimpleChatUpdateType::JoinedSignal,
            "IDENTITY_UPDATE" => SimpleChatUpdateType::IdentityUpdate,
            "IDENTITY_VERIFIED" => SimpleChatUpdateType::IdentityVerified,
            "IDENTITY_DEFAULT" => SimpleChatUpdateType::IdentityDefault,
            "CHANGE_NUMBER" => SimpleChatUpdateType::ChangeNumber,
            "RELEASE_CHANNEL_DONATION_REQUEST" => {
                SimpleChatUpdateType::ReleaseChannelDonationRequest
            }
            "END_SESSION" => SimpleChatUpdateType::EndSession,
            "CHAT_SESSION_REFRESH" => SimpleChatUpdateType::ChatSessionRefresh,
            "BAD_DECRYPT" => SimpleChatUpdateType::BadDecrypt,
            "PAYMENTS_ACTIVATED" => SimpleChatUpdateType::PaymentsActivated,
            "PAYMENT_ACTIVATION_REQUEST" => SimpleChatUpdateType::PaymentActivationRequest,
            "UNSUPPORTED_PROTOCOL_MESSAGE" => SimpleChatUpdateType::UnsupportedProtocolMessage,
            "REPORTED_SPAM" => SimpleChatUpdateType::ReportedSpam,
            _ => SimpleChatUpdateType::Unknown,
        }
    }
}

impl From<SimpleChatUpdateType> for &'static str {
    fn from(value: SimpleChatUpdateType) -> Self {
        match value {
            SimpleChatUpdateType::Unknown => "UNKNOWN",
            SimpleChatUpdateType::JoinedSignal => "JOINED_SIGNAL",
            SimpleChatUpdateType::IdentityUpdate => "IDENTITY_UPDATE",
            SimpleChatUpdateType::IdentityVerified => "IDENTITY_VERIFIED",
            SimpleChatUpdateType::IdentityDefault => "IDENTITY_DEFAULT",
            SimpleChatUpdateType::ChangeNumber => "CHANGE_NUMBER",
            SimpleChatUpdateType::ReleaseChannelDonationRequest => {
                "RELEASE_CHANNEL_DONATION_REQUEST"
            }
            SimpleChatUpdateType::EndSession => "END_SESSION",
            SimpleChatUpdateType::ChatSessionRefresh => "CHAT_SESSION_REFRESH",
            SimpleChatUpdateType::BadDecrypt => "BAD_DECRYPT",
            SimpleChatUpdateType::PaymentsActivated => "PAYMENTS_ACTIVATED",
            SimpleChatUpdateType::PaymentActivationRequest => "PAYMENT_ACTIVATION_REQUEST",
            SimpleChatUpdateType::UnsupportedProtocolMessage => "UNSUPPORTED_PROTOCOL_MESSAGE",
            SimpleChatUpdateType::ReportedSpam => "REPORTED_SPAM",
        }
    }
}

/// A regular message with text and/or attachments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,
    #[serde(default)]
    pub quote: Option<Quote>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentFlag {
    #[default]
    None,
    VoiceMessage,
    Borderless,
    Gif,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachment {
    pub pointer: FilePointer,
    #[serde(default)]
    pub flag: AttachmentFlag,
    #[serde(default)]
    pub client_uuid: Option<Uuid>,
    #[serde(default)]
    pub was_downloaded: bool,
}

impl MessageAttachment {
    pub fn new(pointer: FilePointer) -> Self {
        Self {
            pointer,
            flag: AttachmentFlag::None,
            client_uuid: None,
            was_downloaded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub target_sent_timestamp: Option<u64>,
    pub author_id: RecipientId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<QuotedAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedAttachment {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<MessageAttachment>,
}
