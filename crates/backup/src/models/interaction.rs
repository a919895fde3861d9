//! Interaction records: the rows that make up chat history

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContactAddress, RecipientAddress, ThreadId};

/// Local row id of an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InteractionRowId(pub i64);

/// One row of chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Row id, `None` until inserted
    pub row_id: Option<InteractionRowId>,
    /// Stable unique id
    pub unique_id: String,
    /// Thread this interaction belongs to
    pub thread_id: ThreadId,
    /// Sent timestamp (milliseconds since epoch)
    pub timestamp: u64,
    pub kind: InteractionKind,
}

impl InteractionRecord {
    /// Create a new, not yet inserted record with a fresh unique id
    pub fn new(thread_id: ThreadId, timestamp: u64, kind: InteractionKind) -> Self {
        Self {
            row_id: None,
            unique_id: Uuid::new_v4().to_string(),
            thread_id,
            timestamp,
            kind,
        }
    }

    pub fn with_row_id(mut self, row_id: InteractionRowId) -> Self {
        self.row_id = Some(row_id);
        self
    }
}

/// Type-specific payload of an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InteractionKind {
    /// Info or error message without message content
    Update(LegacyUpdate),
    /// Message sent by the local user
    Outgoing(OutgoingMessage),
}

/// Legacy info/error message kinds
///
/// Most of these map onto a single simple chat update on the wire. A few
/// are intentionally never archived, and a few belong to dedicated
/// archivers (group updates, timers, profile changes, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegacyUpdate {
    SessionEnded,
    UserJoinedSignal,
    UnsupportedMessage,
    ReportedSpam,
    /// Safety-number verification change; `details` is `None` when the row
    /// was stored without its verification subtype.
    VerificationStateChange {
        details: Option<VerificationStateDetails>,
    },
    PhoneNumberChange(PhoneNumberChange),
    PaymentsActivationRequest {
        sender: RecipientAddress,
    },
    PaymentsActivated {
        sender: RecipientAddress,
    },
    ReleaseChannelDonationRequest,
    NonBlockingIdentityChange {
        recipient: ContactAddress,
    },
    SessionRefresh,
    DecryptionFailure {
        sender: Option<ContactAddress>,
    },
    RecoverableDecryptionPlaceholder(DecryptionPlaceholder),

    // Legacy kinds that are dropped on export
    UserNotRegistered,
    AddToContactsOffer,
    AddUserToProfileWhitelistOffer,
    AddGroupToProfileWhitelistOffer,
    NoSession,
    WrongTrustedIdentityKey,
    InvalidKeyException,
    MissingKeyId,
    InvalidMessage,
    DuplicateMessage,
    InvalidVersion,
    GroupCreationFailed,
    UnknownContactBlockOffer,

    // Kinds owned by other archivers
    GroupUpdate,
    DisappearingMessagesConfiguration,
    ProfileChange,
    ThreadMerge,
    SessionSwitchover,
    LearnedProfileName,
}

impl LegacyUpdate {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LegacyUpdate::SessionEnded => "session_ended",
            LegacyUpdate::UserJoinedSignal => "user_joined_signal",
            LegacyUpdate::UnsupportedMessage => "unsupported_message",
            LegacyUpdate::ReportedSpam => "reported_spam",
            LegacyUpdate::VerificationStateChange { .. } => "verification_state_change",
            LegacyUpdate::PhoneNumberChange(_) => "phone_number_change",
            LegacyUpdate::PaymentsActivationRequest { .. } => "payments_activation_request",
            LegacyUpdate::PaymentsActivated { .. } => "payments_activated",
            LegacyUpdate::ReleaseChannelDonationRequest => "release_channel_donation_request",
            LegacyUpdate::NonBlockingIdentityChange { .. } => "non_blocking_identity_change",
            LegacyUpdate::SessionRefresh => "session_refresh",
            LegacyUpdate::DecryptionFailure { .. } => "decryption_failure",
            LegacyUpdate::RecoverableDecryptionPlaceholder(_) => "recoverable_decryption_placeholder",
            LegacyUpdate::UserNotRegistered => "user_not_registered",
            LegacyUpdate::AddToContactsOffer => "add_to_contacts_offer",
            LegacyUpdate::AddUserToProfileWhitelistOffer => "add_user_to_profile_whitelist_offer",
            LegacyUpdate::AddGroupToProfileWhitelistOffer => "add_group_to_profile_whitelist_offer",
            LegacyUpdate::NoSession => "no_session",
            LegacyUpdate::WrongTrustedIdentityKey => "wrong_trusted_identity_key",
            LegacyUpdate::InvalidKeyException => "invalid_key_exception",
            LegacyUpdate::MissingKeyId => "missing_key_id",
            LegacyUpdate::InvalidMessage => "invalid_message",
            LegacyUpdate::DuplicateMessage => "duplicate_message",
            LegacyUpdate::InvalidVersion => "invalid_version",
            LegacyUpdate::GroupCreationFailed => "group_creation_failed",
            LegacyUpdate::UnknownContactBlockOffer => "unknown_contact_block_offer",
            LegacyUpdate::GroupUpdate => "group_update",
            LegacyUpdate::DisappearingMessagesConfiguration => "disappearing_messages_configuration",
            LegacyUpdate::ProfileChange => "profile_change",
            LegacyUpdate::ThreadMerge => "thread_merge",
            LegacyUpdate::SessionSwitchover => "session_switchover",
            LegacyUpdate::LearnedProfileName => "learned_profile_name",
        }
    }
}

/// Verification state of a contact's safety number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Default,
    Verified,
    NoLongerVerified,
    DefaultAcknowledged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStateDetails {
    /// Contact whose safety number changed state
    pub recipient: ContactAddress,
    pub state: VerificationState,
    pub is_local_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumberChange {
    /// ACI of the contact that changed number
    pub aci: Option<Uuid>,
    pub old_number: Option<String>,
    pub new_number: Option<String>,
}

/// Placeholder shown while a failed decryption may still be recovered by
/// a resend from the sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptionPlaceholder {
    pub sender: ContactAddress,
    /// After this time (ms) the placeholder is treated as a plain failure
    pub expiration_timestamp: u64,
}

impl DecryptionPlaceholder {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expiration_timestamp
    }
}

/// Per-recipient send status of an outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutgoingSendStatus {
    Sending,
    Pending,
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientSendState {
    pub recipient: ContactAddress,
    pub status: OutgoingSendStatus,
    pub delivery_timestamp: Option<u64>,
    pub read_timestamp: Option<u64>,
    pub viewed_timestamp: Option<u64>,
    pub was_sent_by_sealed_sender: bool,
}

impl RecipientSendState {
    /// A state that was sent without any receipts yet
    pub fn sent(recipient: ContactAddress) -> Self {
        Self {
            recipient,
            status: OutgoingSendStatus::Sent,
            delivery_timestamp: None,
            read_timestamp: None,
            viewed_timestamp: None,
            was_sent_by_sealed_sender: false,
        }
    }
}

/// Metadata of the attachment a quote refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedAttachmentInfo {
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedReply {
    /// Sent timestamp of the original message, if known
    pub target_timestamp: Option<u64>,
    /// Contact or local user
    pub author: RecipientAddress,
    pub body: Option<String>,
    pub attachment: Option<QuotedAttachmentInfo>,
}

/// A message sent by the local user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub body: Option<String>,
    pub recipient_states: Vec<RecipientSendState>,
    pub quoted_reply: Option<QuotedReply>,
    pub expires_in_ms: Option<u64>,
    pub expire_started_at: Option<u64>,
    pub is_view_once: bool,
}

impl OutgoingMessage {
    /// Create a new message builder
    pub fn builder() -> OutgoingMessageBuilder {
        OutgoingMessageBuilder::default()
    }
}

/// Builder for creating OutgoingMessage instances
#[derive(Default)]
pub struct OutgoingMessageBuilder {
    body: Option<String>,
    recipient_states: Vec<RecipientSendState>,
    quoted_reply: Option<QuotedReply>,
    expires_in_ms: Option<u64>,
    expire_started_at: Option<u64>,
    is_view_once: bool,
}

impl OutgoingMessageBuilder {
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn recipient_state(mut self, state: RecipientSendState) -> Self {
        self.recipient_states.push(state);
        self
    }

    pub fn quoted_reply(mut self, quoted_reply: QuotedReply) -> Self {
        self.quoted_reply = Some(quoted_reply);
        self
    }

    pub fn expires_in_ms(mut self, expires_in_ms: u64) -> Self {
        self.expires_in_ms = Some(expires_in_ms);
        self
    }

    pub fn expire_started_at(mut self, expire_started_at: u64) -> Self {
        self.expire_started_at = Some(expire_started_at);
        self
    }

    pub fn view_once(mut self, is_view_once: bool) -> Self {
        self.is_view_once = is_view_once;
        self
    }

    pub fn build(self) -> OutgoingMessage {
        OutgoingMessage {
            body: self.body,
            recipient_states: self.recipient_states,
            quoted_reply: self.quoted_reply,
            expires_in_ms: self.expires_in_ms,
            expire_started_at: self.expire_started_at,
            is_view_once: self.is_view_once,
        }
    }
}
