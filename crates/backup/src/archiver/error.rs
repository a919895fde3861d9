//! Per-frame error taxonomy

use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::attachments::{AttachmentCreationError, OwnerContractError};
use crate::proto::{ChatId, RecipientId};

/// Identifies the record an error belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// A local interaction being exported
    Interaction { unique_id: String },
    /// A wire chat item being restored
    ChatItem { chat_id: ChatId, date_sent: u64 },
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Interaction { unique_id } => write!(f, "interaction {}", unique_id),
            RecordId::ChatItem { chat_id, date_sent } => {
                write!(f, "chat item {}@{}", chat_id, date_sent)
            }
        }
    }
}

/// Broad class of an [`ErrorKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A referenced recipient, chat or thread cannot be resolved
    MissingCrossReference,
    /// The record exists but has the wrong shape for the operation
    WrongRecordShape,
    /// Dispatch reached an archiver that cannot handle this record
    Unsupported,
    /// The wire data itself is invalid
    Validation,
    /// Attachment pointers or downloads
    Attachment,
    /// The store refused a write or read
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("recipient id {0} is not in the backup")]
    RecipientIdNotFound(RecipientId),

    #[error("no recipient id for {0}")]
    RecipientAddressNotFound(String),

    #[error("thread {0} not found")]
    ThreadNotFound(i64),

    #[error("chat id {0} is not in the backup")]
    ChatIdNotFound(ChatId),

    #[error("update requires a 1:1 contact thread")]
    ExpectedContactThread,

    #[error("update author must be a contact, found {0}")]
    AuthorNotContact(&'static str),

    #[error("verification state change is missing its details")]
    MissingVerificationStateDetails,

    #[error("phone number change is missing the contact's aci")]
    PhoneNumberChangeMissingAci,

    #[error("send status recipient must be a contact, found {0}")]
    SendStatusRecipientNotContact(&'static str),

    #[error("quote author cannot be resolved")]
    QuoteAuthorNotFound,

    #[error("{0} is not a simple chat update")]
    NotASimpleChatUpdate(&'static str),

    #[error("expected a {expected} record, found {actual}")]
    WrongRecordShape {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("expected {expected} directional details, found {actual}")]
    WrongDirectionalDetails {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("expected a {expected} payload, found {actual}")]
    WrongPayloadShape {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("chat item type {0} cannot be restored")]
    UnsupportedChatItem(&'static str),

    #[error("unrecognized simple chat update type")]
    UnknownSimpleChatUpdateType,

    #[error("unrecognized delivery status for recipient {0}")]
    UnknownDeliveryStatus(RecipientId),

    #[error("invalid timestamp {0}")]
    InvalidTimestamp(u64),

    #[error("message has no body, attachments or quote")]
    EmptyMessage,

    #[error("message was already inserted")]
    DuplicateMessage,

    #[error("attachment: {0}")]
    Attachment(#[from] AttachmentCreationError),

    #[error("attachment owner contract violated: {0}")]
    AttachmentOwnerContract(#[from] OwnerContractError),

    #[error("attachment {attachment_id} could not be queued for download: {message}")]
    DownloadEnqueueFailed { attachment_id: i64, message: String },

    #[error("store error: {0}")]
    Database(String),
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::RecipientIdNotFound(_)
            | ErrorKind::RecipientAddressNotFound(_)
            | ErrorKind::ThreadNotFound(_)
            | ErrorKind::ChatIdNotFound(_)
            | ErrorKind::QuoteAuthorNotFound => ErrorCategory::MissingCrossReference,
            ErrorKind::ExpectedContactThread
            | ErrorKind::AuthorNotContact(_)
            | ErrorKind::MissingVerificationStateDetails
            | ErrorKind::PhoneNumberChangeMissingAci
            | ErrorKind::SendStatusRecipientNotContact(_) => ErrorCategory::WrongRecordShape,
            ErrorKind::NotASimpleChatUpdate(_)
            | ErrorKind::WrongRecordShape { .. }
            | ErrorKind::WrongDirectionalDetails { .. }
            | ErrorKind::WrongPayloadShape { .. }
            | ErrorKind::AttachmentOwnerContract(_) => ErrorCategory::Unsupported,
            ErrorKind::UnsupportedChatItem(_)
            | ErrorKind::UnknownSimpleChatUpdateType
            | ErrorKind::UnknownDeliveryStatus(_)
            | ErrorKind::InvalidTimestamp(_)
            | ErrorKind::EmptyMessage
            | ErrorKind::DuplicateMessage => ErrorCategory::Validation,
            ErrorKind::Attachment(_) | ErrorKind::DownloadEnqueueFailed { .. } => {
                ErrorCategory::Attachment
            }
            ErrorKind::Database(_) => ErrorCategory::Storage,
        }
    }

    /// Developer errors abort the whole job
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Unsupported
    }
}

/// A recoverable or fatal problem with a single frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({record_id}) at {location}")]
pub struct FrameError {
    pub kind: ErrorKind,
    pub record_id: RecordId,
    /// Where the error was raised
    pub location: &'static Location<'static>,
}

impl FrameError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>, record_id: RecordId) -> Self {
        Self {
            kind: kind.into(),
            record_id,
            location: Location::caller(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

/// A frame error that should have been statically impossible
///
/// Returned to the orchestrator, which must abort the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fatal developer error: {0}")]
pub struct FatalDeveloperError(pub FrameError);
