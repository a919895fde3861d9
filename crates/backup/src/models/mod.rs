//! Local chat-history and attachment model
//!
//! These are the client-side shapes the archivers read at export time and
//! write at import time. Wire shapes live in [`crate::proto`].

mod attachment;
mod interaction;
mod recipient;
mod thread;

pub use attachment::{
    Attachment, AttachmentOwner, AttachmentOwnerId, AttachmentReference,
    AttachmentReferenceParams, AttachmentRowId, DownloadPriority, MediaTierInfo, NewAttachment,
    OrphanAttachmentRecord, OrphanRecordId, OwnerKind, QueuedAttachmentDownload, RenderingFlag,
    StreamInfo, TransitTierInfo,
};
pub use interaction::{
    DecryptionPlaceholder, InteractionKind, InteractionRecord, InteractionRowId, LegacyUpdate,
    OutgoingMessage, OutgoingSendStatus, PhoneNumberChange, QuotedAttachmentInfo, QuotedReply,
    RecipientSendState, VerificationState, VerificationStateDetails,
};
pub use recipient::{ContactAddress, DistributionListId, GroupId, RecipientAddress};
pub use thread::{ThreadId, ThreadKind, ThreadRecord};
