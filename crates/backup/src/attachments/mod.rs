//! Attachment pointers, local streams and their lifecycle

pub mod hashing;
mod manager;
mod orphans;
mod pointer;

pub use manager::{
    AttachmentBatchOutcome, AttachmentManager, AttachmentManagerError, AttachmentManagerOptions,
    AttachmentPointerFailure, EnqueueFailure, OVERSIZE_TEXT_MIME_TYPE, OwnedAttachmentPointer,
    OwnerContractError, PendingAttachment, StreamCreation,
};
pub use orphans::{OrphanReaper, ReapStats};
pub use pointer::{
    AttachmentCreationError, DEFAULT_CONTENT_TYPE, ValidatedLocation, ValidatedPointer,
    file_pointer_for, message_attachment_for, rendering_flag_from_wire, rendering_flag_to_wire,
    validate_file_pointer,
};
