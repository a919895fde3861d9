//! Store contract used by the archivers and the attachment manager
//!
//! Every method runs inside the ambient transaction of the store binding
//! that produced the handle. None of them open transactions of their own.

use anyhow::Result;
use thiserror::Error;

use crate::models::{
    Attachment, AttachmentOwner, AttachmentOwnerId, AttachmentReference,
    AttachmentReferenceParams, AttachmentRowId, DownloadPriority, InteractionRecord,
    InteractionRowId, NewAttachment, OrphanAttachmentRecord, OrphanRecordId,
    QueuedAttachmentDownload, ThreadId,
};

/// Chat history rows
pub trait InteractionStore {
    /// Insert a record, returning its new row id
    fn insert_interaction(&self, record: &InteractionRecord) -> Result<InteractionRowId>;

    fn fetch_interaction(&self, row_id: InteractionRowId) -> Result<Option<InteractionRecord>>;

    /// First interaction in `thread_id` sent at exactly `timestamp`
    fn find_interaction_by_timestamp(
        &self,
        thread_id: ThreadId,
        timestamp: u64,
    ) -> Result<Option<InteractionRecord>>;

    /// All interactions of a thread, ordered by timestamp then row id
    fn list_interactions(&self, thread_id: ThreadId) -> Result<Vec<InteractionRecord>>;
}

/// Failure to insert a new attachment row
#[derive(Debug, Error)]
pub enum AttachmentInsertError {
    /// Another row already holds this plaintext hash
    #[error("an attachment with the same plaintext hash already exists (row {})", existing.0)]
    DuplicatePlaintextHash { existing: AttachmentRowId },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Attachment rows and owner references
pub trait AttachmentStore {
    fn fetch_attachment(&self, id: AttachmentRowId) -> Result<Option<Attachment>>;

    /// All references held by any of `owners`, ordered by owner then slot
    fn fetch_references(&self, owners: &[AttachmentOwnerId]) -> Result<Vec<AttachmentReference>>;

    /// Insert a new attachment together with its first reference
    ///
    /// Fails with [`AttachmentInsertError::DuplicatePlaintextHash`] when the
    /// content hash is already present; nothing is written in that case.
    fn insert_attachment(
        &self,
        attachment: &NewAttachment,
        reference: &AttachmentReferenceParams,
    ) -> std::result::Result<AttachmentRowId, AttachmentInsertError>;

    /// Add a reference to an existing attachment
    fn add_owner(
        &self,
        reference: &AttachmentReferenceParams,
        attachment_id: AttachmentRowId,
    ) -> Result<()>;

    /// Remove one reference; the attachment row goes with its last reference
    fn remove_owner(&self, owner: &AttachmentOwner, attachment_id: AttachmentRowId) -> Result<()>;

    fn fetch_attachment_by_content_hash(&self, sha256_content_hash: &[u8])
    -> Result<Option<Attachment>>;

    /// Attachment a quote of `message_row_id` should show: the first visual
    /// media body attachment of that message
    fn attachment_to_use_in_quote(
        &self,
        message_row_id: InteractionRowId,
    ) -> Result<Option<(AttachmentReference, Attachment)>>;

    fn count_attachments(&self) -> Result<usize>;
}

/// Markers for locally written files that nothing owns yet
pub trait OrphanAttachmentStore {
    fn insert_orphan(&self, local_relative_path: &str) -> Result<OrphanRecordId>;

    fn orphan_exists(&self, id: OrphanRecordId) -> Result<bool>;

    /// Delete the marker; the file is owned from now on
    fn release_orphan(&self, id: OrphanRecordId) -> Result<()>;

    fn list_orphans(&self) -> Result<Vec<OrphanAttachmentRecord>>;
}

/// Queue consumed by the external attachment downloader
pub trait BackupAttachmentDownloadStore {
    fn enqueue_download(
        &self,
        attachment_row_id: AttachmentRowId,
        owner: AttachmentOwnerId,
        priority: DownloadPriority,
        is_thumbnail_clone: bool,
    ) -> Result<()>;

    fn list_queued_downloads(&self) -> Result<Vec<QueuedAttachmentDownload>>;
}

/// Everything available inside one store transaction
pub trait BackupTransaction:
    InteractionStore + AttachmentStore + OrphanAttachmentStore + BackupAttachmentDownloadStore
{
}

impl<T> BackupTransaction for T where
    T: InteractionStore
        + AttachmentStore
        + OrphanAttachmentStore
        + BackupAttachmentDownloadStore
        + ?Sized
{
}

/// A store that hands out transactions
pub trait BackupStore: Send + Sync {
    /// Run `f` in a write transaction, committed only if `f` returns `Ok`
    fn write<T>(&self, f: impl FnOnce(&dyn BackupTransaction) -> Result<T>) -> Result<T>
    where
        Self: Sized;

    /// Run `f` against a read-only view
    fn read<T>(&self, f: impl FnOnce(&dyn BackupTransaction) -> Result<T>) -> Result<T>
    where
        Self: Sized;
}
