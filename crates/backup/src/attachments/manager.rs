//! Attachment creation, deduplication and download scheduling
//!
//! All methods take the caller's transaction; the manager never opens one
//! itself. The only exception is the orphan marker written by
//! [`AttachmentManager::write_pending_attachment`], which the caller must
//! commit separately before the owning transaction starts.

use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use uuid::Uuid;

use super::hashing;
use super::pointer::{AttachmentCreationError, validate_file_pointer};
use crate::config::BackupSettings;
use crate::models::{
    AttachmentOwner, AttachmentOwnerId, AttachmentReferenceParams, AttachmentRowId,
    DownloadPriority, InteractionRowId, NewAttachment, OrphanRecordId, OwnerKind,
    QuotedAttachmentInfo, RenderingFlag, StreamInfo,
};
use crate::proto::FilePointer;
use crate::storage::{AttachmentInsertError, BackupTransaction, BlobKey, BlobStore, FileBlobStore};

/// Mime type marking a body attachment that is really the message's long text
pub const OVERSIZE_TEXT_MIME_TYPE: &str = "text/x-signal-plain";

/// A caller asked for something no owner layout allows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnerContractError {
    #[error("owner {kind:?} {owner_row_id} got {count} attachments but holds at most one")]
    MultipleInputsForSingleOwner {
        kind: OwnerKind,
        owner_row_id: i64,
        count: usize,
    },
}

#[derive(Debug, Error)]
pub enum AttachmentManagerError {
    #[error(transparent)]
    OwnerContract(#[from] OwnerContractError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// One wire pointer to attach to an owner
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedAttachmentPointer {
    pub owner: AttachmentOwnerId,
    pub pointer: FilePointer,
    pub rendering_flag: RenderingFlag,
    pub client_uuid: Option<Uuid>,
}

impl OwnedAttachmentPointer {
    pub fn new(owner: AttachmentOwnerId, pointer: FilePointer) -> Self {
        Self {
            owner,
            pointer,
            rendering_flag: RenderingFlag::Default,
            client_uuid: None,
        }
    }
}

/// Pointer that failed validation, with the slot it was meant for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPointerFailure {
    pub owner: AttachmentOwner,
    pub error: AttachmentCreationError,
}

/// Attachment row that exists but could not be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueFailure {
    pub attachment_row_id: AttachmentRowId,
    pub message: String,
}

/// What a batch of pointer creations produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentBatchOutcome {
    pub created: Vec<(AttachmentOwner, AttachmentRowId)>,
    pub failures: Vec<AttachmentPointerFailure>,
    pub enqueue_failures: Vec<EnqueueFailure>,
}

impl AttachmentBatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.enqueue_failures.is_empty()
    }
}

/// A locally written file waiting for an owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub orphan_id: OrphanRecordId,
    pub local_relative_path: String,
    pub mime_type: String,
    pub sha256_content_hash: Vec<u8>,
    pub digest: Vec<u8>,
    pub encryption_key: Vec<u8>,
    pub encrypted_byte_count: u32,
    pub unencrypted_byte_count: u32,
    pub blur_hash: Option<String>,
}

/// How a pending attachment ended up owned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCreation {
    /// A new row was inserted and the orphan marker released
    Inserted(AttachmentRowId),
    /// The content already existed; the new reference points at that row
    /// and the pending file stays orphaned
    Deduplicated(AttachmentRowId),
}

impl StreamCreation {
    pub fn attachment_row_id(&self) -> AttachmentRowId {
        match self {
            StreamCreation::Inserted(id) | StreamCreation::Deduplicated(id) => *id,
        }
    }
}

/// Manager knobs taken from [`BackupSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentManagerOptions {
    pub enqueue_backup_downloads: bool,
    pub max_quote_thumbnail_dimension: u32,
}

impl Default for AttachmentManagerOptions {
    fn default() -> Self {
        Self {
            enqueue_backup_downloads: true,
            max_quote_thumbnail_dimension: 320,
        }
    }
}

impl From<&BackupSettings> for AttachmentManagerOptions {
    fn from(settings: &BackupSettings) -> Self {
        Self {
            enqueue_backup_downloads: settings.enqueue_backup_downloads,
            max_quote_thumbnail_dimension: settings.max_quote_thumbnail_dimension,
        }
    }
}

/// Creates attachment rows and references from wire pointers or local bytes
pub struct AttachmentManager {
    blob_store: Arc<dyn BlobStore>,
    options: AttachmentManagerOptions,
}

impl AttachmentManager {
    pub fn new(blob_store: Arc<dyn BlobStore>, options: AttachmentManagerOptions) -> Self {
        Self {
            blob_store,
            options,
        }
    }

    /// Manager over a file blob store at `settings.attachments_dir`
    pub fn from_settings(settings: &BackupSettings) -> Result<Self> {
        let blob_store = FileBlobStore::with_compression_level(
            &settings.attachments_dir,
            settings.blob_compression_level,
        )?;
        Ok(Self::new(Arc::new(blob_store), settings.into()))
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob_store
    }

    /// Create attachments and references for a batch of wire pointers
    ///
    /// Only message bodies may receive several pointers; any other owner
    /// with more than one input rejects the whole batch before anything is
    /// written. Pointers that fail validation are reported in the outcome
    /// and do not stop their siblings.
    pub fn create_attachment_pointers(
        &self,
        inputs: Vec<OwnedAttachmentPointer>,
        tx: &dyn BackupTransaction,
    ) -> Result<AttachmentBatchOutcome, AttachmentManagerError> {
        let groups = group_by_owner(inputs);
        for (owner, group) in &groups {
            if !owner.kind.allows_multiple() && group.len() > 1 {
                return Err(OwnerContractError::MultipleInputsForSingleOwner {
                    kind: owner.kind,
                    owner_row_id: owner.owner_row_id,
                    count: group.len(),
                }
                .into());
            }
        }

        let mut outcome = AttachmentBatchOutcome::default();
        for (owner, group) in groups {
            for (slot, input) in assign_owner_slots(owner, group) {
                self.create_one(slot, &input, tx, &mut outcome)?;
            }
        }
        Ok(outcome)
    }

    fn create_one(
        &self,
        owner: AttachmentOwner,
        input: &OwnedAttachmentPointer,
        tx: &dyn BackupTransaction,
        outcome: &mut AttachmentBatchOutcome,
    ) -> Result<(), AttachmentManagerError> {
        let validated = match validate_file_pointer(&input.pointer) {
            Ok(validated) => validated,
            Err(error) => {
                log::warn!(
                    "[ATTACH] Invalid pointer for {} {}: {}",
                    owner.id.kind.as_str(),
                    owner.id.owner_row_id,
                    error
                );
                outcome
                    .failures
                    .push(AttachmentPointerFailure { owner, error });
                return Ok(());
            }
        };

        let attachment = validated.new_attachment();
        let params = validated.reference_params(owner, input.rendering_flag, input.client_uuid);
        let id = self.insert_or_reuse(&attachment, &params, tx)?;
        outcome.created.push((owner, id));

        if self.is_download_eligible(&attachment) {
            self.enqueue(id, owner.id, DownloadPriority::Default, false, tx, outcome);
        }
        Ok(())
    }

    /// Insert, or attach to the existing row when the content hash is taken
    fn insert_or_reuse(
        &self,
        attachment: &NewAttachment,
        params: &AttachmentReferenceParams,
        tx: &dyn BackupTransaction,
    ) -> Result<AttachmentRowId> {
        match tx.insert_attachment(attachment, params) {
            Ok(id) => Ok(id),
            Err(AttachmentInsertError::DuplicatePlaintextHash { existing }) => {
                tx.add_owner(params, existing)?;
                Ok(existing)
            }
            Err(AttachmentInsertError::Other(err)) => Err(err),
        }
    }

    fn is_download_eligible(&self, attachment: &NewAttachment) -> bool {
        self.options.enqueue_backup_downloads
            && attachment.stream.is_none()
            && (attachment.transit_tier.is_some() || attachment.media_tier.is_some())
    }

    fn enqueue(
        &self,
        id: AttachmentRowId,
        owner: AttachmentOwnerId,
        priority: DownloadPriority,
        is_thumbnail_clone: bool,
        tx: &dyn BackupTransaction,
        outcome: &mut AttachmentBatchOutcome,
    ) {
        if let Err(err) = tx.enqueue_download(id, owner, priority, is_thumbnail_clone) {
            log::warn!("[ATTACH] Failed to enqueue attachment {}: {:#}", id.0, err);
            outcome.enqueue_failures.push(EnqueueFailure {
                attachment_row_id: id,
                message: format!("{:#}", err),
            });
        }
    }

    /// Write local bytes to the blob store and mark them as orphaned
    ///
    /// `orphans` should be a transaction that commits on its own, so the
    /// marker survives if the owning transaction later rolls back.
    pub fn write_pending_attachment(
        &self,
        data: &[u8],
        mime_type: &str,
        orphans: &dyn BackupTransaction,
    ) -> Result<PendingAttachment> {
        let key = BlobKey::generate();
        let orphan_id = orphans
            .insert_orphan(key.relative_path())
            .context("Failed to record orphan attachment")?;
        let stored = self
            .blob_store
            .put(&key, data)
            .with_context(|| format!("Failed to write attachment {}", key.relative_path()))?;

        log::debug!(
            "[ATTACH] Wrote pending attachment {} ({} bytes)",
            key.relative_path(),
            data.len()
        );

        Ok(PendingAttachment {
            orphan_id,
            local_relative_path: key.relative_path().to_string(),
            mime_type: mime_type.to_string(),
            sha256_content_hash: hashing::plaintext_hash(data),
            digest: stored.digest,
            encryption_key: hashing::generate_encryption_key(),
            encrypted_byte_count: u32::try_from(stored.stored_byte_count)
                .context("Attachment file too large")?,
            unencrypted_byte_count: u32::try_from(data.len()).context("Attachment too large")?,
            blur_hash: None,
        })
    }

    /// Give a pending attachment its first owner
    ///
    /// Content that already exists gets a new reference and keeps the
    /// pending file orphaned. A fresh insert releases the orphan marker in
    /// `tx`. Any other failure leaves the marker for the reaper.
    pub fn create_attachment_stream(
        &self,
        pending: &PendingAttachment,
        reference: AttachmentReferenceParams,
        tx: &dyn BackupTransaction,
    ) -> Result<StreamCreation, AttachmentManagerError> {
        if let Some(existing) = tx.fetch_attachment_by_content_hash(&pending.sha256_content_hash)? {
            tx.add_owner(&reference, existing.id)?;
            log::debug!(
                "[ATTACH] Reusing attachment {} for {}",
                existing.id.0,
                pending.local_relative_path
            );
            return Ok(StreamCreation::Deduplicated(existing.id));
        }

        let mut attachment = NewAttachment::blank(pending.mime_type.clone(), pending.encryption_key.clone());
        attachment.blur_hash = pending.blur_hash.clone();
        attachment.sha256_content_hash = Some(pending.sha256_content_hash.clone());
        attachment.media_name = Some(hashing::media_name(
            &pending.sha256_content_hash,
            &pending.encryption_key,
        ));
        attachment.stream = Some(StreamInfo {
            sha256_content_hash: pending.sha256_content_hash.clone(),
            digest: pending.digest.clone(),
            encrypted_byte_count: pending.encrypted_byte_count,
            unencrypted_byte_count: pending.unencrypted_byte_count,
            local_relative_path: pending.local_relative_path.clone(),
        });

        match tx.insert_attachment(&attachment, &reference) {
            Ok(id) => {
                tx.release_orphan(pending.orphan_id)?;
                Ok(StreamCreation::Inserted(id))
            }
            Err(AttachmentInsertError::DuplicatePlaintextHash { existing }) => {
                // Lost a race with another writer: same as a proactive hit
                tx.add_owner(&reference, existing)?;
                Ok(StreamCreation::Deduplicated(existing))
            }
            Err(AttachmentInsertError::Other(err)) => {
                log::warn!(
                    "[ATTACH] Failed to insert {}; leaving it orphaned: {:#}",
                    pending.local_relative_path,
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Create the thumbnail shown inside a quoted reply
    ///
    /// Policy, in order:
    /// 1. The original attachment is local: insert a clone row and queue a
    ///    high-priority job that copies the original's bytes.
    /// 2. The original is not local and the sender sent a thumbnail-sized
    ///    pointer: create the thumbnail from that pointer.
    /// 3. The original is not local: copy its metadata with no locator; a
    ///    later download of the original fills the thumbnail in.
    /// 4. No original: use the sender's pointer if any.
    pub fn create_quoted_reply_thumbnail(
        &self,
        original_message_row_id: Option<InteractionRowId>,
        sender_thumbnail: Option<&OwnedAttachmentPointer>,
        quoted_info: Option<&QuotedAttachmentInfo>,
        quoting_message_row_id: InteractionRowId,
        tx: &dyn BackupTransaction,
    ) -> Result<AttachmentBatchOutcome, AttachmentManagerError> {
        let owner = AttachmentOwner::single(OwnerKind::QuotedReplyThumbnail, quoting_message_row_id.0);
        let mut outcome = AttachmentBatchOutcome::default();

        let original = match original_message_row_id {
            Some(row_id) => tx.attachment_to_use_in_quote(row_id)?,
            None => None,
        };

        let mut params = AttachmentReferenceParams::new(owner);
        params.source_filename = quoted_info.and_then(|info| info.file_name.clone());

        match original {
            Some((original_reference, original)) if original.is_stream() => {
                let mut clone = NewAttachment::blank(original.mime_type.clone(), original.encryption_key.clone());
                clone.blur_hash = original.blur_hash.clone();
                clone.original_attachment_id_for_quoted_reply = Some(original.id);
                params.source_media_size_pixels = original_reference.source_media_size_pixels;

                let id = self.insert_or_reuse(&clone, &params, tx)?;
                outcome.created.push((owner, id));
                self.enqueue(id, owner.id, DownloadPriority::High, true, tx, &mut outcome);
            }
            Some((original_reference, original)) => {
                let usable_sender = sender_thumbnail.filter(|t| self.is_thumbnail_sized(&t.pointer));
                if let Some(thumbnail) = usable_sender {
                    self.create_one(owner, thumbnail, tx, &mut outcome)?;
                } else {
                    let mut fallback = NewAttachment::blank(original.mime_type.clone(), original.encryption_key.clone());
                    fallback.blur_hash = original.blur_hash.clone();
                    fallback.original_attachment_id_for_quoted_reply = Some(original.id);
                    params.source_media_size_pixels = original_reference.source_media_size_pixels;

                    let id = self.insert_or_reuse(&fallback, &params, tx)?;
                    outcome.created.push((owner, id));
                }
            }
            None => {
                if let Some(thumbnail) = sender_thumbnail {
                    self.create_one(owner, thumbnail, tx, &mut outcome)?;
                }
            }
        }

        Ok(outcome)
    }

    fn is_thumbnail_sized(&self, pointer: &FilePointer) -> bool {
        let max = self.options.max_quote_thumbnail_dimension;
        pointer.width.is_none_or(|w| w <= max) && pointer.height.is_none_or(|h| h <= max)
    }
}

fn group_by_owner(
    inputs: Vec<OwnedAttachmentPointer>,
) -> Vec<(AttachmentOwnerId, Vec<OwnedAttachmentPointer>)> {
    let mut groups: Vec<(AttachmentOwnerId, Vec<OwnedAttachmentPointer>)> = Vec::new();
    for input in inputs {
        match groups.iter_mut().find(|(owner, _)| *owner == input.owner) {
            Some((_, group)) => group.push(input),
            None => groups.push((input.owner, vec![input])),
        }
    }
    groups
}

/// Assign slots within one owner
///
/// A leading plain-text body attachment becomes the oversize-text owner and
/// the remaining body attachments shift down by one.
fn assign_owner_slots(
    owner: AttachmentOwnerId,
    inputs: Vec<OwnedAttachmentPointer>,
) -> Vec<(AttachmentOwner, OwnedAttachmentPointer)> {
    if owner.kind != OwnerKind::MessageBody {
        return inputs
            .into_iter()
            .map(|input| (AttachmentOwner::single(owner.kind, owner.owner_row_id), input))
            .collect();
    }

    let promote_first = inputs
        .first()
        .and_then(|input| input.pointer.content_type.as_deref())
        .is_some_and(|mime| mime == OVERSIZE_TEXT_MIME_TYPE);

    let mut next_order = 0u32;
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let slot = if index == 0 && promote_first {
                AttachmentOwner::single(OwnerKind::MessageOversizeText, owner.owner_row_id)
            } else {
                let slot = AttachmentOwner::body(owner.owner_row_id, next_order);
                next_order += 1;
                slot
            };
            (slot, input)
        })
        .collect()
}
