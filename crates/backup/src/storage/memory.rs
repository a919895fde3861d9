//! In-memory storage implementation
//!
//! Used in tests and by hosts that restore into a scratch store before
//! copying into their own database. Transactions work on a snapshot of the
//! state which replaces the live state only when the closure succeeds.

use anyhow::{Result, anyhow};
use chrono::Utc;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::traits::{
    AttachmentInsertError, AttachmentStore, BackupAttachmentDownloadStore, BackupStore,
    BackupTransaction, InteractionStore, OrphanAttachmentStore,
};
use crate::models::{
    Attachment, AttachmentOwner, AttachmentOwnerId, AttachmentReference,
    AttachmentReferenceParams, AttachmentRowId, DownloadPriority, InteractionRecord,
    InteractionRowId, NewAttachment, OrphanAttachmentRecord, OrphanRecordId, OwnerKind,
    QueuedAttachmentDownload, ThreadId,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    interactions: BTreeMap<i64, InteractionRecord>,
    next_interaction_id: i64,
    attachments: BTreeMap<i64, Attachment>,
    next_attachment_id: i64,
    /// plaintext hash -> attachment row
    content_hash_index: HashMap<Vec<u8>, AttachmentRowId>,
    references: Vec<AttachmentReference>,
    orphans: BTreeMap<i64, OrphanAttachmentRecord>,
    next_orphan_id: i64,
    downloads: Vec<QueuedAttachmentDownload>,
}

impl MemoryState {
    fn slot_taken(&self, owner: &AttachmentOwner) -> bool {
        self.references.iter().any(|r| r.owner == *owner)
    }

    fn check_slot(&self, owner: &AttachmentOwner) -> Result<()> {
        if self.slot_taken(owner) {
            return Err(anyhow!(
                "owner slot {} {} {:?} already has a reference",
                owner.id.kind.as_str(),
                owner.id.owner_row_id,
                owner.order_in_owner
            ));
        }
        Ok(())
    }
}

/// In-memory implementation of the backup store contract
pub struct InMemoryBackupStore {
    state: Mutex<MemoryState>,
}

impl InMemoryBackupStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_interaction_id: 1,
                next_attachment_id: 1,
                next_orphan_id: 1,
                ..MemoryState::default()
            }),
        }
    }
}

impl Default for InMemoryBackupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupStore for InMemoryBackupStore {
    fn write<T>(&self, f: impl FnOnce(&dyn BackupTransaction) -> Result<T>) -> Result<T> {
        let mut live = self.state.lock().unwrap();
        let tx = MemoryTransaction {
            state: RefCell::new(live.clone()),
        };
        let value = f(&tx)?;
        *live = tx.state.into_inner();
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&dyn BackupTransaction) -> Result<T>) -> Result<T> {
        let snapshot = self.state.lock().unwrap().clone();
        let tx = MemoryTransaction {
            state: RefCell::new(snapshot),
        };
        f(&tx)
    }
}

/// One open transaction over a snapshot
pub struct MemoryTransaction {
    state: RefCell<MemoryState>,
}

impl InteractionStore for MemoryTransaction {
    fn insert_interaction(&self, record: &InteractionRecord) -> Result<InteractionRowId> {
        let mut state = self.state.borrow_mut();
        if state
            .interactions
            .values()
            .any(|existing| existing.unique_id == record.unique_id)
        {
            return Err(anyhow!("interaction {} already exists", record.unique_id));
        }
        let row_id = InteractionRowId(state.next_interaction_id);
        state.next_interaction_id += 1;
        state
            .interactions
            .insert(row_id.0, record.clone().with_row_id(row_id));
        Ok(row_id)
    }

    fn fetch_interaction(&self, row_id: InteractionRowId) -> Result<Option<InteractionRecord>> {
        Ok(self.state.borrow().interactions.get(&row_id.0).cloned())
    }

    fn find_interaction_by_timestamp(
        &self,
        thread_id: ThreadId,
        timestamp: u64,
    ) -> Result<Option<InteractionRecord>> {
        let state = self.state.borrow();
        Ok(state
            .interactions
            .values()
            .find(|r| r.thread_id == thread_id && r.timestamp == timestamp)
            .cloned())
    }

    fn list_interactions(&self, thread_id: ThreadId) -> Result<Vec<InteractionRecord>> {
        let state = self.state.borrow();
        let mut records: Vec<InteractionRecord> = state
            .interactions
            .values()
            .filter(|r| r.thread_id == thread_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.timestamp, r.row_id));
        Ok(records)
    }
}

impl AttachmentStore for MemoryTransaction {
    fn fetch_attachment(&self, id: AttachmentRowId) -> Result<Option<Attachment>> {
        Ok(self.state.borrow().attachments.get(&id.0).cloned())
    }

    fn fetch_references(&self, owners: &[AttachmentOwnerId]) -> Result<Vec<AttachmentReference>> {
        let state = self.state.borrow();
        let mut references: Vec<AttachmentReference> = state
            .references
            .iter()
            .filter(|r| owners.contains(&r.owner.id))
            .cloned()
            .collect();
        references.sort_by_key(|r| r.owner);
        Ok(references)
    }

    fn insert_attachment(
        &self,
        attachment: &NewAttachment,
        reference: &AttachmentReferenceParams,
    ) -> std::result::Result<AttachmentRowId, AttachmentInsertError> {
        let mut state = self.state.borrow_mut();
        if let Some(hash) = &attachment.sha256_content_hash
            && let Some(existing) = state.content_hash_index.get(hash)
        {
            return Err(AttachmentInsertError::DuplicatePlaintextHash {
                existing: *existing,
            });
        }
        state.check_slot(&reference.owner)?;

        let id = AttachmentRowId(state.next_attachment_id);
        state.next_attachment_id += 1;
        if let Some(hash) = &attachment.sha256_content_hash {
            state.content_hash_index.insert(hash.clone(), id);
        }
        state
            .attachments
            .insert(id.0, attachment.clone().with_id(id));
        state.references.push(reference.clone().bind(id));
        Ok(id)
    }

    fn add_owner(
        &self,
        reference: &AttachmentReferenceParams,
        attachment_id: AttachmentRowId,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.attachments.contains_key(&attachment_id.0) {
            return Err(anyhow!("attachment {} does not exist", attachment_id.0));
        }
        state.check_slot(&reference.owner)?;
        state.references.push(reference.clone().bind(attachment_id));
        Ok(())
    }

    fn remove_owner(&self, owner: &AttachmentOwner, attachment_id: AttachmentRowId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state
            .references
            .retain(|r| !(r.owner == *owner && r.attachment_row_id == attachment_id));

        let still_referenced = state
            .references
            .iter()
            .any(|r| r.attachment_row_id == attachment_id);
        if !still_referenced && let Some(removed) = state.attachments.remove(&attachment_id.0) {
            if let Some(hash) = removed.sha256_content_hash {
                state.content_hash_index.remove(&hash);
            }
            state
                .downloads
                .retain(|d| d.attachment_row_id != attachment_id);
        }
        Ok(())
    }

    fn fetch_attachment_by_content_hash(
        &self,
        sha256_content_hash: &[u8],
    ) -> Result<Option<Attachment>> {
        let state = self.state.borrow();
        Ok(state
            .content_hash_index
            .get(sha256_content_hash)
            .and_then(|id| state.attachments.get(&id.0))
            .cloned())
    }

    fn attachment_to_use_in_quote(
        &self,
        message_row_id: InteractionRowId,
    ) -> Result<Option<(AttachmentReference, Attachment)>> {
        let state = self.state.borrow();
        let owner = AttachmentOwnerId::new(OwnerKind::MessageBody, message_row_id.0);
        let mut candidates: Vec<(&AttachmentReference, &Attachment)> = state
            .references
            .iter()
            .filter(|r| r.owner.id == owner)
            .filter_map(|r| {
                state
                    .attachments
                    .get(&r.attachment_row_id.0)
                    .filter(|a| a.is_visual_media())
                    .map(|a| (r, a))
            })
            .collect();
        candidates.sort_by_key(|(r, _)| r.owner.order_in_owner);
        Ok(candidates
            .first()
            .map(|(r, a)| ((*r).clone(), (*a).clone())))
    }

    fn count_attachments(&self) -> Result<usize> {
        Ok(self.state.borrow().attachments.len())
    }
}

impl OrphanAttachmentStore for MemoryTransaction {
    fn insert_orphan(&self, local_relative_path: &str) -> Result<OrphanRecordId> {
        let mut state = self.state.borrow_mut();
        let id = OrphanRecordId(state.next_orphan_id);
        state.next_orphan_id += 1;
        state.orphans.insert(
            id.0,
            OrphanAttachmentRecord {
                id,
                local_relative_path: local_relative_path.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn orphan_exists(&self, id: OrphanRecordId) -> Result<bool> {
        Ok(self.state.borrow().orphans.contains_key(&id.0))
    }

    fn release_orphan(&self, id: OrphanRecordId) -> Result<()> {
        self.state.borrow_mut().orphans.remove(&id.0);
        Ok(())
    }

    fn list_orphans(&self) -> Result<Vec<OrphanAttachmentRecord>> {
        Ok(self.state.borrow().orphans.values().cloned().collect())
    }
}

impl BackupAttachmentDownloadStore for MemoryTransaction {
    fn enqueue_download(
        &self,
        attachment_row_id: AttachmentRowId,
        owner: AttachmentOwnerId,
        priority: DownloadPriority,
        is_thumbnail_clone: bool,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.attachments.contains_key(&attachment_row_id.0) {
            return Err(anyhow!(
                "cannot enqueue missing attachment {}",
                attachment_row_id.0
            ));
        }
        state.downloads.push(QueuedAttachmentDownload {
            attachment_row_id,
            owner,
            priority,
            is_thumbnail_clone,
            enqueued_at: Utc::now(),
        });
        Ok(())
    }

    fn list_queued_downloads(&self) -> Result<Vec<QueuedAttachmentDownload>> {
        Ok(self.state.borrow().downloads.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactAddress, InteractionKind, LegacyUpdate};
    use uuid::Uuid;

    fn spam_record(thread: i64, timestamp: u64) -> InteractionRecord {
        InteractionRecord::new(
            ThreadId(thread),
            timestamp,
            InteractionKind::Update(LegacyUpdate::ReportedSpam),
        )
    }

    fn hashed(hash: u8) -> NewAttachment {
        let mut attachment = NewAttachment::blank("image/png", vec![7; 64]);
        attachment.sha256_content_hash = Some(vec![hash; 32]);
        attachment
    }

    #[test]
    fn test_write_commits_on_ok() {
        let store = InMemoryBackupStore::new();
        let row_id = store
            .write(|tx| tx.insert_interaction(&spam_record(1, 100)))
            .unwrap();

        let fetched = store.read(|tx| tx.fetch_interaction(row_id)).unwrap();
        assert_eq!(fetched.unwrap().timestamp, 100);
    }

    #[test]
    fn test_write_rolls_back_on_err() {
        let store = InMemoryBackupStore::new();
        let result: Result<()> = store.write(|tx| {
            tx.insert_interaction(&spam_record(1, 100))?;
            Err(anyhow!("abort"))
        });
        assert!(result.is_err());

        let listed = store.read(|tx| tx.list_interactions(ThreadId(1))).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn test_find_by_timestamp_is_thread_scoped() {
        let store = InMemoryBackupStore::new();
        store
            .write(|tx| tx.insert_interaction(&spam_record(1, 100)))
            .unwrap();

        let found = store
            .read(|tx| tx.find_interaction_by_timestamp(ThreadId(1), 100))
            .unwrap();
        let other_thread = store
            .read(|tx| tx.find_interaction_by_timestamp(ThreadId(2), 100))
            .unwrap();
        assert!(found.is_some());
        assert!(other_thread.is_none());
    }

    #[test]
    fn test_duplicate_content_hash_rejected() {
        let store = InMemoryBackupStore::new();
        let first = store
            .write(|tx| {
                Ok(tx.insert_attachment(
                    &hashed(1),
                    &AttachmentReferenceParams::new(AttachmentOwner::body(1, 0)),
                )?)
            })
            .unwrap();

        let err = store
            .write(|tx| {
                match tx.insert_attachment(
                    &hashed(1),
                    &AttachmentReferenceParams::new(AttachmentOwner::body(2, 0)),
                ) {
                    Err(AttachmentInsertError::DuplicatePlaintextHash { existing }) => Ok(existing),
                    other => Err(anyhow!("unexpected {:?}", other)),
                }
            })
            .unwrap();
        assert_eq!(err, first);
        assert_eq!(store.read(|tx| tx.count_attachments()).unwrap(), 1);
    }

    #[test]
    fn test_owner_slot_is_unique() {
        let store = InMemoryBackupStore::new();
        let owner = AttachmentOwner::single(OwnerKind::QuotedReplyThumbnail, 5);
        let result = store.write(|tx| {
            let id = tx.insert_attachment(&hashed(1), &AttachmentReferenceParams::new(owner))?;
            tx.add_owner(&AttachmentReferenceParams::new(owner), id)
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_last_owner_deletes_attachment() {
        let store = InMemoryBackupStore::new();
        let owner = AttachmentOwner::body(1, 0);
        store
            .write(|tx| {
                let id = tx.insert_attachment(&hashed(3), &AttachmentReferenceParams::new(owner))?;
                tx.remove_owner(&owner, id)
            })
            .unwrap();

        assert_eq!(store.read(|tx| tx.count_attachments()).unwrap(), 0);
        let by_hash = store
            .read(|tx| tx.fetch_attachment_by_content_hash(&[3; 32]))
            .unwrap();
        assert!(by_hash.is_none());
    }

    #[test]
    fn test_quote_attachment_prefers_first_visual() {
        let store = InMemoryBackupStore::new();
        let chosen = store
            .write(|tx| {
                let text = NewAttachment::blank("application/pdf", vec![1; 64]);
                tx.insert_attachment(&text, &AttachmentReferenceParams::new(AttachmentOwner::body(9, 0)))?;
                let image = NewAttachment::blank("image/jpeg", vec![1; 64]);
                let image_id = tx.insert_attachment(
                    &image,
                    &AttachmentReferenceParams::new(AttachmentOwner::body(9, 1)),
                )?;
                let video = NewAttachment::blank("video/mp4", vec![1; 64]);
                tx.insert_attachment(&video, &AttachmentReferenceParams::new(AttachmentOwner::body(9, 2)))?;
                Ok((image_id, tx.attachment_to_use_in_quote(InteractionRowId(9))?))
            })
            .unwrap();

        let (image_id, found) = chosen;
        assert_eq!(found.unwrap().1.id, image_id);
    }

    #[test]
    fn test_orphan_lifecycle() {
        let store = InMemoryBackupStore::new();
        let id = store.write(|tx| tx.insert_orphan("ab/file.bin.zst")).unwrap();
        assert!(store.read(|tx| tx.orphan_exists(id)).unwrap());

        store.write(|tx| tx.release_orphan(id)).unwrap();
        assert!(!store.read(|tx| tx.orphan_exists(id)).unwrap());
    }

    #[test]
    fn test_enqueue_requires_attachment() {
        let store = InMemoryBackupStore::new();
        let owner = AttachmentOwnerId::new(OwnerKind::MessageBody, 1);
        let result = store.write(|tx| {
            tx.enqueue_download(AttachmentRowId(42), owner, DownloadPriority::Default, false)
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_unique_id_rejected() {
        let store = InMemoryBackupStore::new();
        let record = InteractionRecord::new(
            ThreadId(1),
            5,
            InteractionKind::Update(LegacyUpdate::NonBlockingIdentityChange {
                recipient: ContactAddress::from_aci(Uuid::new_v4()),
            }),
        );
        store.write(|tx| tx.insert_interaction(&record)).unwrap();
        assert!(store.write(|tx| tx.insert_interaction(&record)).is_err());
    }
}
