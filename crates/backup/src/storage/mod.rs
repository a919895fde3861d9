//! Storage traits and implementations
//!
//! The archivers and the attachment manager only talk to the store through
//! the traits in `traits`. Two bindings are provided: an in-memory store
//! with snapshot transactions and a SQLite store. Attachment bytes live in a
//! separate blob store.

mod blob;
mod blob_file;
mod memory;
mod sqlite;
mod traits;

pub use blob::{BlobKey, BlobStore, StoredBlob};
pub use blob_file::FileBlobStore;
pub use memory::{InMemoryBackupStore, MemoryTransaction};
pub use sqlite::{SqliteBackupStore, SqliteTransaction};
pub use traits::{
    AttachmentInsertError, AttachmentStore, BackupAttachmentDownloadStore, BackupStore,
    BackupTransaction, InteractionStore, OrphanAttachmentStore,
};
