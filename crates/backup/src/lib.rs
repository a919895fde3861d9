//! Backup crate - Archive/restore engine for chat history
//!
//! This crate converts between the local chat-history/attachment model and
//! the portable backup wire format:
//! - Wire payload shapes (ChatItem, FilePointer, ...)
//! - Local models (interactions, attachments, owner references)
//! - Archivers for simple chat updates and outgoing messages
//! - Attachment manager with content-hash deduplication and orphan cleanup
//! - Storage trait abstractions with in-memory and SQLite bindings
//!
//! The outer backup container, network transport and the attachment
//! downloader itself live outside this crate.

pub mod archiver;
pub mod attachments;
pub mod config;
pub mod logging;
pub mod models;
pub mod proto;
pub mod storage;

pub use archiver::{
    ArchiveResult, BackupContext, BackupJobStats, ChatContext, ChatItemArchiver, ErrorKind,
    FatalDeveloperError, FrameError, FrameResult, OutgoingMessageArchiver, RecipientContext,
    RestoreResult, SimpleChatUpdateArchiver, SkipReason,
};
pub use attachments::{
    AttachmentCreationError, AttachmentManager, AttachmentManagerOptions, OrphanReaper,
    OwnedAttachmentPointer,
};
pub use config::BackupSettings;
pub use models::{
    Attachment, AttachmentOwner, AttachmentReference, ContactAddress, InteractionKind,
    InteractionRecord, LegacyUpdate, OutgoingMessage, RecipientAddress, ThreadId, ThreadRecord,
};
pub use proto::{ChatItem, FilePointer, RecipientId};
pub use storage::{
    BackupStore, BackupTransaction, BlobStore, FileBlobStore, InMemoryBackupStore,
    SqliteBackupStore,
};
