//! Interaction archivers and restorers
//!
//! Every archiver returns a [`FrameResult`]; nothing here raises for bad
//! user data. The orchestrator feeds results into [`BackupJobStats`] and
//! stops only on a [`FatalDeveloperError`].

mod content;
mod context;
mod dispatch;
mod error;
mod outgoing_message;
mod receiver;
mod result;
mod simple_chat_update;
mod stats;

pub use content::{
    MessageContentArchiver, RestoredContent, RestoredQuote, StandardMessageContentArchiver,
};
pub use context::{BackupContext, ChatContext, RecipientContext};
pub use dispatch::ChatItemArchiver;
pub use error::{ErrorCategory, ErrorKind, FatalDeveloperError, FrameError, RecordId};
pub use outgoing_message::{
    ArchivedOutgoingMessage, OutgoingMessageArchiver, recipient_state_for, send_status_for,
};
pub use receiver::{MessageReceiver, SentMessageTranscript, StoreMessageReceiver};
pub use result::{ArchiveResult, FrameResult, RestoreResult, SkipReason};
pub use simple_chat_update::{
    ExportPlan, RestorePlan, SimpleChatUpdateArchiver, UpdateAuthor, export_plan, restore_plan,
};
pub use stats::BackupJobStats;
