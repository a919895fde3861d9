//! Routing of records and frames to their archiver

use std::sync::Arc;

use super::content::StandardMessageContentArchiver;
use super::context::BackupContext;
use super::error::{ErrorKind, FrameError, RecordId};
use super::outgoing_message::OutgoingMessageArchiver;
use super::receiver::StoreMessageReceiver;
use super::result::{ArchiveResult, RestoreResult};
use super::simple_chat_update::SimpleChatUpdateArchiver;
use crate::attachments::AttachmentManager;
use crate::models::{InteractionKind, InteractionRecord};
use crate::proto::{ChatItem, ChatItemPayload, DirectionalDetails};
use crate::storage::BackupTransaction;

/// Entry point for one chat item in either direction
pub struct ChatItemArchiver {
    simple_updates: SimpleChatUpdateArchiver,
    outgoing: OutgoingMessageArchiver,
}

impl ChatItemArchiver {
    /// Archiver with the standard content archiver and store receiver
    pub fn new(attachments: Arc<AttachmentManager>) -> Self {
        Self::with_parts(
            SimpleChatUpdateArchiver::new(),
            OutgoingMessageArchiver::new(
                Arc::new(StandardMessageContentArchiver::new(attachments)),
                Arc::new(StoreMessageReceiver),
            ),
        )
    }

    pub fn with_parts(
        simple_updates: SimpleChatUpdateArchiver,
        outgoing: OutgoingMessageArchiver,
    ) -> Self {
        Self {
            simple_updates,
            outgoing,
        }
    }

    pub fn archive(
        &self,
        record: &InteractionRecord,
        context: &BackupContext,
        tx: &dyn BackupTransaction,
    ) -> ArchiveResult<ChatItem> {
        match &record.kind {
            InteractionKind::Update(_) => self.simple_updates.archive(record, context),
            InteractionKind::Outgoing(_) => self
                .outgoing
                .archive(record, context, tx)
                .map(|archived| archived.item),
        }
    }

    pub fn restore(
        &self,
        item: &ChatItem,
        context: &BackupContext,
        tx: &dyn BackupTransaction,
    ) -> RestoreResult {
        match (&item.item, &item.directional_details) {
            (ChatItemPayload::UpdateMessage(_), _) => self.simple_updates.restore(item, context, tx),
            (ChatItemPayload::StandardMessage(_), DirectionalDetails::Outgoing(_)) => {
                self.outgoing.restore(item, context, tx)
            }
            (ChatItemPayload::StandardMessage(_), other) => {
                RestoreResult::message_failure(vec![FrameError::new(
                    ErrorKind::UnsupportedChatItem(other.name()),
                    RecordId::ChatItem {
                        chat_id: item.chat_id,
                        date_sent: item.date_sent,
                    },
                )])
            }
        }
    }
}
