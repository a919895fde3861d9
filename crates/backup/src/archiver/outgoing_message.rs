//! Messages sent by the local user and their per-recipient send state

use std::sync::Arc;

use super::content::{MessageContentArchiver, RestoredContent};
use super::context::BackupContext;
use super::error::{ErrorKind, FrameError, RecordId};
use super::receiver::{MessageReceiver, SentMessageTranscript};
use super::result::{ArchiveResult, RestoreResult, bubble_up};
use crate::models::{
    ContactAddress, InteractionKind, InteractionRecord, OutgoingSendStatus, RecipientAddress,
    RecipientSendState, ThreadId,
};
use crate::proto::{
    ChatItem, ChatItemPayload, DeliveryStatus, DirectionalDetails, OutgoingMessageDetails,
    RecipientId, SendStatus,
};
use crate::storage::BackupTransaction;

/// Export of one sent message
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedOutgoingMessage {
    pub item: ChatItem,
    /// Whether any recipient got the message via sealed sender
    pub sealed_sender: bool,
}

/// Wire status for one local send state
///
/// Receipts win over the plain sent state: read, then viewed, then
/// delivered. Failures are always reported as network failures.
pub fn send_status_for(state: &RecipientSendState, recipient_id: RecipientId, sent_at: u64) -> SendStatus {
    let (delivery_status, timestamp) = match state.status {
        OutgoingSendStatus::Sent => {
            if let Some(read) = state.read_timestamp {
                (DeliveryStatus::Read, read)
            } else if let Some(viewed) = state.viewed_timestamp {
                (DeliveryStatus::Viewed, viewed)
            } else if let Some(delivered) = state.delivery_timestamp {
                (DeliveryStatus::Delivered, delivered)
            } else {
                (DeliveryStatus::Sent, sent_at)
            }
        }
        OutgoingSendStatus::Failed => (DeliveryStatus::Failed, sent_at),
        OutgoingSendStatus::Sending | OutgoingSendStatus::Pending => (DeliveryStatus::Pending, sent_at),
        OutgoingSendStatus::Skipped => (DeliveryStatus::Skipped, sent_at),
    };

    SendStatus {
        recipient_id,
        delivery_status,
        network_failure: state.status == OutgoingSendStatus::Failed,
        identity_key_mismatch: false,
        sealed_sender: state.was_sent_by_sealed_sender,
        timestamp,
    }
}

/// Local send state for one wire status; `None` for unrecognized statuses
pub fn recipient_state_for(
    status: &SendStatus,
    recipient: ContactAddress,
) -> Option<RecipientSendState> {
    let mut state = RecipientSendState::sent(recipient);
    state.was_sent_by_sealed_sender = status.sealed_sender;
    match status.delivery_status {
        DeliveryStatus::Unknown => return None,
        DeliveryStatus::Pending => state.status = OutgoingSendStatus::Pending,
        DeliveryStatus::Sent => {}
        DeliveryStatus::Delivered => state.delivery_timestamp = Some(status.timestamp),
        DeliveryStatus::Read => state.read_timestamp = Some(status.timestamp),
        DeliveryStatus::Viewed => state.viewed_timestamp = Some(status.timestamp),
        DeliveryStatus::Failed => state.status = OutgoingSendStatus::Failed,
        DeliveryStatus::Skipped => state.status = OutgoingSendStatus::Skipped,
    }
    Some(state)
}

/// Archiver for [`InteractionKind::Outgoing`] records
pub struct OutgoingMessageArchiver {
    content: Arc<dyn MessageContentArchiver>,
    receiver: Arc<dyn MessageReceiver>,
}

impl OutgoingMessageArchiver {
    pub fn new(content: Arc<dyn MessageContentArchiver>, receiver: Arc<dyn MessageReceiver>) -> Self {
        Self { content, receiver }
    }

    pub fn archive(
        &self,
        record: &InteractionRecord,
        context: &BackupContext,
        tx: &dyn BackupTransaction,
    ) -> ArchiveResult<ArchivedOutgoingMessage> {
        let record_id = RecordId::Interaction {
            unique_id: record.unique_id.clone(),
        };
        let fail = |kind: ErrorKind| {
            ArchiveResult::complete_failure(vec![FrameError::new(kind, record_id.clone())])
        };

        let message = match &record.kind {
            InteractionKind::Outgoing(message) => message,
            InteractionKind::Update(update) => {
                return fail(ErrorKind::WrongRecordShape {
                    expected: "outgoing",
                    actual: update.name(),
                });
            }
        };
        let Some(row_id) = record.row_id else {
            return fail(ErrorKind::Database(format!(
                "interaction {} has no row id",
                record.unique_id
            )));
        };
        let chat_id = match context.require_chat_id(record.thread_id) {
            Ok(id) => id,
            Err(kind) => return fail(kind),
        };
        let author_id = match context.require_recipient_id(&RecipientAddress::Local) {
            Ok(id) => id,
            Err(kind) => return fail(kind),
        };

        let mut errors = Vec::new();
        let mut send_statuses = Vec::with_capacity(message.recipient_states.len());
        for state in &message.recipient_states {
            match context.require_recipient_id(&RecipientAddress::Contact(state.recipient.clone())) {
                Ok(recipient_id) => {
                    send_statuses.push(send_status_for(state, recipient_id, record.timestamp));
                }
                Err(kind) => errors.push(FrameError::new(kind, record_id.clone())),
            }
        }
        let sealed_sender = message
            .recipient_states
            .iter()
            .any(|state| state.was_sent_by_sealed_sender);

        let content = bubble_up!(
            self.content.archive_content(&record_id, row_id, message, context, tx),
            errors
        );

        let item = ChatItem {
            chat_id,
            author_id,
            date_sent: record.timestamp,
            expire_start_date: message.expire_started_at,
            expires_in_ms: message.expires_in_ms,
            directional_details: DirectionalDetails::Outgoing(OutgoingMessageDetails { send_statuses }),
            item: ChatItemPayload::StandardMessage(content),
        };

        if !errors.is_empty() {
            log::warn!(
                "[ARCHIVE] Outgoing message {} exported with {} errors",
                record.unique_id,
                errors.len()
            );
        }
        ArchiveResult::partial_failure(
            ArchivedOutgoingMessage {
                item,
                sealed_sender,
            },
            errors,
        )
    }

    pub fn restore(
        &self,
        item: &ChatItem,
        context: &BackupContext,
        tx: &dyn BackupTransaction,
    ) -> RestoreResult {
        let record_id = RecordId::ChatItem {
            chat_id: item.chat_id,
            date_sent: item.date_sent,
        };
        let fail = |kind: ErrorKind| {
            RestoreResult::message_failure(vec![FrameError::new(kind, record_id.clone())])
        };

        let details = match &item.directional_details {
            DirectionalDetails::Outgoing(details) => details,
            other => {
                return fail(ErrorKind::WrongDirectionalDetails {
                    expected: "outgoing",
                    actual: other.name(),
                });
            }
        };
        if item.date_sent == 0 {
            return fail(ErrorKind::InvalidTimestamp(item.date_sent));
        }
        let thread_id = match context.require_thread(item.chat_id) {
            Ok(thread) => thread.id,
            Err(kind) => return fail(kind),
        };
        if let Err(kind) = context.require_address(item.author_id) {
            return fail(kind);
        }

        let mut errors = Vec::new();

        // 1. Content
        let content = bubble_up!(self.content.restore_content(item, context), errors);

        // 2. Transcript
        let recipient_states = bubble_up!(
            self.restore_recipient_states(details, &record_id, context),
            errors
        );
        let transcript = build_transcript(item, thread_id, &content, recipient_states);

        // 3. Insert
        let row_id = match self.receiver.insert_sent_message(transcript, tx) {
            Ok(Some(row_id)) => row_id,
            Ok(None) => {
                errors.push(FrameError::new(ErrorKind::DuplicateMessage, record_id));
                return RestoreResult::message_failure(errors);
            }
            Err(err) => {
                errors.push(FrameError::new(
                    ErrorKind::Database(format!("{:#}", err)),
                    record_id,
                ));
                return RestoreResult::message_failure(errors);
            }
        };

        // 4. Objects keyed to the new row
        bubble_up!(
            self.content
                .restore_downstream_objects(&record_id, &content, row_id, thread_id, tx),
            errors
        );

        RestoreResult::partial_restore((), errors)
    }

    /// Send states for every wire status
    ///
    /// An unknown recipient fails the whole message; an unrecognized
    /// status only drops that recipient.
    fn restore_recipient_states(
        &self,
        details: &OutgoingMessageDetails,
        record_id: &RecordId,
        context: &BackupContext,
    ) -> RestoreResult<Vec<RecipientSendState>> {
        let mut states = Vec::with_capacity(details.send_statuses.len());
        let mut errors = Vec::new();
        let mut fatal_to_message = false;

        for status in &details.send_statuses {
            let address = match context.require_address(status.recipient_id) {
                Ok(address) => address,
                Err(kind) => {
                    errors.push(FrameError::new(kind, record_id.clone()));
                    fatal_to_message = true;
                    continue;
                }
            };
            let Some(contact) = address.as_contact() else {
                errors.push(FrameError::new(
                    ErrorKind::SendStatusRecipientNotContact(address.kind_name()),
                    record_id.clone(),
                ));
                fatal_to_message = true;
                continue;
            };
            match recipient_state_for(status, contact.clone()) {
                Some(state) => states.push(state),
                None => errors.push(FrameError::new(
                    ErrorKind::UnknownDeliveryStatus(status.recipient_id),
                    record_id.clone(),
                )),
            }
        }

        if fatal_to_message {
            RestoreResult::message_failure(errors)
        } else {
            RestoreResult::partial_restore(states, errors)
        }
    }
}

fn build_transcript(
    item: &ChatItem,
    thread_id: ThreadId,
    content: &RestoredContent,
    recipient_states: Vec<RecipientSendState>,
) -> SentMessageTranscript {
    SentMessageTranscript {
        thread_id,
        timestamp: item.date_sent,
        body: content.body.clone(),
        quoted_reply: content.quote.as_ref().map(|quote| quote.reply.clone()),
        recipient_states,
        expires_in_ms: item.expires_in_ms,
        expire_started_at: item.expire_start_date,
        is_view_once: false,
    }
}
