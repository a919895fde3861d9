//! Message content: body text, attachments and quotes
//!
//! The outgoing archiver owns directional details and send state; the body
//! of a standard message is delegated to a [`MessageContentArchiver`].

use std::sync::Arc;

use super::context::BackupContext;
use super::error::{ErrorKind, FrameError, RecordId};
use super::result::{ArchiveResult, RestoreResult};
use crate::attachments::{
    AttachmentBatchOutcome, AttachmentManager, AttachmentManagerError, OwnedAttachmentPointer,
    message_attachment_for, rendering_flag_from_wire, validate_file_pointer,
};
use crate::models::{
    AttachmentOwnerId, InteractionRowId, OutgoingMessage, OwnerKind, QuotedAttachmentInfo,
    QuotedReply, ThreadId,
};
use crate::proto::{ChatItem, ChatItemPayload, MessageAttachment, Quote, QuotedAttachment, StandardMessage};
use crate::storage::BackupTransaction;

/// Restored quote, before the quoting message has a row id
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredQuote {
    pub reply: QuotedReply,
    /// Thumbnail pointer the sender attached, if any
    pub thumbnail: Option<MessageAttachment>,
}

/// Content of a standard message, ready to be written
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestoredContent {
    pub body: Option<String>,
    /// Body attachments in wire order, including ones that fail validation
    pub attachments: Vec<MessageAttachment>,
    pub quote: Option<RestoredQuote>,
}

/// Archives and restores the content part of a message
pub trait MessageContentArchiver: Send + Sync {
    fn archive_content(
        &self,
        record_id: &RecordId,
        message_row_id: InteractionRowId,
        message: &OutgoingMessage,
        context: &BackupContext,
        tx: &dyn BackupTransaction,
    ) -> ArchiveResult<StandardMessage>;

    fn restore_content(&self, item: &ChatItem, context: &BackupContext) -> RestoreResult<RestoredContent>;

    /// Objects that need the inserted message's row id
    fn restore_downstream_objects(
        &self,
        record_id: &RecordId,
        content: &RestoredContent,
        message_row_id: InteractionRowId,
        thread_id: ThreadId,
        tx: &dyn BackupTransaction,
    ) -> RestoreResult;
}

/// Content archiver for standard messages
pub struct StandardMessageContentArchiver {
    attachments: Arc<AttachmentManager>,
}

impl StandardMessageContentArchiver {
    pub fn new(attachments: Arc<AttachmentManager>) -> Self {
        Self { attachments }
    }

    fn archive_attachments(
        &self,
        message_row_id: InteractionRowId,
        tx: &dyn BackupTransaction,
    ) -> anyhow::Result<(Vec<MessageAttachment>, Option<MessageAttachment>)> {
        let owners = [
            AttachmentOwnerId::new(OwnerKind::MessageOversizeText, message_row_id.0),
            AttachmentOwnerId::new(OwnerKind::MessageBody, message_row_id.0),
            AttachmentOwnerId::new(OwnerKind::QuotedReplyThumbnail, message_row_id.0),
        ];
        let references = tx.fetch_references(&owners)?;

        let mut oversize_text = None;
        let mut body = Vec::new();
        let mut thumbnail = None;
        for reference in references {
            let Some(attachment) = tx.fetch_attachment(reference.attachment_row_id)? else {
                log::warn!(
                    "[ARCHIVE] Reference to missing attachment {}",
                    reference.attachment_row_id.0
                );
                continue;
            };
            let exported = message_attachment_for(&attachment, &reference);
            match reference.owner.id.kind {
                OwnerKind::MessageOversizeText => oversize_text = Some(exported),
                OwnerKind::QuotedReplyThumbnail => thumbnail = Some(exported),
                OwnerKind::MessageBody => body.push(exported),
                other => log::warn!(
                    "[ARCHIVE] Skipping {} reference on message {}",
                    other.as_str(),
                    message_row_id.0
                ),
            }
        }

        // Long text goes back to the front of the body list
        if let Some(text) = oversize_text {
            body.insert(0, text);
        }
        Ok((body, thumbnail))
    }

    fn thumbnail_pointer(
        &self,
        quote: &RestoredQuote,
        message_row_id: InteractionRowId,
    ) -> Option<OwnedAttachmentPointer> {
        quote.thumbnail.as_ref().map(|thumbnail| OwnedAttachmentPointer {
            owner: AttachmentOwnerId::new(OwnerKind::QuotedReplyThumbnail, message_row_id.0),
            pointer: thumbnail.pointer.clone(),
            rendering_flag: rendering_flag_from_wire(thumbnail.flag),
            client_uuid: thumbnail.client_uuid,
        })
    }
}

impl MessageContentArchiver for StandardMessageContentArchiver {
    fn archive_content(
        &self,
        record_id: &RecordId,
        message_row_id: InteractionRowId,
        message: &OutgoingMessage,
        context: &BackupContext,
        tx: &dyn BackupTransaction,
    ) -> ArchiveResult<StandardMessage> {
        let mut errors = Vec::new();

        let (attachments, thumbnail) = match self.archive_attachments(message_row_id, tx) {
            Ok(found) => found,
            Err(err) => {
                return ArchiveResult::complete_failure(vec![FrameError::new(
                    ErrorKind::Database(format!("{:#}", err)),
                    record_id.clone(),
                )]);
            }
        };

        let quote = message.quoted_reply.as_ref().and_then(|reply| {
            match context.require_recipient_id(&reply.author) {
                Ok(author_id) => Some(Quote {
                    target_sent_timestamp: reply.target_timestamp,
                    author_id,
                    text: reply.body.clone(),
                    attachments: reply
                        .attachment
                        .as_ref()
                        .map(|info| QuotedAttachment {
                            content_type: info.content_type.clone(),
                            file_name: info.file_name.clone(),
                            thumbnail: thumbnail.clone(),
                        })
                        .into_iter()
                        .collect(),
                }),
                Err(_) => {
                    errors.push(FrameError::new(ErrorKind::QuoteAuthorNotFound, record_id.clone()));
                    None
                }
            }
        });

        let text = message.body.clone().filter(|body| !body.is_empty());
        if text.is_none() && attachments.is_empty() && quote.is_none() {
            errors.push(FrameError::new(ErrorKind::EmptyMessage, record_id.clone()));
            return ArchiveResult::complete_failure(errors);
        }

        ArchiveResult::partial_failure(
            StandardMessage {
                text,
                attachments,
                quote,
            },
            errors,
        )
    }

    fn restore_content(&self, item: &ChatItem, context: &BackupContext) -> RestoreResult<RestoredContent> {
        let record_id = RecordId::ChatItem {
            chat_id: item.chat_id,
            date_sent: item.date_sent,
        };

        let message = match &item.item {
            ChatItemPayload::StandardMessage(message) => message,
            other => {
                return RestoreResult::message_failure(vec![FrameError::new(
                    ErrorKind::WrongPayloadShape {
                        expected: "standardMessage",
                        actual: other.name(),
                    },
                    record_id,
                )]);
            }
        };

        // Invalid pointers are reported by the attachment manager once the
        // row exists; here they only count towards the empty-message check.
        let invalid_pointers: Vec<FrameError> = message
            .attachments
            .iter()
            .filter_map(|attachment| validate_file_pointer(&attachment.pointer).err())
            .map(|err| FrameError::new(err, record_id.clone()))
            .collect();
        let has_valid_attachment = invalid_pointers.len() < message.attachments.len();

        let quote = match &message.quote {
            Some(quote) => match context.require_address(quote.author_id) {
                Ok(author) => {
                    let first = quote.attachments.first();
                    Some(RestoredQuote {
                        reply: QuotedReply {
                            target_timestamp: quote.target_sent_timestamp,
                            author: author.clone(),
                            body: quote.text.clone(),
                            attachment: first.map(|a| QuotedAttachmentInfo {
                                content_type: a.content_type.clone(),
                                file_name: a.file_name.clone(),
                            }),
                        },
                        thumbnail: first.and_then(|a| a.thumbnail.clone()),
                    })
                }
                Err(kind) => {
                    return RestoreResult::message_failure(vec![FrameError::new(kind, record_id)]);
                }
            },
            None => None,
        };

        let body = message.text.clone().filter(|text| !text.is_empty());
        if body.is_none() && !has_valid_attachment && quote.is_none() {
            let mut errors = invalid_pointers;
            errors.push(FrameError::new(ErrorKind::EmptyMessage, record_id));
            return RestoreResult::message_failure(errors);
        }

        RestoreResult::success(RestoredContent {
            body,
            attachments: message.attachments.clone(),
            quote,
        })
    }

    fn restore_downstream_objects(
        &self,
        record_id: &RecordId,
        content: &RestoredContent,
        message_row_id: InteractionRowId,
        thread_id: ThreadId,
        tx: &dyn BackupTransaction,
    ) -> RestoreResult {
        let mut errors = Vec::new();

        let body_owner = AttachmentOwnerId::new(OwnerKind::MessageBody, message_row_id.0);
        let inputs = content
            .attachments
            .iter()
            .map(|attachment| OwnedAttachmentPointer {
                owner: body_owner,
                pointer: attachment.pointer.clone(),
                rendering_flag: rendering_flag_from_wire(attachment.flag),
                client_uuid: attachment.client_uuid,
            })
            .collect::<Vec<_>>();
        if !inputs.is_empty() {
            let outcome = self.attachments.create_attachment_pointers(inputs, tx);
            collect_attachment_errors(outcome, record_id, &mut errors);
        }

        if let Some(quote) = &content.quote
            && (quote.reply.attachment.is_some() || quote.thumbnail.is_some())
        {
            let original = match quote.reply.target_timestamp {
                Some(timestamp) => match tx.find_interaction_by_timestamp(thread_id, timestamp) {
                    Ok(found) => found
                        .and_then(|record| record.row_id)
                        .filter(|row_id| *row_id != message_row_id),
                    Err(err) => {
                        errors.push(FrameError::new(
                            ErrorKind::Database(format!("{:#}", err)),
                            record_id.clone(),
                        ));
                        None
                    }
                },
                None => None,
            };
            let sender = self.thumbnail_pointer(quote, message_row_id);
            let outcome = self.attachments.create_quoted_reply_thumbnail(
                original,
                sender.as_ref(),
                quote.reply.attachment.as_ref(),
                message_row_id,
                tx,
            );
            collect_attachment_errors(outcome, record_id, &mut errors);
        }

        // The message row exists; anything that went wrong here is partial
        RestoreResult::partial_restore((), errors)
    }
}

fn collect_attachment_errors(
    outcome: Result<AttachmentBatchOutcome, AttachmentManagerError>,
    record_id: &RecordId,
    errors: &mut Vec<FrameError>,
) {
    match outcome {
        Ok(outcome) => {
            for failure in outcome.failures {
                errors.push(FrameError::new(failure.error, record_id.clone()));
            }
            for failure in outcome.enqueue_failures {
                errors.push(FrameError::new(
                    ErrorKind::DownloadEnqueueFailed {
                        attachment_id: failure.attachment_row_id.0,
                        message: failure.message,
                    },
                    record_id.clone(),
                ));
            }
        }
        Err(AttachmentManagerError::OwnerContract(err)) => {
            errors.push(FrameError::new(err, record_id.clone()));
        }
        Err(AttachmentManagerError::Store(err)) => {
            errors.push(FrameError::new(
                ErrorKind::Database(format!("{:#}", err)),
                record_id.clone(),
            ));
        }
    }
}
