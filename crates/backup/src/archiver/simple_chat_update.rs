//! Simple chat updates: system events without message content
//!
//! Both directions are split into a pure planning step and a small
//! resolution/insert step. Planning maps one local legacy kind to a wire
//! type plus an author policy (export), or one wire type plus the resolved
//! author to a local legacy kind (restore).

use super::context::BackupContext;
use super::error::{ErrorKind, FrameError, RecordId};
use super::result::{ArchiveResult, RestoreResult, SkipReason};
use crate::models::{
    ContactAddress, InteractionKind, InteractionRecord, LegacyUpdate, PhoneNumberChange,
    RecipientAddress, ThreadId, VerificationState, VerificationStateDetails,
};
use crate::proto::{ChatItem, ChatItemPayload, ChatUpdateMessage, DirectionalDetails, RecipientId, SimpleChatUpdateType};
use crate::storage::BackupTransaction;

/// Who is recorded as the author of an exported update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAuthor {
    /// Carried on the local record
    Precomputed(RecipientAddress),
    /// The counterpart of the 1:1 thread the update lives in
    InferFromContactThread,
    /// The account owner
    Local,
}

/// Export decision for one local legacy update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPlan {
    Archive {
        author: UpdateAuthor,
        update_type: SimpleChatUpdateType,
    },
    Skip(SkipReason),
    Fail(ErrorKind),
}

impl ExportPlan {
    fn archive(author: UpdateAuthor, update_type: SimpleChatUpdateType) -> Self {
        ExportPlan::Archive {
            author,
            update_type,
        }
    }

    fn contact(contact: &ContactAddress, update_type: SimpleChatUpdateType) -> Self {
        Self::archive(
            UpdateAuthor::Precomputed(RecipientAddress::Contact(contact.clone())),
            update_type,
        )
    }
}

/// Restore decision for one wire update type
#[derive(Debug, Clone, PartialEq)]
pub enum RestorePlan {
    Insert(LegacyUpdate),
    Skip(SkipReason),
    Fail(ErrorKind),
}

/// Map a local legacy update onto its wire representation
pub fn export_plan(update: &LegacyUpdate, now_ms: u64) -> ExportPlan {
    use SimpleChatUpdateType as Wire;

    match update {
        LegacyUpdate::SessionEnded => {
            ExportPlan::archive(UpdateAuthor::InferFromContactThread, Wire::EndSession)
        }
        LegacyUpdate::UserJoinedSignal => {
            ExportPlan::archive(UpdateAuthor::InferFromContactThread, Wire::JoinedSignal)
        }
        LegacyUpdate::UnsupportedMessage => ExportPlan::archive(
            UpdateAuthor::InferFromContactThread,
            Wire::UnsupportedProtocolMessage,
        ),
        LegacyUpdate::SessionRefresh => {
            ExportPlan::archive(UpdateAuthor::InferFromContactThread, Wire::ChatSessionRefresh)
        }
        LegacyUpdate::ReportedSpam => ExportPlan::archive(UpdateAuthor::Local, Wire::ReportedSpam),
        LegacyUpdate::VerificationStateChange { details } => match details {
            Some(details) => {
                let update_type = match details.state {
                    VerificationState::Verified => Wire::IdentityVerified,
                    VerificationState::Default
                    | VerificationState::NoLongerVerified
                    | VerificationState::DefaultAcknowledged => Wire::IdentityDefault,
                };
                ExportPlan::contact(&details.recipient, update_type)
            }
            None => ExportPlan::Fail(ErrorKind::MissingVerificationStateDetails),
        },
        LegacyUpdate::PhoneNumberChange(change) => match change.aci {
            Some(aci) => ExportPlan::contact(&ContactAddress::from_aci(aci), Wire::ChangeNumber),
            None => ExportPlan::Fail(ErrorKind::PhoneNumberChangeMissingAci),
        },
        LegacyUpdate::PaymentsActivationRequest { sender } => ExportPlan::archive(
            UpdateAuthor::Precomputed(sender.clone()),
            Wire::PaymentActivationRequest,
        ),
        LegacyUpdate::PaymentsActivated { sender } => {
            ExportPlan::archive(UpdateAuthor::Precomputed(sender.clone()), Wire::PaymentsActivated)
        }
        LegacyUpdate::ReleaseChannelDonationRequest => ExportPlan::archive(
            UpdateAuthor::Precomputed(RecipientAddress::ReleaseChannel),
            Wire::ReleaseChannelDonationRequest,
        ),
        LegacyUpdate::NonBlockingIdentityChange { recipient } => {
            ExportPlan::contact(recipient, Wire::IdentityUpdate)
        }
        LegacyUpdate::DecryptionFailure { sender } => match sender {
            Some(sender) => ExportPlan::contact(sender, Wire::BadDecrypt),
            None => ExportPlan::archive(UpdateAuthor::InferFromContactThread, Wire::BadDecrypt),
        },
        LegacyUpdate::RecoverableDecryptionPlaceholder(placeholder) => {
            if placeholder.is_expired(now_ms) {
                ExportPlan::contact(&placeholder.sender, Wire::BadDecrypt)
            } else {
                ExportPlan::Skip(SkipReason::RecoveryWindowOpen)
            }
        }

        LegacyUpdate::UserNotRegistered
        | LegacyUpdate::AddToContactsOffer
        | LegacyUpdate::AddUserToProfileWhitelistOffer
        | LegacyUpdate::AddGroupToProfileWhitelistOffer
        | LegacyUpdate::NoSession
        | LegacyUpdate::WrongTrustedIdentityKey
        | LegacyUpdate::InvalidKeyException
        | LegacyUpdate::MissingKeyId
        | LegacyUpdate::InvalidMessage
        | LegacyUpdate::DuplicateMessage
        | LegacyUpdate::InvalidVersion
        | LegacyUpdate::GroupCreationFailed
        | LegacyUpdate::UnknownContactBlockOffer => {
            ExportPlan::Skip(SkipReason::LegacyKindNotArchived(update.name()))
        }

        LegacyUpdate::GroupUpdate
        | LegacyUpdate::DisappearingMessagesConfiguration
        | LegacyUpdate::ProfileChange
        | LegacyUpdate::ThreadMerge
        | LegacyUpdate::SessionSwitchover
        | LegacyUpdate::LearnedProfileName => {
            ExportPlan::Fail(ErrorKind::NotASimpleChatUpdate(update.name()))
        }
    }
}

/// Map a wire update type and its resolved author onto a local update
///
/// Updates that name a contact take it from the frame author; the
/// previous verification state and the phone numbers are not in the frame.
pub fn restore_plan(update_type: SimpleChatUpdateType, author: &RecipientAddress) -> RestorePlan {
    use SimpleChatUpdateType as Wire;

    let contact = || {
        author
            .as_contact()
            .cloned()
            .ok_or(ErrorKind::AuthorNotContact(author.kind_name()))
    };
    let with_contact = |build: fn(ContactAddress) -> LegacyUpdate| match contact() {
        Ok(contact) => RestorePlan::Insert(build(contact)),
        Err(kind) => RestorePlan::Fail(kind),
    };

    match update_type {
        Wire::Unknown => RestorePlan::Fail(ErrorKind::UnknownSimpleChatUpdateType),
        Wire::JoinedSignal => RestorePlan::Insert(LegacyUpdate::UserJoinedSignal),
        Wire::EndSession => RestorePlan::Insert(LegacyUpdate::SessionEnded),
        Wire::ChatSessionRefresh => RestorePlan::Insert(LegacyUpdate::SessionRefresh),
        Wire::UnsupportedProtocolMessage => RestorePlan::Insert(LegacyUpdate::UnsupportedMessage),
        Wire::ReportedSpam => RestorePlan::Insert(LegacyUpdate::ReportedSpam),
        Wire::ReleaseChannelDonationRequest => {
            RestorePlan::Skip(SkipReason::ReleaseChannelDonationRequest)
        }
        Wire::IdentityVerified => with_contact(|recipient| LegacyUpdate::VerificationStateChange {
            details: Some(VerificationStateDetails {
                recipient,
                state: VerificationState::Verified,
                is_local_change: false,
            }),
        }),
        Wire::IdentityDefault => with_contact(|recipient| LegacyUpdate::VerificationStateChange {
            details: Some(VerificationStateDetails {
                recipient,
                state: VerificationState::Default,
                is_local_change: false,
            }),
        }),
        Wire::IdentityUpdate => {
            with_contact(|recipient| LegacyUpdate::NonBlockingIdentityChange { recipient })
        }
        Wire::BadDecrypt => with_contact(|sender| LegacyUpdate::DecryptionFailure {
            sender: Some(sender),
        }),
        Wire::ChangeNumber => match contact() {
            Ok(ContactAddress { aci: Some(aci), .. }) => {
                RestorePlan::Insert(LegacyUpdate::PhoneNumberChange(PhoneNumberChange {
                    aci: Some(aci),
                    old_number: None,
                    new_number: None,
                }))
            }
            Ok(_) => RestorePlan::Fail(ErrorKind::PhoneNumberChangeMissingAci),
            Err(kind) => RestorePlan::Fail(kind),
        },
        Wire::PaymentActivationRequest => {
            RestorePlan::Insert(LegacyUpdate::PaymentsActivationRequest {
                sender: author.clone(),
            })
        }
        Wire::PaymentsActivated => RestorePlan::Insert(LegacyUpdate::PaymentsActivated {
            sender: author.clone(),
        }),
    }
}

/// Archiver for [`LegacyUpdate`] interactions
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleChatUpdateArchiver;

impl SimpleChatUpdateArchiver {
    pub fn new() -> Self {
        Self
    }

    pub fn archive(
        &self,
        record: &InteractionRecord,
        context: &BackupContext,
    ) -> ArchiveResult<ChatItem> {
        let record_id = RecordId::Interaction {
            unique_id: record.unique_id.clone(),
        };
        let fail = |kind: ErrorKind| {
            ArchiveResult::complete_failure(vec![FrameError::new(kind, record_id.clone())])
        };

        let update = match &record.kind {
            InteractionKind::Update(update) => update,
            InteractionKind::Outgoing(_) => {
                return fail(ErrorKind::WrongRecordShape {
                    expected: "update",
                    actual: "outgoing",
                });
            }
        };

        let (author, update_type) = match export_plan(update, context.now_ms) {
            ExportPlan::Archive {
                author,
                update_type,
            } => (author, update_type),
            ExportPlan::Skip(reason) => {
                log::debug!("[ARCHIVE] Skipping {}: {}", record.unique_id, reason);
                return ArchiveResult::skippable(reason);
            }
            ExportPlan::Fail(kind) => return fail(kind),
        };

        let author_id = match resolve_author(&author, record.thread_id, context) {
            Ok(id) => id,
            Err(kind) => return fail(kind),
        };
        let chat_id = match context.require_chat_id(record.thread_id) {
            Ok(id) => id,
            Err(kind) => return fail(kind),
        };

        ArchiveResult::success(ChatItem {
            chat_id,
            author_id,
            date_sent: record.timestamp,
            expire_start_date: None,
            expires_in_ms: None,
            directional_details: DirectionalDetails::Directionless,
            item: ChatItemPayload::UpdateMessage(ChatUpdateMessage { update_type }),
        })
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

        let update_type = match &item.item {
            ChatItemPayload::UpdateMessage(update) => update.update_type,
            other => {
                return fail(ErrorKind::WrongPayloadShape {
                    expected: "updateMessage",
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
        let author = match context.require_address(item.author_id) {
            Ok(author) => author,
            Err(kind) => return fail(kind),
        };

        let update = match restore_plan(update_type, author) {
            RestorePlan::Insert(update) => update,
            RestorePlan::Skip(reason) => {
                log::info!("[RESTORE] Dropping {} update: {}", update_type.as_str(), reason);
                return RestoreResult::skippable(reason);
            }
            RestorePlan::Fail(kind) => return fail(kind),
        };

        let record = InteractionRecord::new(thread_id, item.date_sent, InteractionKind::Update(update));
        match tx.insert_interaction(&record) {
            Ok(_) => RestoreResult::success(()),
            Err(err) => fail(ErrorKind::Database(format!("{:#}", err))),
        }
    }
}

fn resolve_author(
    author: &UpdateAuthor,
    thread_id: ThreadId,
    context: &BackupContext,
) -> Result<RecipientId, ErrorKind> {
    match author {
        UpdateAuthor::Precomputed(address) => context.require_recipient_id(address),
        UpdateAuthor::Local => context.require_recipient_id(&RecipientAddress::Local),
        UpdateAuthor::InferFromContactThread => {
            let thread = context
                .chats
                .thread(thread_id)
                .ok_or(ErrorKind::ThreadNotFound(thread_id.0))?;
            let contact = thread
                .contact_address()
                .ok_or(ErrorKind::ExpectedContactThread)?;
            context.require_recipient_id(&RecipientAddress::Contact(contact.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::context::{ChatContext, RecipientContext};
    use crate::models::{DecryptionPlaceholder, GroupId, ThreadRecord};
    use crate::proto::ChatId;
    use crate::storage::{BackupStore, InMemoryBackupStore};
    use uuid::Uuid;

    struct Fixture {
        context: BackupContext,
        contact: ContactAddress,
    }

    fn fixture() -> Fixture {
        let contact = ContactAddress::from_aci(Uuid::new_v4());
        let mut recipients = RecipientContext::new();
        recipients.register(RecipientId(1), RecipientAddress::Local).unwrap();
        recipients
            .register(RecipientId(2), RecipientAddress::Contact(contact.clone()))
            .unwrap();
        recipients
            .register(RecipientId(3), RecipientAddress::ReleaseChannel)
            .unwrap();
        recipients
            .register(RecipientId(4), RecipientAddress::Group(GroupId(vec![9; 32])))
            .unwrap();

        let mut chats = ChatContext::new();
        chats
            .register(ChatId(10), ThreadRecord::contact(100, contact.clone()))
            .unwrap();
        chats
            .register(ChatId(11), ThreadRecord::group(101, GroupId(vec![9; 32])))
            .unwrap();

        Fixture {
            context: BackupContext::new(recipients, chats, 1_000_000),
            contact,
        }
    }

    fn record(thread: i64, update: LegacyUpdate) -> InteractionRecord {
        InteractionRecord::new(ThreadId(thread), 5_000, InteractionKind::Update(update))
    }

    fn first_kind<T>(result: &ArchiveResult<T>) -> ErrorKind {
        result.errors()[0].kind.clone()
    }

    #[test]
    fn test_reported_spam_is_local_and_directionless() {
        let f = fixture();
        let result = SimpleChatUpdateArchiver::new().archive(&record(100, LegacyUpdate::ReportedSpam), &f.context);

        let item = result.into_value().unwrap();
        assert_eq!(item.author_id, RecipientId(1));
        assert_eq!(item.chat_id, ChatId(10));
        assert_eq!(item.date_sent, 5_000);
        assert_eq!(item.directional_details, DirectionalDetails::Directionless);
        assert_eq!(
            item.item,
            ChatItemPayload::UpdateMessage(ChatUpdateMessage {
                update_type: SimpleChatUpdateType::ReportedSpam
            })
        );
    }

    #[test]
    fn test_thread_inferred_author() {
        let f = fixture();
        let item = SimpleChatUpdateArchiver::new()
            .archive(&record(100, LegacyUpdate::SessionEnded), &f.context)
            .into_value()
            .unwrap();
        assert_eq!(item.author_id, RecipientId(2));
    }

    #[test]
    fn test_group_thread_cannot_infer_author() {
        let f = fixture();
        let result = SimpleChatUpdateArchiver::new().archive(&record(101, LegacyUpdate::SessionEnded), &f.context);
        assert!(result.is_failure());
        assert_eq!(first_kind(&result), ErrorKind::ExpectedContactThread);
        assert!(result.fatal_error().is_none());
    }

    #[test]
    fn test_missing_verification_details_fails() {
        let f = fixture();
        let result = SimpleChatUpdateArchiver::new().archive(
            &record(100, LegacyUpdate::VerificationStateChange { details: None }),
            &f.context,
        );
        assert_eq!(first_kind(&result), ErrorKind::MissingVerificationStateDetails);
    }

    #[test]
    fn test_unregistered_contact_fails() {
        let f = fixture();
        let stranger = ContactAddress::from_aci(Uuid::new_v4());
        let result = SimpleChatUpdateArchiver::new().archive(
            &record(100, LegacyUpdate::NonBlockingIdentityChange { recipient: stranger }),
            &f.context,
        );
        assert!(matches!(first_kind(&result), ErrorKind::RecipientAddressNotFound(_)));
    }

    #[test]
    fn test_non_simple_kind_is_fatal() {
        let f = fixture();
        let result = SimpleChatUpdateArchiver::new().archive(&record(100, LegacyUpdate::GroupUpdate), &f.context);
        assert!(result.fatal_error().is_some());
    }

    #[test]
    fn test_legacy_kinds_are_skipped() {
        let f = fixture();
        let result = SimpleChatUpdateArchiver::new().archive(&record(100, LegacyUpdate::NoSession), &f.context);
        assert_eq!(
            result,
            ArchiveResult::Skipped(SkipReason::LegacyKindNotArchived("no_session"))
        );
    }

    #[test]
    fn test_placeholder_waits_for_recovery_window() {
        let f = fixture();
        let pending = LegacyUpdate::RecoverableDecryptionPlaceholder(DecryptionPlaceholder {
            sender: f.contact.clone(),
            expiration_timestamp: f.context.now_ms + 1,
        });
        let expired = LegacyUpdate::RecoverableDecryptionPlaceholder(DecryptionPlaceholder {
            sender: f.contact.clone(),
            expiration_timestamp: f.context.now_ms - 1,
        });

        let archiver = SimpleChatUpdateArchiver::new();
        assert!(archiver.archive(&record(100, pending), &f.context).is_skipped());
        let item = archiver.archive(&record(100, expired), &f.context).into_value().unwrap();
        assert_eq!(
            item.item,
            ChatItemPayload::UpdateMessage(ChatUpdateMessage {
                update_type: SimpleChatUpdateType::BadDecrypt
            })
        );
        assert_eq!(item.author_id, RecipientId(2));
    }

    #[test]
    fn test_every_wire_type_has_a_restore_plan() {
        let author = RecipientAddress::Contact(ContactAddress::from_aci(Uuid::new_v4()));
        for update_type in SimpleChatUpdateType::ALL {
            let plan = restore_plan(update_type, &author);
            assert!(!matches!(plan, RestorePlan::Fail(_)), "{:?}", update_type);
        }
        assert_eq!(
            restore_plan(SimpleChatUpdateType::Unknown, &author),
            RestorePlan::Fail(ErrorKind::UnknownSimpleChatUpdateType)
        );
    }

    #[test]
    fn test_identity_update_needs_contact_author() {
        assert_eq!(
            restore_plan(SimpleChatUpdateType::IdentityUpdate, &RecipientAddress::Local),
            RestorePlan::Fail(ErrorKind::AuthorNotContact("local"))
        );
        assert_eq!(
            restore_plan(
                SimpleChatUpdateType::ChangeNumber,
                &RecipientAddress::Contact(ContactAddress::from_e164("+15555550100"))
            ),
            RestorePlan::Fail(ErrorKind::PhoneNumberChangeMissingAci)
        );
    }

    #[test]
    fn test_restore_inserts_update() {
        let f = fixture();
        let store = InMemoryBackupStore::new();
        let item = SimpleChatUpdateArchiver::new()
            .archive(&record(100, LegacyUpdate::ReportedSpam), &f.context)
            .into_value()
            .unwrap();

        let result = store
            .write(|tx| Ok(SimpleChatUpdateArchiver::new().restore(&item, &f.context, tx)))
            .unwrap();
        assert!(result.is_success());

        let rows = store.read(|tx| tx.list_interactions(ThreadId(100))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, 5_000);
        assert_eq!(rows[0].kind, InteractionKind::Update(LegacyUpdate::ReportedSpam));
    }

    #[test]
    fn test_restore_unknown_author_inserts_nothing() {
        let f = fixture();
        let store = InMemoryBackupStore::new();
        let item = ChatItem {
            chat_id: ChatId(10),
            author_id: RecipientId(99),
            date_sent: 5_000,
            expire_start_date: None,
            expires_in_ms: None,
            directional_details: DirectionalDetails::Directionless,
            item: ChatItemPayload::UpdateMessage(ChatUpdateMessage {
                update_type: SimpleChatUpdateType::JoinedSignal,
            }),
        };

        let result = store
            .write(|tx| Ok(SimpleChatUpdateArchiver::new().restore(&item, &f.context, tx)))
            .unwrap();
        assert!(result.is_failure());
        assert_eq!(result.errors()[0].kind, ErrorKind::RecipientIdNotFound(RecipientId(99)));
        assert!(store.read(|tx| tx.list_interactions(ThreadId(100))).unwrap().is_empty());
    }

    #[test]
    fn test_restore_donation_request_is_skipped() {
        let f = fixture();
        let store = InMemoryBackupStore::new();
        let item = ChatItem {
            chat_id: ChatId(10),
            author_id: RecipientId(3),
            date_sent: 5_000,
            expire_start_date: None,
            expires_in_ms: None,
            directional_details: DirectionalDetails::Directionless,
            item: ChatItemPayload::UpdateMessage(ChatUpdateMessage {
                update_type: SimpleChatUpdateType::ReleaseChannelDonationRequest,
            }),
        };

        let result = store
            .write(|tx| Ok(SimpleChatUpdateArchiver::new().restore(&item, &f.context, tx)))
            .unwrap();
        assert_eq!(result, RestoreResult::Skipped(SkipReason::ReleaseChannelDonationRequest));
        assert!(store.read(|tx| tx.list_interactions(ThreadId(100))).unwrap().is_empty());
    }
}
