//! Integration tests for the backup crate
//!
//! These tests run export -> restore round trips against both store
//! bindings.

use std::sync::Arc;

use backup::archiver::{
    BackupContext, BackupJobStats, ChatContext, ChatItemArchiver, ErrorKind, FrameResult,
    RecipientContext,
};
use backup::attachments::{
    AttachmentCreationError, AttachmentManager, AttachmentManagerOptions, OrphanReaper,
    OwnedAttachmentPointer, StreamCreation,
};
use backup::models::{
    AttachmentOwner, AttachmentOwnerId, AttachmentReferenceParams, ContactAddress,
    DownloadPriority, GroupId, InteractionKind, InteractionRecord, LegacyUpdate, OutgoingMessage,
    OwnerKind, PhoneNumberChange, QuotedAttachmentInfo, QuotedReply, RecipientAddress,
    RecipientSendState, ThreadId, ThreadRecord, VerificationState, VerificationStateDetails,
};
use backup::proto::{
    AttachmentLocator, BackupLocator, ChatId, ChatItem, ChatItemPayload, ChatUpdateMessage,
    DirectionalDetails, FilePointer, Locator, MessageAttachment, Quote, QuotedAttachment,
    RecipientId, SimpleChatUpdateType, StandardMessage,
};
use backup::storage::{BackupStore, FileBlobStore, InMemoryBackupStore, SqliteBackupStore};
use tempfile::TempDir;
use uuid::Uuid;

const CONTACT_THREAD: i64 = 100;
const GROUP_THREAD: i64 = 200;

struct Env {
    _dir: TempDir,
    context: BackupContext,
    contacts: Vec<ContactAddress>,
    manager: Arc<AttachmentManager>,
    archiver: ChatItemArchiver,
}

/// Helper to build a job with a local user, three contacts, a 1:1 thread
/// and a group thread
fn env() -> Env {
    let dir = TempDir::new().unwrap();
    let blobs = FileBlobStore::new(dir.path().join("attachments")).unwrap();
    let manager = Arc::new(AttachmentManager::new(
        Arc::new(blobs),
        AttachmentManagerOptions::default(),
    ));

    let contacts: Vec<ContactAddress> = (0..3)
        .map(|i| ContactAddress {
            aci: Some(Uuid::new_v4()),
            pni: None,
            e164: Some(format!("+1555555010{}", i)),
        })
        .collect();

    let mut recipients = RecipientContext::new();
    recipients.register(RecipientId(1), RecipientAddress::Local).unwrap();
    recipients
        .register(RecipientId(2), RecipientAddress::ReleaseChannel)
        .unwrap();
    for (i, contact) in contacts.iter().enumerate() {
        recipients
            .register(RecipientId(10 + i as u64), RecipientAddress::Contact(contact.clone()))
            .unwrap();
    }
    recipients
        .register(RecipientId(30), RecipientAddress::Group(GroupId(vec![3; 32])))
        .unwrap();

    let mut chats = ChatContext::new();
    chats
        .register(ChatId(1), ThreadRecord::contact(CONTACT_THREAD, contacts[0].clone()))
        .unwrap();
    chats
        .register(ChatId(2), ThreadRecord::group(GROUP_THREAD, GroupId(vec![3; 32])))
        .unwrap();

    Env {
        _dir: dir,
        context: BackupContext::new(recipients, chats, 1_800_000_000_000),
        contacts,
        archiver: ChatItemArchiver::new(manager.clone()),
        manager,
    }
}

fn sqlite_store(dir: &TempDir, name: &str) -> SqliteBackupStore {
    SqliteBackupStore::new(dir.path().join(name)).unwrap()
}

fn transit_pointer(content_type: &str) -> FilePointer {
    FilePointer::new(Locator::AttachmentLocator(AttachmentLocator {
        cdn_key: "abc".to_string(),
        cdn_number: 2,
        upload_timestamp: Some(0),
        key: vec![7; 32],
        digest: vec![8; 32],
        size: 1000,
    }))
    .with_content_type(content_type)
}

fn update_item(update_type: SimpleChatUpdateType, author: u64, date_sent: u64) -> ChatItem {
    ChatItem {
        chat_id: ChatId(1),
        author_id: RecipientId(author),
        date_sent,
        expire_start_date: None,
        expires_in_ms: None,
        directional_details: DirectionalDetails::Directionless,
        item: ChatItemPayload::UpdateMessage(ChatUpdateMessage { update_type }),
    }
}

fn outgoing_item(date_sent: u64, message: StandardMessage) -> ChatItem {
    ChatItem {
        chat_id: ChatId(2),
        author_id: RecipientId(1),
        date_sent,
        expire_start_date: None,
        expires_in_ms: None,
        directional_details: DirectionalDetails::Outgoing(Default::default()),
        item: ChatItemPayload::StandardMessage(message),
    }
}

/// Export each update from one store and restore it into another
fn simple_update_round_trip<S: BackupStore>(env: &Env, source: &S, target: &S) {
    let contact = env.contacts[0].clone();
    let cases = vec![
        (LegacyUpdate::SessionEnded, LegacyUpdate::SessionEnded),
        (LegacyUpdate::UserJoinedSignal, LegacyUpdate::UserJoinedSignal),
        (LegacyUpdate::UnsupportedMessage, LegacyUpdate::UnsupportedMessage),
        (LegacyUpdate::ReportedSpam, LegacyUpdate::ReportedSpam),
        (LegacyUpdate::SessionRefresh, LegacyUpdate::SessionRefresh),
        (
            LegacyUpdate::NonBlockingIdentityChange {
                recipient: contact.clone(),
            },
            LegacyUpdate::NonBlockingIdentityChange {
                recipient: contact.clone(),
            },
        ),
        (
            LegacyUpdate::VerificationStateChange {
                details: Some(VerificationStateDetails {
                    recipient: contact.clone(),
                    state: VerificationState::Verified,
                    is_local_change: true,
                }),
            },
            LegacyUpdate::VerificationStateChange {
                details: Some(VerificationStateDetails {
                    recipient: contact.clone(),
                    state: VerificationState::Verified,
                    is_local_change: false,
                }),
            },
        ),
        (
            LegacyUpdate::VerificationStateChange {
                details: Some(VerificationStateDetails {
                    recipient: contact.clone(),
                    state: VerificationState::NoLongerVerified,
                    is_local_change: false,
                }),
            },
            LegacyUpdate::VerificationStateChange {
                details: Some(VerificationStateDetails {
                    recipient: contact.clone(),
                    state: VerificationState::Default,
                    is_local_change: false,
                }),
            },
        ),
        (
            LegacyUpdate::PhoneNumberChange(PhoneNumberChange {
                aci: contact.aci,
                old_number: Some("+15555550100".to_string()),
                new_number: Some("+15555550199".to_string()),
            }),
            LegacyUpdate::PhoneNumberChange(PhoneNumberChange {
                aci: contact.aci,
                old_number: None,
                new_number: None,
            }),
        ),
        (
            LegacyUpdate::PaymentsActivationRequest {
                sender: RecipientAddress::Local,
            },
            LegacyUpdate::PaymentsActivationRequest {
                sender: RecipientAddress::Local,
            },
        ),
        (
            LegacyUpdate::PaymentsActivated {
                sender: RecipientAddress::Contact(contact.clone()),
            },
            LegacyUpdate::PaymentsActivated {
                sender: RecipientAddress::Contact(contact.clone()),
            },
        ),
        (
            LegacyUpdate::DecryptionFailure { sender: None },
            LegacyUpdate::DecryptionFailure {
                sender: Some(contact.clone()),
            },
        ),
    ];

    let mut stats = BackupJobStats::new();
    for (index, (local, expected)) in cases.into_iter().enumerate() {
        let timestamp = 1_000 + index as u64;
        let record = InteractionRecord::new(ThreadId(CONTACT_THREAD), timestamp, InteractionKind::Update(local));
        let row_id = source
            .write(|tx| tx.insert_interaction(&record))
            .unwrap();
        let record = record.with_row_id(row_id);

        let exported = source
            .read(|tx| Ok(env.archiver.archive(&record, &env.context, tx)))
            .unwrap();
        let item = stats.record(exported).unwrap().unwrap();

        let restored = target
            .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
            .unwrap();
        assert!(restored.is_success(), "{:?}", restored);

        let found = target
            .read(|tx| tx.find_interaction_by_timestamp(ThreadId(CONTACT_THREAD), timestamp))
            .unwrap()
            .unwrap();
        assert_eq!(found.kind, InteractionKind::Update(expected));
    }
    assert_eq!(stats.failures, 0);
}

#[test]
fn test_simple_update_round_trip_in_memory() {
    let env = env();
    simple_update_round_trip(&env, &InMemoryBackupStore::new(), &InMemoryBackupStore::new());
}

#[test]
fn test_simple_update_round_trip_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    simple_update_round_trip(&env, &sqlite_store(&dir, "a.db"), &sqlite_store(&dir, "b.db"));
}

#[test]
fn test_reported_spam_by_local_user() {
    let env = env();
    let store = InMemoryBackupStore::new();
    let record = InteractionRecord::new(
        ThreadId(CONTACT_THREAD),
        1_234_567,
        InteractionKind::Update(LegacyUpdate::ReportedSpam),
    );

    let item = store
        .read(|tx| Ok(env.archiver.archive(&record, &env.context, tx)))
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(item.author_id, RecipientId(1));
    assert_eq!(item.directional_details, DirectionalDetails::Directionless);
    assert_eq!(item.date_sent, 1_234_567);
    assert_eq!(
        item.item,
        ChatItemPayload::UpdateMessage(ChatUpdateMessage {
            update_type: SimpleChatUpdateType::ReportedSpam
        })
    );

    let target = InMemoryBackupStore::new();
    target
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    let rows = target.read(|tx| tx.list_interactions(ThreadId(CONTACT_THREAD))).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, 1_234_567);
    assert_eq!(rows[0].kind, InteractionKind::Update(LegacyUpdate::ReportedSpam));
    assert_eq!(target.read(|tx| tx.count_attachments()).unwrap(), 0);
}

fn unresolvable_recipient_inserts_nothing<S: BackupStore>(env: &Env, store: &S) {
    let items = vec![
        update_item(SimpleChatUpdateType::EndSession, 999, 10),
        outgoing_item(
            11,
            StandardMessage {
                text: Some("hi".to_string()),
                ..Default::default()
            },
        ),
    ];
    let mut unknown_author = items[1].clone();
    unknown_author.author_id = RecipientId(999);

    for item in [items[0].clone(), unknown_author] {
        let result = store
            .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
            .unwrap();
        assert!(result.is_failure(), "{:?}", result);
        assert_eq!(result.errors()[0].kind, ErrorKind::RecipientIdNotFound(RecipientId(999)));
    }

    assert!(store.read(|tx| tx.list_interactions(ThreadId(CONTACT_THREAD))).unwrap().is_empty());
    assert!(store.read(|tx| tx.list_interactions(ThreadId(GROUP_THREAD))).unwrap().is_empty());
}

#[test]
fn test_unresolvable_recipient_in_memory() {
    let env = env();
    unresolvable_recipient_inserts_nothing(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_unresolvable_recipient_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    unresolvable_recipient_inserts_nothing(&env, &sqlite_store(&dir, "backup.db"));
}

fn unresolvable_quote_author_inserts_nothing<S: BackupStore>(env: &Env, store: &S) {
    let quoting = outgoing_item(
        12,
        StandardMessage {
            text: Some("hi".to_string()),
            attachments: vec![],
            quote: Some(Quote {
                target_sent_timestamp: Some(11),
                author_id: RecipientId(999),
                text: Some("earlier".to_string()),
                attachments: vec![],
            }),
        },
    );

    let mut stranger_status = outgoing_item(
        13,
        StandardMessage {
            text: Some("hi".to_string()),
            ..Default::default()
        },
    );
    let mut details = backup::proto::OutgoingMessageDetails::default();
    details.send_statuses.push(backup::proto::SendStatus {
        recipient_id: RecipientId(999),
        delivery_status: backup::proto::DeliveryStatus::Sent,
        network_failure: false,
        identity_key_mismatch: false,
        sealed_sender: false,
        timestamp: 13,
    });
    stranger_status.directional_details = DirectionalDetails::Outgoing(details);

    for item in [quoting, stranger_status] {
        let result = store
            .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
            .unwrap();
        assert!(result.is_failure(), "{:?}", result);
        assert!(result.fatal_error().is_none());
        assert_eq!(result.errors()[0].kind, ErrorKind::RecipientIdNotFound(RecipientId(999)));
    }

    assert!(store.read(|tx| tx.list_interactions(ThreadId(GROUP_THREAD))).unwrap().is_empty());
    assert_eq!(store.read(|tx| tx.count_attachments()).unwrap(), 0);
}

#[test]
fn test_unresolvable_quote_author_in_memory() {
    let env = env();
    unresolvable_quote_author_inserts_nothing(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_unresolvable_quote_author_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    unresolvable_quote_author_inserts_nothing(&env, &sqlite_store(&dir, "backup.db"));
}

/// Only the first wire attachment may become the message's long text
fn invalid_first_attachment_keeps_text_in_body<S: BackupStore>(env: &Env, store: &S) {
    let item = outgoing_item(
        14,
        StandardMessage {
            text: None,
            attachments: vec![
                MessageAttachment::new(
                    FilePointer::new(Locator::InvalidAttachmentLocator).with_content_type("image/png"),
                ),
                MessageAttachment::new(transit_pointer(backup::attachments::OVERSIZE_TEXT_MIME_TYPE)),
                MessageAttachment::new(transit_pointer("image/png")),
            ],
            quote: None,
        },
    );

    let result = store
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    assert!(matches!(result, FrameResult::Partial(_, _)), "{:?}", result);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(
        result.errors()[0].kind,
        ErrorKind::Attachment(AttachmentCreationError::InvalidLocator)
    );

    let row = store
        .read(|tx| tx.find_interaction_by_timestamp(ThreadId(GROUP_THREAD), 14))
        .unwrap()
        .unwrap()
        .row_id
        .unwrap();
    let references = store
        .read(|tx| {
            tx.fetch_references(&[
                AttachmentOwnerId::new(OwnerKind::MessageBody, row.0),
                AttachmentOwnerId::new(OwnerKind::MessageOversizeText, row.0),
            ])
        })
        .unwrap();
    let owners: Vec<AttachmentOwner> = references.iter().map(|r| r.owner).collect();
    assert_eq!(
        owners,
        vec![AttachmentOwner::body(row.0, 1), AttachmentOwner::body(row.0, 2)]
    );
}

#[test]
fn test_invalid_first_attachment_in_memory() {
    let env = env();
    invalid_first_attachment_keeps_text_in_body(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_invalid_first_attachment_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    invalid_first_attachment_keeps_text_in_body(&env, &sqlite_store(&dir, "backup.db"));
}

fn identical_streams_share_one_row<S: BackupStore>(env: &Env, store: &S) {
    let first = store
        .write(|tx| env.manager.write_pending_attachment(b"identical bytes", "image/png", tx))
        .unwrap();
    let second = store
        .write(|tx| env.manager.write_pending_attachment(b"identical bytes", "image/png", tx))
        .unwrap();
    assert_eq!(first.sha256_content_hash, second.sha256_content_hash);

    let a = store
        .write(|tx| {
            Ok(env.manager.create_attachment_stream(
                &first,
                AttachmentReferenceParams::new(AttachmentOwner::body(1, 0)),
                tx,
            )?)
        })
        .unwrap();
    let b = store
        .write(|tx| {
            Ok(env.manager.create_attachment_stream(
                &second,
                AttachmentReferenceParams::new(AttachmentOwner::single(OwnerKind::ContactAvatar, 5)),
                tx,
            )?)
        })
        .unwrap();

    assert!(matches!(a, StreamCreation::Inserted(_)));
    assert_eq!(b, StreamCreation::Deduplicated(a.attachment_row_id()));
    assert_eq!(store.read(|tx| tx.count_attachments()).unwrap(), 1);

    let references = store
        .read(|tx| {
            tx.fetch_references(&[
                AttachmentOwnerId::new(OwnerKind::MessageBody, 1),
                AttachmentOwnerId::new(OwnerKind::ContactAvatar, 5),
            ])
        })
        .unwrap();
    assert_eq!(references.len(), 2);
    assert!(references.iter().all(|r| r.attachment_row_id == a.attachment_row_id()));

    assert!(!store.read(|tx| tx.orphan_exists(first.orphan_id)).unwrap());
    assert!(store.read(|tx| tx.orphan_exists(second.orphan_id)).unwrap());
}

#[test]
fn test_dedup_in_memory() {
    let env = env();
    identical_streams_share_one_row(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_dedup_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    identical_streams_share_one_row(&env, &sqlite_store(&dir, "backup.db"));
}

#[test]
fn test_reaper_removes_unclaimed_duplicate() {
    let env = env();
    let store = InMemoryBackupStore::new();
    let first = store
        .write(|tx| env.manager.write_pending_attachment(b"bytes", "image/png", tx))
        .unwrap();
    let second = store
        .write(|tx| env.manager.write_pending_attachment(b"bytes", "image/png", tx))
        .unwrap();
    store
        .write(|tx| {
            for (pending, row) in [(&first, 1), (&second, 2)] {
                env.manager.create_attachment_stream(
                    pending,
                    AttachmentReferenceParams::new(AttachmentOwner::body(row, 0)),
                    tx,
                )?;
            }
            Ok(())
        })
        .unwrap();

    let reaper = OrphanReaper::new(chrono::Duration::hours(1));
    let later = chrono::Utc::now() + chrono::Duration::days(1);
    let stats = store
        .write(|tx| reaper.reap(tx, env.manager.blob_store().as_ref(), later))
        .unwrap();
    assert_eq!(stats.removed_records, 1);
    assert_eq!(stats.deleted_files, 1);

    let kept = backup::storage::BlobKey::from_relative_path(&first.local_relative_path).unwrap();
    assert!(env.manager.blob_store().exists(&kept).unwrap());
}

fn missing_digest_inserts_nothing<S: BackupStore>(env: &Env, store: &S) {
    let pointer = FilePointer::new(Locator::BackupLocator(BackupLocator {
        media_name: "media".to_string(),
        cdn_number: Some(3),
        key: vec![1; 64],
        digest: vec![],
        size: 10,
        transit_cdn_key: None,
        transit_cdn_number: None,
    }));

    let outcome = store
        .write(|tx| {
            Ok(env.manager.create_attachment_pointers(
                vec![OwnedAttachmentPointer::new(
                    AttachmentOwnerId::new(OwnerKind::MessageBody, 1),
                    pointer,
                )],
                tx,
            )?)
        })
        .unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].error, AttachmentCreationError::MissingDigest);
    assert_eq!(store.read(|tx| tx.count_attachments()).unwrap(), 0);
    assert!(store.read(|tx| tx.list_queued_downloads()).unwrap().is_empty());
}

#[test]
fn test_missing_digest_in_memory() {
    let env = env();
    missing_digest_inserts_nothing(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_missing_digest_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    missing_digest_inserts_nothing(&env, &sqlite_store(&dir, "backup.db"));
}

fn transit_only_pointer<S: BackupStore>(env: &Env, store: &S) {
    let attachment = store
        .write(|tx| {
            let outcome = env.manager.create_attachment_pointers(
                vec![OwnedAttachmentPointer::new(
                    AttachmentOwnerId::new(OwnerKind::MessageBody, 1),
                    transit_pointer("image/jpeg"),
                )],
                tx,
            )?;
            assert!(outcome.is_clean());
            Ok(tx.fetch_attachment(outcome.created[0].1)?.unwrap())
        })
        .unwrap();

    let transit = attachment.transit_tier.unwrap();
    assert_eq!(transit.cdn_key, "abc");
    assert_eq!(transit.cdn_number, 2);
    assert_eq!(transit.upload_timestamp, 0);
    assert_eq!(transit.digest, vec![8; 32]);
    assert_eq!(transit.unencrypted_byte_count, Some(1000));
    assert_eq!(attachment.encryption_key, vec![7; 32]);
    assert!(attachment.media_tier.is_none());

    let queued = store.read(|tx| tx.list_queued_downloads()).unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].priority, DownloadPriority::Default);
}

#[test]
fn test_transit_only_pointer_in_memory() {
    let env = env();
    transit_only_pointer(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_transit_only_pointer_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    transit_only_pointer(&env, &sqlite_store(&dir, "backup.db"));
}

#[test]
fn test_outgoing_export_with_unresolvable_recipient() {
    let env = env();
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, "backup.db");
    let stranger = ContactAddress::from_aci(Uuid::new_v4());

    let message = OutgoingMessage::builder()
        .body("three recipients")
        .recipient_state(RecipientSendState::sent(env.contacts[0].clone()))
        .recipient_state(RecipientSendState::sent(stranger))
        .recipient_state(RecipientSendState::sent(env.contacts[2].clone()))
        .build();
    let record = InteractionRecord::new(ThreadId(GROUP_THREAD), 5_000, InteractionKind::Outgoing(message));
    let row_id = store.write(|tx| tx.insert_interaction(&record)).unwrap();
    let record = record.with_row_id(row_id);

    let result = store
        .read(|tx| Ok(env.archiver.archive(&record, &env.context, tx)))
        .unwrap();
    assert!(matches!(result, FrameResult::Partial(_, _)));
    assert_eq!(result.errors().len(), 1);
    let item = result.into_value().unwrap();
    let DirectionalDetails::Outgoing(details) = item.directional_details else {
        panic!("expected outgoing details");
    };
    let ids: Vec<RecipientId> = details.send_statuses.iter().map(|s| s.recipient_id).collect();
    assert_eq!(ids, vec![RecipientId(10), RecipientId(12)]);
}

fn outgoing_round_trip_with_attachments<S: BackupStore>(env: &Env, source: &S, target: &S) {
    // Source: a sent message with long text and one photo
    let message = OutgoingMessage::builder()
        .body("short preview")
        .recipient_state(RecipientSendState::sent(env.contacts[1].clone()))
        .build();
    let record = InteractionRecord::new(ThreadId(GROUP_THREAD), 9_000, InteractionKind::Outgoing(message));
    let row_id = source
        .write(|tx| {
            let row_id = tx.insert_interaction(&record)?;
            let owner = AttachmentOwnerId::new(OwnerKind::MessageBody, row_id.0);
            env.manager.create_attachment_pointers(
                vec![
                    OwnedAttachmentPointer::new(owner, transit_pointer(backup::attachments::OVERSIZE_TEXT_MIME_TYPE)),
                    OwnedAttachmentPointer::new(owner, transit_pointer("image/jpeg")),
                ],
                tx,
            )?;
            Ok(row_id)
        })
        .unwrap();
    let record = record.with_row_id(row_id);

    let item = source
        .read(|tx| Ok(env.archiver.archive(&record, &env.context, tx)))
        .unwrap()
        .into_value()
        .unwrap();
    let ChatItemPayload::StandardMessage(content) = &item.item else {
        panic!("expected standard message");
    };
    assert_eq!(content.attachments.len(), 2);
    assert_eq!(
        content.attachments[0].pointer.content_type.as_deref(),
        Some(backup::attachments::OVERSIZE_TEXT_MIME_TYPE)
    );

    // Round trip through the serialized frame
    let json = serde_json::to_string(&item).unwrap();
    let item: ChatItem = serde_json::from_str(&json).unwrap();

    let result = target
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    assert!(result.is_success(), "{:?}", result);

    let restored = target
        .read(|tx| tx.find_interaction_by_timestamp(ThreadId(GROUP_THREAD), 9_000))
        .unwrap()
        .unwrap();
    let restored_row = restored.row_id.unwrap();
    let references = target
        .read(|tx| {
            tx.fetch_references(&[
                AttachmentOwnerId::new(OwnerKind::MessageBody, restored_row.0),
                AttachmentOwnerId::new(OwnerKind::MessageOversizeText, restored_row.0),
            ])
        })
        .unwrap();
    let mut owners: Vec<AttachmentOwner> = references.iter().map(|r| r.owner).collect();
    owners.sort();
    assert_eq!(
        owners,
        vec![
            AttachmentOwner::body(restored_row.0, 0),
            AttachmentOwner::single(OwnerKind::MessageOversizeText, restored_row.0),
        ]
    );
    assert_eq!(target.read(|tx| tx.list_queued_downloads()).unwrap().len(), 2);
}

#[test]
fn test_outgoing_round_trip_in_memory() {
    let env = env();
    outgoing_round_trip_with_attachments(&env, &InMemoryBackupStore::new(), &InMemoryBackupStore::new());
}

#[test]
fn test_outgoing_round_trip_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    outgoing_round_trip_with_attachments(&env, &sqlite_store(&dir, "a.db"), &sqlite_store(&dir, "b.db"));
}

fn quote_of_remote_original<S: BackupStore>(env: &Env, store: &S) {
    let original = outgoing_item(
        20_000,
        StandardMessage {
            text: None,
            attachments: vec![MessageAttachment::new(transit_pointer("image/png"))],
            quote: None,
        },
    );
    let reply = outgoing_item(
        21_000,
        StandardMessage {
            text: Some("look at this".to_string()),
            attachments: vec![],
            quote: Some(Quote {
                target_sent_timestamp: Some(20_000),
                author_id: RecipientId(1),
                text: None,
                attachments: vec![QuotedAttachment {
                    content_type: Some("image/png".to_string()),
                    file_name: Some("photo.png".to_string()),
                    thumbnail: None,
                }],
            }),
        },
    );

    for item in [&original, &reply] {
        let result = store
            .write(|tx| Ok(env.archiver.restore(item, &env.context, tx)))
            .unwrap();
        assert!(result.is_success(), "{:?}", result);
    }

    let reply_row = store
        .read(|tx| tx.find_interaction_by_timestamp(ThreadId(GROUP_THREAD), 21_000))
        .unwrap()
        .unwrap();
    let InteractionKind::Outgoing(message) = &reply_row.kind else {
        panic!("expected outgoing");
    };
    assert_eq!(
        message.quoted_reply,
        Some(QuotedReply {
            target_timestamp: Some(20_000),
            author: RecipientAddress::Local,
            body: None,
            attachment: Some(QuotedAttachmentInfo {
                content_type: Some("image/png".to_string()),
                file_name: Some("photo.png".to_string()),
            }),
        })
    );

    let row = reply_row.row_id.unwrap();
    let thumbnail = store
        .read(|tx| {
            let references = tx.fetch_references(&[AttachmentOwnerId::new(OwnerKind::QuotedReplyThumbnail, row.0)])?;
            assert_eq!(references.len(), 1);
            Ok(tx.fetch_attachment(references[0].attachment_row_id)?.unwrap())
        })
        .unwrap();
    assert!(thumbnail.original_attachment_id_for_quoted_reply.is_some());
    assert!(thumbnail.transit_tier.is_none());
    assert_eq!(thumbnail.mime_type, "image/png");
}

#[test]
fn test_quote_of_remote_original_in_memory() {
    let env = env();
    quote_of_remote_original(&env, &InMemoryBackupStore::new());
}

#[test]
fn test_quote_of_remote_original_sqlite() {
    let env = env();
    let dir = TempDir::new().unwrap();
    quote_of_remote_original(&env, &sqlite_store(&dir, "backup.db"));
}

#[test]
fn test_invalid_attachment_keeps_message() {
    let env = env();
    let store = InMemoryBackupStore::new();
    let broken = FilePointer::new(Locator::InvalidAttachmentLocator);
    let item = outgoing_item(
        30_000,
        StandardMessage {
            text: Some("caption survives".to_string()),
            attachments: vec![MessageAttachment::new(broken)],
            quote: None,
        },
    );

    let result = store
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    assert!(matches!(result, FrameResult::Partial(_, _)));
    assert_eq!(
        result.errors()[0].kind,
        ErrorKind::Attachment(AttachmentCreationError::InvalidLocator)
    );
    assert_eq!(store.read(|tx| tx.list_interactions(ThreadId(GROUP_THREAD))).unwrap().len(), 1);
}

#[test]
fn test_attachment_only_message_without_valid_pointer_fails() {
    let env = env();
    let store = InMemoryBackupStore::new();
    let item = outgoing_item(
        31_000,
        StandardMessage {
            text: None,
            attachments: vec![MessageAttachment::new(FilePointer::new(Locator::InvalidAttachmentLocator))],
            quote: None,
        },
    );

    let result = store
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    assert!(result.is_failure());
    assert!(store.read(|tx| tx.list_interactions(ThreadId(GROUP_THREAD))).unwrap().is_empty());
}

#[test]
fn test_incoming_standard_message_is_unsupported() {
    let env = env();
    let store = InMemoryBackupStore::new();
    let mut item = outgoing_item(
        40_000,
        StandardMessage {
            text: Some("hi".to_string()),
            ..Default::default()
        },
    );
    item.directional_details = DirectionalDetails::Directionless;

    let result = store
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    assert!(result.is_failure());
    assert!(result.fatal_error().is_none());
    assert_eq!(result.errors()[0].kind, ErrorKind::UnsupportedChatItem("directionless"));
}

#[test]
fn test_release_channel_donation_is_skipped_in_job() {
    let env = env();
    let store = InMemoryBackupStore::new();
    let item = update_item(SimpleChatUpdateType::ReleaseChannelDonationRequest, 2, 50);

    let mut stats = BackupJobStats::new();
    let result = store
        .write(|tx| Ok(env.archiver.restore(&item, &env.context, tx)))
        .unwrap();
    assert_eq!(stats.record(result).unwrap(), None);
    assert_eq!(stats.skips, 1);
    assert!(store.read(|tx| tx.list_interactions(ThreadId(CONTACT_THREAD))).unwrap().is_empty());
}
