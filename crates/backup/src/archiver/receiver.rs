//! Insertion of restored sent messages

use anyhow::Result;

use crate::models::{
    InteractionKind, InteractionRecord, InteractionRowId, OutgoingMessage, QuotedReply,
    RecipientSendState, ThreadId,
};
use crate::storage::BackupTransaction;

/// Everything needed to insert one sent message
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessageTranscript {
    pub thread_id: ThreadId,
    pub timestamp: u64,
    pub body: Option<String>,
    pub quoted_reply: Option<QuotedReply>,
    pub recipient_states: Vec<RecipientSendState>,
    pub expires_in_ms: Option<u64>,
    pub expire_started_at: Option<u64>,
    pub is_view_once: bool,
}

impl SentMessageTranscript {
    pub fn into_record(self) -> InteractionRecord {
        let message = OutgoingMessage {
            body: self.body,
            recipient_states: self.recipient_states,
            quoted_reply: self.quoted_reply,
            expires_in_ms: self.expires_in_ms,
            expire_started_at: self.expire_started_at,
            is_view_once: self.is_view_once,
        };
        InteractionRecord::new(self.thread_id, self.timestamp, InteractionKind::Outgoing(message))
    }
}

/// Inserts a sent message, or reports that it already exists
pub trait MessageReceiver: Send + Sync {
    /// `Ok(None)` means nothing was inserted
    fn insert_sent_message(
        &self,
        transcript: SentMessageTranscript,
        tx: &dyn BackupTransaction,
    ) -> Result<Option<InteractionRowId>>;
}

/// Receiver that writes straight to the interaction store
///
/// A message already present in the thread at the same timestamp is
/// treated as a duplicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreMessageReceiver;

impl MessageReceiver for StoreMessageReceiver {
    fn insert_sent_message(
        &self,
        transcript: SentMessageTranscript,
        tx: &dyn BackupTransaction,
    ) -> Result<Option<InteractionRowId>> {
        if let Some(existing) = tx.find_interaction_by_timestamp(transcript.thread_id, transcript.timestamp)?
            && matches!(existing.kind, InteractionKind::Outgoing(_))
        {
            log::debug!(
                "[RESTORE] Sent message at {} already in thread {}",
                transcript.timestamp,
                transcript.thread_id.0
            );
            return Ok(None);
        }

        let row_id = tx.insert_interaction(&transcript.into_record())?;
        Ok(Some(row_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BackupStore, InMemoryBackupStore};

    fn transcript(body: &str) -> SentMessageTranscript {
        SentMessageTranscript {
            thread_id: ThreadId(1),
            timestamp: 42,
            body: Some(body.to_string()),
            quoted_reply: None,
            recipient_states: vec![],
            expires_in_ms: None,
            expire_started_at: None,
            is_view_once: false,
        }
    }

    #[test]
    fn test_second_insert_is_duplicate() {
        let store = InMemoryBackupStore::new();
        let receiver = StoreMessageReceiver;

        let first = store
            .write(|tx| receiver.insert_sent_message(transcript("hi"), tx))
            .unwrap();
        let second = store
            .write(|tx| receiver.insert_sent_message(transcript("hi again"), tx))
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.read(|tx| tx.list_interactions(ThreadId(1))).unwrap().len(), 1);
    }

    #[test]
    fn test_transcript_becomes_outgoing_record() {
        let record = transcript("hello").into_record();
        assert_eq!(record.timestamp, 42);
        match record.kind {
            InteractionKind::Outgoing(message) => assert_eq!(message.body.as_deref(), Some("hello")),
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
