//! Cross-record identity resolution for one backup job
//!
//! Recipient and chat frames are processed before any chat item, so by the
//! time an archiver runs every id it may see is already registered here.
//! Lookups never guess: an id or address that was not registered resolves
//! to `None`.

use std::collections::HashMap;

use anyhow::{Result, bail};
use uuid::Uuid;

use super::error::ErrorKind;
use crate::models::{ContactAddress, RecipientAddress, ThreadId, ThreadRecord};
use crate::proto::{ChatId, RecipientId};

/// Bidirectional RecipientId <-> local address map
#[derive(Debug, Default, Clone)]
pub struct RecipientContext {
    by_id: HashMap<RecipientId, RecipientAddress>,
    by_address: HashMap<RecipientAddress, RecipientId>,
    // Contacts are also reachable by any single identifier
    by_aci: HashMap<Uuid, RecipientId>,
    by_pni: HashMap<Uuid, RecipientId>,
    by_e164: HashMap<String, RecipientId>,
    local: Option<RecipientId>,
    release_channel: Option<RecipientId>,
}

impl RecipientContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipient frame
    ///
    /// Fails if either the id or the address is already registered.
    pub fn register(&mut self, id: RecipientId, address: RecipientAddress) -> Result<()> {
        if self.by_id.contains_key(&id) {
            bail!("recipient id {} registered twice", id);
        }
        if self.by_address.contains_key(&address) {
            bail!("recipient {} registered twice", address);
        }

        match &address {
            RecipientAddress::Local => self.local = Some(id),
            RecipientAddress::ReleaseChannel => self.release_channel = Some(id),
            RecipientAddress::Contact(contact) => {
                if let Some(aci) = contact.aci {
                    self.by_aci.insert(aci, id);
                }
                if let Some(pni) = contact.pni {
                    self.by_pni.insert(pni, id);
                }
                if let Some(e164) = &contact.e164 {
                    self.by_e164.insert(e164.clone(), id);
                }
            }
            RecipientAddress::Group(_) | RecipientAddress::DistributionList(_) => {}
        }

        self.by_id.insert(id, address.clone());
        self.by_address.insert(address, id);
        Ok(())
    }

    pub fn address(&self, id: RecipientId) -> Option<&RecipientAddress> {
        self.by_id.get(&id)
    }

    pub fn recipient_id(&self, address: &RecipientAddress) -> Option<RecipientId> {
        match address {
            RecipientAddress::Contact(contact) => self.contact_id(contact),
            RecipientAddress::Local => self.local,
            RecipientAddress::ReleaseChannel => self.release_channel,
            _ => self.by_address.get(address).copied(),
        }
    }

    /// Resolve a contact by its strongest known identifier
    pub fn contact_id(&self, contact: &ContactAddress) -> Option<RecipientId> {
        if let Some(id) = self
            .by_address
            .get(&RecipientAddress::Contact(contact.clone()))
        {
            return Some(*id);
        }
        contact
            .aci
            .and_then(|aci| self.by_aci.get(&aci))
            .or_else(|| contact.pni.and_then(|pni| self.by_pni.get(&pni)))
            .or_else(|| contact.e164.as_ref().and_then(|e164| self.by_e164.get(e164)))
            .copied()
    }

    pub fn local_recipient_id(&self) -> Option<RecipientId> {
        self.local
    }

    pub fn release_channel_id(&self) -> Option<RecipientId> {
        self.release_channel
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Bidirectional ChatId <-> local thread map
#[derive(Debug, Default, Clone)]
pub struct ChatContext {
    threads: HashMap<ThreadId, ThreadRecord>,
    by_chat: HashMap<ChatId, ThreadId>,
    by_thread: HashMap<ThreadId, ChatId>,
}

impl ChatContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, chat_id: ChatId, thread: ThreadRecord) -> Result<()> {
        if self.by_chat.contains_key(&chat_id) {
            bail!("chat id {} registered twice", chat_id);
        }
        if self.by_thread.contains_key(&thread.id) {
            bail!("thread {} registered twice", thread.id.0);
        }
        self.by_chat.insert(chat_id, thread.id);
        self.by_thread.insert(thread.id, chat_id);
        self.threads.insert(thread.id, thread);
        Ok(())
    }

    pub fn thread_id(&self, chat_id: ChatId) -> Option<ThreadId> {
        self.by_chat.get(&chat_id).copied()
    }

    pub fn chat_id(&self, thread_id: ThreadId) -> Option<ChatId> {
        self.by_thread.get(&thread_id).copied()
    }

    pub fn thread(&self, thread_id: ThreadId) -> Option<&ThreadRecord> {
        self.threads.get(&thread_id)
    }
}

/// Everything an archiver may consult besides the store
#[derive(Debug, Clone)]
pub struct BackupContext {
    pub recipients: RecipientContext,
    pub chats: ChatContext,
    /// Wall clock of the job in milliseconds, fixed for its duration
    pub now_ms: u64,
}

impl BackupContext {
    pub fn new(recipients: RecipientContext, chats: ChatContext, now_ms: u64) -> Self {
        Self {
            recipients,
            chats,
            now_ms,
        }
    }

    pub(crate) fn require_recipient_id(
        &self,
        address: &RecipientAddress,
    ) -> std::result::Result<RecipientId, ErrorKind> {
        self.recipients
            .recipient_id(address)
            .ok_or_else(|| ErrorKind::RecipientAddressNotFound(address.to_string()))
    }

    pub(crate) fn require_address(
        &self,
        id: RecipientId,
    ) -> std::result::Result<&RecipientAddress, ErrorKind> {
        self.recipients
            .address(id)
            .ok_or(ErrorKind::RecipientIdNotFound(id))
    }

    pub(crate) fn require_chat_id(&self, thread_id: ThreadId) -> std::result::Result<ChatId, ErrorKind> {
        self.chats
            .chat_id(thread_id)
            .ok_or(ErrorKind::ThreadNotFound(thread_id.0))
    }

    /// Thread a wire chat id was registered for
    pub(crate) fn require_thread(&self, chat_id: ChatId) -> std::result::Result<&ThreadRecord, ErrorKind> {
        self.chats
            .thread_id(chat_id)
            .and_then(|thread_id| self.chats.thread(thread_id))
            .ok_or(ErrorKind::ChatIdNotFound(chat_id))
    }
}
