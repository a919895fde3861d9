//! Thread model (a 1:1 or group conversation)

use serde::{Deserialize, Serialize};

use super::{ContactAddress, GroupId};

/// Local row id of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub i64);

/// What kind of conversation a thread is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ThreadKind {
    /// 1:1 conversation with a contact
    Contact(ContactAddress),
    /// Group conversation
    Group(GroupId),
}

/// A thread as the archivers see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: ThreadId,
    pub kind: ThreadKind,
}

impl ThreadRecord {
    pub fn contact(id: i64, address: ContactAddress) -> Self {
        Self {
            id: ThreadId(id),
            kind: ThreadKind::Contact(address),
        }
    }

    pub fn group(id: i64, group_id: GroupId) -> Self {
        Self {
            id: ThreadId(id),
            kind: ThreadKind::Group(group_id),
        }
    }

    /// The counterpart of a 1:1 thread, `None` for groups
    pub fn contact_address(&self) -> Option<&ContactAddress> {
        match &self.kind {
            ThreadKind::Contact(address) => Some(address),
            ThreadKind::Group(_) => None,
        }
    }
}
