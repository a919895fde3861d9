//! Recipient addresses as the local database knows them

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Address of a single contact
///
/// A contact may be known by its ACI, its PNI, its phone number, or any
/// combination. At least one identifier is expected to be present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactAddress {
    pub aci: Option<Uuid>,
    pub pni: Option<Uuid>,
    pub e164: Option<String>,
}

impl ContactAddress {
    /// Create an address known only by ACI
    pub fn from_aci(aci: Uuid) -> Self {
        Self {
            aci: Some(aci),
            pni: None,
            e164: None,
        }
    }

    /// Create an address known only by phone number
    pub fn from_e164(e164: impl Into<String>) -> Self {
        Self {
            aci: None,
            pni: None,
            e164: Some(e164.into()),
        }
    }

    /// Whether any identifier is present
    pub fn is_valid(&self) -> bool {
        self.aci.is_some() || self.pni.is_some() || self.e164.is_some()
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Phone numbers stay out of logs
        match (&self.aci, &self.pni, &self.e164) {
            (Some(aci), _, _) => write!(f, "aci:{}", aci),
            (None, Some(pni), _) => write!(f, "pni:{}", pni),
            (None, None, Some(_)) => write!(f, "e164:<redacted>"),
            (None, None, None) => write!(f, "<empty address>"),
        }
    }
}

/// Group identifier (raw group id bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub Vec<u8>);

/// Story distribution list identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistributionListId(pub Uuid);

/// Anything a backup `RecipientId` can resolve to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecipientAddress {
    Contact(ContactAddress),
    Group(GroupId),
    DistributionList(DistributionListId),
    /// The account owner
    Local,
    /// The release-notes channel
    ReleaseChannel,
}

impl RecipientAddress {
    /// Short name of the variant, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            RecipientAddress::Contact(_) => "contact",
            RecipientAddress::Group(_) => "group",
            RecipientAddress::DistributionList(_) => "distribution list",
            RecipientAddress::Local => "local",
            RecipientAddress::ReleaseChannel => "release channel",
        }
    }

    /// The contact address, if this is a contact
    pub fn as_contact(&self) -> Option<&ContactAddress> {
        match self {
            RecipientAddress::Contact(address) => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for RecipientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientAddress::Contact(address) => write!(f, "contact({})", address),
            RecipientAddress::Group(id) => write!(f, "group({} bytes)", id.0.len()),
            RecipientAddress::DistributionList(id) => write!(f, "distribution_list({})", id.0),
            RecipientAddress::Local => write!(f, "local"),
            RecipientAddress::ReleaseChannel => write!(f, "release_channel"),
        }
    }
}
