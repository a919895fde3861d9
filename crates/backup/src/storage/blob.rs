//! Blob storage trait for local attachment files

use anyhow::{Result, bail};
use uuid::Uuid;

/// Key for storing/retrieving a local attachment file
///
/// Keys are relative paths under the attachments directory, sharded by the
/// first two characters of a random file id: `ab/ab12...ef.bin.zst`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    relative_path: String,
}

impl BlobKey {
    /// A fresh key for a file that does not exist yet
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            relative_path: format!("{}/{}.bin.zst", &id[..2], id),
        }
    }

    /// Rebuild a key from a stored relative path
    ///
    /// Absolute paths and parent-directory components are rejected.
    pub fn from_relative_path(path: &str) -> Result<Self> {
        if path.is_empty()
            || path.starts_with('/')
            || path.split('/').any(|component| component == ".." || component.is_empty())
        {
            bail!("Invalid blob path {:?}", path);
        }
        Ok(Self {
            relative_path: path.to_string(),
        })
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }
}

/// Result of writing a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Size of the file as stored (after compression)
    pub stored_byte_count: u64,
    /// SHA-256 of the stored bytes
    pub digest: Vec<u8>,
}

/// Trait for blob storage operations
///
/// Implementations handle compression/decompression internally.
pub trait BlobStore: Send + Sync {
    /// Store blob content
    fn put(&self, key: &BlobKey, data: &[u8]) -> Result<StoredBlob>;

    /// Retrieve blob content
    ///
    /// Returns None if the blob doesn't exist.
    fn get(&self, key: &BlobKey) -> Result<Option<Vec<u8>>>;

    /// Check if a blob exists
    fn exists(&self, key: &BlobKey) -> Result<bool>;

    /// Delete a blob; deleting a missing blob is not an error
    fn delete(&self, key: &BlobKey) -> Result<()>;
}
