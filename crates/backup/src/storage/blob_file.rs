//! File-based blob storage with zstd compression

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use super::blob::{BlobKey, BlobStore, StoredBlob};

/// File-based blob storage with zstd compression
///
/// Directory structure:
/// ```text
/// attachments/
///   ab/
///     ab12cd34ef56....bin.zst
///   cd/
///     cd78ef90ab12....bin.zst
/// ```
pub struct FileBlobStore {
    root: PathBuf,
    compression_level: i32,
}

impl FileBlobStore {
    /// Create a new file blob store at the given path
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_compression_level(root, 3)
    }

    pub fn with_compression_level(root: impl AsRef<Path>, compression_level: i32) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).context("Failed to create attachments directory")?;
        Ok(Self {
            root,
            compression_level,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the file path for a blob key
    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, key: &BlobKey, data: &[u8]) -> Result<StoredBlob> {
        let path = self.blob_path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let compressed =
            zstd::encode_all(data, self.compression_level).context("Failed to compress blob")?;

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &compressed)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)?;

        Ok(StoredBlob {
            stored_byte_count: compressed.len() as u64,
            digest: Sha256::digest(&compressed).to_vec(),
        })
    }

    fn get(&self, key: &BlobKey) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key);

        if !path.exists() {
            return Ok(None);
        }

        let compressed = fs::read(&path)?;
        let mut decoder = zstd::Decoder::new(compressed.as_slice())?;
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("Failed to decompress blob")?;

        Ok(Some(decompressed))
    }

    fn exists(&self, key: &BlobKey) -> Result<bool> {
        Ok(self.blob_path(key).exists())
    }

    fn delete(&self, key: &BlobKey) -> Result<()> {
        let path = self.blob_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
        }
        Ok(())
    }
}
