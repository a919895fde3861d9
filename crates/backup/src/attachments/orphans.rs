//! Cleanup of local attachment files that never got an owner

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::config::BackupSettings;
use crate::storage::{BackupTransaction, BlobKey, BlobStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    pub deleted_files: usize,
    pub removed_records: usize,
}

/// Deletes orphaned files once they are older than the grace period
///
/// The grace period keeps the reaper away from files whose owning
/// transaction is still in flight.
#[derive(Debug, Clone, Copy)]
pub struct OrphanReaper {
    grace_period: Duration,
}

impl OrphanReaper {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    pub fn from_settings(settings: &BackupSettings) -> Self {
        Self::new(settings.orphan_grace_period())
    }

    pub fn reap(
        &self,
        tx: &dyn BackupTransaction,
        blobs: &dyn BlobStore,
        now: DateTime<Utc>,
    ) -> Result<ReapStats> {
        let cutoff = now - self.grace_period;
        let mut stats = ReapStats::default();

        for orphan in tx.list_orphans()? {
            if orphan.created_at > cutoff {
                continue;
            }

            match BlobKey::from_relative_path(&orphan.local_relative_path) {
                Ok(key) => {
                    if blobs.exists(&key)? {
                        blobs.delete(&key)?;
                        stats.deleted_files += 1;
                    }
                }
                Err(err) => {
                    // Never touch a path outside the attachments directory
                    log::warn!("[ORPHAN] Dropping record {}: {}", orphan.id.0, err);
                }
            }

            tx.release_orphan(orphan.id)?;
            stats.removed_records += 1;
        }

        if stats.removed_records > 0 {
            log::info!(
                "[ORPHAN] Reaped {} records, {} files",
                stats.removed_records,
                stats.deleted_files
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BackupStore, FileBlobStore, InMemoryBackupStore};
    use tempfile::tempdir;

    #[test]
    fn test_reaps_only_old_orphans() {
        let dir = tempdir().unwrap();
        let blobs = FileBlobStore::new(dir.path()).unwrap();
        let store = InMemoryBackupStore::new();
        let key = BlobKey::generate();
        blobs.put(&key, b"left behind").unwrap();
        store.write(|tx| tx.insert_orphan(key.relative_path())).unwrap();

        let reaper = OrphanReaper::new(Duration::hours(1));

        let early = store.write(|tx| reaper.reap(tx, &blobs, Utc::now())).unwrap();
        assert_eq!(early, ReapStats::default());
        assert!(blobs.exists(&key).unwrap());

        let later = Utc::now() + Duration::hours(2);
        let stats = store.write(|tx| reaper.reap(tx, &blobs, later)).unwrap();
        assert_eq!(
            stats,
            ReapStats {
                deleted_files: 1,
                removed_records: 1
            }
        );
        assert!(!blobs.exists(&key).unwrap());
        assert!(store.read(|tx| tx.list_orphans()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_still_clears_record() {
        let dir = tempdir().unwrap();
        let blobs = FileBlobStore::new(dir.path()).unwrap();
        let store = InMemoryBackupStore::new();
        store.write(|tx| tx.insert_orphan("ab/gone.bin.zst")).unwrap();

        let stats = store
            .write(|tx| OrphanReaper::new(Duration::zero()).reap(tx, &blobs, Utc::now()))
            .unwrap();
        assert_eq!(stats.deleted_files, 0);
        assert_eq!(stats.removed_records, 1);
    }

    #[test]
    fn test_escaping_path_is_not_deleted() {
        let dir = tempdir().unwrap();
        let blobs = FileBlobStore::new(dir.path().join("attachments")).unwrap();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "keep").unwrap();
        let store = InMemoryBackupStore::new();
        store.write(|tx| tx.insert_orphan("../keep.txt")).unwrap();

        let stats = store
            .write(|tx| OrphanReaper::new(Duration::zero()).reap(tx, &blobs, Utc::now()))
            .unwrap();
        assert_eq!(stats.removed_records, 1);
        assert!(outside.exists());
    }
}
