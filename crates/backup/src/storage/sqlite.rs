//! SQLite-backed store binding
//!
//! Interactions keep their type-specific payload as a JSON column. The
//! attachments table carries a partial UNIQUE index on the plaintext hash,
//! which is what makes content deduplication safe under concurrent writers.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};
use rusqlite_migration::{M, Migrations};
use uuid::Uuid;

use super::traits::{
    AttachmentInsertError, AttachmentStore, BackupAttachmentDownloadStore, BackupStore,
    BackupTransaction, InteractionStore, OrphanAttachmentStore,
};
use crate::models::{
    Attachment, AttachmentOwner, AttachmentOwnerId, AttachmentReference,
    AttachmentReferenceParams, AttachmentRowId, DownloadPriority, InteractionKind,
    InteractionRecord, InteractionRowId, NewAttachment, OrphanAttachmentRecord, OrphanRecordId,
    OwnerKind, QueuedAttachmentDownload, RenderingFlag, ThreadId,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                unique_id TEXT NOT NULL UNIQUE,
                thread_id INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL  -- JSON
            );

            CREATE INDEX idx_interactions_thread_timestamp
                ON interactions(thread_id, timestamp);

            CREATE TABLE attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mime_type TEXT NOT NULL,
                blur_hash TEXT,
                encryption_key BLOB NOT NULL,
                sha256_content_hash BLOB,
                media_name TEXT,
                transit_tier TEXT,  -- JSON
                media_tier TEXT,    -- JSON
                stream TEXT,        -- JSON
                original_attachment_id_for_quoted_reply INTEGER
                    REFERENCES attachments(id) ON DELETE SET NULL
            );

            CREATE UNIQUE INDEX idx_attachments_content_hash
                ON attachments(sha256_content_hash)
                WHERE sha256_content_hash IS NOT NULL;

            CREATE TABLE attachment_references (
                attachment_id INTEGER NOT NULL
                    REFERENCES attachments(id) ON DELETE CASCADE,
                owner_kind TEXT NOT NULL,
                owner_row_id INTEGER NOT NULL,
                order_in_owner INTEGER,
                rendering_flag TEXT NOT NULL,
                client_uuid TEXT,
                source_filename TEXT,
                source_unencrypted_byte_count INTEGER,
                source_width INTEGER,
                source_height INTEGER,
                caption TEXT
            );

            CREATE UNIQUE INDEX idx_attachment_references_slot
                ON attachment_references(owner_kind, owner_row_id, IFNULL(order_in_owner, -1));
            CREATE INDEX idx_attachment_references_attachment
                ON attachment_references(attachment_id);

            CREATE TABLE orphaned_attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                local_relative_path TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE backup_attachment_download_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attachment_id INTEGER NOT NULL
                    REFERENCES attachments(id) ON DELETE CASCADE,
                owner_kind TEXT NOT NULL,
                owner_row_id INTEGER NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                is_thumbnail_clone INTEGER NOT NULL DEFAULT 0,
                enqueued_at TEXT NOT NULL
            );

            CREATE INDEX idx_download_queue_priority
                ON backup_attachment_download_queue(priority DESC, id ASC);
            "#,
        ),
    ])
}

/// SQLite implementation of the backup store contract
pub struct SqliteBackupStore {
    conn: Mutex<Connection>,
}

impl SqliteBackupStore {
    /// Open (or create) the database at `db_path` and migrate it
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        log::debug!("[STORE] SQLite backup store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl BackupStore for SqliteBackupStore {
    fn write<T>(&self, f: impl FnOnce(&dyn BackupTransaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin write transaction")?;
        let value = f(&SqliteTransaction { conn: &tx })?;
        tx.commit().context("Failed to commit write transaction")?;
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&dyn BackupTransaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        // Dropped without commit
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .context("Failed to begin read transaction")?;
        f(&SqliteTransaction { conn: &tx })
    }
}

/// Store handle bound to one open SQLite transaction
pub struct SqliteTransaction<'conn> {
    conn: &'conn Connection,
}

fn to_sql_u64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {} does not fit in an INTEGER column", value))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp {:?}", raw))?
        .with_timezone(&Utc))
}

fn json_column<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).context("Failed to encode JSON column"))
        .transpose()
}

fn parse_json_column<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Result<Option<T>> {
    raw.map(|s| serde_json::from_str(&s).context("Failed to decode JSON column"))
        .transpose()
}

struct RawInteraction {
    id: i64,
    unique_id: String,
    thread_id: i64,
    timestamp: i64,
    kind: String,
}

impl RawInteraction {
    const COLUMNS: &'static str = "id, unique_id, thread_id, timestamp, kind";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            unique_id: row.get(1)?,
            thread_id: row.get(2)?,
            timestamp: row.get(3)?,
            kind: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<InteractionRecord> {
        let kind: InteractionKind = serde_json::from_str(&self.kind)
            .with_context(|| format!("Failed to decode interaction {}", self.id))?;
        Ok(InteractionRecord {
            row_id: Some(InteractionRowId(self.id)),
            unique_id: self.unique_id,
            thread_id: ThreadId(self.thread_id),
            timestamp: self.timestamp as u64,
            kind,
        })
    }
}

struct RawAttachment {
    id: i64,
    mime_type: String,
    blur_hash: Option<String>,
    encryption_key: Vec<u8>,
    sha256_content_hash: Option<Vec<u8>>,
    media_name: Option<String>,
    transit_tier: Option<String>,
    media_tier: Option<String>,
    stream: Option<String>,
    original_attachment_id_for_quoted_reply: Option<i64>,
}

impl RawAttachment {
    const COLUMNS: &'static str = "a.id, a.mime_type, a.blur_hash, a.encryption_key, \
         a.sha256_content_hash, a.media_name, a.transit_tier, a.media_tier, a.stream, \
         a.original_attachment_id_for_quoted_reply";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            mime_type: row.get(1)?,
            blur_hash: row.get(2)?,
            encryption_key: row.get(3)?,
            sha256_content_hash: row.get(4)?,
            media_name: row.get(5)?,
            transit_tier: row.get(6)?,
            media_tier: row.get(7)?,
            stream: row.get(8)?,
            original_attachment_id_for_quoted_reply: row.get(9)?,
        })
    }

    fn into_attachment(self) -> Result<Attachment> {
        Ok(Attachment {
            id: AttachmentRowId(self.id),
            mime_type: self.mime_type,
            blur_hash: self.blur_hash,
            encryption_key: self.encryption_key,
            sha256_content_hash: self.sha256_content_hash,
            media_name: self.media_name,
            transit_tier: parse_json_column(self.transit_tier)?,
            media_tier: parse_json_column(self.media_tier)?,
            stream: parse_json_column(self.stream)?,
            original_attachment_id_for_quoted_reply: self
                .original_attachment_id_for_quoted_reply
                .map(AttachmentRowId),
        })
    }
}

struct RawReference {
    attachment_id: i64,
    owner_kind: String,
    owner_row_id: i64,
    order_in_owner: Option<u32>,
    rendering_flag: String,
    client_uuid: Option<String>,
    source_filename: Option<String>,
    source_unencrypted_byte_count: Option<u32>,
    source_width: Option<u32>,
    source_height: Option<u32>,
    caption: Option<String>,
}

impl RawReference {
    const COLUMNS: &'static str = "r.attachment_id, r.owner_kind, r.owner_row_id, \
         r.order_in_owner, r.rendering_flag, r.client_uuid, r.source_filename, \
         r.source_unencrypted_byte_count, r.source_width, r.source_height, r.caption";

    /// Reads the reference columns starting at `offset`
    fn from_row(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            attachment_id: row.get(offset)?,
            owner_kind: row.get(offset + 1)?,
            owner_row_id: row.get(offset + 2)?,
            order_in_owner: row.get(offset + 3)?,
            rendering_flag: row.get(offset + 4)?,
            client_uuid: row.get(offset + 5)?,
            source_filename: row.get(offset + 6)?,
            source_unencrypted_byte_count: row.get(offset + 7)?,
            source_width: row.get(offset + 8)?,
            source_height: row.get(offset + 9)?,
            caption: row.get(offset + 10)?,
        })
    }

    fn into_reference(self) -> Result<AttachmentReference> {
        let kind = OwnerKind::parse(&self.owner_kind)
            .ok_or_else(|| anyhow!("Unknown owner kind {:?}", self.owner_kind))?;
        let client_uuid = self
            .client_uuid
            .map(|raw| Uuid::parse_str(&raw))
            .transpose()
            .context("Invalid client uuid")?;
        Ok(AttachmentReference {
            attachment_row_id: AttachmentRowId(self.attachment_id),
            owner: AttachmentOwner {
                id: AttachmentOwnerId::new(kind, self.owner_row_id),
                order_in_owner: self.order_in_owner,
            },
            rendering_flag: RenderingFlag::parse(&self.rendering_flag),
            client_uuid,
            source_filename: self.source_filename,
            source_unencrypted_byte_count: self.source_unencrypted_byte_count,
            source_media_size_pixels: self.source_width.zip(self.source_height),
            caption: self.caption,
        })
    }
}

impl SqliteTransaction<'_> {
    fn slot_taken(&self, owner: &AttachmentOwner) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attachment_references
             WHERE owner_kind = ?1 AND owner_row_id = ?2
               AND IFNULL(order_in_owner, -1) = IFNULL(?3, -1)",
            params![owner.id.kind.as_str(), owner.id.owner_row_id, owner.order_in_owner],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_reference(
        &self,
        reference: &AttachmentReferenceParams,
        attachment_id: AttachmentRowId,
    ) -> Result<()> {
        let (width, height) = reference.source_media_size_pixels.unzip();
        self.conn
            .execute(
                "INSERT INTO attachment_references (
                    attachment_id, owner_kind, owner_row_id, order_in_owner, rendering_flag,
                    client_uuid, source_filename, source_unencrypted_byte_count,
                    source_width, source_height, caption
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    attachment_id.0,
                    reference.owner.id.kind.as_str(),
                    reference.owner.id.owner_row_id,
                    reference.owner.order_in_owner,
                    reference.rendering_flag.as_str(),
                    reference.client_uuid.map(|u| u.to_string()),
                    reference.source_filename,
                    reference.source_unencrypted_byte_count,
                    width,
                    height,
                    reference.caption,
                ],
            )
            .with_context(|| {
                format!(
                    "Failed to insert reference {} {} for attachment {}",
                    reference.owner.id.kind.as_str(),
                    reference.owner.id.owner_row_id,
                    attachment_id.0
                )
            })?;
        Ok(())
    }

    fn attachment_id_for_hash(&self, hash: &[u8]) -> Result<Option<AttachmentRowId>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM attachments WHERE sha256_content_hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?
            .map(AttachmentRowId))
    }
}

impl InteractionStore for SqliteTransaction<'_> {
    fn insert_interaction(&self, record: &InteractionRecord) -> Result<InteractionRowId> {
        let kind = serde_json::to_string(&record.kind).context("Failed to encode interaction")?;
        self.conn
            .execute(
                "INSERT INTO interactions (unique_id, thread_id, timestamp, kind)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.unique_id,
                    record.thread_id.0,
                    to_sql_u64(record.timestamp)?,
                    kind
                ],
            )
            .with_context(|| format!("Failed to insert interaction {}", record.unique_id))?;
        Ok(InteractionRowId(self.conn.last_insert_rowid()))
    }

    fn fetch_interaction(&self, row_id: InteractionRowId) -> Result<Option<InteractionRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM interactions WHERE id = ?1", RawInteraction::COLUMNS),
                params![row_id.0],
                RawInteraction::from_row,
            )
            .optional()?;
        raw.map(RawInteraction::into_record).transpose()
    }

    fn find_interaction_by_timestamp(
        &self,
        thread_id: ThreadId,
        timestamp: u64,
    ) -> Result<Option<InteractionRecord>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM interactions WHERE thread_id = ?1 AND timestamp = ?2
                     ORDER BY id ASC LIMIT 1",
                    RawInteraction::COLUMNS
                ),
                params![thread_id.0, to_sql_u64(timestamp)?],
                RawInteraction::from_row,
            )
            .optional()?;
        raw.map(RawInteraction::into_record).transpose()
    }

    fn list_interactions(&self, thread_id: ThreadId) -> Result<Vec<InteractionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM interactions WHERE thread_id = ?1 ORDER BY timestamp ASC, id ASC",
            RawInteraction::COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![thread_id.0], RawInteraction::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawInteraction::into_record).collect()
    }
}

impl AttachmentStore for SqliteTransaction<'_> {
    fn fetch_attachment(&self, id: AttachmentRowId) -> Result<Option<Attachment>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM attachments a WHERE a.id = ?1", RawAttachment::COLUMNS),
                params![id.0],
                RawAttachment::from_row,
            )
            .optional()?;
        raw.map(RawAttachment::into_attachment).transpose()
    }

    fn fetch_references(&self, owners: &[AttachmentOwnerId]) -> Result<Vec<AttachmentReference>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM attachment_references r
             WHERE r.owner_kind = ?1 AND r.owner_row_id = ?2",
            RawReference::COLUMNS
        ))?;

        let mut references = Vec::new();
        for owner in owners {
            let raws = stmt
                .query_map(params![owner.kind.as_str(), owner.owner_row_id], |row| {
                    RawReference::from_row(row, 0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for raw in raws {
                references.push(raw.into_reference()?);
            }
        }
        references.sort_by_key(|r| r.owner);
        Ok(references)
    }

    fn insert_attachment(
        &self,
        attachment: &NewAttachment,
        reference: &AttachmentReferenceParams,
    ) -> std::result::Result<AttachmentRowId, AttachmentInsertError> {
        if self.slot_taken(&reference.owner)? {
            return Err(anyhow!(
                "owner slot {} {} {:?} already has a reference",
                reference.owner.id.kind.as_str(),
                reference.owner.id.owner_row_id,
                reference.owner.order_in_owner
            )
            .into());
        }

        let inserted = self.conn.execute(
            "INSERT INTO attachments (
                mime_type, blur_hash, encryption_key, sha256_content_hash, media_name,
                transit_tier, media_tier, stream, original_attachment_id_for_quoted_reply
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                attachment.mime_type,
                attachment.blur_hash,
                attachment.encryption_key,
                attachment.sha256_content_hash,
                attachment.media_name,
                json_column(&attachment.transit_tier)?,
                json_column(&attachment.media_tier)?,
                json_column(&attachment.stream)?,
                attachment.original_attachment_id_for_quoted_reply.map(|id| id.0),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                // Only the content hash index can conflict here
                if let Some(hash) = &attachment.sha256_content_hash
                    && let Some(existing) = self.attachment_id_for_hash(hash)?
                {
                    return Err(AttachmentInsertError::DuplicatePlaintextHash { existing });
                }
                return Err(anyhow!("attachment insert violated a constraint: {}", err).into());
            }
            Err(err) => return Err(anyhow::Error::new(err).context("Failed to insert attachment").into()),
        }

        let id = AttachmentRowId(self.conn.last_insert_rowid());
        self.insert_reference(reference, id)?;
        Ok(id)
    }

    fn add_owner(
        &self,
        reference: &AttachmentReferenceParams,
        attachment_id: AttachmentRowId,
    ) -> Result<()> {
        self.insert_reference(reference, attachment_id)
    }

    fn remove_owner(&self, owner: &AttachmentOwner, attachment_id: AttachmentRowId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM attachment_references
             WHERE attachment_id = ?1 AND owner_kind = ?2 AND owner_row_id = ?3
               AND IFNULL(order_in_owner, -1) = IFNULL(?4, -1)",
            params![
                attachment_id.0,
                owner.id.kind.as_str(),
                owner.id.owner_row_id,
                owner.order_in_owner
            ],
        )?;
        self.conn.execute(
            "DELETE FROM attachments WHERE id = ?1
               AND NOT EXISTS (SELECT 1 FROM attachment_references WHERE attachment_id = ?1)",
            params![attachment_id.0],
        )?;
        Ok(())
    }

    fn fetch_attachment_by_content_hash(
        &self,
        sha256_content_hash: &[u8],
    ) -> Result<Option<Attachment>> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM attachments a WHERE a.sha256_content_hash = ?1",
                    RawAttachment::COLUMNS
                ),
                params![sha256_content_hash],
                RawAttachment::from_row,
            )
            .optional()?;
        raw.map(RawAttachment::into_attachment).transpose()
    }

    fn attachment_to_use_in_quote(
        &self,
        message_row_id: InteractionRowId,
    ) -> Result<Option<(AttachmentReference, Attachment)>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, {} FROM attachment_references r
                     JOIN attachments a ON a.id = r.attachment_id
                     WHERE r.owner_kind = ?1 AND r.owner_row_id = ?2
                       AND (a.mime_type LIKE 'image/%' OR a.mime_type LIKE 'video/%')
                     ORDER BY IFNULL(r.order_in_owner, -1) ASC
                     LIMIT 1",
                    RawAttachment::COLUMNS,
                    RawReference::COLUMNS
                ),
                params![OwnerKind::MessageBody.as_str(), message_row_id.0],
                |row| Ok((RawAttachment::from_row(row)?, RawReference::from_row(row, 10)?)),
            )
            .optional()?;

        match row {
            Some((attachment, reference)) => Ok(Some((
                reference.into_reference()?,
                attachment.into_attachment()?,
            ))),
            None => Ok(None),
        }
    }

    fn count_attachments(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM attachments", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl OrphanAttachmentStore for SqliteTransaction<'_> {
    fn insert_orphan(&self, local_relative_path: &str) -> Result<OrphanRecordId> {
        self.conn.execute(
            "INSERT INTO orphaned_attachments (local_relative_path, created_at) VALUES (?1, ?2)",
            params![local_relative_path, Utc::now().to_rfc3339()],
        )?;
        Ok(OrphanRecordId(self.conn.last_insert_rowid()))
    }

    fn orphan_exists(&self, id: OrphanRecordId) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM orphaned_attachments WHERE id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn release_orphan(&self, id: OrphanRecordId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM orphaned_attachments WHERE id = ?1",
            params![id.0],
        )?;
        Ok(())
    }

    fn list_orphans(&self) -> Result<Vec<OrphanAttachmentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, local_relative_path, created_at FROM orphaned_attachments ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, local_relative_path, created_at)| {
                Ok(OrphanAttachmentRecord {
                    id: OrphanRecordId(id),
                    local_relative_path,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

impl BackupAttachmentDownloadStore for SqliteTransaction<'_> {
    fn enqueue_download(
        &self,
        attachment_row_id: AttachmentRowId,
        owner: AttachmentOwnerId,
        priority: DownloadPriority,
        is_thumbnail_clone: bool,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO backup_attachment_download_queue (
                    attachment_id, owner_kind, owner_row_id, priority, is_thumbnail_clone, enqueued_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    attachment_row_id.0,
                    owner.kind.as_str(),
                    owner.owner_row_id,
                    priority.as_i64(),
                    is_thumbnail_clone,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to enqueue attachment {}", attachment_row_id.0))?;
        Ok(())
    }

    fn list_queued_downloads(&self) -> Result<Vec<QueuedAttachmentDownload>> {
        let mut stmt = self.conn.prepare(
            "SELECT attachment_id, owner_kind, owner_row_id, priority, is_thumbnail_clone, enqueued_at
             FROM backup_attachment_download_queue ORDER BY priority DESC, id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(attachment_id, owner_kind, owner_row_id, priority, clone, enqueued_at)| {
                let kind = OwnerKind::parse(&owner_kind)
                    .ok_or_else(|| anyhow!("Unknown owner kind {:?}", owner_kind))?;
                Ok(QueuedAttachmentDownload {
                    attachment_row_id: AttachmentRowId(attachment_id),
                    owner: AttachmentOwnerId::new(kind, owner_row_id),
                    priority: DownloadPriority::from_i64(priority),
                    is_thumbnail_clone: clone,
                    enqueued_at: parse_timestamp(&enqueued_at)?,
                })
            })
            .collect()
    }
}
