//! Durable, deduplicated store of media metadata seen through plugins.
//!
//! Records are written once: inserting an id, source or download uri that is
//! already present is dropped with a debug log and reported as `Ok(false)`.

mod schema;

use crate::metadata::{MetadataMap, RecordError, KEY_DURATION};
use crate::models::{MediaRecord, PlayableItem};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid record: {0}")]
    Record(#[from] RecordError),
    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// SQLite-backed media record store; cheap to clone and share across threads.
#[derive(Clone)]
pub struct MetadataDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataDatabase {
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::debug!(path = %path.display(), "opened metadata database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        let current = schema::current();
        let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found > current.version {
            return Err(DbError::UnsupportedVersion {
                found,
                supported: current.version,
            });
        }

        conn.execute_batch(current.up)?;
        if found < current.version {
            if found > 0 {
                tracing::info!(from = found, to = current.version, "upgrading metadata schema");
            }
            conn.pragma_update(None, "user_version", current.version)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Inserts `record`. Returns `Ok(false)` when it collides with a stored one.
    pub fn put(&self, record: &MediaRecord) -> DbResult<bool> {
        let duration = i64::try_from(record.duration_ms).map_err(|_| RecordError::InvalidField {
            key: KEY_DURATION,
            reason: format!("{} does not fit the duration column", record.duration_ms),
        })?;

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO MediaItems (id, artist, title, duration, source, download, album_art_url, waveform_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.artist,
                record.title,
                duration,
                record.source_uri,
                record.download_uri(),
                record.artwork_uri,
                record.waveform_uri(),
            ],
        );

        match inserted {
            Ok(_) => Ok(true),
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                tracing::debug!(id = %record.id, source = %record.source_uri, "record already stored: {err}");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Stores a snapshot of a plugin item.
    pub fn put_item(&self, item: &PlayableItem) -> DbResult<bool> {
        self.put(&MediaRecord::from_playable(item))
    }

    /// Validates an interchange map and stores it.
    pub fn put_metadata(&self, metadata: &MetadataMap) -> DbResult<bool> {
        let record = MediaRecord::from_metadata(metadata)?;
        self.put(&record)
    }

    pub fn get(&self, id: &str) -> DbResult<Option<MediaRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, artist, title, duration, source, download, album_art_url, waveform_url
                 FROM MediaItems WHERE id = ?1",
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Like [`get`](Self::get), in interchange shape tagged as a cache hit.
    pub fn get_metadata(&self, id: &str) -> DbResult<Option<MetadataMap>> {
        Ok(self.get(id)?.map(|record| record.to_metadata()))
    }

    pub fn len(&self) -> DbResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM MediaItems", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let duration: i64 = row.get(3)?;
    let download: Option<String> = row.get(5)?;
    let waveform: Option<String> = row.get(7)?;
    let mut record = MediaRecord::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        duration.max(0) as u64,
        row.get::<_, String>(4)?,
        row.get::<_, String>(6)?,
    );
    if let Some(download) = download {
        record = record.with_download(download);
    }
    if let Some(waveform) = waveform {
        record = record.with_waveform(waveform);
    }
    Ok(record)
}
