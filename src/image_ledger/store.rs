//! Image ledger storage.
//!
//! SQLite-backed persistence for uploaded images and their recognition status.

use super::models::*;
use super::schema::IMAGE_LEDGER_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::{open_in_memory_db, open_versioned_db};
use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Persistent collection of uploaded images.
pub trait ImageLedger: Send + Sync {
    // === Core contract ===

    /// Find any image with the given kind and status. Which one is returned
    /// when several match is unspecified.
    ///
    /// Read-only and not atomic with a following `save`: processing must
    /// claim through [`ImageLedger::claim_next_eligible`] instead.
    fn find_one_eligible(&self, kind: &str, status: ImageStatus) -> Result<Option<Image>>;

    /// Persist all mutable fields of an existing image and bump `updated_at`.
    fn save(&self, image: &Image) -> Result<()>;

    // === Extras ===

    /// Add a new image. Fails if the id already exists.
    fn insert(&self, image: &Image) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Image>>;

    /// Atomically pick one QUEUED image of the given kind and move it to
    /// PROCESSING. Returns the image as it is after the transition, or None if
    /// nothing was eligible.
    fn claim_next_eligible(&self, kind: &str) -> Result<Option<Image>>;

    /// Tag an image for recognition and queue it, according to its current status.
    fn queue_for_recognition(&self, id: &str) -> Result<QueueRequestResult>;

    fn count_by_status(&self) -> Result<ImageStatusCounts>;
}

const IMAGE_COLUMNS: &str = "id, url, kind, status, species_document_id, user_id, filename, size, mimetype, created_at, updated_at";

pub struct SqliteImageLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImageLedger {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, IMAGE_LEDGER_VERSIONED_SCHEMAS, "image ledger")?;
        let store = SqliteImageLedger {
            conn: Arc::new(Mutex::new(conn)),
        };
        let counts = store.count_by_status()?;
        info!(
            "Image ledger opened: {} new, {} queued, {} processing, {} done, {} failed",
            counts.new, counts.queued, counts.processing, counts.done, counts.failed
        );
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory_db(IMAGE_LEDGER_VERSIONED_SCHEMAS)?;
        Ok(SqliteImageLedger {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_image(row: &rusqlite::Row) -> rusqlite::Result<Image> {
        let status_code: i32 = row.get("status")?;
        let status = ImageStatus::from_i32(status_code).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Integer,
                format!("unknown image status {}", status_code).into(),
            )
        })?;
        Ok(Image {
            id: row.get("id")?,
            url: row.get("url")?,
            kind: row.get("kind")?,
            status,
            species_document_id: row.get("species_document_id")?,
            user_id: row.get("user_id")?,
            filename: row.get("filename")?,
            size: row.get("size")?,
            mimetype: row.get("mimetype")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

impl ImageLedger for SqliteImageLedger {
    fn find_one_eligible(&self, kind: &str, status: ImageStatus) -> Result<Option<Image>> {
        let conn = self.conn.lock().unwrap();
        let image = conn
            .query_row(
                &format!(
                    "SELECT {} FROM images WHERE kind = ?1 AND status = ?2 ORDER BY created_at LIMIT 1",
                    IMAGE_COLUMNS
                ),
                params![kind, status.as_i32()],
                Self::row_to_image,
            )
            .optional()?;
        Ok(image)
    }

    fn save(&self, image: &Image) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE images SET url = ?2, kind = ?3, status = ?4, species_document_id = ?5,
                user_id = ?6, filename = ?7, size = ?8, mimetype = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                image.id,
                image.url,
                image.kind,
                image.status.as_i32(),
                image.species_document_id,
                image.user_id,
                image.filename,
                image.size,
                image.mimetype,
                Self::now(),
            ],
        )?;
        if updated == 0 {
            bail!("Image {} not found", image.id);
        }
        Ok(())
    }

    fn insert(&self, image: &Image) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO images ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                IMAGE_COLUMNS
            ),
            params![
                image.id,
                image.url,
                image.kind,
                image.status.as_i32(),
                image.species_document_id,
                image.user_id,
                image.filename,
                image.size,
                image.mimetype,
                image.created_at,
                image.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Image>> {
        let conn = self.conn.lock().unwrap();
        let image = conn
            .query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS),
                params![id],
                Self::row_to_image,
            )
            .optional()?;
        Ok(image)
    }

    fn claim_next_eligible(&self, kind: &str) -> Result<Option<Image>> {
        let conn = self.conn.lock().unwrap();
        let image = conn
            .query_row(
                &format!(
                    "UPDATE images SET status = ?1, updated_at = ?2
                     WHERE id = (
                         SELECT id FROM images WHERE kind = ?3 AND status = ?4
                         ORDER BY created_at LIMIT 1
                     ) AND status = ?4
                     RETURNING {}",
                    IMAGE_COLUMNS
                ),
                params![
                    ImageStatus::Processing.as_i32(),
                    Self::now(),
                    kind,
                    ImageStatus::Queued.as_i32(),
                ],
                Self::row_to_image,
            )
            .optional()?;
        Ok(image)
    }

    fn queue_for_recognition(&self, id: &str) -> Result<QueueRequestResult> {
        let conn = self.conn.lock().unwrap();
        let image = conn
            .query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS),
                params![id],
                Self::row_to_image,
            )
            .optional()?;
        let Some(image) = image else {
            return Ok(QueueRequestResult::NotFound);
        };

        let result = match image.status {
            ImageStatus::New => QueueRequestResult::Queued,
            ImageStatus::Failed => QueueRequestResult::Requeued,
            ImageStatus::Queued | ImageStatus::Processing => {
                return Ok(QueueRequestResult::AlreadyQueued {
                    status: image.status,
                })
            }
            ImageStatus::Done => match image.species_document_id {
                Some(species_document_id) => {
                    return Ok(QueueRequestResult::AlreadyDone {
                        species_document_id,
                    })
                }
                None => bail!("Image {} is DONE without a species document", id),
            },
        };

        conn.execute(
            "UPDATE images SET kind = ?2, status = ?3, species_document_id = NULL, updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                RECOGNIZE_KIND,
                ImageStatus::Queued.as_i32(),
                Self::now()
            ],
        )?;
        Ok(result)
    }

    fn count_by_status(&self) -> Result<ImageStatusCounts> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM images GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = ImageStatusCounts::default();
        for row in rows {
            let (code, count) = row?;
            match ImageStatus::from_i32(code) {
                Some(status) => counts.add(status, count as usize),
                None => bail!("Unknown image status {} in ledger", code),
            }
        }
        Ok(counts)
    }
}
