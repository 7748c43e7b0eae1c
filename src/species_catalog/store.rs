//! SQLite-backed species catalog.

use super::models::*;
use super::schema::SPECIES_CATALOG_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::{open_in_memory_db, open_versioned_db};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Persistent collection of species reference documents.
pub trait SpeciesCatalog: Send + Sync {
    /// Find the document whose scientific name equals `scientific_name`,
    /// ignoring case and surrounding whitespace.
    fn find_by_scientific_name(&self, scientific_name: &str) -> Result<Option<SpeciesDocument>>;

    /// Insert or update a document by id.
    ///
    /// Fails if another document already holds the same scientific name.
    fn save(&self, document: &SpeciesDocument) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<SpeciesDocument>>;

    fn count(&self) -> Result<usize>;
}

const SPECIES_COLUMNS: &str = "id, scientific_key, scientific_name, common_name, family, kingdom, species_type, habitat, conservation, reference_image_url, fun_facts, facts, confidence, image_ids, raw_response, processed_at, created_at, updated_at";

pub struct SqliteSpeciesCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSpeciesCatalog {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(
            db_path,
            SPECIES_CATALOG_VERSIONED_SCHEMAS,
            "species catalog",
        )?;
        let store = SqliteSpeciesCatalog {
            conn: Arc::new(Mutex::new(conn)),
        };
        info!("Species catalog opened with {} documents", store.count()?);
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory_db(SPECIES_CATALOG_VERSIONED_SCHEMAS)?;
        Ok(SqliteSpeciesCatalog {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<SpeciesDocument> {
        Ok(SpeciesDocument {
            id: row.get("id")?,
            name: SpeciesName {
                scientific: row.get("scientific_name")?,
                common: row.get("common_name")?,
            },
            family: row.get("family")?,
            kingdom: row.get("kingdom")?,
            species_type: row.get("species_type")?,
            habitat: row.get("habitat")?,
            conservation: row.get("conservation")?,
            reference_image_url: row.get("reference_image_url")?,
            fun_facts: parse_json_array(row.get("fun_facts")?),
            facts: parse_json_array(row.get("facts")?),
            confidence: row.get("confidence")?,
            image_ids: parse_image_ids(row.get("image_ids")?)?,
            raw_response: row.get("raw_response")?,
            processed_at: row.get("processed_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

// Helper: serialize a string list to a JSON array
fn json_array(v: &[String]) -> Result<String> {
    serde_json::to_string(v).context("Failed to serialize string list")
}

// Helper: deserialize a JSON array column, tolerating malformed rows
fn parse_json_array(json: String) -> Vec<String> {
    serde_json::from_str(&json).unwrap_or_else(|e| {
        warn!("Malformed JSON array in species db: {}: {}", json, e);
        vec![]
    })
}

// Helper: deserialize the image id list. Unlike the descriptive lists this one
// is rewritten on every reuse, so a malformed value must not read as empty.
fn parse_image_ids(json: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            13,
            rusqlite::types::Type::Text,
            format!("malformed image_ids {:?}: {}", json, e).into(),
        )
    })
}

impl SpeciesCatalog for SqliteSpeciesCatalog {
    fn find_by_scientific_name(&self, scientific_name: &str) -> Result<Option<SpeciesDocument>> {
        let conn = self.conn.lock().unwrap();
        let document = conn
            .query_row(
                &format!(
                    "SELECT {} FROM species WHERE scientific_key = ?1",
                    SPECIES_COLUMNS
                ),
                params![scientific_key(scientific_name)],
                Self::row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    fn save(&self, document: &SpeciesDocument) -> Result<()> {
        let key = document.scientific_key();
        if key.is_empty() {
            bail!("Species document {} has an empty scientific name", document.id);
        }
        let fun_facts = json_array(&document.fun_facts)?;
        let facts = json_array(&document.facts)?;
        let image_ids = json_array(&document.image_ids)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO species ({}) VALUES
                    (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(id) DO UPDATE SET
                    scientific_key = excluded.scientific_key,
                    scientific_name = excluded.scientific_name,
                    common_name = excluded.common_name,
                    family = excluded.family,
                    kingdom = excluded.kingdom,
                    species_type = excluded.species_type,
                    habitat = excluded.habitat,
                    conservation = excluded.conservation,
                    reference_image_url = excluded.reference_image_url,
                    fun_facts = excluded.fun_facts,
                    facts = excluded.facts,
                    confidence = excluded.confidence,
                    image_ids = excluded.image_ids,
                    raw_response = excluded.raw_response,
                    processed_at = excluded.processed_at,
                    updated_at = excluded.updated_at",
                SPECIES_COLUMNS
            ),
            params![
                document.id,
                key,
                document.name.scientific,
                document.name.common,
                document.family,
                document.kingdom,
                document.species_type,
                document.habitat,
                document.conservation,
                document.reference_image_url,
                fun_facts,
                facts,
                document.confidence,
                image_ids,
                document.raw_response,
                document.processed_at,
                document.created_at,
                chrono::Utc::now().timestamp(),
            ],
        )
        .with_context(|| {
            format!(
                "Failed to save species document {} ({})",
                document.id, document.name.scientific
            )
        })?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SpeciesDocument>> {
        let conn = self.conn.lock().unwrap();
        let document = conn
            .query_row(
                &format!("SELECT {} FROM species WHERE id = ?1", SPECIES_COLUMNS),
                params![id],
                Self::row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM species", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
