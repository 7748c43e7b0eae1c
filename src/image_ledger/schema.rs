//! Database schema for images.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

// =============================================================================
// Images Table - Version 1
// =============================================================================

const IMAGES_TABLE_V1: Table = Table {
    name: "images",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("url", &SqlType::Text, non_null = true),
        sqlite_column!("kind", &SqlType::Text),
        sqlite_column!("status", &SqlType::Integer, non_null = true),
        sqlite_column!("species_document_id", &SqlType::Text),
        sqlite_column!("user_id", &SqlType::Text),
        sqlite_column!("filename", &SqlType::Text),
        sqlite_column!("size", &SqlType::Integer),
        sqlite_column!("mimetype", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_images_kind_status", "kind, status, created_at"),
        ("idx_images_user", "user_id"),
    ],
};

// =============================================================================
// Versioned Schemas
// =============================================================================

pub const IMAGE_LEDGER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[IMAGES_TABLE_V1],
    migration: None,
}];
