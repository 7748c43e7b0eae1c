//! Database schema for species.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

/// One row per species. `scientific_key` is the lowercased scientific name and
/// carries the uniqueness guarantee; list-valued fields are JSON arrays.
const SPECIES_TABLE_V1: Table = Table {
    name: "species",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("scientific_key", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("scientific_name", &SqlType::Text, non_null = true),
        sqlite_column!("common_name", &SqlType::Text),
        sqlite_column!("family", &SqlType::Text),
        sqlite_column!("kingdom", &SqlType::Text),
        sqlite_column!("species_type", &SqlType::Text),
        sqlite_column!("habitat", &SqlType::Text),
        sqlite_column!("conservation", &SqlType::Text),
        sqlite_column!("reference_image_url", &SqlType::Text),
        sqlite_column!("fun_facts", &SqlType::Text, non_null = true),
        sqlite_column!("facts", &SqlType::Text, non_null = true),
        sqlite_column!("confidence", &SqlType::Real, non_null = true),
        sqlite_column!("image_ids", &SqlType::Text, non_null = true),
        sqlite_column!("raw_response", &SqlType::Text),
        sqlite_column!("processed_at", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
};

pub const SPECIES_CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SPECIES_TABLE_V1],
    migration: None,
}];
