//! Species catalog: deduplicated species reference documents keyed by
//! scientific name.

mod models;
mod schema;
mod store;

pub use models::*;
pub use store::{SpeciesCatalog, SqliteSpeciesCatalog};
