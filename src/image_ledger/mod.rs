//! Image ledger: the persistent collection of uploaded images and their
//! recognition status.

mod models;
mod schema;
mod store;

pub use models::*;
pub use store::{ImageLedger, SqliteImageLedger};
