// persistence/mod.rs - Storage and export
//
// SQLite cache for explorer responses (WAL mode, schema in schema.sql) and
// CSV/JSON export of the report tables.

pub mod export;
mod store;

pub use export::{write_csv, write_json};
pub use store::{ResponseCache, DEFAULT_CACHE_TTL};
