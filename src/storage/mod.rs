//! `SQLite` storage layer for `qatrack`.
//!
//! [`SqliteStore`] implements the core `EntityStore` and `SequenceCounter`
//! traits on top of a single WAL-mode connection:
//! - custom IDs are issued by one upsert statement per call
//! - listing predicates compile to parameterised SQL
//! - busy/locked databases surface as `StoreUnavailable`

mod schema;
mod sqlite;

pub use schema::{SCHEMA, apply_schema};
pub use sqlite::SqliteStore;
