//! Append-only SQLite history of remote resource metadata.
//!
//! Every resource kind gets its own table of versions. A new version is only
//! written when the *normalized* content hash of a fetched payload differs
//! from the current one; otherwise the current row's `last_seen_on` moves
//! forward. Rows are never deleted: the tables are a permanent audit log.
//!
//! A dry-run insert answers "would this be a new version, and which number?"
//! without writing, which is how the sync decides whether a file download is
//! worth paying for before committing anything.

mod db;
pub mod error;
mod models;
mod normalize;
pub mod resource;
mod store;
mod table;

pub use crate::models::{Current, Outcome, VersionRecord};
pub use crate::store::Store;
pub use crate::table::Table;
