//! Storage Layer - persistence seam and its SQLite implementation
//!
//! System of record is SQLite with tables:
//! - nodes(id, kind, name, source_path, owner, line_start, line_end)
//! - edges(id, source_id, edge_type, target_id)
//!
//! Ids are content-addressed, so the primary keys double as the merge keys.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteStore, StoredEdge, StoredNode};

use crate::entity::Entity;
use crate::relationship::Relationship;
use serde::Serialize;

/// What an upsert found in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Existing,
}

/// Failures a store reports to the writer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached; nothing further will succeed
    #[error("connection lost: {0}")]
    Connection(String),

    /// This one item was refused (constraint violation, bad value)
    #[error("rejected: {0}")]
    Rejected(String),
}

/// A graph store with merge-by-identity writes.
///
/// Implementations must make both upserts idempotent: writing the same key
/// twice leaves exactly one node or edge behind.
pub trait GraphStore {
    fn upsert_node(&mut self, entity: &Entity) -> std::result::Result<UpsertOutcome, StoreError>;

    /// Both endpoints must already exist
    fn upsert_edge(&mut self, relationship: &Relationship) -> std::result::Result<UpsertOutcome, StoreError>;

    fn begin(&mut self) -> std::result::Result<(), StoreError> {
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), StoreError> {
        Ok(())
    }

    fn rollback(&mut self) -> std::result::Result<(), StoreError> {
        Ok(())
    }
}
