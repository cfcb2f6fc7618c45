//! # Codegraph - Code knowledge graph
//!
//! Statically analyzes a Python source tree and materializes what it finds
//! into a persistent graph store.
//!
//! Codegraph provides:
//! - A source walker honoring extension and exclusion rules
//! - Tree-sitter based entity extraction (libraries, functions, classes, methods)
//! - Run-scoped symbol resolution for `CALLS`, `IMPORTS`, `CONTAINS` and `DEFINES` edges
//! - Idempotent, merge-by-identity persistence into SQLite

pub mod entity;
pub mod relationship;
pub mod config;
pub mod walker;
pub mod extract;
pub mod resolve;
pub mod storage;
pub mod writer;
pub mod pipeline;
pub mod ui;

// Re-exports for convenient access
pub use entity::{Entity, EntityKey, EntityKind};
pub use relationship::{EdgeType, Relationship};
pub use config::GraphConfig;
pub use storage::{GraphStore, SqliteStore, StoreError};
pub use writer::{GraphWriter, WriteSummary};
pub use pipeline::{Pipeline, Extraction, RunReport};

use std::path::PathBuf;

/// Result type alias for Codegraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Codegraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid root path {path}: {reason}")]
    Path { path: PathBuf, reason: String },

    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Write error for {item}: {message}")]
    Write { item: String, message: String },

    #[error("Store connection error: {0}")]
    StoreConnection(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error stops the pipeline outright
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Parse { .. } | Error::Write { .. })
    }
}
