//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use crate::{Result, Error};
use crate::entity::{Entity, EntityKind};
use crate::relationship::{EdgeType, Relationship};
use super::{GraphStore, StoreError, UpsertOutcome, schema};

/// SQLite-backed storage for the code graph
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::StoreConnection(format!("{}: {}", path.display(), e)))?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Node Operations ==========

    /// Insert a node unless its id is already present
    pub fn insert_node(&self, entity: &Entity) -> Result<UpsertOutcome> {
        let key = &entity.key;
        let changed = self.conn.execute(
            r#"
            INSERT INTO nodes (id, kind, name, source_path, owner, line_start, line_end)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![
                key.id(),
                key.kind.as_str(),
                key.name,
                key.source_path,
                key.owner,
                entity.line_start,
                entity.line_end,
            ],
        )?;
        Ok(outcome(changed))
    }

    /// Get a node by id
    pub fn get_node(&self, id: &str) -> Result<Option<StoredNode>> {
        self.conn
            .query_row(
                "SELECT id, kind, name, source_path, owner, line_start, line_end FROM nodes WHERE id = ?1",
                [id],
                |row| self.row_to_node(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find all nodes recorded for a file
    pub fn find_nodes_in_file(&self, path: &str) -> Result<Vec<StoredNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, name, source_path, owner, line_start, line_end FROM nodes WHERE source_path = ?1 ORDER BY line_start"
        )?;

        let nodes = stmt
            .query_map([path], |row| self.row_to_node(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(nodes)
    }

    /// Count all nodes
    pub fn count_nodes(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Node counts grouped by kind
    pub fn count_nodes_by_kind(&self) -> Result<Vec<(String, usize)>> {
        self.grouped_counts("SELECT kind, COUNT(*) FROM nodes GROUP BY kind ORDER BY kind")
    }

    /// Helper to convert a row to a StoredNode
    fn row_to_node(&self, row: &rusqlite::Row) -> rusqlite::Result<StoredNode> {
        let kind_str: String = row.get(1)?;
        let kind: EntityKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StoredNode {
            id: row.get(0)?,
            kind,
            name: row.get(2)?,
            source_path: row.get(3)?,
            owner: row.get(4)?,
            line_start: row.get(5)?,
            line_end: row.get(6)?,
        })
    }

    // ========== Edge Operations ==========

    /// Insert an edge unless the same (source, type, target) is already present
    pub fn insert_edge(&self, relationship: &Relationship) -> Result<UpsertOutcome> {
        let changed = self.conn.execute(
            r#"
            INSERT INTO edges (id, source_id, edge_type, target_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT DO NOTHING
            "#,
            params![
                relationship.id(),
                relationship.source.id(),
                relationship.edge_type.as_str(),
                relationship.target.id(),
            ],
        )?;
        Ok(outcome(changed))
    }

    /// Get edges leaving a node
    pub fn get_edges_from(&self, id: &str) -> Result<Vec<StoredEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, edge_type, target_id FROM edges WHERE source_id = ?1 ORDER BY edge_type, target_id"
        )?;

        let edges = stmt
            .query_map([id], |row| self.row_to_edge(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(edges)
    }

    /// Get edges pointing at a node (reverse lookup)
    pub fn get_edges_to(&self, id: &str) -> Result<Vec<StoredEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, edge_type, target_id FROM edges WHERE target_id = ?1 ORDER BY edge_type, source_id"
        )?;

        let edges = stmt
            .query_map([id], |row| self.row_to_edge(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(edges)
    }

    /// Count all edges
    pub fn count_edges(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Edge counts grouped by type
    pub fn count_edges_by_type(&self) -> Result<Vec<(String, usize)>> {
        self.grouped_counts("SELECT edge_type, COUNT(*) FROM edges GROUP BY edge_type ORDER BY edge_type")
    }

    /// Helper to convert a row to a StoredEdge
    fn row_to_edge(&self, row: &rusqlite::Row) -> rusqlite::Result<StoredEdge> {
        let type_str: String = row.get(2)?;
        let edge_type: EdgeType = type_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StoredEdge {
            id: row.get(0)?,
            source_id: row.get(1)?,
            edge_type,
            target_id: row.get(3)?,
        })
    }

    fn grouped_counts(&self, sql: &str) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                let label: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((label, count as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ========== Bulk Operations ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit_transaction(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback_transaction(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            nodes: self.count_nodes()?,
            edges: self.count_edges()?,
            nodes_by_kind: self.count_nodes_by_kind()?,
            edges_by_type: self.count_edges_by_type()?,
        })
    }
}

impl GraphStore for SqliteStore {
    fn upsert_node(&mut self, entity: &Entity) -> std::result::Result<UpsertOutcome, StoreError> {
        self.insert_node(entity).map_err(classify)
    }

    fn upsert_edge(&mut self, relationship: &Relationship) -> std::result::Result<UpsertOutcome, StoreError> {
        self.insert_edge(relationship).map_err(classify)
    }

    fn begin(&mut self) -> std::result::Result<(), StoreError> {
        self.begin_transaction().map_err(classify)
    }

    fn commit(&mut self) -> std::result::Result<(), StoreError> {
        self.commit_transaction().map_err(classify)
    }

    fn rollback(&mut self) -> std::result::Result<(), StoreError> {
        self.rollback_transaction().map_err(classify)
    }
}

fn outcome(changed: usize) -> UpsertOutcome {
    if changed > 0 {
        UpsertOutcome::Created
    } else {
        UpsertOutcome::Existing
    }
}

/// Split store failures into "store is gone" and "this item was refused"
fn classify(err: Error) -> StoreError {
    match &err {
        Error::Storage(inner) => match inner.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked,
            ) => StoreError::Connection(inner.to_string()),
            _ => StoreError::Rejected(inner.to_string()),
        },
        Error::StoreConnection(msg) => StoreError::Connection(msg.clone()),
        Error::Io(io) => StoreError::Connection(io.to_string()),
        other => StoreError::Rejected(other.to_string()),
    }
}

/// A node as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredNode {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub source_path: String,
    pub owner: Option<String>,
    pub line_start: u32,
    pub line_end: u32,
}

/// An edge as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEdge {
    pub id: String,
    pub source_id: String,
    pub edge_type: EdgeType,
    pub target_id: String,
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_kind: Vec<(String, usize)>,
    pub edges_by_type: Vec<(String, usize)>,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        for (kind, count) in &self.nodes_by_kind {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        writeln!(f, "  Edges: {}", self.edges)?;
        for (edge_type, count) in &self.edges_by_type {
            writeln!(f, "    {}: {}", edge_type, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;

    fn function(name: &str, line: u32) -> Entity {
        Entity::new(EntityKey::new(EntityKind::Function, name, "src/main.py"), line, line + 5)
    }

    #[test]
    fn test_node_upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let node = function("my_func", 10);

        assert_eq!(store.insert_node(&node).unwrap(), UpsertOutcome::Created);
        assert_eq!(store.insert_node(&node).unwrap(), UpsertOutcome::Existing);
        // Attributes are immutable once created
        assert_eq!(store.insert_node(&function("my_func", 99)).unwrap(), UpsertOutcome::Existing);
        assert_eq!(store.count_nodes().unwrap(), 1);

        let stored = store.get_node(&node.key.id()).unwrap().unwrap();
        assert_eq!(stored.name, "my_func");
        assert_eq!(stored.kind, EntityKind::Function);
        assert_eq!(stored.line_start, 10);
    }

    #[test]
    fn test_methods_keep_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = Entity::new(EntityKey::method("__init__", "shapes.py", "Square"), 2, 3);
        let b = Entity::new(EntityKey::method("__init__", "shapes.py", "Circle"), 6, 7);
        store.insert_node(&a).unwrap();
        store.insert_node(&b).unwrap();

        let nodes = store.find_nodes_in_file("shapes.py").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].owner.as_deref(), Some("Square"));
    }

    #[test]
    fn test_edge_upsert_and_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        let caller = function("caller", 10);
        let callee = function("callee", 20);
        store.insert_node(&caller).unwrap();
        store.insert_node(&callee).unwrap();

        let rel = Relationship::new(caller.key.clone(), EdgeType::Calls, callee.key.clone());
        assert_eq!(store.insert_edge(&rel).unwrap(), UpsertOutcome::Created);
        assert_eq!(store.insert_edge(&rel).unwrap(), UpsertOutcome::Existing);

        let from = store.get_edges_from(&caller.key.id()).unwrap();
        assert_eq!(from.len(), 1);
        assert_eq!(from[0].edge_type, EdgeType::Calls);
        assert_eq!(store.get_edges_to(&callee.key.id()).unwrap().len(), 1);
        assert_eq!(store.count_edges_by_type().unwrap(), vec![("CALLS".to_string(), 1)]);
    }

    #[test]
    fn test_edge_without_endpoint_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let caller = function("caller", 10);
        store.insert_node(&caller).unwrap();

        let dangling = Relationship::new(
            caller.key.clone(),
            EdgeType::Calls,
            EntityKey::external("ghost"),
        );
        match store.upsert_edge(&dangling) {
            Err(StoreError::Rejected(_)) => {}
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(store.count_edges().unwrap(), 0);
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store.upsert_node(&function("temp", 1)).unwrap();
        store.rollback().unwrap();
        assert_eq!(store.count_nodes().unwrap(), 0);

        store.begin().unwrap();
        store.upsert_node(&function("kept", 1)).unwrap();
        store.commit().unwrap();
        assert_eq!(store.stats().unwrap().nodes, 1);
    }

    #[test]
    fn test_classify_errors() {
        let busy = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY), None);
        assert!(matches!(classify(Error::Storage(busy)), StoreError::Connection(_)));

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(matches!(classify(Error::Storage(constraint)), StoreError::Rejected(_)));
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_node(&function("persisted", 1)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_nodes().unwrap(), 1);

        let missing = dir.path().join("no/such/dir/graph.db");
        assert!(matches!(SqliteStore::open(&missing), Err(Error::StoreConnection(_))));
    }
}
