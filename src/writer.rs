//! Graph Writer
//!
//! Persists one run's entities and relationships through a [`GraphStore`].
//! Every node is written before any edge. A single refused item is recorded
//! and skipped; losing the store aborts the run.

use crate::entity::Entity;
use crate::relationship::Relationship;
use crate::storage::{GraphStore, StoreError, UpsertOutcome};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;

/// One item the store refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub item: String,
    pub reason: String,
}

impl WriteFailure {
    /// The same failure as a library error
    pub fn to_error(&self) -> Error {
        Error::Write {
            item: self.item.clone(),
            message: self.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub nodes_created: usize,
    pub nodes_existing: usize,
    pub edges_created: usize,
    pub edges_existing: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteSummary {
    pub fn nodes_written(&self) -> usize {
        self.nodes_created + self.nodes_existing
    }

    pub fn edges_written(&self) -> usize {
        self.edges_created + self.edges_existing
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for WriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Write Summary:")?;
        writeln!(f, "  Nodes: {} created, {} already present", self.nodes_created, self.nodes_existing)?;
        writeln!(f, "  Edges: {} created, {} already present", self.edges_created, self.edges_existing)?;
        writeln!(f, "  Failed: {}", self.failures.len())?;
        for failure in &self.failures {
            writeln!(f, "    ❌ {}: {}", failure.item, failure.reason)?;
        }
        Ok(())
    }
}

pub struct GraphWriter<'a, S: GraphStore> {
    store: &'a mut S,
}

impl<'a, S: GraphStore> GraphWriter<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Upsert all entities, then all relationships, in one transaction.
    pub fn write(&mut self, entities: &[Entity], relationships: &[Relationship]) -> Result<WriteSummary> {
        self.store.begin().map_err(connection_error)?;

        match self.write_items(entities, relationships) {
            Ok(summary) => {
                self.store.commit().map_err(connection_error)?;
                tracing::info!(
                    "Wrote {} nodes ({} new) and {} edges ({} new), {} failures",
                    summary.nodes_written(),
                    summary.nodes_created,
                    summary.edges_written(),
                    summary.edges_created,
                    summary.failures.len()
                );
                Ok(summary)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::warn!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn write_items(&mut self, entities: &[Entity], relationships: &[Relationship]) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();

        for entity in entities {
            match self.store.upsert_node(entity) {
                Ok(UpsertOutcome::Created) => summary.nodes_created += 1,
                Ok(UpsertOutcome::Existing) => summary.nodes_existing += 1,
                Err(StoreError::Rejected(reason)) => {
                    record_failure(&mut summary, entity.key.to_string(), reason);
                }
                Err(err) => return Err(connection_error(err)),
            }
        }

        for relationship in relationships {
            match self.store.upsert_edge(relationship) {
                Ok(UpsertOutcome::Created) => summary.edges_created += 1,
                Ok(UpsertOutcome::Existing) => summary.edges_existing += 1,
                Err(StoreError::Rejected(reason)) => {
                    record_failure(&mut summary, relationship.to_string(), reason);
                }
                Err(err) => return Err(connection_error(err)),
            }
        }

        Ok(summary)
    }
}

fn record_failure(summary: &mut WriteSummary, item: String, reason: String) {
    tracing::warn!("Failed to write {}: {}", item, reason);
    summary.failures.push(WriteFailure { item, reason });
}

fn connection_error(err: StoreError) -> Error {
    Error::StoreConnection(err.to_string())
}
