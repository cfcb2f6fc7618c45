//! Relationship types - the edges of the code graph
//!
//! Four edge types cover everything the extractor derives:
//! - `Contains`: file → function, class or method
//! - `Defines`: class → method
//! - `Imports`: file → library or file → file
//! - `Calls`: function/method → callee

use crate::entity::EntityKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeType {
    /// Callable calls another callable (or an external placeholder)
    Calls,
    /// File imports a library or another project file
    Imports,
    /// File contains a definition
    Contains,
    /// Class defines a method
    Defines,
}

impl EdgeType {
    /// Get the string representation of the edge type
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "CALLS",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Contains => "CONTAINS",
            EdgeType::Defines => "DEFINES",
        }
    }

    /// Get all edge types
    pub fn all() -> &'static [EdgeType] {
        &[EdgeType::Calls, EdgeType::Imports, EdgeType::Contains, EdgeType::Defines]
    }
}

impl FromStr for EdgeType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CALLS" | "CALL" => Ok(EdgeType::Calls),
            "IMPORTS" | "IMPORT" => Ok(EdgeType::Imports),
            "CONTAINS" | "CONTAIN" => Ok(EdgeType::Contains),
            "DEFINES" | "DEFINE" => Ok(EdgeType::Defines),
            _ => Err(crate::Error::Config(format!("Unknown edge type: {}", s))),
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed, typed edge between two entity keys.
///
/// Identity is the whole triple, so a set of relationships never holds
/// the same edge twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relationship {
    pub source: EntityKey,
    pub edge_type: EdgeType,
    pub target: EntityKey,
}

impl Relationship {
    pub fn new(source: EntityKey, edge_type: EdgeType, target: EntityKey) -> Self {
        Self { source, edge_type, target }
    }

    /// Content-addressed edge id over the endpoint ids and the edge type
    pub fn id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.source.id().as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.edge_type.as_str().as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.target.id().as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// `(source_name, edge_type, target_name)` as exposed by the reporting interface
    pub fn as_tuple(&self) -> (&str, EdgeType, &str) {
        (&self.source.name, self.edge_type, &self.target.name)
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.source.display_name(),
            self.edge_type,
            self.target.display_name()
        )
    }
}
