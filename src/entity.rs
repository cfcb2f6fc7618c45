//! Entity types - the nodes of the code graph
//!
//! Every structural construct the extractor finds maps to one of these kinds:
//! - `File`: an analyzed source file
//! - `Library`: an imported module that is not part of the project
//! - `Function`: a function not nested inside a class
//! - `Class`: a class definition
//! - `Method`: a function defined directly in a class body
//! - `External`: placeholder for a call target with no local definition

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name given to the Library placeholder of a dynamically computed import.
pub const UNRESOLVED_IMPORT: &str = "<unresolved>";

/// Kinds of graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Library,
    Function,
    Class,
    Method,
    External,
}

impl EntityKind {
    /// Get the string representation of the entity kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "File",
            EntityKind::Library => "Library",
            EntityKind::Function => "Function",
            EntityKind::Class => "Class",
            EntityKind::Method => "Method",
            EntityKind::External => "External",
        }
    }

    /// Get all entity kinds
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::File,
            EntityKind::Library,
            EntityKind::Function,
            EntityKind::Class,
            EntityKind::Method,
            EntityKind::External,
        ]
    }

    /// Kinds that are definitions and therefore enter the symbol table
    pub fn is_definition(&self) -> bool {
        matches!(self, EntityKind::Function | EntityKind::Class | EntityKind::Method)
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" | "module" => Ok(EntityKind::File),
            "library" | "lib" => Ok(EntityKind::Library),
            "function" | "fn" | "def" => Ok(EntityKind::Function),
            "class" => Ok(EntityKind::Class),
            "method" => Ok(EntityKind::Method),
            "external" | "placeholder" => Ok(EntityKind::External),
            _ => Err(Error::Config(format!("Unknown entity kind: {}", s))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a node: two entities with equal keys are the same node,
/// in this run and in every later one.
///
/// `owner` is only set for methods and keeps `A.__init__` and `B.__init__`
/// from the same file apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub name: String,
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl EntityKey {
    pub fn new(kind: EntityKind, name: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            source_path: source_path.into(),
            owner: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(EntityKind::File, path.clone(), path)
    }

    pub fn method(name: impl Into<String>, source_path: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::new(EntityKind::Method, name, source_path)
        }
    }

    /// Placeholder for an unresolved callee; shared by every file.
    pub fn external(callee: impl Into<String>) -> Self {
        Self::new(EntityKind::External, callee, "")
    }

    /// Content-addressed node id: hex BLAKE3 digest of the key fields.
    pub fn id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.name.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.source_path.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.owner.as_deref().unwrap_or("").as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Human-readable label, `Calculator.add` for methods
    pub fn display_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", owner, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.kind, self.display_name(), self.source_path)
    }
}

/// A node in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    /// Starting line number (1-indexed)
    pub line_start: u32,
    /// Ending line number (1-indexed, inclusive)
    pub line_end: u32,
}

impl Entity {
    pub fn new(key: EntityKey, line_start: u32, line_end: u32) -> Self {
        Self { key, line_start, line_end }
    }

    pub fn kind(&self) -> EntityKind {
        self.key.kind
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn source_path(&self) -> &str {
        &self.key.source_path
    }

    pub fn owner(&self) -> Option<&str> {
        self.key.owner.as_deref()
    }

    /// `(kind, name, source_path)` as exposed by the reporting interface
    pub fn as_tuple(&self) -> (EntityKind, &str, &str) {
        (self.key.kind, &self.key.name, &self.key.source_path)
    }
}

// Line spans are attributes, not identity.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
