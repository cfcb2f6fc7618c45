//! Run-scoped symbol table
//!
//! Built once from every file's definitions after extraction finishes and
//! handed to the resolver by reference. Nothing in here is global, so two
//! runs in the same process never see each other's symbols.

use crate::entity::{Entity, EntityKey, EntityKind};
use crate::extract::FileExtraction;
use std::collections::HashMap;

/// Outcome of looking up a callee name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one visible definition
    Resolved(EntityKey),
    /// Several equally good candidates; never guessed
    Ambiguous(Vec<EntityKey>),
    /// No definition with that name
    Unresolved,
}

impl Resolution {
    fn from_candidates(mut candidates: Vec<EntityKey>) -> Self {
        match candidates.len() {
            0 => Resolution::Unresolved,
            1 => Resolution::Resolved(candidates.remove(0)),
            _ => Resolution::Ambiguous(candidates),
        }
    }

    pub fn resolved(&self) -> Option<&EntityKey> {
        match self {
            Resolution::Resolved(key) => Some(key),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Functions and classes by bare name
    callables: HashMap<String, Vec<EntityKey>>,
    /// Methods by (file, owning class, name)
    methods: HashMap<(String, String, String), EntityKey>,
    definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from every extracted file of a run
    pub fn build(files: &[FileExtraction]) -> Self {
        let mut table = Self::new();
        for entity in files.iter().flat_map(|f| f.definitions()) {
            table.insert(entity);
        }
        tracing::debug!(
            "Symbol table: {} definitions, {} distinct callable names",
            table.definitions,
            table.callables.len()
        );
        table
    }

    pub fn insert(&mut self, entity: &Entity) {
        let key = &entity.key;
        match (key.kind, &key.owner) {
            (EntityKind::Method, Some(owner)) => {
                self.methods.insert(
                    (key.source_path.clone(), owner.clone(), key.name.clone()),
                    key.clone(),
                );
            }
            (EntityKind::Function | EntityKind::Class, _) => {
                let bucket = self.callables.entry(key.name.clone()).or_default();
                if bucket.contains(key) {
                    return;
                }
                bucket.push(key.clone());
            }
            _ => return,
        }
        self.definitions += 1;
    }

    pub fn len(&self) -> usize {
        self.definitions
    }

    pub fn is_empty(&self) -> bool {
        self.definitions == 0
    }

    /// Resolve a bare callee name as seen from `context_file`.
    ///
    /// Same-file definitions win over everything else. Without one, a unique
    /// project-wide match resolves; several matches stay ambiguous.
    pub fn resolve(&self, name: &str, context_file: &str) -> Resolution {
        let local = self.lookup_in(name, context_file);
        if !matches!(local, Resolution::Unresolved) {
            return local;
        }
        let all = self.callables.get(name).cloned().unwrap_or_default();
        Resolution::from_candidates(all)
    }

    /// Functions and classes named `name` defined in `file`
    pub fn lookup_in(&self, name: &str, file: &str) -> Resolution {
        let candidates = self
            .callables
            .get(name)
            .map(|keys| {
                keys.iter()
                    .filter(|k| k.source_path == file)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Resolution::from_candidates(candidates)
    }

    /// Method `name` of class `owner` in `file`
    pub fn method(&self, file: &str, owner: &str, name: &str) -> Option<&EntityKey> {
        self.methods
            .get(&(file.to_string(), owner.to_string(), name.to_string()))
    }

    pub fn has_class(&self, file: &str, name: &str) -> bool {
        self.callables
            .get(name)
            .map(|keys| {
                keys.iter()
                    .any(|k| k.kind == EntityKind::Class && k.source_path == file)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(kind: EntityKind, name: &str, path: &str) -> Entity {
        Entity::new(EntityKey::new(kind, name, path), 1, 2)
    }

    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.insert(&def(EntityKind::Function, "helper", "a.py"));
        table.insert(&def(EntityKind::Function, "helper", "b.py"));
        table.insert(&def(EntityKind::Function, "unique", "b.py"));
        table.insert(&def(EntityKind::Class, "Calculator", "calc.py"));
        table.insert(&Entity::new(EntityKey::method("add", "calc.py", "Calculator"), 3, 4));
        table.insert(&def(EntityKind::Library, "os", "a.py"));
        table
    }

    #[test]
    fn test_same_file_wins() {
        let table = table();
        assert_eq!(
            table.resolve("helper", "a.py"),
            Resolution::Resolved(EntityKey::new(EntityKind::Function, "helper", "a.py"))
        );
    }

    #[test]
    fn test_cross_file_collision_is_ambiguous() {
        let table = table();
        match table.resolve("helper", "c.py") {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_unique_project_match_and_miss() {
        let table = table();
        assert!(table.resolve("unique", "a.py").resolved().is_some());
        assert_eq!(table.resolve("jsonify", "a.py"), Resolution::Unresolved);
        // Libraries never enter the table
        assert_eq!(table.resolve("os", "a.py"), Resolution::Unresolved);
    }

    #[test]
    fn test_methods_and_classes() {
        let table = table();
        assert_eq!(table.len(), 5);
        assert!(table.method("calc.py", "Calculator", "add").is_some());
        assert!(table.method("calc.py", "Other", "add").is_none());
        assert!(table.has_class("calc.py", "Calculator"));
        assert!(!table.has_class("a.py", "Calculator"));
        // Methods are not bare callables
        assert_eq!(table.resolve("add", "calc.py"), Resolution::Unresolved);
    }
}
