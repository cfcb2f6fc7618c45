//! Core extractor framework
//!
//! Defines the trait every language extractor implements and the per-file
//! result it hands to the resolver.

use crate::Result;
use crate::entity::{Entity, EntityKey, EntityKind};
use super::modules::ModuleIndex;
use serde::Serialize;
use std::path::Path;

/// Where an import points once checked against the project's files
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum ImportTarget {
    /// A project file (relative path)
    Module(String),
    /// An external dependency, by module name as written
    Library(String),
    /// A dynamically computed target
    Unresolved,
}

impl ImportTarget {
    /// Key of the node an `IMPORTS` edge from `importer` should point at
    pub fn entity_key(&self, importer: &str) -> EntityKey {
        match self {
            ImportTarget::Module(path) => EntityKey::file(path.clone()),
            ImportTarget::Library(name) => EntityKey::new(EntityKind::Library, name.clone(), importer),
            ImportTarget::Unresolved => {
                EntityKey::new(EntityKind::Library, crate::entity::UNRESOLVED_IMPORT, importer)
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ImportTarget::Module(_))
    }
}

/// One imported name, as found in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRef {
    /// Module text as written (`os.path`, `..models`)
    pub module: String,
    pub target: ImportTarget,
    /// Name the import binds in the file's namespace
    pub local_name: Option<String>,
    /// Symbol pulled out of the target by `from m import symbol`;
    /// `None` when the binding is the module itself
    pub symbol: Option<String>,
    pub line: u32,
}

/// A call expression inside a function or method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// Enclosing function or method
    pub caller: EntityKey,
    /// Callee text verbatim (`helper`, `self.add`, `requests.get`)
    pub callee: String,
    pub line: u32,
}

/// A constant assigned to a plain name inside a function or method.
///
/// Reported with the extraction but never persisted as an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFlow {
    /// Enclosing function or method
    pub scope: EntityKey,
    /// Constant as written, string quotes stripped (`0`, `guest`, `None`)
    pub value: String,
    /// Name the constant flows to
    pub target: String,
    pub line: u32,
}

impl DataFlow {
    /// `(value, target)`
    pub fn as_tuple(&self) -> (&str, &str) {
        (&self.value, &self.target)
    }
}

/// Everything extracted from one file
#[derive(Debug, Clone, Serialize)]
pub struct FileExtraction {
    /// Path relative to the project root
    pub path: String,
    pub entities: Vec<Entity>,
    pub imports: Vec<ImportRef>,
    pub calls: Vec<CallSite>,
    pub data_flows: Vec<DataFlow>,
}

impl FileExtraction {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entities: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            data_flows: Vec::new(),
        }
    }

    pub fn file_key(&self) -> EntityKey {
        EntityKey::file(self.path.clone())
    }

    /// Functions, classes and methods defined in this file
    pub fn definitions(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.kind().is_definition())
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind() == kind)
    }
}

/// Trait for language extractors
///
/// Each extractor is responsible for:
/// 1. Identifying files it can parse
/// 2. Parsing them with tree-sitter
/// 3. Emitting entities and reference tokens, with no cross-file resolution
pub trait LanguageExtractor {
    /// Get the language name (for display)
    fn language_name(&self) -> &str;

    /// Get file extensions this extractor handles
    fn file_extensions(&self) -> &[&str];

    /// Check if this extractor can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.file_extensions().contains(&ext)
        } else {
            false
        }
    }

    /// Parse one file. A syntax error yields `Error::Parse` and no partial result.
    fn extract(&self, path: &str, content: &str, modules: &ModuleIndex) -> Result<FileExtraction>;
}

/// Registry of language extractors
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn LanguageExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor
    pub fn register(&mut self, extractor: impl LanguageExtractor + 'static) {
        self.extractors.push(Box::new(extractor));
    }

    /// Find an extractor for a file
    pub fn find(&self, path: &Path) -> Option<&dyn LanguageExtractor> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(path))
            .map(|e| e.as_ref())
    }
}

/// Create a registry with every built-in extractor
pub fn default_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(super::python::PythonExtractor::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestExtractor;

    impl LanguageExtractor for TestExtractor {
        fn language_name(&self) -> &str { "test" }
        fn file_extensions(&self) -> &[&str] { &["test"] }
        fn extract(&self, path: &str, _content: &str, _modules: &ModuleIndex) -> Result<FileExtraction> {
            Ok(FileExtraction::new(path))
        }
    }

    #[test]
    fn test_registry() {
        let mut registry = ExtractorRegistry::new();
        registry.register(TestExtractor);

        assert!(registry.find(Path::new("foo.test")).is_some());
        assert!(registry.find(Path::new("foo.other")).is_none());
        assert!(default_registry().find(Path::new("pkg/app.py")).is_some());
    }

    #[test]
    fn test_import_target_keys() {
        let internal = ImportTarget::Module("pkg/util.py".to_string());
        assert_eq!(internal.entity_key("main.py"), EntityKey::file("pkg/util.py"));
        assert!(internal.is_internal());

        let lib = ImportTarget::Library("flask".to_string());
        let key = lib.entity_key("main.py");
        assert_eq!(key.kind, EntityKind::Library);
        assert_eq!(key.source_path, "main.py");

        assert_eq!(ImportTarget::Unresolved.entity_key("main.py").name, "<unresolved>");
    }
}
