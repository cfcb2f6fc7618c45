//! Entity Extraction
//!
//! Each language provides a tree-sitter grammar and an extractor that turns
//! one file's syntax tree into entities plus the raw reference tokens
//! (imports, call sites) the resolver needs, plus the constant data flows
//! reported alongside the graph. Nothing here looks across files
//! except the [`ModuleIndex`], which only knows which paths exist.

pub mod framework;
pub mod modules;
pub mod python;

pub use framework::{
    CallSite, DataFlow, ExtractorRegistry, FileExtraction, ImportRef, ImportTarget, LanguageExtractor,
    default_registry,
};
pub use modules::ModuleIndex;
pub use python::PythonExtractor;
