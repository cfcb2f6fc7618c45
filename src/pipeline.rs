//! Pipeline - one full run from source tree to graph store
//!
//! Walk → read → module index → per-file extraction → symbol table → resolution → write.
//! All run-scoped state lives on the stack of [`Pipeline::extract`], so
//! independent runs never share anything but the store they write to.

use crate::config::GraphConfig;
use crate::entity::{Entity, EntityKind};
use crate::extract::{DataFlow, ExtractorRegistry, FileExtraction, ModuleIndex, default_registry};
use crate::relationship::{EdgeType, Relationship};
use crate::resolve::{ResolveStats, ResolvedGraph, Resolver, SymbolTable};
use crate::storage::GraphStore;
use crate::walker::{SkippedFile, SourceFile, SourceWalker, WalkItem};
use crate::writer::{GraphWriter, WriteSummary};
use crate::{Error, Result};
use serde::Serialize;

/// A file that was read but could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

impl FileError {
    pub fn to_error(&self) -> Error {
        Error::Parse {
            path: self.path.clone(),
            message: self.message.clone(),
        }
    }
}

/// Everything a run derived from the source tree, before persistence
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub skipped: Vec<SkippedFile>,
    pub parse_errors: Vec<FileError>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// Constant assignments; reported only, never written to the store
    pub data_flows: Vec<DataFlow>,
    pub resolution: ResolveStats,
}

impl Extraction {
    /// `(kind, name, source_path)` for every entity
    pub fn entity_tuples(&self) -> Vec<(EntityKind, &str, &str)> {
        self.entities.iter().map(Entity::as_tuple).collect()
    }

    /// `(source_name, edge_type, target_name)` for every relationship
    pub fn relationship_tuples(&self) -> Vec<(&str, EdgeType, &str)> {
        self.relationships.iter().map(Relationship::as_tuple).collect()
    }

    /// `(value, target)` for every data flow
    pub fn data_flow_tuples(&self) -> Vec<(&str, &str)> {
        self.data_flows.iter().map(DataFlow::as_tuple).collect()
    }

    pub fn count_entities(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn count_relationships(&self, edge_type: EdgeType) -> usize {
        self.relationships.iter().filter(|r| r.edge_type == edge_type).count()
    }
}

/// Outcome of a full run, extraction plus write
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub extraction: Extraction,
    pub write: WriteSummary,
}

impl RunReport {
    pub fn entity_tuples(&self) -> Vec<(EntityKind, &str, &str)> {
        self.extraction.entity_tuples()
    }

    pub fn relationship_tuples(&self) -> Vec<(&str, EdgeType, &str)> {
        self.extraction.relationship_tuples()
    }

    /// Recovered per-file and per-item errors, in the order they happened
    pub fn errors(&self) -> Vec<Error> {
        self.extraction
            .parse_errors
            .iter()
            .map(FileError::to_error)
            .chain(self.write.failures.iter().map(|f| f.to_error()))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.extraction.skipped.is_empty()
            && self.extraction.parse_errors.is_empty()
            && self.write.is_success()
    }
}

pub struct Pipeline {
    config: GraphConfig,
    registry: ExtractorRegistry,
}

impl Pipeline {
    /// Create a pipeline with every built-in extractor
    pub fn new(config: GraphConfig) -> Self {
        Self::with_registry(config, default_registry())
    }

    pub fn with_registry(config: GraphConfig, registry: ExtractorRegistry) -> Self {
        Self { config, registry }
    }

    /// Walk, extract and resolve without touching a store.
    ///
    /// Fails only when the root is unusable; bad files are recorded.
    pub fn extract(&self) -> Result<Extraction> {
        let walker = SourceWalker::new(&self.config)?;
        tracing::info!("Scanning {}", walker.root().display());

        let mut sources: Vec<SourceFile> = Vec::new();
        let mut skipped: Vec<SkippedFile> = Vec::new();
        for item in walker.files() {
            match item {
                WalkItem::File(file) => {
                    if self.registry.find(&file.path).is_some() {
                        sources.push(file);
                    } else {
                        tracing::debug!("No extractor for {}", file.relative_path);
                        skipped.push(SkippedFile {
                            path: file.relative_path,
                            reason: "no extractor".to_string(),
                        });
                    }
                }
                WalkItem::Skipped(skip) => skipped.push(skip),
            }
        }

        tracing::info!("Found {} source files", sources.len());

        let mut readable: Vec<(&SourceFile, String)> = Vec::with_capacity(sources.len());
        for file in &sources {
            match file.read() {
                Ok(content) => readable.push((file, content)),
                Err(err) => {
                    tracing::warn!("Skipping unreadable {}: {}", file.relative_path, err);
                    skipped.push(SkippedFile {
                        path: file.relative_path.clone(),
                        reason: format!("unreadable: {}", err),
                    });
                }
            }
        }

        // Only files that can be read are import targets
        let modules = ModuleIndex::from_paths(readable.iter().map(|(f, _)| f.relative_path.clone()));

        let mut parsed: Vec<FileExtraction> = Vec::with_capacity(readable.len());
        let mut parse_errors: Vec<FileError> = Vec::new();
        for (file, content) in &readable {
            let Some(extractor) = self.registry.find(&file.path) else {
                continue;
            };
            match extractor.extract(&file.relative_path, content, &modules) {
                Ok(extraction) => parsed.push(extraction),
                Err(Error::Parse { path, message }) => {
                    tracing::warn!("Parse error in {}: {}", path, message);
                    parse_errors.push(FileError { path, message });
                }
                Err(err) => return Err(err),
            }
        }

        let data_flows: Vec<DataFlow> = parsed.iter().flat_map(|f| f.data_flows.iter().cloned()).collect();
        let table = SymbolTable::build(&parsed);
        let ResolvedGraph { entities, relationships, stats } = Resolver::new(&table).run(&parsed);
        tracing::info!(
            "Extracted {} entities and {} relationships from {} files",
            entities.len(),
            relationships.len(),
            parsed.len()
        );
        tracing::debug!("{}", stats);

        Ok(Extraction {
            files_scanned: sources.len(),
            files_parsed: parsed.len(),
            skipped,
            parse_errors,
            entities,
            relationships,
            data_flows,
            resolution: stats,
        })
    }

    /// Full run: extract, then write everything into `store`.
    pub fn run<S: GraphStore>(&self, store: &mut S) -> Result<RunReport> {
        let extraction = self.extract()?;
        let write = GraphWriter::new(store).write(&extraction.entities, &extraction.relationships)?;
        Ok(RunReport { extraction, write })
    }
}
