use crate::entity::{Entity, EntityKey, EntityKind};
use crate::extract::{CallSite, FileExtraction, ImportRef, ImportTarget};
use crate::relationship::{EdgeType, Relationship};
use super::symbol_table::{Resolution, SymbolTable};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    pub resolved: usize,
    pub ambiguous: usize,
    pub external: usize,
    pub total: usize,
}

impl fmt::Display for ResolveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Call Resolution Stats:")?;
        writeln!(f, "  Total Call Sites: {}", self.total)?;
        writeln!(f, "  ✅ Resolved: {}", self.resolved)?;
        writeln!(f, "  🤔 Ambiguous: {}", self.ambiguous)?;
        writeln!(f, "  🌍 External: {}", self.external)
    }
}

/// The graph of one run, ready for the writer
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedGraph {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub stats: ResolveStats,
}

/// Insertion-ordered set of graph parts
#[derive(Default)]
struct GraphBuilder {
    entities: Vec<Entity>,
    entity_keys: HashSet<EntityKey>,
    relationships: Vec<Relationship>,
    relationship_keys: HashSet<Relationship>,
}

impl GraphBuilder {
    fn add_entity(&mut self, entity: Entity) {
        if self.entity_keys.insert(entity.key.clone()) {
            self.entities.push(entity);
        }
    }

    fn add_relationship(&mut self, source: &EntityKey, edge_type: EdgeType, target: EntityKey) {
        let rel = Relationship::new(source.clone(), edge_type, target);
        if self.relationship_keys.insert(rel.clone()) {
            self.relationships.push(rel);
        }
    }
}

/// Names an import binds in one file, restricted to project-internal targets
struct ImportBindings<'a> {
    by_local: HashMap<&'a str, &'a ImportRef>,
}

impl<'a> ImportBindings<'a> {
    fn new(imports: &'a [ImportRef]) -> Self {
        let by_local = imports
            .iter()
            .filter(|i| i.target.is_internal())
            .filter_map(|i| i.local_name.as_deref().map(|name| (name, i)))
            .collect();
        Self { by_local }
    }

    /// Target file and imported symbol for a `from m import symbol` binding
    fn symbol(&self, local: &str) -> Option<(&'a str, &'a str)> {
        let import = self.by_local.get(local)?;
        match (&import.target, &import.symbol) {
            (ImportTarget::Module(file), Some(symbol)) => Some((file.as_str(), symbol.as_str())),
            _ => None,
        }
    }

    /// Target file for a binding of a whole module
    fn module(&self, local: &str) -> Option<&'a str> {
        let import = self.by_local.get(local)?;
        match (&import.target, &import.symbol) {
            (ImportTarget::Module(file), None) => Some(file.as_str()),
            _ => None,
        }
    }
}

/// Derives every relationship of a run from the per-file extractions
pub struct Resolver<'a> {
    table: &'a SymbolTable,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self { table }
    }

    pub fn run(&self, files: &[FileExtraction]) -> ResolvedGraph {
        let mut graph = GraphBuilder::default();
        let mut stats = ResolveStats::default();

        for file in files {
            for entity in &file.entities {
                graph.add_entity(entity.clone());
            }
        }

        // Line span of each file, for File nodes created by imports
        let file_spans: HashMap<&str, (u32, u32)> = files
            .iter()
            .filter_map(|f| {
                let file = f.entities.first()?;
                Some((f.path.as_str(), (file.line_start, file.line_end)))
            })
            .collect();

        for file in files {
            let file_key = file.file_key();

            // --- Structure ---
            for def in file.definitions() {
                graph.add_relationship(&file_key, EdgeType::Contains, def.key.clone());
                if let Some(owner) = def.owner() {
                    let class = EntityKey::new(EntityKind::Class, owner, file.path.clone());
                    graph.add_relationship(&class, EdgeType::Defines, def.key.clone());
                }
            }

            // --- Imports ---
            for import in &file.imports {
                let target = import.target.entity_key(&file.path);
                if let ImportTarget::Module(path) = &import.target {
                    let (start, end) = file_spans.get(path.as_str()).copied().unwrap_or((1, 1));
                    graph.add_entity(Entity::new(target.clone(), start, end));
                }
                graph.add_relationship(&file_key, EdgeType::Imports, target);
            }

            // --- Calls ---
            let bindings = ImportBindings::new(&file.imports);
            for call in &file.calls {
                stats.total += 1;
                let target = match self.resolve_call(call, &file.path, &bindings) {
                    Resolution::Resolved(key) => {
                        stats.resolved += 1;
                        key
                    }
                    Resolution::Ambiguous(candidates) => {
                        tracing::debug!(
                            "{}:{} call to {} is ambiguous between {} candidates",
                            file.path,
                            call.line,
                            call.callee,
                            candidates.len()
                        );
                        stats.ambiguous += 1;
                        self.external(&mut graph, call)
                    }
                    Resolution::Unresolved => {
                        stats.external += 1;
                        self.external(&mut graph, call)
                    }
                };
                graph.add_relationship(&call.caller, EdgeType::Calls, target);
            }
        }

        tracing::debug!(
            "Resolved {} entities, {} relationships",
            graph.entities.len(),
            graph.relationships.len()
        );

        ResolvedGraph {
            entities: graph.entities,
            relationships: graph.relationships,
            stats,
        }
    }

    fn external(&self, graph: &mut GraphBuilder, call: &CallSite) -> EntityKey {
        let key = EntityKey::external(call.callee.clone());
        graph.add_entity(Entity::new(key.clone(), call.line, call.line));
        key
    }

    fn resolve_call(&self, call: &CallSite, file: &str, bindings: &ImportBindings) -> Resolution {
        match call.callee.rsplit_once('.') {
            None => self.resolve_bare(&call.callee, file, bindings),
            Some((receiver, attr)) => self.resolve_dotted(call, receiver, attr, file, bindings),
        }
    }

    /// `helper()`: same file, then an explicit `from` import, then project-wide
    fn resolve_bare(&self, name: &str, file: &str, bindings: &ImportBindings) -> Resolution {
        let local = self.table.lookup_in(name, file);
        if !matches!(local, Resolution::Unresolved) {
            return local;
        }

        if let Some((target, symbol)) = bindings.symbol(name) {
            let imported = self.table.lookup_in(symbol, target);
            if !matches!(imported, Resolution::Unresolved) {
                return imported;
            }
        }

        self.table.resolve(name, file)
    }

    /// `self.m()`, `Klass.m()`, `mod.f()`, `Imported.m()`
    fn resolve_dotted(
        &self,
        call: &CallSite,
        receiver: &str,
        attr: &str,
        file: &str,
        bindings: &ImportBindings,
    ) -> Resolution {
        if receiver == "self" || receiver == "cls" {
            if let Some(owner) = &call.caller.owner {
                if let Some(method) = self.table.method(file, owner, attr) {
                    return Resolution::Resolved(method.clone());
                }
            }
            return Resolution::Unresolved;
        }

        if self.table.has_class(file, receiver) {
            return self
                .table
                .method(file, receiver, attr)
                .map(|m| Resolution::Resolved(m.clone()))
                .unwrap_or(Resolution::Unresolved);
        }

        if let Some(target) = bindings.module(receiver) {
            return self.table.lookup_in(attr, target);
        }

        if let Some((target, class)) = bindings.symbol(receiver) {
            if let Some(method) = self.table.method(target, class, attr) {
                return Resolution::Resolved(method.clone());
            }
        }

        Resolution::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{LanguageExtractor, ModuleIndex, PythonExtractor};

    fn extract_all(sources: &[(&str, &str)]) -> Vec<FileExtraction> {
        let modules = ModuleIndex::from_paths(sources.iter().map(|(p, _)| p.to_string()));
        let extractor = PythonExtractor::new();
        sources
            .iter()
            .map(|(path, src)| extractor.extract(path, src, &modules).unwrap())
            .collect()
    }

    fn resolve(sources: &[(&str, &str)]) -> ResolvedGraph {
        let files = extract_all(sources);
        let table = SymbolTable::build(&files);
        Resolver::new(&table).run(&files)
    }

    fn edges(graph: &ResolvedGraph, edge_type: EdgeType) -> Vec<String> {
        graph
            .relationships
            .iter()
            .filter(|r| r.edge_type == edge_type)
            .map(|r| format!("{} -> {}", r.source, r.target))
            .collect()
    }

    #[test]
    fn test_calculator_structure() {
        let graph = resolve(&[(
            "calculator.py",
            "class Calculator:\n    def add(self, a, b):\n        return a + b\n",
        )]);

        assert_eq!(
            edges(&graph, EdgeType::Defines),
            vec!["Class:Calculator@calculator.py -> Method:Calculator.add@calculator.py"]
        );
        assert_eq!(
            edges(&graph, EdgeType::Contains),
            vec![
                "File:calculator.py@calculator.py -> Class:Calculator@calculator.py",
                "File:calculator.py@calculator.py -> Method:Calculator.add@calculator.py",
            ]
        );
    }

    #[test]
    fn test_external_call_and_library_import() {
        let graph = resolve(&[(
            "main.py",
            "from flask import jsonify, request\n\ndef greet():\n    return jsonify(msg='hi')\n",
        )]);

        assert_eq!(edges(&graph, EdgeType::Imports), vec!["File:main.py@main.py -> Library:flask@main.py"]);
        assert_eq!(edges(&graph, EdgeType::Calls), vec!["Function:greet@main.py -> External:jsonify@"]);
        assert_eq!(graph.stats.external, 1);
        assert!(graph.entities.iter().any(|e| e.key == EntityKey::external("jsonify")));
    }

    #[test]
    fn test_duplicate_calls_collapse() {
        let graph = resolve(&[(
            "loop.py",
            "def step():\n    pass\n\ndef run():\n    step()\n    step()\n    print(1)\n    print(2)\n",
        )]);

        assert_eq!(
            edges(&graph, EdgeType::Calls),
            vec![
                "Function:run@loop.py -> Function:step@loop.py",
                "Function:run@loop.py -> External:print@",
            ]
        );
        assert_eq!(graph.stats.total, 4);
        assert_eq!(graph.stats.resolved, 2);
    }

    #[test]
    fn test_self_and_class_method_calls() {
        let graph = resolve(&[(
            "shapes.py",
            r#"
class Square:
    def __init__(self):
        self.reset()
    def reset(self):
        Circle.unit()
        self.missing()

class Circle:
    def __init__(self):
        pass
    @classmethod
    def unit(cls):
        return cls.__init__()
"#,
        )]);

        let calls = edges(&graph, EdgeType::Calls);
        assert!(calls.contains(&"Method:Square.__init__@shapes.py -> Method:Square.reset@shapes.py".to_string()));
        assert!(calls.contains(&"Method:Square.reset@shapes.py -> Method:Circle.unit@shapes.py".to_string()));
        assert!(calls.contains(&"Method:Square.reset@shapes.py -> External:self.missing@".to_string()));
        assert!(calls.contains(&"Method:Circle.unit@shapes.py -> Method:Circle.__init__@shapes.py".to_string()));
        assert_eq!(edges(&graph, EdgeType::Defines).len(), 4);
    }

    #[test]
    fn test_cross_file_resolution() {
        let graph = resolve(&[
            ("app.py", "import util\nfrom models import User, make\n\ndef main():\n    util.fmt()\n    make()\n    User.create()\n    shared()\n"),
            ("util.py", "def fmt():\n    pass\n"),
            ("models.py", "class User:\n    def create(self):\n        pass\n\ndef make():\n    pass\n"),
            ("one.py", "def shared():\n    pass\n"),
            ("two.py", "def shared():\n    pass\n"),
        ]);

        let calls = edges(&graph, EdgeType::Calls);
        assert_eq!(
            calls,
            vec![
                "Function:main@app.py -> Function:fmt@util.py",
                "Function:main@app.py -> Function:make@models.py",
                "Function:main@app.py -> Method:User.create@models.py",
                "Function:main@app.py -> External:shared@",
            ]
        );
        assert_eq!(graph.stats.ambiguous, 1);
        assert_eq!(
            edges(&graph, EdgeType::Imports),
            vec![
                "File:app.py@app.py -> File:util.py@util.py",
                "File:app.py@app.py -> File:models.py@models.py",
            ]
        );
    }

    #[test]
    fn test_every_edge_endpoint_is_an_entity() {
        let graph = resolve(&[
            ("pkg/__init__.py", ""),
            ("pkg/core.py", "import os\nfrom . import helpers\n\ndef run():\n    helpers.go()\n    os.getcwd()\n"),
            ("pkg/helpers.py", "def go():\n    pass\n"),
        ]);

        let keys: HashSet<&EntityKey> = graph.entities.iter().map(|e| &e.key).collect();
        for rel in &graph.relationships {
            assert!(keys.contains(&rel.source), "missing source of {}", rel);
            assert!(keys.contains(&rel.target), "missing target of {}", rel);
        }
        assert!(edges(&graph, EdgeType::Calls)
            .contains(&"Function:run@pkg/core.py -> Function:go@pkg/helpers.py".to_string()));
    }

    #[test]
    fn test_imported_file_node_takes_target_span() {
        let graph = resolve(&[
            ("app.py", "import util\n"),
            ("util.py", "def a():\n    pass\n\ndef b():\n    pass\n"),
        ]);
        let util = graph
            .entities
            .iter()
            .find(|e| e.key == EntityKey::file("util.py"))
            .unwrap();
        assert_eq!((util.line_start, util.line_end), (1, 5));
    }

    #[test]
    fn test_same_key_definitions_collapse_and_resolve() {
        let graph = resolve(&[(
            "d.py",
            "def a():\n    def wrapper():\n        pass\n\ndef b():\n    def wrapper():\n        pass\n\ndef c():\n    wrapper()\n",
        )]);

        let wrappers = graph
            .entities
            .iter()
            .filter(|e| e.kind() == EntityKind::Function && e.name() == "wrapper")
            .count();
        assert_eq!(wrappers, 1);
        assert_eq!(edges(&graph, EdgeType::Calls), vec!["Function:c@d.py -> Function:wrapper@d.py"]);
        assert_eq!(graph.stats.resolved, 1);
        assert_eq!(graph.stats.ambiguous, 0);
    }
}
