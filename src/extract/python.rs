//! Python extractor
//!
//! Walks a tree-sitter-python syntax tree and emits:
//! - `File`, `Function`, `Class` and `Method` entities
//! - one `Library` entity per distinct external module imported by the file
//! - import tokens and call sites for the resolver
//! - `name = <constant>` data flows inside functions and methods

use crate::{Error, Result};
use crate::entity::{Entity, EntityKey, EntityKind, UNRESOLVED_IMPORT};
use super::framework::{CallSite, DataFlow, FileExtraction, ImportRef, ImportTarget, LanguageExtractor};
use super::modules::ModuleIndex;
use std::collections::HashSet;
use tree_sitter::{Language, Node, Parser};

/// Callees whose first argument names a module to import.
const DYNAMIC_IMPORTERS: &[&str] = &["importlib.import_module", "import_module", "__import__"];

/// Python language extractor
pub struct PythonExtractor {
    language: Language,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for PythonExtractor {
    fn language_name(&self) -> &str {
        "Python"
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn extract(&self, path: &str, content: &str, modules: &ModuleIndex) -> Result<FileExtraction> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).map_err(|e| Error::Parse {
            path: path.to_string(),
            message: format!("failed to load grammar: {}", e),
        })?;

        let tree = parser.parse(content, None).ok_or_else(|| Error::Parse {
            path: path.to_string(),
            message: "parser produced no tree".to_string(),
        })?;

        let root = tree.root_node();
        if root.has_error() {
            let message = match first_error(root) {
                Some(node) => format!(
                    "syntax error at line {}, column {}",
                    node.start_position().row + 1,
                    node.start_position().column + 1
                ),
                None => "syntax error".to_string(),
            };
            return Err(Error::Parse { path: path.to_string(), message });
        }

        let mut walk = TreeWalk::new(path, content.as_bytes(), modules);
        let line_count = content.lines().count().max(1) as u32;
        walk.add_entity(Entity::new(EntityKey::file(path), 1, line_count));
        walk.visit_children(root, &Scope::default());

        tracing::debug!(
            "Extracted {}: {} entities, {} imports, {} calls, {} data flows",
            path,
            walk.out.entities.len(),
            walk.out.imports.len(),
            walk.out.calls.len(),
            walk.out.data_flows.len()
        );
        Ok(walk.out)
    }
}

/// Lexical position of the node being visited
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Set while directly inside a class body; defs here are methods
    class_body: Option<String>,
    /// Function or method that calls are attributed to
    caller: Option<EntityKey>,
    /// Inside a method body (defs here produce no entity)
    in_method: bool,
}

struct TreeWalk<'a> {
    path: &'a str,
    source: &'a [u8],
    modules: &'a ModuleIndex,
    out: FileExtraction,
    seen: HashSet<EntityKey>,
}

impl<'a> TreeWalk<'a> {
    fn new(path: &'a str, source: &'a [u8], modules: &'a ModuleIndex) -> Self {
        Self {
            path,
            source,
            modules,
            out: FileExtraction::new(path),
            seen: HashSet::new(),
        }
    }

    fn add_entity(&mut self, entity: Entity) {
        if self.seen.insert(entity.key.clone()) {
            self.out.entities.push(entity);
        }
    }

    fn text(&self, node: Node) -> Option<&'a str> {
        node.utf8_text(self.source).ok()
    }

    fn field_text(&self, node: Node, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).and_then(|n| self.text(n))
    }

    fn visit_children(&mut self, node: Node, scope: &Scope) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, scope);
        }
    }

    fn visit(&mut self, node: Node, scope: &Scope) {
        match node.kind() {
            "function_definition" => self.visit_function(node, scope),
            "class_definition" => self.visit_class(node, scope),
            "import_statement" => self.visit_import(node),
            "import_from_statement" | "future_import_statement" => self.visit_import_from(node),
            "call" => {
                self.visit_call(node, scope);
                self.visit_children(node, scope);
            }
            "assignment" => {
                self.visit_assignment(node, scope);
                self.visit_children(node, scope);
            }
            _ => self.visit_children(node, scope),
        }
    }

    fn visit_function(&mut self, node: Node, scope: &Scope) {
        let Some(name) = self.field_text(node, "name") else {
            return self.visit_children(node, scope);
        };
        let (start, end) = span(node);

        let inner = if let Some(class) = &scope.class_body {
            let key = EntityKey::method(name, self.path, class.clone());
            self.add_entity(Entity::new(key.clone(), start, end));
            Scope { class_body: None, caller: Some(key), in_method: true }
        } else if scope.in_method {
            // Helper nested in a method: no entity, its calls belong to the method
            Scope { class_body: None, ..scope.clone() }
        } else {
            let key = EntityKey::new(EntityKind::Function, name, self.path);
            self.add_entity(Entity::new(key.clone(), start, end));
            Scope { class_body: None, caller: Some(key), in_method: false }
        };

        // Defaults and annotations run in the enclosing scope
        for field in ["parameters", "return_type"] {
            if let Some(child) = node.child_by_field_name(field) {
                self.visit(child, scope);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body, &inner);
        }
    }

    fn visit_class(&mut self, node: Node, scope: &Scope) {
        let Some(name) = self.field_text(node, "name") else {
            return self.visit_children(node, scope);
        };
        let (start, end) = span(node);
        self.add_entity(Entity::new(
            EntityKey::new(EntityKind::Class, name, self.path),
            start,
            end,
        ));

        if let Some(bases) = node.child_by_field_name("superclasses") {
            self.visit(bases, scope);
        }
        if let Some(body) = node.child_by_field_name("body") {
            let inner = Scope {
                class_body: Some(name.to_string()),
                caller: scope.caller.clone(),
                in_method: false,
            };
            self.visit(body, &inner);
        }
    }

    /// `import a.b`, `import a.b as c`
    fn visit_import(&mut self, node: Node) {
        let line = node.start_position().row as u32 + 1;
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();

        for name_node in names {
            let (module, alias) = match name_node.kind() {
                "aliased_import" => (
                    name_node.child_by_field_name("name").and_then(|n| self.text(n)),
                    name_node.child_by_field_name("alias").and_then(|n| self.text(n)),
                ),
                _ => (self.text(name_node), None),
            };
            let Some(module) = module.map(compact) else { continue };
            let local = alias.map(str::to_string).unwrap_or_else(|| module.clone());
            let target = self.resolve_target(&module);
            self.record_import(module, target, Some(local), None, line);
        }
    }

    /// `from m import x as y`, `from m import *`, `from __future__ import x`
    fn visit_import_from(&mut self, node: Node) {
        let line = node.start_position().row as u32 + 1;
        let module = if node.kind() == "future_import_statement" {
            "__future__".to_string()
        } else {
            match self.field_text(node, "module_name") {
                Some(text) => compact(text),
                None => return,
            }
        };

        let mut cursor = node.walk();
        let is_wildcard = node
            .named_children(&mut cursor)
            .any(|child| child.kind() == "wildcard_import");
        if is_wildcard {
            let target = self.resolve_target(&module);
            self.record_import(module, target, None, None, line);
            return;
        }

        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name_node in names {
            let (symbol, alias) = match name_node.kind() {
                "aliased_import" => (
                    name_node.child_by_field_name("name").and_then(|n| self.text(n)),
                    name_node.child_by_field_name("alias").and_then(|n| self.text(n)),
                ),
                _ => (self.text(name_node), None),
            };
            let Some(symbol) = symbol.map(compact) else { continue };
            let local = alias.map(str::to_string).unwrap_or_else(|| symbol.clone());

            // `from pkg import mod` where pkg/mod.py exists binds the submodule
            let submodule = if module.ends_with('.') {
                format!("{}{}", module, symbol)
            } else {
                format!("{}.{}", module, symbol)
            };
            if let Some(file) = self.modules.resolve(&submodule, self.path) {
                self.record_import(submodule, ImportTarget::Module(file), Some(local), None, line);
                continue;
            }

            let target = self.resolve_target(&module);
            self.record_import(module.clone(), target, Some(local), Some(symbol), line);
        }
    }

    fn visit_call(&mut self, node: Node, scope: &Scope) {
        let Some(callee) = node
            .child_by_field_name("function")
            .and_then(|f| self.dotted_name(f))
        else {
            return;
        };
        let line = node.start_position().row as u32 + 1;

        if DYNAMIC_IMPORTERS.contains(&callee.as_str()) {
            let literal = self.first_string_argument(node);
            let target = match &literal {
                Some(module) => self.resolve_target(module),
                None => ImportTarget::Unresolved,
            };
            let module = literal.unwrap_or_else(|| UNRESOLVED_IMPORT.to_string());
            self.record_import(module, target, None, None, line);
        }

        if let Some(caller) = &scope.caller {
            self.out.calls.push(CallSite {
                caller: caller.clone(),
                callee,
                line,
            });
        }
    }

    /// `x = 1`, `a = b = "s"`; chained targets are visited as nested assignments
    fn visit_assignment(&mut self, node: Node, scope: &Scope) {
        let Some(caller) = &scope.caller else { return };
        // `x: int = 1` is an annotation, not a plain binding
        if node.child_by_field_name("type").is_some() {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else { return };
        if left.kind() != "identifier" {
            return;
        }

        let mut right = node.child_by_field_name("right");
        while let Some(inner) = right.filter(|n| n.kind() == "assignment") {
            right = inner.child_by_field_name("right");
        }
        let Some(value) = right.and_then(|n| self.constant_value(n)) else { return };
        let Some(target) = self.text(left) else { return };

        self.out.data_flows.push(DataFlow {
            scope: caller.clone(),
            value,
            target: target.to_string(),
            line: node.start_position().row as u32 + 1,
        });
    }

    fn constant_value(&self, node: Node) -> Option<String> {
        match node.kind() {
            "integer" | "float" => self.text(node).map(str::to_string),
            "true" => Some("True".to_string()),
            "false" => Some("False".to_string()),
            "none" => Some("None".to_string()),
            "string" => self.string_constant(node),
            _ => None,
        }
    }

    fn resolve_target(&self, module: &str) -> ImportTarget {
        match self.modules.resolve(module, self.path) {
            Some(file) => ImportTarget::Module(file),
            None => ImportTarget::Library(module.to_string()),
        }
    }

    fn record_import(
        &mut self,
        module: String,
        target: ImportTarget,
        local_name: Option<String>,
        symbol: Option<String>,
        line: u32,
    ) {
        if !target.is_internal() {
            let key = target.entity_key(self.path);
            self.add_entity(Entity::new(key, line, line));
        }
        self.out.imports.push(ImportRef {
            module,
            target,
            local_name,
            symbol,
            line,
        });
    }

    /// `name` or `a.b.name`; anything else has no lexical name
    fn dotted_name(&self, node: Node) -> Option<String> {
        match node.kind() {
            "identifier" => self.text(node).map(str::to_string),
            "attribute" => {
                let object = self.dotted_name(node.child_by_field_name("object")?)?;
                let attribute = node.child_by_field_name("attribute")?;
                if attribute.kind() != "identifier" {
                    return None;
                }
                Some(format!("{}.{}", object, self.text(attribute)?))
            }
            _ => None,
        }
    }

    /// First positional argument, when it is a plain string literal
    fn first_string_argument(&self, call: Node) -> Option<String> {
        let args = call.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let first = args
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment")?;
        if first.kind() != "string" {
            return None;
        }

        let literal = self.string_constant(first)?;
        if literal.is_empty() { None } else { Some(literal) }
    }

    /// Value of a string node, unless it is an f-string with placeholders
    fn string_constant(&self, node: Node) -> Option<String> {
        let mut cursor = node.walk();
        if node.named_children(&mut cursor).any(|n| n.kind() == "interpolation") {
            return None;
        }
        string_literal_value(self.text(node)?)
    }
}

fn span(node: Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

/// Module text without the whitespace the grammar tolerates (`from . mod`)
fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

/// Strip prefix letters and quotes: `r"pkg.mod"` -> `pkg.mod`
fn string_literal_value(text: &str) -> Option<String> {
    let body = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= 2 * quote.len() && body.starts_with(quote) && body.ends_with(quote) {
            return Some(body[quote.len()..body.len() - quote.len()].to_string());
        }
    }
    None
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, source: &str) -> FileExtraction {
        extract_with(path, source, &ModuleIndex::new())
    }

    fn extract_with(path: &str, source: &str, modules: &ModuleIndex) -> FileExtraction {
        PythonExtractor::new()
            .extract(path, source, modules)
            .expect("extraction failed")
    }

    fn keys(result: &FileExtraction, kind: EntityKind) -> Vec<String> {
        result.entities_of(kind).map(|e| e.key.display_name()).collect()
    }

    fn callees(result: &FileExtraction, caller: &str) -> Vec<String> {
        result
            .calls
            .iter()
            .filter(|c| c.caller.display_name() == caller)
            .map(|c| c.callee.clone())
            .collect()
    }

    #[test]
    fn test_functions_classes_methods() {
        let source = r#"
def hello():
    print("hello")

class Foo:
    """Docstring."""
    def bar(self):
        def inner():
            pass
        return inner()

    @staticmethod
    async def baz():
        pass

def world():
    def nested():
        pass
"#;
        let result = extract("test.py", source);

        assert_eq!(keys(&result, EntityKind::File), vec!["test.py"]);
        assert_eq!(keys(&result, EntityKind::Function), vec!["hello", "world", "nested"]);
        assert_eq!(keys(&result, EntityKind::Class), vec!["Foo"]);
        assert_eq!(keys(&result, EntityKind::Method), vec!["Foo.bar", "Foo.baz"]);

        let bar = result.entities_of(EntityKind::Method).next().unwrap();
        assert_eq!(bar.owner(), Some("Foo"));
        assert_eq!((bar.line_start, bar.line_end), (7, 10));
    }

    #[test]
    fn test_nested_class_owns_its_methods() {
        let source = r#"
class Outer:
    class Inner:
        def ping(self):
            pass
    def pong(self):
        pass
"#;
        let result = extract("nested.py", source);
        assert_eq!(keys(&result, EntityKind::Class), vec!["Outer", "Inner"]);
        assert_eq!(keys(&result, EntityKind::Method), vec!["Inner.ping", "Outer.pong"]);
    }

    #[test]
    fn test_calls_attributed_to_enclosing_callable() {
        let source = r#"
import requests

setup()

class Calculator:
    registry = build()

    def add(self, a, b):
        def log():
            record(a)
        log()
        return self.total(a) + helper(b)

def get_greeting(name):
    response = requests.get(f"http://localhost/{name}")
    return response.json()

def compose():
    return outer(inner(1))[0]()
"#;
        let result = extract("calc.py", source);

        assert_eq!(
            callees(&result, "Calculator.add"),
            vec!["record", "log", "self.total", "helper"]
        );
        assert_eq!(callees(&result, "get_greeting"), vec!["requests.get", "response.json"]);
        // The subscript call has no lexical name
        assert_eq!(callees(&result, "compose"), vec!["outer", "inner"]);
        assert!(!result.calls.iter().any(|c| c.callee == "setup" || c.callee == "build"));
    }

    #[test]
    fn test_decorator_calls_belong_to_enclosing_scope() {
        let source = r#"
@app.route("/x")
def view():
    return render()

def factory():
    @wraps(view)
    def wrapper():
        return view()
    return wrapper
"#;
        let result = extract("views.py", source);
        assert_eq!(callees(&result, "view"), vec!["render"]);
        assert_eq!(callees(&result, "factory"), vec!["wraps"]);
        assert_eq!(callees(&result, "wrapper"), vec!["view"]);
    }

    #[test]
    fn test_external_imports_become_libraries() {
        let source = r#"
import os
import os.path as osp
from flask import Flask, jsonify, request
from flask import jsonify

def handler():
    import json
    if True:
        from collections import OrderedDict
"#;
        let result = extract("main.py", source);

        assert_eq!(
            keys(&result, EntityKind::Library),
            vec!["os", "os.path", "flask", "json", "collections"]
        );
        let flask_imports: Vec<_> = result.imports.iter().filter(|i| i.module == "flask").collect();
        assert_eq!(flask_imports.len(), 4);
        assert!(flask_imports.iter().all(|i| i.target == ImportTarget::Library("flask".into())));

        let osp = result.imports.iter().find(|i| i.module == "os.path").unwrap();
        assert_eq!(osp.local_name.as_deref(), Some("osp"));
        assert_eq!(osp.symbol, None);

        let jsonify = result
            .imports
            .iter()
            .find(|i| i.symbol.as_deref() == Some("jsonify"))
            .unwrap();
        assert_eq!(jsonify.local_name.as_deref(), Some("jsonify"));
    }

    #[test]
    fn test_internal_imports_do_not_create_libraries() {
        let modules = ModuleIndex::from_paths([
            "app.py",
            "pkg/__init__.py",
            "pkg/models.py",
            "pkg/sub/__init__.py",
            "pkg/sub/views.py",
            "pkg/sub/helpers.py",
        ]);
        let source = r#"
import pkg.models
from pkg import models as m
from pkg.models import User
from .helpers import fmt
from .. import models
from . import *
"#;
        let result = extract_with("pkg/sub/views.py", source, &modules);

        assert!(keys(&result, EntityKind::Library).is_empty());
        let targets: Vec<_> = result
            .imports
            .iter()
            .map(|i| (i.target.clone(), i.local_name.clone(), i.symbol.clone()))
            .collect();
        assert_eq!(
            targets,
            vec![
                (ImportTarget::Module("pkg/models.py".into()), Some("pkg.models".into()), None),
                (ImportTarget::Module("pkg/models.py".into()), Some("m".into()), None),
                (
                    ImportTarget::Module("pkg/models.py".into()),
                    Some("User".into()),
                    Some("User".into())
                ),
                (
                    ImportTarget::Module("pkg/sub/helpers.py".into()),
                    Some("fmt".into()),
                    Some("fmt".into())
                ),
                (ImportTarget::Module("pkg/models.py".into()), Some("models".into()), None),
                (ImportTarget::Module("pkg/sub/__init__.py".into()), None, None),
            ]
        );
    }

    #[test]
    fn test_dynamic_imports() {
        let source = r#"
import importlib

plugin = importlib.import_module("plugins.audio")
other = __import__(name)

def load(kind):
    return importlib.import_module(f"plugins.{kind}")
"#;
        let result = extract("loader.py", source);
        assert_eq!(
            keys(&result, EntityKind::Library),
            vec!["importlib", "plugins.audio", UNRESOLVED_IMPORT]
        );
        let unresolved = result
            .imports
            .iter()
            .filter(|i| i.target == ImportTarget::Unresolved)
            .count();
        assert_eq!(unresolved, 2);
    }

    #[test]
    fn test_constant_assignments_are_data_flows() {
        let source = r#"
LIMIT = 10

def configure(user):
    retries = 3
    name = "guest"
    debug = verbose = False
    label = f"user-{user}"
    total: int = 0
    first, second = 1, 2
    count = len(user)
    self_ref = None

class Service:
    def start(self):
        self.port = 8080
        timeout = 2.5
"#;
        let result = extract("settings.py", source);
        let flows: Vec<(&str, &str, String)> = result
            .data_flows
            .iter()
            .map(|f| (f.value.as_str(), f.target.as_str(), f.scope.display_name()))
            .collect();

        assert_eq!(
            flows,
            vec![
                ("3", "retries", "configure".to_string()),
                ("guest", "name", "configure".to_string()),
                ("False", "debug", "configure".to_string()),
                ("False", "verbose", "configure".to_string()),
                ("None", "self_ref", "configure".to_string()),
                ("2.5", "timeout", "Service.start".to_string()),
            ]
        );
    }

    #[test]
    fn test_future_import() {
        let result = extract("typed.py", "from __future__ import annotations\n");
        assert_eq!(keys(&result, EntityKind::Library), vec!["__future__"]);
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = PythonExtractor::new()
            .extract("broken.py", "def broken(:\n    pass\n", &ModuleIndex::new())
            .unwrap_err();
        match err {
            Error::Parse { path, message } => {
                assert_eq!(path, "broken.py");
                assert!(message.contains("line 1"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_string_literal_value() {
        assert_eq!(string_literal_value("\"a.b\""), Some("a.b".into()));
        assert_eq!(string_literal_value("r'a'"), Some("a".into()));
        assert_eq!(string_literal_value("'''x'''"), Some("x".into()));
        assert_eq!(string_literal_value("x"), None);
    }
}
