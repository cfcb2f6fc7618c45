//! Module index: which dotted module names refer to project files.

use std::collections::BTreeSet;

const MODULE_SUFFIXES: &[&str] = &[".py", ".pyi", "/__init__.py", "/__init__.pyi"];

/// The set of project files, queried by module name.
///
/// Built once per run from the walker's output, before any file is parsed.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    files: BTreeSet<String>,
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.files.insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve `module`, as written in `importer`, to a project file.
    ///
    /// Absolute names are tried against the project root first, then against
    /// the importer's directory. Relative names (`.x`, `..`) only resolve
    /// against the importer's package.
    pub fn resolve(&self, module: &str, importer: &str) -> Option<String> {
        let importer_dir = parent_dir(importer);

        if module.starts_with('.') {
            let dots = module.chars().take_while(|&c| c == '.').count();
            let mut base = importer_dir.to_string();
            for _ in 1..dots {
                if base.is_empty() {
                    // Beyond the project root
                    return None;
                }
                base = parent_dir(&base).to_string();
            }
            return self.lookup(&join(&base, &module[dots..].replace('.', "/")));
        }

        let as_path = module.replace('.', "/");
        self.lookup(&as_path).or_else(|| {
            if importer_dir.is_empty() {
                None
            } else {
                self.lookup(&join(importer_dir, &as_path))
            }
        })
    }

    fn lookup(&self, base: &str) -> Option<String> {
        if base.is_empty() {
            return ["__init__.py", "__init__.pyi"]
                .iter()
                .find(|candidate| self.files.contains(**candidate))
                .map(|candidate| candidate.to_string());
        }
        MODULE_SUFFIXES
            .iter()
            .map(|suffix| format!("{}{}", base, suffix))
            .find(|candidate| self.files.contains(candidate))
    }
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn join(dir: &str, rest: &str) -> String {
    match (dir.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => dir.to_string(),
        (false, false) => format!("{}/{}", dir, rest),
    }
}
