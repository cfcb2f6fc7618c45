//! Source Walker
//!
//! Enumerates the files of a project that the extractor should see. The walk
//! is lazy and restartable: every call to [`SourceWalker::files`] starts over.

use crate::config::GraphConfig;
use crate::{Error, Result};
use ignore::{DirEntry, WalkBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A file selected for analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated
    pub relative_path: String,
}

impl SourceFile {
    pub fn read(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// A file the run could not look at, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem {
    File(SourceFile),
    Skipped(SkippedFile),
}

pub struct SourceWalker {
    root: PathBuf,
    include_ext: BTreeSet<String>,
    exclude_dirs: BTreeSet<String>,
    respect_gitignore: bool,
}

impl SourceWalker {
    /// Validate the root and capture the filter rules.
    ///
    /// A missing, non-directory or unreadable root is a `PathError`.
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let root = config.root.canonicalize().map_err(|e| Error::Path {
            path: config.root.clone(),
            reason: e.to_string(),
        })?;

        if !root.is_dir() {
            return Err(Error::Path {
                path: config.root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        std::fs::read_dir(&root).map_err(|e| Error::Path {
            path: config.root.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            root,
            include_ext: config
                .include_ext
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
            exclude_dirs: config.exclude_dirs.clone(),
            respect_gitignore: config.respect_gitignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk over the project.
    pub fn files(&self) -> impl Iterator<Item = WalkItem> + '_ {
        let exclude_dirs = self.exclude_dirs.clone();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .parents(false)
            .ignore(self.respect_gitignore)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(false)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !is_excluded_dir(entry, &exclude_dirs));

        builder.build().filter_map(move |result| match result {
            Ok(entry) => {
                let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                if !is_file || !self.has_included_extension(entry.path()) {
                    return None;
                }
                Some(WalkItem::File(SourceFile {
                    path: entry.path().to_path_buf(),
                    relative_path: self.relative_path(entry.path()),
                }))
            }
            Err(err) => {
                let path = error_path(&err)
                    .map(|p| self.relative_path(&p))
                    .unwrap_or_default();
                tracing::warn!("Skipping {}: {}", path, err);
                Some(WalkItem::Skipped(SkippedFile {
                    path,
                    reason: err.to_string(),
                }))
            }
        })
    }

    fn has_included_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.include_ext.contains(ext))
            .unwrap_or(false)
    }

    fn relative_path(&self, path: &Path) -> String {
        normalize_path(path.strip_prefix(&self.root).unwrap_or(path))
    }
}

/// Render a path with `/` separators regardless of platform
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &BTreeSet<String>) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
    is_dir
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_dirs.contains(name))
            .unwrap_or(false)
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } => error_path(err),
        ignore::Error::WithLineNumber { err, .. } => error_path(err),
        _ => None,
    }
}
