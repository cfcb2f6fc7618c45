use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Options recognized in `codegraph.toml`. Every field has a default, so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Scan start path
    pub root: PathBuf,
    /// File extensions to parse, without the leading dot
    pub include_ext: BTreeSet<String>,
    /// Directory names pruned from the walk
    pub exclude_dirs: BTreeSet<String>,
    /// Honor `.gitignore` / `.ignore` files under the root
    pub respect_gitignore: bool,
    /// SQLite database file; `.codegraph/graph.db` under the root when unset
    pub database: Option<PathBuf>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            include_ext: ["py", "pyi"].into_iter().map(String::from).collect(),
            exclude_dirs: [
                "venv", ".venv", "env", "node_modules", "__pycache__", "site-packages",
                ".git", ".tox", ".mypy_cache", "build", "dist",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            respect_gitignore: true,
            database: None,
        }
    }
}

impl GraphConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Database path, falling back to the default location under the root
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| default_database_path_in(&self.root))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("codegraph.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".codegraph").join("graph.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<GraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: GraphConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &GraphConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: GraphConfig = toml::from_str(
            r#"
root = "app_repo"
exclude_dirs = ["migrations"]
"#,
        )
        .unwrap();

        assert_eq!(config.root, PathBuf::from("app_repo"));
        assert!(config.exclude_dirs.contains("migrations"));
        assert!(!config.exclude_dirs.contains("venv"));
        assert!(config.include_ext.contains("py"));
        assert!(config.include_ext.contains("pyi"));
        assert!(config.respect_gitignore);
    }

    #[test]
    fn test_database_path_defaults_under_root() {
        let config = GraphConfig::with_root("/tmp/project");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/project/.codegraph/graph.db")
        );
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codegraph.toml");
        let config = GraphConfig::with_root("src");

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).unwrap().is_none());
    }
}
