//! Indexer configuration.
//!
//! Read from `plugin-index.toml`. Every field is optional; relative paths are
//! resolved against the directory holding the config file.

use crate::artifact::{ArchiveFormat, ArtifactLayout};
use crate::component::{Branch, ComponentKind};
use crate::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, DEFAULT_INDEX_FILE};
use crate::error::{IndexError, IndexResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Indexer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// Folder containing the `integrations/` and `platforms/` source trees.
    pub source: PathBuf,

    /// Index root: holds the index file and the artifact folders.
    pub output: PathBuf,

    /// Index file, relative to `output`.
    pub index_file: PathBuf,

    /// Artifact compression format.
    pub format: ArchiveFormat,

    /// Rebuild artifacts that are recorded but missing on disk.
    pub rebuild_missing: bool,

    /// Paths left out of artifacts, per kind.
    pub excludes: Excludes,

    /// Versions of the tools artifacts are built against, stamped into the index.
    pub tool_versions: BTreeMap<String, String>,

    /// Git publishing.
    pub publish: PublishConfig,
}

/// Gitignore-style patterns excluded from artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Excludes {
    pub integrations: Vec<String>,
    pub platforms: Vec<String>,
}

/// Git publishing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Commit after every run without needing `--publish`.
    pub enabled: bool,

    /// Push after committing.
    pub push: bool,

    /// Remote to push to.
    pub remote: Option<String>,

    /// Commit message. `{branch}` is replaced with the branch name.
    pub message: String,

    /// Repository root. Defaults to the index root.
    pub repo: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl IndexerConfig {
    /// Load configuration.
    ///
    /// Uses `path` if given, else the file named by `PLUGIN_INDEX_CONFIG`, else
    /// `plugin-index.toml` in the working directory. Only an explicitly named
    /// file is required to exist.
    pub fn load(path: Option<&Path>) -> IndexResult<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let (path, required) = match explicit {
            Some(p) => (p, true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                return Err(IndexError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            tracing::debug!("No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_toml(&content, base)
    }

    /// Parse a config and resolve its relative paths against `base`.
    pub fn from_toml(content: &str, base: &Path) -> IndexResult<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };

        self.source = resolve(&self.source);
        self.output = resolve(&self.output);
        self.publish.repo = self.publish.repo.as_ref().map(resolve);
    }

    /// Check that artifacts written below `output` can never end up inside
    /// the component folders they are packed from.
    pub fn check_paths(&self) -> IndexResult<()> {
        let source = resolve_existing(&self.source);
        let output = resolve_existing(&self.output);

        if output.starts_with(&source) {
            return Err(IndexError::InvalidConfig(format!(
                "output {} must not be inside source {}",
                self.output.display(),
                self.source.display()
            )));
        }
        Ok(())
    }

    /// Full path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.output.join(&self.index_file)
    }

    /// Artifact layout below the index root.
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.output, self.format)
    }

    /// Exclude patterns for a kind.
    pub fn excludes_for(&self, kind: ComponentKind) -> &[String] {
        match kind {
            ComponentKind::Integration => &self.excludes.integrations,
            ComponentKind::Platform => &self.excludes.platforms,
        }
    }

    /// Repository the publisher commits in.
    pub fn publish_repo(&self) -> PathBuf {
        self.publish
            .repo
            .clone()
            .unwrap_or_else(|| self.output.clone())
    }

    /// Commit message for a branch.
    pub fn commit_message(&self, branch: Branch) -> String {
        self.publish.message.replace("{branch}", branch.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Canonicalize the longest existing prefix of `path` and append the rest.
fn resolve_existing(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            resolve_existing(parent).join(name)
        }
        _ => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("components"),
            output: PathBuf::from("index"),
            index_file: PathBuf::from(DEFAULT_INDEX_FILE),
            format: ArchiveFormat::default(),
            rebuild_missing: false,
            excludes: Excludes::default(),
            tool_versions: BTreeMap::new(),
            publish: PublishConfig::default(),
        }
    }
}

impl Default for Excludes {
    fn default() -> Self {
        let owned = |patterns: &[&str]| patterns.iter().map(|p| p.to_string()).collect();
        Self {
            integrations: owned(&["emulator.json", "designer", "designer.py"]),
            platforms: owned(&["designer", "designer.py"]),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            push: false,
            remote: Some("origin".to_string()),
            message: "Update {branch} package index".to_string(),
            repo: None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::from_toml("", Path::new("/repo")).unwrap();
        assert_eq!(config.source, PathBuf::from("/repo/components"));
        assert_eq!(config.index_path(), PathBuf::from("/repo/index/index.json"));
        assert_eq!(config.publish.remote.as_deref(), Some("origin"));
        assert_eq!(config.format, ArchiveFormat::Zip);
        assert!(config.excludes_for(ComponentKind::Integration).contains(&"emulator.json".to_string()));
        assert!(!config.excludes_for(ComponentKind::Platform).contains(&"emulator.json".to_string()));
        assert_eq!(config.commit_message(Branch::Dev), "Update dev package index");
    }

    #[test]
    fn test_full_config() {
        let content = r#"
            source = "designer"
            output = "/srv/index"
            format = "tar.gz"
            rebuild_missing = true

            [excludes]
            integrations = ["designer"]

            [tool_versions]
            inkBoard = "0.3.0"

            [publish]
            enabled = true
            push = true
            remote = "origin"
            message = "Index {branch} build"
        "#;
        let config = IndexerConfig::from_toml(content, Path::new("/repo")).unwrap();

        assert_eq!(config.source, PathBuf::from("/repo/designer"));
        assert_eq!(config.output, PathBuf::from("/srv/index"));
        assert_eq!(config.format, ArchiveFormat::TarGz);
        assert!(config.rebuild_missing);
        assert_eq!(config.excludes.integrations, vec!["designer"]);
        // Unset kinds keep their defaults.
        assert_eq!(config.excludes.platforms, vec!["designer", "designer.py"]);
        assert_eq!(config.tool_versions["inkBoard"], "0.3.0");
        assert_eq!(config.publish_repo(), PathBuf::from("/srv/index"));
        assert_eq!(config.commit_message(Branch::Main), "Index main build");
    }

    #[test]
    fn test_output_inside_source_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("components")).unwrap();
        let config = |source: &str, output: &str| IndexerConfig {
            source: dir.path().join(source),
            output: dir.path().join(output),
            ..Default::default()
        };

        for (source, output) in [("components", "components"), ("components", "components/index")] {
            assert!(matches!(
                config(source, output).check_paths(),
                Err(IndexError::InvalidConfig(_))
            ));
        }

        // Spelled differently, same folder.
        assert!(config("components", "components/../components").check_paths().is_err());

        config("components", "index").check_paths().unwrap();
        config("components", "../elsewhere/index").check_paths().unwrap();
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = IndexerConfig::from_toml("sorce = \"x\"", Path::new("."));
        assert!(matches!(result, Err(IndexError::ConfigParse(_))));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = IndexerConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_resolves_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plugin-index.toml");
        std::fs::write(&path, "output = \"index\"\n").unwrap();

        let config = IndexerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.output, dir.path().join("index"));
    }
}
