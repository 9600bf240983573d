//! Component kinds, branches and manifest discovery.

use crate::constants::{
    INTEGRATION_MANIFEST_FILE, INTEGRATIONS_DIR, PLATFORM_MANIFEST_FILE, PLATFORMS_DIR,
};
use crate::error::ComponentError;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The two kinds of component tracked by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Integration,
    Platform,
}

/// Release branch a pass publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// Stable releases only.
    Main,
    /// May carry pre-release builds.
    Dev,
}

/// Name and declared version of one component, read from its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Component name, unique within its kind.
    pub name: String,

    /// Version declared by the manifest.
    pub declared_version: Version,
}

/// A component folder found in the source tree.
#[derive(Debug)]
pub struct DiscoveredComponent {
    /// Folder name, used as the component name.
    pub name: String,

    /// Source folder the artifact is built from.
    pub dir: PathBuf,

    /// Parsed descriptor, or why it could not be read.
    pub descriptor: Result<ComponentDescriptor, ComponentError>,
}

/// Fields of a manifest file the indexer reads. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct ManifestVersion {
    version: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ComponentKind {
    /// Both kinds, in processing order.
    pub const ALL: [ComponentKind; 2] = [ComponentKind::Integration, ComponentKind::Platform];

    /// Folder name for this kind in the source tree and the index root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Integration => INTEGRATIONS_DIR,
            Self::Platform => PLATFORMS_DIR,
        }
    }

    /// Manifest file that declares the component version.
    pub fn manifest_file(&self) -> &'static str {
        match self {
            Self::Integration => INTEGRATION_MANIFEST_FILE,
            Self::Platform => PLATFORM_MANIFEST_FILE,
        }
    }

    /// Parse a kind from its singular or plural name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "integration" | "integrations" => Some(Self::Integration),
            "platform" | "platforms" => Some(Self::Platform),
            _ => None,
        }
    }
}

impl Branch {
    /// Both branches.
    pub const ALL: [Branch; 2] = [Branch::Main, Branch::Dev];

    /// Whether this is the dev branch.
    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    /// Lowercase branch name as stored in the index.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Dev => "dev",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integration => "integration",
            Self::Platform => "platform",
        })
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Find every component of `kind` under `source_root`.
///
/// A component is an immediate sub-folder of `<source_root>/<kind-dir>` that
/// contains the kind's manifest file. Hidden folders and `__pycache__`-style
/// folders are skipped. Results are sorted by name.
pub fn discover_components(
    kind: ComponentKind,
    source_root: &Path,
) -> std::io::Result<Vec<DiscoveredComponent>> {
    let base = source_root.join(kind.dir_name());
    if !base.is_dir() {
        tracing::debug!("No {} folder at {}", kind.dir_name(), base.display());
        return Ok(Vec::new());
    }

    let mut components = Vec::new();
    for entry in std::fs::read_dir(&base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name.starts_with("__") {
            continue;
        }

        let dir = entry.path();
        if !dir.join(kind.manifest_file()).exists() {
            tracing::debug!("Skipping {}: no {}", dir.display(), kind.manifest_file());
            continue;
        }

        let descriptor = read_descriptor(kind, &dir);
        components.push(DiscoveredComponent {
            name,
            dir,
            descriptor,
        });
    }

    components.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(components)
}

/// Read the descriptor of the component in `dir`.
pub fn read_descriptor(
    kind: ComponentKind,
    dir: &Path,
) -> Result<ComponentDescriptor, ComponentError> {
    let manifest_path = dir.join(kind.manifest_file());
    let missing = |reason: String| ComponentError::MissingDescriptor {
        path: manifest_path.clone(),
        reason,
    };

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| missing("component folder has no name".to_string()))?;

    let content = std::fs::read_to_string(&manifest_path).map_err(|e| missing(e.to_string()))?;
    let manifest: ManifestVersion =
        serde_json::from_str(&content).map_err(|e| missing(format!("invalid JSON: {}", e)))?;
    let version = manifest
        .version
        .ok_or_else(|| missing("no `version` field".to_string()))?;

    Ok(ComponentDescriptor {
        name,
        declared_version: Version::parse(&version)?,
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_component(root: &Path, kind: ComponentKind, name: &str, manifest: &str) -> PathBuf {
        let dir = root.join(kind.dir_name()).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(kind.manifest_file()), manifest).unwrap();
        dir
    }

    #[test]
    fn test_read_descriptor() {
        let root = TempDir::new().unwrap();
        let dir = write_component(
            root.path(),
            ComponentKind::Integration,
            "homeassistant",
            r#"{ "name": "Home Assistant", "version": "1.2.0" }"#,
        );

        let descriptor = read_descriptor(ComponentKind::Integration, &dir).unwrap();
        assert_eq!(descriptor.name, "homeassistant");
        assert_eq!(descriptor.declared_version, Version::new(1, 2, 0));
    }

    #[test]
    fn test_read_descriptor_errors() {
        let root = TempDir::new().unwrap();

        let no_version = write_component(root.path(), ComponentKind::Platform, "a", r#"{}"#);
        assert!(matches!(
            read_descriptor(ComponentKind::Platform, &no_version),
            Err(ComponentError::MissingDescriptor { .. })
        ));

        let bad_json = write_component(root.path(), ComponentKind::Platform, "b", "{ nope");
        assert!(matches!(
            read_descriptor(ComponentKind::Platform, &bad_json),
            Err(ComponentError::MissingDescriptor { .. })
        ));

        let bad_version = write_component(
            root.path(),
            ComponentKind::Platform,
            "c",
            r#"{ "version": "latest" }"#,
        );
        assert!(matches!(
            read_descriptor(ComponentKind::Platform, &bad_version),
            Err(ComponentError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_discover_components() {
        let root = TempDir::new().unwrap();
        let kind = ComponentKind::Integration;
        write_component(root.path(), kind, "zeta", r#"{ "version": "1.0.0" }"#);
        write_component(root.path(), kind, "alpha", r#"{ "version": "0.1.0" }"#);
        write_component(root.path(), kind, "__pycache__", r#"{ "version": "0.1.0" }"#);
        std::fs::create_dir_all(root.path().join("integrations/no_manifest")).unwrap();
        // A platform manifest does not make an integration.
        write_component(root.path(), ComponentKind::Platform, "desktop", r#"{ "version": "1.0.0" }"#);

        let found = discover_components(kind, root.path()).unwrap();
        let names: Vec<_> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(found.iter().all(|c| c.descriptor.is_ok()));
    }

    #[test]
    fn test_discover_missing_kind_folder() {
        let root = TempDir::new().unwrap();
        let found = discover_components(ComponentKind::Platform, root.path()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ComponentKind::parse("Platforms"), Some(ComponentKind::Platform));
        assert_eq!(ComponentKind::parse("integration"), Some(ComponentKind::Integration));
        assert_eq!(ComponentKind::parse("themes"), None);
    }
}
