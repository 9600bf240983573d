//! Artifact naming and on-disk layout.
//!
//! The file name is the only pointer to a branch's current artifact, so every
//! path the indexer touches is derived here:
//!
//! ```text
//! <root>/<kind-dir>/<name>/<name>-<version>.<ext>          current, main
//! <root>/<kind-dir>/<name>/<name>-<version>_dev.<ext>      current, dev
//! <root>/<kind-dir>/<name>/versions/<name>-<version>.<ext> archived
//! ```

use crate::component::{Branch, ComponentKind};
use crate::constants::{DEV_ARTIFACT_SUFFIX, VERSIONS_DIR};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Compression format of built artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,

    #[serde(rename = "tar.gz")]
    TarGz,
}

/// Resolves artifact paths below an index root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
    format: ArchiveFormat,
}

/// A current artifact found in a component's primary folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentArtifact {
    pub path: PathBuf,
    pub version: Version,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ArchiveFormat {
    /// File extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, format: ArchiveFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// The index root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Primary folder of a component.
    pub fn component_dir(&self, kind: ComponentKind, name: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(name)
    }

    /// Folder holding a component's archived artifacts.
    pub fn versions_dir(&self, kind: ComponentKind, name: &str) -> PathBuf {
        self.component_dir(kind, name).join(VERSIONS_DIR)
    }

    /// File name of the current artifact for a version on a branch.
    pub fn current_file_name(&self, name: &str, version: &Version, branch: Branch) -> String {
        let suffix = if branch.is_dev() {
            DEV_ARTIFACT_SUFFIX
        } else {
            ""
        };
        format!("{}-{}{}.{}", name, version, suffix, self.format.extension())
    }

    /// Path of the current artifact for a version on a branch.
    pub fn current_path(
        &self,
        kind: ComponentKind,
        name: &str,
        version: &Version,
        branch: Branch,
    ) -> PathBuf {
        self.component_dir(kind, name)
            .join(self.current_file_name(name, version, branch))
    }

    /// Path an artifact of `version` is archived to. Archived names never carry the dev suffix.
    pub fn archive_path(&self, kind: ComponentKind, name: &str, version: &Version) -> PathBuf {
        self.versions_dir(kind, name)
            .join(format!("{}-{}.{}", name, version, self.format.extension()))
    }

    /// Path relative to the index root, with forward slashes, as stored in the index.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Parse a file name as a current artifact of `name` on `branch`.
    pub fn parse_current_file_name(
        &self,
        name: &str,
        file_name: &str,
        branch: Branch,
    ) -> Option<Version> {
        let stem = file_name
            .strip_suffix(self.format.extension())?
            .strip_suffix('.')?
            .strip_prefix(name)?
            .strip_prefix('-')?;

        let raw = match (branch, stem.strip_suffix(DEV_ARTIFACT_SUFFIX)) {
            (Branch::Dev, Some(raw)) => raw,
            (Branch::Main, None) => stem,
            _ => return None,
        };

        Version::parse(raw).ok()
    }

    /// Every current artifact of `branch` in the component's primary folder.
    ///
    /// A missing folder has no artifacts. Results are sorted by path.
    pub fn scan_current(
        &self,
        kind: ComponentKind,
        name: &str,
        branch: Branch,
    ) -> std::io::Result<Vec<CurrentArtifact>> {
        let dir = self.component_dir(kind, name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(version) = self.parse_current_file_name(name, &file_name, branch) {
                found.push(CurrentArtifact {
                    path: entry.path(),
                    version,
                });
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_naming() {
        let layout = ArtifactLayout::new("/idx", ArchiveFormat::Zip);
        let kind = ComponentKind::Integration;

        assert_eq!(
            layout.current_path(kind, "foo", &v("1.0.0"), Branch::Main),
            PathBuf::from("/idx/integrations/foo/foo-1.0.0.zip")
        );
        assert_eq!(
            layout.current_path(kind, "foo", &v("1.1.0a1"), Branch::Dev),
            PathBuf::from("/idx/integrations/foo/foo-1.1.0a1_dev.zip")
        );
        assert_eq!(
            layout.archive_path(kind, "foo", &v("1.1.0a1")),
            PathBuf::from("/idx/integrations/foo/versions/foo-1.1.0a1.zip")
        );

        let tgz = ArtifactLayout::new("/idx", ArchiveFormat::TarGz);
        assert_eq!(
            tgz.current_file_name("desktop", &v("0.2.0"), Branch::Main),
            "desktop-0.2.0.tar.gz"
        );
    }

    #[test]
    fn test_parse_current_file_name() {
        let layout = ArtifactLayout::new("/idx", ArchiveFormat::Zip);

        assert_eq!(
            layout.parse_current_file_name("foo", "foo-1.0.0.zip", Branch::Main),
            Some(v("1.0.0"))
        );
        assert_eq!(
            layout.parse_current_file_name("foo", "foo-1.0.0a2_dev.zip", Branch::Dev),
            Some(v("1.0.0a2"))
        );
        // Branch suffix must match.
        assert_eq!(layout.parse_current_file_name("foo", "foo-1.0.0_dev.zip", Branch::Main), None);
        assert_eq!(layout.parse_current_file_name("foo", "foo-1.0.0.zip", Branch::Dev), None);
        // Other components and other files are not artifacts.
        assert_eq!(layout.parse_current_file_name("foo", "foo-bar-1.0.0.zip", Branch::Main), None);
        assert_eq!(layout.parse_current_file_name("foo", "foo-1.0.0.tar.gz", Branch::Main), None);
        assert_eq!(layout.parse_current_file_name("foo", "foo-1.0.0.zip.tmp", Branch::Main), None);
        assert_eq!(layout.parse_current_file_name("foo", "README.md", Branch::Main), None);
    }

    #[test]
    fn test_scan_current() {
        let root = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(root.path(), ArchiveFormat::Zip);
        let kind = ComponentKind::Platform;

        assert!(layout.scan_current(kind, "desktop", Branch::Main).unwrap().is_empty());

        let dir = layout.component_dir(kind, "desktop");
        std::fs::create_dir_all(dir.join("versions")).unwrap();
        std::fs::write(dir.join("desktop-1.0.0.zip"), b"").unwrap();
        std::fs::write(dir.join("desktop-1.1.0b1_dev.zip"), b"").unwrap();
        std::fs::write(dir.join("versions/desktop-0.9.0.zip"), b"").unwrap();
        std::fs::write(dir.join("notes.txt"), b"").unwrap();

        let main = layout.scan_current(kind, "desktop", Branch::Main).unwrap();
        assert_eq!(
            main,
            vec![CurrentArtifact {
                path: dir.join("desktop-1.0.0.zip"),
                version: v("1.0.0"),
            }]
        );

        let dev = layout.scan_current(kind, "desktop", Branch::Dev).unwrap();
        assert_eq!(dev.len(), 1);
        assert_eq!(dev[0].version, v("1.1.0b1"));
    }

    #[test]
    fn test_relative() {
        let layout = ArtifactLayout::new("/idx", ArchiveFormat::Zip);
        assert_eq!(
            layout.relative(Path::new("/idx/platforms/desktop/desktop-1.0.0.zip")),
            "platforms/desktop/desktop-1.0.0.zip"
        );
    }
}
