//! The persisted package index.
//!
//! The index file is the only durable state the indexer keeps. It is loaded
//! once per run, mutated in memory by the index sessions, and written back
//! with an atomic write (temp file + rename) so a crash mid-write leaves the
//! previous index intact.

use crate::component::{Branch, ComponentKind};
use crate::constants::{TMP_EXT, TOOL_NAME, TOOL_VERSION};
use crate::error::{IndexError, IndexResult};
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What the index remembers about one branch of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    /// Currently published version.
    pub version: Version,

    /// Builder-supplied metadata (artifact file, checksum, sizes).
    #[serde(flatten)]
    pub metadata: BTreeMap<String, String>,
}

/// Per-branch records of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIndexEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<BranchRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<BranchRecord>,
}

/// The whole package index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStore {
    /// Last successful run per branch.
    #[serde(default)]
    pub timestamps: BTreeMap<Branch, DateTime<Utc>>,

    /// Tool versions the artifacts of each branch were built against.
    #[serde(default)]
    pub tool_versions: BTreeMap<Branch, BTreeMap<String, String>>,

    #[serde(default)]
    pub integrations: BTreeMap<String, ComponentIndexEntry>,

    #[serde(default)]
    pub platforms: BTreeMap<String, ComponentIndexEntry>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BranchRecord {
    /// Create a record with no metadata.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            metadata: BTreeMap::new(),
        }
    }
}

impl ComponentIndexEntry {
    /// Record for `branch`, if any.
    pub fn get(&self, branch: Branch) -> Option<&BranchRecord> {
        match branch {
            Branch::Main => self.main.as_ref(),
            Branch::Dev => self.dev.as_ref(),
        }
    }

    fn slot(&mut self, branch: Branch) -> &mut Option<BranchRecord> {
        match branch {
            Branch::Main => &mut self.main,
            Branch::Dev => &mut self.dev,
        }
    }

    /// Whether neither branch has a record.
    pub fn is_empty(&self) -> bool {
        self.main.is_none() && self.dev.is_none()
    }
}

impl IndexStore {
    /// Load the index from `path`.
    ///
    /// A missing or empty file yields an empty index so the first run can
    /// bootstrap it.
    pub fn load(path: &Path) -> IndexResult<Self> {
        if !path.exists() {
            tracing::info!("No index at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content).map_err(|source| IndexError::InvalidIndex {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save the index to `path` with an atomic write.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension(format!("json.{}", TMP_EXT));
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }

        // Never replace a good index with something we cannot read back.
        let verify_content = fs::read_to_string(&temp_path)?;
        if let Err(source) = serde_json::from_str::<IndexStore>(&verify_content) {
            let _ = fs::remove_file(&temp_path);
            return Err(IndexError::InvalidIndex {
                path: temp_path,
                source,
            });
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            IndexError::Io(e)
        })?;

        tracing::debug!("Saved index to {}", path.display());
        Ok(())
    }

    /// All entries of one kind.
    pub fn entries(&self, kind: ComponentKind) -> &BTreeMap<String, ComponentIndexEntry> {
        match kind {
            ComponentKind::Integration => &self.integrations,
            ComponentKind::Platform => &self.platforms,
        }
    }

    fn entries_mut(&mut self, kind: ComponentKind) -> &mut BTreeMap<String, ComponentIndexEntry> {
        match kind {
            ComponentKind::Integration => &mut self.integrations,
            ComponentKind::Platform => &mut self.platforms,
        }
    }

    /// Record for one component branch, if any.
    pub fn get(&self, kind: ComponentKind, name: &str, branch: Branch) -> Option<&BranchRecord> {
        self.entries(kind).get(name).and_then(|e| e.get(branch))
    }

    /// Replace the record for one component branch.
    pub fn set(&mut self, kind: ComponentKind, name: &str, branch: Branch, record: BranchRecord) {
        *self
            .entries_mut(kind)
            .entry(name.to_string())
            .or_default()
            .slot(branch) = Some(record);
    }

    /// Remove the record for one component branch, returning it.
    ///
    /// The component entry is dropped once neither branch has a record.
    pub fn remove(
        &mut self,
        kind: ComponentKind,
        name: &str,
        branch: Branch,
    ) -> Option<BranchRecord> {
        let entries = self.entries_mut(kind);
        let entry = entries.get_mut(name)?;
        let removed = entry.slot(branch).take();
        if entry.is_empty() {
            entries.remove(name);
        }
        removed
    }

    /// Stamp the time of a run and the tool versions its artifacts were built with.
    ///
    /// The indexer's own version is always included.
    pub fn stamp(
        &mut self,
        branch: Branch,
        now: DateTime<Utc>,
        tool_versions: &BTreeMap<String, String>,
    ) {
        self.timestamps.insert(branch, now);
        let mut versions = tool_versions.clone();
        versions.insert(TOOL_NAME.to_string(), TOOL_VERSION.to_string());
        self.tool_versions.insert(branch, versions);
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(version: &str) -> BranchRecord {
        BranchRecord::new(Version::parse(version).unwrap())
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::load(&dir.path().join("index.json")).unwrap();
        assert_eq!(store, IndexStore::default());
    }

    #[test]
    fn test_load_invalid_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ \"integrations\": 3 }").unwrap();
        assert!(matches!(
            IndexStore::load(&path),
            Err(IndexError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_get_set_remove() {
        let mut store = IndexStore::default();
        let kind = ComponentKind::Integration;
        assert!(store.get(kind, "foo", Branch::Main).is_none());

        store.set(kind, "foo", Branch::Main, record("1.0.0"));
        store.set(kind, "foo", Branch::Dev, record("1.1.0a1"));
        assert_eq!(store.get(kind, "foo", Branch::Main), Some(&record("1.0.0")));
        assert!(store.get(ComponentKind::Platform, "foo", Branch::Main).is_none());

        assert_eq!(store.remove(kind, "foo", Branch::Main), Some(record("1.0.0")));
        assert!(store.integrations.contains_key("foo"));
        assert_eq!(store.remove(kind, "foo", Branch::Dev), Some(record("1.1.0a1")));
        assert!(!store.integrations.contains_key("foo"));
        assert_eq!(store.remove(kind, "foo", Branch::Dev), None);
    }

    #[test]
    fn test_save_load_is_lossless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/index.json");

        let mut store = IndexStore::default();
        let mut rec = record("2.0.0b1");
        rec.metadata.insert("file".into(), "integrations/bar/bar-2.0.0b1_dev.zip".into());
        rec.metadata.insert("sha256".into(), "abc123".into());
        store.set(ComponentKind::Integration, "bar", Branch::Dev, rec);
        store.set(ComponentKind::Platform, "desktop", Branch::Main, record("0.4.0"));
        let tools = BTreeMap::from([("inkBoard".to_string(), "0.3.0".to_string())]);
        store.stamp(Branch::Dev, Utc::now(), &tools);

        store.save(&path).unwrap();
        let loaded = IndexStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert!(!path.with_extension("json.tmp").exists());

        // An unchanged store serializes byte-for-byte identically.
        let first = std::fs::read(&path).unwrap();
        loaded.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_file_layout() {
        let mut store = IndexStore::default();
        let mut rec = record("1.0.0");
        rec.metadata.insert("sha256".into(), "ff".into());
        store.set(ComponentKind::Integration, "foo", Branch::Main, rec);

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(
            json["integrations"]["foo"],
            serde_json::json!({ "main": { "version": "1.0.0", "sha256": "ff" } })
        );
        assert!(json["platforms"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_stamp_includes_own_version() {
        let mut store = IndexStore::default();
        store.stamp(Branch::Main, Utc::now(), &BTreeMap::new());
        assert_eq!(
            store.tool_versions[&Branch::Main].get(TOOL_NAME).map(String::as_str),
            Some(TOOL_VERSION)
        );
        assert!(store.timestamps.contains_key(&Branch::Main));
        assert!(!store.timestamps.contains_key(&Branch::Dev));
    }
}
