//! Component artifact packing.

use crate::artifact::ArchiveFormat;
use crate::constants::INDEX_IGNORE_FILE;
use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;
use zip::DateTime as ZipDateTime;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Error types for pack operations.
#[derive(Debug, Error)]
pub enum PackError {
    /// Source folder does not exist.
    #[error("source folder not found: {0}")]
    SourceNotFound(PathBuf),

    /// IO error during packing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Walkdir error.
    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Path strip error.
    #[error("path error: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// Ignore pattern error.
    #[error("ignore pattern error: {0}")]
    Ignore(#[from] ignore::Error),
}

/// Facts about a built artifact, stored alongside its index record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    /// Number of files included.
    pub file_count: usize,

    /// Total uncompressed size in bytes.
    pub total_size: u64,

    /// Compressed size in bytes.
    pub compressed_size: u64,

    /// SHA-256 checksum of the artifact.
    pub checksum: String,

    /// When the artifact was built.
    pub built_at: DateTime<Utc>,
}

/// Builds an artifact from a component folder.
///
/// Implementations must write `dest` only; the caller decides where the
/// finished file ends up.
pub trait ArtifactBuilder {
    fn build(
        &self,
        source: &Path,
        dest: &Path,
        excludes: &[String],
    ) -> Result<ArtifactMetadata, PackError>;
}

/// The default builder: a zip or tar.gz of the component folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackBuilder {
    pub format: ArchiveFormat,
}

/// A file or folder collected for packing.
#[derive(Debug)]
struct PackEntry {
    path: PathBuf,
    /// Path inside the archive, always `/`-separated.
    archive_path: String,
    is_dir: bool,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Built-in ignore patterns (cannot be overridden).
const BUILTIN_IGNORES: &[&str] = &[".git", "__pycache__", "*.pyc", "*.tmp"];

/// Default ignore patterns (can be overridden with !pattern in .indexignore).
const DEFAULT_IGNORES: &[&str] = &[".DS_Store", "Thumbs.db", ".idea/", ".vscode/", ".indexignore"];

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ArtifactMetadata {
    /// Flatten into the string map stored in a branch record.
    pub fn to_record_metadata(&self, file: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("file".to_string(), file.to_string()),
            ("sha256".to_string(), self.checksum.clone()),
            ("files".to_string(), self.file_count.to_string()),
            ("size".to_string(), self.total_size.to_string()),
            ("compressed_size".to_string(), self.compressed_size.to_string()),
            ("built_at".to_string(), self.built_at.to_rfc3339()),
        ])
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl ArtifactBuilder for PackBuilder {
    fn build(
        &self,
        source: &Path,
        dest: &Path,
        excludes: &[String],
    ) -> Result<ArtifactMetadata, PackError> {
        pack_component(source, dest, excludes, self.format)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pack a component folder into `dest`.
///
/// Entries are stored under the component's folder name so the artifact
/// unpacks into a single directory. Entries are added in file name order.
pub fn pack_component(
    source: &Path,
    dest: &Path,
    excludes: &[String],
    format: ArchiveFormat,
) -> Result<ArtifactMetadata, PackError> {
    if !source.is_dir() {
        return Err(PackError::SourceNotFound(source.to_path_buf()));
    }

    let prefix = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let entries = collect_entries(source, &prefix, excludes)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let (file_count, total_size) = match format {
        ArchiveFormat::Zip => write_zip(&entries, dest)?,
        ArchiveFormat::TarGz => write_tar_gz(&entries, dest)?,
    };

    let bytes = std::fs::read(dest)?;
    tracing::debug!(
        "Packed {} files from {} into {}",
        file_count,
        source.display(),
        dest.display()
    );

    Ok(ArtifactMetadata {
        file_count,
        total_size,
        compressed_size: bytes.len() as u64,
        checksum: compute_sha256(&bytes),
        built_at: Utc::now(),
    })
}

/// Walk `source` and collect everything not ignored.
fn collect_entries(
    source: &Path,
    prefix: &str,
    excludes: &[String],
) -> Result<Vec<PackEntry>, PackError> {
    let matcher = build_ignore_matcher(source, excludes)?;
    let mut entries = Vec::new();

    for entry in WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_builtin_ignored(e.path(), source))
    {
        let entry = entry?;
        let path = entry.path();
        if path == source {
            continue;
        }

        let relative = path.strip_prefix(source)?;
        let is_dir = entry.file_type().is_dir();
        if matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
        {
            tracing::trace!("Ignoring {}", relative.display());
            continue;
        }

        let mut archive_path = prefix.to_string();
        for component in relative.components() {
            if !archive_path.is_empty() {
                archive_path.push('/');
            }
            archive_path.push_str(&component.as_os_str().to_string_lossy());
        }

        entries.push(PackEntry {
            path: path.to_path_buf(),
            archive_path,
            is_dir,
        });
    }

    Ok(entries)
}

fn write_zip(entries: &[PackEntry], dest: &Path) -> Result<(usize, u64), PackError> {
    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(file);

    let zip_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut file_count = 0;
    let mut total_size = 0u64;

    for entry in entries {
        let mut options = zip_options;
        if let Ok(metadata) = std::fs::metadata(&entry.path) {
            if let Ok(modified) = metadata.modified()
                && let Some(dt) = system_time_to_zip_datetime(modified)
            {
                options = options.last_modified_time(dt);
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                options = options.unix_permissions(metadata.permissions().mode());
            }
        }

        if entry.is_dir {
            let dir_path = format!("{}/", entry.archive_path);
            zip.add_directory(&dir_path, options)?;
        } else {
            let contents = read_file(&entry.path)?;
            total_size += contents.len() as u64;
            file_count += 1;

            zip.start_file(&entry.archive_path, options)?;
            zip.write_all(&contents)?;
        }
    }

    zip.finish()?;
    Ok((file_count, total_size))
}

fn write_tar_gz(entries: &[PackEntry], dest: &Path) -> Result<(usize, u64), PackError> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut file_count = 0;
    let mut total_size = 0u64;

    for entry in entries {
        let mtime = std::fs::metadata(&entry.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut header = tar::Header::new_gnu();
        header.set_mtime(mtime);

        if entry.is_dir {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(
                &mut header,
                format!("{}/", entry.archive_path),
                std::io::empty(),
            )?;
        } else {
            let contents = read_file(&entry.path)?;
            total_size += contents.len() as u64;
            file_count += 1;

            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, &entry.archive_path, contents.as_slice())?;
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?.sync_all()?;
    Ok((file_count, total_size))
}

fn read_file(path: &Path) -> Result<Vec<u8>, PackError> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Build gitignore-style matcher from default patterns, caller excludes and `.indexignore`.
fn build_ignore_matcher(dir: &Path, excludes: &[String]) -> Result<Gitignore, PackError> {
    let mut builder = GitignoreBuilder::new(dir);

    for pattern in DEFAULT_IGNORES {
        builder.add_line(None, pattern)?;
    }

    for pattern in excludes {
        builder.add_line(None, pattern)?;
    }

    let ignore_file = dir.join(INDEX_IGNORE_FILE);
    if ignore_file.exists()
        && let Some(err) = builder.add(&ignore_file)
    {
        return Err(err.into());
    }

    Ok(builder.build()?)
}

/// Check if a path matches builtin ignore patterns (cannot be overridden).
fn is_builtin_ignored(path: &Path, base: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(base) else {
        return false;
    };

    relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        BUILTIN_IGNORES.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => name.ends_with(suffix),
            None => name == *pattern,
        })
    })
}

/// Convert SystemTime to zip DateTime. Zip only represents 1980 through 2107.
fn system_time_to_zip_datetime(time: SystemTime) -> Option<ZipDateTime> {
    let dt: DateTime<Utc> = time.into();
    let year = u16::try_from(dt.year()).ok()?;

    ZipDateTime::from_date_and_time(
        year,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
    )
    .ok()
}

/// Compute SHA-256 checksum of data and return as hex string.
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn sample_component(root: &Path) -> PathBuf {
        let dir = root.join("homeassistant");
        std::fs::create_dir_all(dir.join("designer")).unwrap();
        std::fs::create_dir_all(dir.join("__pycache__")).unwrap();
        std::fs::create_dir_all(dir.join("entities")).unwrap();
        std::fs::write(dir.join("manifest.json"), r#"{ "version": "1.0.0" }"#).unwrap();
        std::fs::write(dir.join("__init__.py"), "# init").unwrap();
        std::fs::write(dir.join("entities/light.py"), "# light").unwrap();
        std::fs::write(dir.join("designer/panel.py"), "# dev only").unwrap();
        std::fs::write(dir.join("designer.py"), "# dev only").unwrap();
        std::fs::write(dir.join("emulator.json"), "{}").unwrap();
        std::fs::write(dir.join("__pycache__/x.cpython-311.pyc"), "bytecode").unwrap();
        dir
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let bytes = std::fs::read(path).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_is_builtin_ignored() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        assert!(is_builtin_ignored(&base.join(".git"), base));
        assert!(is_builtin_ignored(&base.join(".git/config"), base));
        assert!(is_builtin_ignored(&base.join("__pycache__/a.pyc"), base));
        assert!(is_builtin_ignored(&base.join("sub/module.pyc"), base));
        assert!(!is_builtin_ignored(&base.join("manifest.json"), base));
        assert!(!is_builtin_ignored(&base.join("entities/light.py"), base));
    }

    #[test]
    fn test_indexignore_patterns() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(INDEX_IGNORE_FILE),
            "# Comment\n*.log\n!important.log\nbuild/\n",
        )
        .unwrap();

        let matcher = build_ignore_matcher(dir.path(), &[]).unwrap();
        let ignored = |p: &str, is_dir: bool| {
            matcher
                .matched_path_or_any_parents(Path::new(p), is_dir)
                .is_ignore()
        };

        assert!(ignored("debug.log", false));
        assert!(!ignored("important.log", false));
        assert!(ignored("build", true));
        assert!(ignored(".DS_Store", false));
        assert!(!ignored("manifest.json", false));
    }

    #[test]
    fn test_pack_zip_with_excludes() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dir = sample_component(src.path());
        let dest = out.path().join("homeassistant-1.0.0.zip");

        let excludes = vec![
            "emulator.json".to_string(),
            "designer".to_string(),
            "designer.py".to_string(),
        ];
        let metadata = pack_component(&dir, &dest, &excludes, ArchiveFormat::Zip).unwrap();

        assert_eq!(metadata.file_count, 3);
        assert_eq!(metadata.checksum, compute_sha256(&std::fs::read(&dest).unwrap()));
        assert_eq!(
            zip_names(&dest),
            vec![
                "homeassistant/__init__.py",
                "homeassistant/entities/",
                "homeassistant/entities/light.py",
                "homeassistant/manifest.json",
            ]
        );
    }

    #[test]
    fn test_pack_tar_gz() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dir = sample_component(src.path());
        let dest = out.path().join("homeassistant-1.0.0.tar.gz");

        let metadata = pack_component(&dir, &dest, &[], ArchiveFormat::TarGz).unwrap();
        // designer/panel.py, designer.py and emulator.json are kept without excludes.
        assert_eq!(metadata.file_count, 6);

        let file = File::open(&dest).unwrap();
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"homeassistant/entities/light.py".to_string()));
        assert!(!names.iter().any(|n| n.contains("__pycache__")));
    }

    #[test]
    fn test_pack_is_deterministic_in_content() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dir = sample_component(src.path());

        let a = out.path().join("a.zip");
        let b = out.path().join("b.zip");
        let first = pack_component(&dir, &a, &[], ArchiveFormat::Zip).unwrap();
        let second = pack_component(&dir, &b, &[], ArchiveFormat::Zip).unwrap();
        assert_eq!(first.checksum, second.checksum);
    }

    #[test]
    fn test_pack_missing_source() {
        let out = TempDir::new().unwrap();
        let result = pack_component(
            &out.path().join("missing"),
            &out.path().join("x.zip"),
            &[],
            ArchiveFormat::Zip,
        );
        assert!(matches!(result, Err(PackError::SourceNotFound(_))));
    }

    #[test]
    fn test_record_metadata_keys() {
        let metadata = ArtifactMetadata {
            file_count: 2,
            total_size: 10,
            compressed_size: 8,
            checksum: "ab".to_string(),
            built_at: Utc::now(),
        };
        let map = metadata.to_record_metadata("integrations/foo/foo-1.0.0.zip");
        assert_eq!(map["file"], "integrations/foo/foo-1.0.0.zip");
        assert_eq!(map["files"], "2");
        assert_eq!(map["sha256"], "ab");
        assert!(map.contains_key("built_at"));
    }
}
