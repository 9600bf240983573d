//! Filesystem side effects of a publish plan.
//!
//! The old artifact is always disposed of before the new one is built. A crash
//! between the two steps leaves the branch without a current artifact, which
//! the next pass rebuilds, rather than with two of them.

use crate::constants::TMP_EXT;
use crate::error::ComponentError;
use crate::pack::{ArtifactBuilder, ArtifactMetadata};
use crate::reconcile::{Disposal, PublishPlan};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Executes publish plans with a given artifact builder.
pub struct ArchiveManager<'a, B: ArtifactBuilder> {
    builder: &'a B,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a, B: ArtifactBuilder> ArchiveManager<'a, B> {
    pub fn new(builder: &'a B) -> Self {
        Self { builder }
    }

    /// Run a publish plan: dispose of the old artifact, then build the new one.
    pub fn execute(
        &self,
        source: &Path,
        plan: &PublishPlan,
        excludes: &[String],
    ) -> Result<ArtifactMetadata, ComponentError> {
        match &plan.disposal {
            Some(Disposal::Archive { from, to }) => self.archive(from, to)?,
            Some(Disposal::Delete { path }) => self.delete(path)?,
            None => {}
        }

        self.build(source, &plan.target, excludes)
    }

    /// Move `from` into the archive at `to`. Never overwrites an archived file.
    pub fn archive(&self, from: &Path, to: &Path) -> Result<(), ComponentError> {
        if to.exists() {
            return Err(ComponentError::ArchiveCollision {
                path: to.to_path_buf(),
            });
        }

        let archiving = |source: std::io::Error| ComponentError::Archiving {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(archiving)?;
        }

        move_file(from, to).map_err(archiving)?;
        tracing::info!("Archived {} to {}", from.display(), to.display());
        Ok(())
    }

    /// Remove a superseded artifact. Already gone is fine.
    pub fn delete(&self, path: &Path) -> Result<(), ComponentError> {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::info!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Build the artifact for `source` at `target`.
    ///
    /// The builder writes a temp file next to the target which is renamed into
    /// place only once the build has succeeded.
    pub fn build(
        &self,
        source: &Path,
        target: &Path,
        excludes: &[String],
    ) -> Result<ArtifactMetadata, ComponentError> {
        let temp_path = temp_path_for(target);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let metadata = match self.builder.build(source, &temp_path, excludes) {
            Ok(metadata) => metadata,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e.into());
            }
        };

        fs::rename(&temp_path, target).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ComponentError::Io(e)
        })?;

        tracing::info!("Built {}", target.display());
        Ok(metadata)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(TMP_EXT);
    target.with_file_name(name)
}

/// Rename, falling back to copy and remove when the rename crosses devices.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
