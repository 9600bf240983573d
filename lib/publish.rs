//! Committing index changes to git.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Error types for publish operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and failed.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Result of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// A commit was created (and pushed, if configured).
    Committed { pushed: bool },

    /// Nothing was staged.
    NothingToCommit,
}

/// Records changed paths somewhere durable.
pub trait Publisher {
    fn publish(&self, paths: &[PathBuf], message: &str) -> Result<PublishStatus, PublishError>;
}

/// Commits with the `git` binary found on `PATH`.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    /// Working tree the commands run in.
    pub repo: PathBuf,

    /// Push after committing.
    pub push: bool,

    /// Remote to push to. Uses the upstream of the current branch when unset.
    pub remote: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GitPublisher {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            push: false,
            remote: None,
        }
    }

    fn git(&self, args: &[&str]) -> Result<Output, PublishError> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!("Running {} in {}", command, self.repo.display());

        Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .map_err(|source| PublishError::Spawn { command, source })
    }

    fn git_checked(&self, args: &[&str]) -> Result<Output, PublishError> {
        let output = self.git(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(PublishError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Whether the index has staged changes.
    fn has_staged_changes(&self) -> Result<bool, PublishError> {
        // `--quiet` exits 1 when there are differences.
        let output = self.git(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(PublishError::CommandFailed {
                command: "git diff --cached --quiet".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Publisher for GitPublisher {
    fn publish(&self, paths: &[PathBuf], message: &str) -> Result<PublishStatus, PublishError> {
        let relative: Vec<String> = paths
            .iter()
            .map(|p| relative_to(&self.repo, p))
            .collect();

        let mut add = vec!["add", "-A", "--"];
        add.extend(relative.iter().map(String::as_str));
        self.git_checked(&add)?;

        if !self.has_staged_changes()? {
            tracing::info!("Nothing to commit");
            return Ok(PublishStatus::NothingToCommit);
        }

        self.git_checked(&["commit", "-m", message])?;
        tracing::info!("Committed: {}", message);

        if self.push {
            match &self.remote {
                Some(remote) => self.git_checked(&["push", remote.as_str()])?,
                None => self.git_checked(&["push"])?,
            };
            tracing::info!("Pushed");
        }

        Ok(PublishStatus::Committed { pushed: self.push })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn relative_to(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn init_repo(dir: &Path) {
        let publisher = GitPublisher::new(dir);
        publisher.git_checked(&["init", "-q"]).unwrap();
        publisher
            .git_checked(&["config", "user.email", "ci@example.com"])
            .unwrap();
        publisher.git_checked(&["config", "user.name", "CI"]).unwrap();
        publisher
            .git_checked(&["config", "commit.gpgsign", "false"])
            .unwrap();
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/repo"), Path::new("/repo/index/index.json")),
            "index/index.json"
        );
        assert_eq!(relative_to(Path::new("/repo"), Path::new("elsewhere")), "elsewhere");
    }

    #[test]
    fn test_commit_then_nothing_to_commit() {
        if !git_available() {
            return;
        }

        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let index = dir.path().join("index.json");
        std::fs::write(&index, "{}").unwrap();

        let publisher = GitPublisher::new(dir.path());
        let status = publisher
            .publish(&[index.clone()], "Update main package index")
            .unwrap();
        assert_eq!(status, PublishStatus::Committed { pushed: false });

        let status = publisher.publish(&[index], "Update again").unwrap();
        assert_eq!(status, PublishStatus::NothingToCommit);
    }

    #[test]
    fn test_failed_command_reports_stderr() {
        if !git_available() {
            return;
        }

        let dir = TempDir::new().unwrap();
        // Not a repository.
        let publisher = GitPublisher::new(dir.path());
        let err = publisher
            .publish(&[dir.path().join("index.json")], "msg")
            .unwrap_err();
        assert!(matches!(err, PublishError::CommandFailed { .. }));
    }
}
