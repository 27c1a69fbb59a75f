//! Repository handle over the system git binary.
//!
//! Source control is an external collaborator: all operations shell out to
//! the installed `git` command via [`crate::process`], the same way the
//! build and upload tools are invoked. This keeps authentication with the
//! user's existing git configuration (SSH agents, credential helpers).

use crate::error::{CommandFailure, GitError};
use crate::process;
use std::path::{Path, PathBuf};

/// Result type for repository operations
pub type GitResult<T> = std::result::Result<T, GitError>;

/// A remote source repository pinned to a local working tree.
#[derive(Debug, Clone)]
pub struct Repository {
    url: String,
    path: PathBuf,
    default_branch: String,
}

impl Repository {
    /// Create a handle for `url` with its working tree at `path`
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            default_branch: "master".to_string(),
        }
    }

    /// Override the branch targeted by [`Repository::pull`]
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Remote URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local working tree path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, operation: &str, source: CommandFailure) -> GitError {
        GitError::Command {
            operation: operation.to_string(),
            url: self.url.clone(),
            source,
        }
    }

    async fn git(&self, operation: &str, args: &[&str]) -> GitResult<()> {
        process::run("git", args, Some(&self.path))
            .await
            .map_err(|e| self.err(operation, e))
    }

    async fn git_output(&self, operation: &str, args: &[&str]) -> GitResult<String> {
        process::output("git", args, Some(&self.path))
            .await
            .map_err(|e| self.err(operation, e))
    }

    /// Whether the working tree is a usable clone of the expected remote.
    ///
    /// False when the path is missing, is not inside a git work tree, or
    /// tracks a different remote URL. Callers remove and re-clone in the
    /// false case, which makes `pull` idempotent regardless of prior local
    /// corruption.
    pub async fn is_valid(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        let inside = process::output(
            "git",
            &["rev-parse", "--is-inside-work-tree"],
            Some(&self.path),
        )
        .await;
        match inside {
            Ok(out) if out.trim() == "true" => {}
            _ => return false,
        }
        match process::output("git", &["ls-remote", "--get-url"], Some(&self.path)).await {
            Ok(out) => out.trim() == self.url,
            Err(_) => false,
        }
    }

    /// Remove the local working tree entirely
    pub fn remove(&self) -> GitResult<()> {
        if self.path.exists() {
            log::info!("removing working tree {}", self.path.display());
            std::fs::remove_dir_all(&self.path).map_err(|source| GitError::RemoveFailed {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Clone the remote into the working tree path
    pub async fn clone(&self) -> GitResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GitError::RemoveFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let path = self.path.display().to_string();
        process::run("git", &["clone", &self.url, &path], None)
            .await
            .map_err(|e| self.err("clone", e))
    }

    /// Discard local modifications to tracked files
    pub async fn reset(&self) -> GitResult<()> {
        self.git("reset", &["checkout", "."]).await
    }

    /// Fetch the remote, including all tags
    pub async fn fetch(&self) -> GitResult<()> {
        self.git("fetch", &["fetch", "origin"]).await?;
        self.git("fetch --tags", &["fetch", "origin", "--tags"]).await
    }

    /// Fast-forward the default branch from origin
    pub async fn pull(&self) -> GitResult<()> {
        self.checkout_branch(&self.default_branch).await?;
        self.git("pull", &["pull", "origin", &self.default_branch])
            .await
    }

    /// Checkout a branch
    pub async fn checkout_branch(&self, branch: &str) -> GitResult<()> {
        self.git("checkout", &["checkout", branch]).await
    }

    /// Checkout a tag (detached)
    pub async fn checkout_tag(&self, tag: &str) -> GitResult<()> {
        self.git("checkout", &["checkout", tag]).await
    }

    /// List all local tags
    pub async fn list_tags(&self) -> GitResult<Vec<String>> {
        let out = self.git_output("tag", &["tag"]).await?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// The lexicographically greatest tag name.
    ///
    /// This matches the historical tooling: plain string ordering, not
    /// semantic version ordering, so `0.9.0` sorts above `0.10.0`. Callers
    /// needing a specific version pass an explicit pin instead.
    pub async fn latest_tag(&self) -> GitResult<String> {
        let tags = self.list_tags().await?;
        tags.into_iter().max().ok_or_else(|| GitError::NoTags {
            url: self.url.clone(),
        })
    }

    /// Archive the checked-out tree as `<name>-<tag>.tar` under `dest_dir`.
    ///
    /// The archive carries a `<name>-<tag>/` prefix so the build step can
    /// unpack it into a predictable scratch directory. Decoupling build
    /// from the live working tree keeps later pulls from mutating a build
    /// in progress.
    pub async fn archive(&self, name: &str, tag: &str, dest_dir: &Path) -> GitResult<PathBuf> {
        std::fs::create_dir_all(dest_dir).map_err(|source| GitError::RemoveFailed {
            path: dest_dir.to_path_buf(),
            source,
        })?;
        let stamped = format!("{name}-{tag}");
        let tarball = dest_dir.join(format!("{stamped}.tar"));
        let prefix = format!("--prefix={stamped}/");
        let out = format!("-o{}", tarball.display());
        self.git("archive", &["archive", &prefix, &out, tag]).await?;
        Ok(tarball)
    }
}
