//! Boundary to the external conda build/convert and anaconda upload tools.
//!
//! The pipeline never inspects package contents itself; producing,
//! converting, and publishing artifacts is delegated to these commands,
//! and only their exit status and reported paths flow back in.

use crate::error::CommandFailure;
use crate::process;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Target platforms an artifact is produced for. The build tool emits one
/// native artifact; the rest come from `conda convert`.
pub const PLATFORMS: &[&str] = &["osx-64", "linux-32", "linux-64", "win-32", "win-64"];

/// Environment variable the upload tool reads its API token from. Tokens
/// are passed through the environment so they never show up in logged
/// command lines.
const TOKEN_ENV: &str = "ANACONDA_API_TOKEN";

/// Wrapper for `conda build` / `conda convert` invocations
#[derive(Debug, Clone)]
pub struct CondaBuild {
    channel: String,
}

impl CondaBuild {
    /// Create a builder drawing dependencies from `channel`
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    /// Build the recipe for one python version, producing a native artifact
    pub async fn build(
        &self,
        recipe_dir: &Path,
        python: &str,
        cwd: &Path,
    ) -> std::result::Result<(), CommandFailure> {
        let recipe = recipe_dir.display().to_string();
        process::run(
            "conda",
            &[
                "build",
                "-c",
                &self.channel,
                "--no-anaconda-upload",
                "--python",
                python,
                &recipe,
            ],
            Some(cwd),
        )
        .await
    }

    /// Ask the build tool where the artifact for this recipe/python pair
    /// lands, without building
    pub async fn output_path(
        &self,
        recipe_dir: &Path,
        python: &str,
        cwd: &Path,
    ) -> std::result::Result<PathBuf, CommandFailure> {
        let recipe = recipe_dir.display().to_string();
        let out = process::output(
            "conda",
            &["build", "--python", python, &recipe, "--output"],
            Some(cwd),
        )
        .await?;
        Ok(PathBuf::from(out.trim()))
    }

    /// Convert a native artifact for another platform, writing the result
    /// under `<out_dir>/<platform>/`
    pub async fn convert(
        &self,
        artifact: &Path,
        platform: &str,
        out_dir: &Path,
    ) -> std::result::Result<(), CommandFailure> {
        let artifact = artifact.display().to_string();
        let out = out_dir.display().to_string();
        process::run(
            "conda",
            &["convert", "--platform", platform, &artifact, "-o", &out],
            None,
        )
        .await
    }
}

/// Outcome of publishing one artifact.
///
/// The distinction between "skip, already exists" and "real failure" is
/// explicit so re-runs of a partially completed release stay green while
/// genuine failures are surfaced in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadOutcome {
    /// Artifact published successfully
    Uploaded,
    /// Destination already has this artifact; safe to skip
    AlreadyExists,
    /// Upload failed for any other reason
    Failed {
        /// Tool diagnostics
        reason: String,
    },
}

impl UploadOutcome {
    /// Whether this outcome counts against the run's success
    pub fn is_failure(&self) -> bool {
        matches!(self, UploadOutcome::Failed { .. })
    }
}

/// Wrapper for the anaconda upload tool
#[derive(Debug, Clone)]
pub struct Anaconda {
    token: Option<String>,
    label: String,
    user: Option<String>,
    force: bool,
}

impl Anaconda {
    /// Create an uploader publishing under `label`
    pub fn new(
        token: Option<String>,
        label: impl Into<String>,
        user: Option<String>,
        force: bool,
    ) -> Self {
        Self {
            token,
            label: label.into(),
            user,
            force,
        }
    }

    /// Whether an explicit token was supplied
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn envs(&self) -> Vec<(&str, &str)> {
        match &self.token {
            Some(token) => vec![(TOKEN_ENV, token.as_str())],
            None => vec![],
        }
    }

    /// Whether the current session can upload.
    ///
    /// A session reporting itself as anonymous cannot publish; the driver
    /// checks this before the upload phase unless a token is present.
    pub async fn is_authenticated(&self) -> std::result::Result<bool, CommandFailure> {
        let out = process::output_env("anaconda", &["whoami"], None, &self.envs()).await?;
        Ok(!out.to_lowercase().contains("anonymous"))
    }

    /// Publish one artifact, classifying the result.
    ///
    /// "Already exists" responses from the tool are a distinct outcome, not
    /// an error; any other non-zero exit is reported with the tool's
    /// diagnostics.
    pub async fn upload(&self, artifact: &Path) -> UploadOutcome {
        log::info!(
            "upload config: token={}, label={}, user={}, force={}",
            if self.token.is_some() { "provided" } else { "absent" },
            self.label,
            self.user.as_deref().unwrap_or("default"),
            self.force,
        );

        let path = artifact.display().to_string();
        let mut args = vec!["upload", "--no-progress", "--label", self.label.as_str()];
        if self.force {
            args.push("--force");
        }
        if let Some(user) = &self.user {
            args.push("--user");
            args.push(user);
        }
        args.push(&path);

        match process::output_env("anaconda", &args, None, &self.envs()).await {
            Ok(_) => UploadOutcome::Uploaded,
            Err(failure) if failure.reason.to_lowercase().contains("already exists") => {
                UploadOutcome::AlreadyExists
            }
            Err(failure) => UploadOutcome::Failed {
                reason: failure.reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platforms_cover_the_published_matrix() {
        assert_eq!(PLATFORMS.len(), 5);
        assert!(PLATFORMS.contains(&"linux-64"));
        assert!(PLATFORMS.contains(&"osx-64"));
    }

    #[test]
    fn failed_outcome_counts_as_failure() {
        assert!(!UploadOutcome::Uploaded.is_failure());
        assert!(!UploadOutcome::AlreadyExists.is_failure());
        assert!(
            UploadOutcome::Failed {
                reason: "network".to_string()
            }
            .is_failure()
        );
    }
}
