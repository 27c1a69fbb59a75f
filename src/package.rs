//! Package descriptor: pull, build, and upload state logic.
//!
//! A package is one named unit with a source repository, its dependency
//! names, and a cache location. The pipeline driver walks packages in
//! dependency order and calls the three operations below; all side effects
//! stay inside the run's cache directories.

use crate::cli::OutputManager;
use crate::conda::{Anaconda, CondaBuild, UploadOutcome, PLATFORMS};
use crate::error::{BuildError, Result, UploadError};
use crate::git::Repository;
use crate::pipeline::TagSet;
use crate::registry::CacheLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One artifact produced by the build step and staged for upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltArtifact {
    /// Package name
    pub package: String,
    /// Resolved version tag it was built at
    pub tag: String,
    /// Python runtime version
    pub python: String,
    /// Target platform
    pub platform: String,
    /// Staged artifact location in the upload cache
    pub path: PathBuf,
}

/// Result of attempting to publish one staged artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactUpload {
    /// Package name
    pub package: String,
    /// Target platform
    pub platform: String,
    /// Artifact file name
    pub file: String,
    /// What happened
    pub outcome: UploadOutcome,
}

/// A named package with its repository, dependencies, and cache location.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    repo: Repository,
    dependencies: Vec<String>,
    cache: CacheLayout,
}

impl Package {
    /// Create a descriptor
    pub fn new(
        name: impl Into<String>,
        repo: Repository,
        dependencies: Vec<String>,
        cache: CacheLayout,
    ) -> Self {
        Self {
            name: name.into(),
            repo,
            dependencies,
            cache,
        }
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source repository handle
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Names of the packages this one depends on
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Where the archived snapshot for `tag` lives
    pub fn snapshot_tarball(&self, tag: &str) -> PathBuf {
        self.cache
            .build_dir(&self.name)
            .join(format!("{}-{tag}.tar", self.name))
    }

    fn snapshot_dir(&self, tag: &str) -> PathBuf {
        self.cache
            .build_dir(&self.name)
            .join(format!("{}-{tag}", self.name))
    }

    /// Synchronize the working tree to the resolved tag and archive it.
    ///
    /// A valid existing clone is reset and pulled; anything else (missing,
    /// corrupted, or pointing at the wrong remote) is removed and cloned
    /// fresh, which makes re-runs idempotent. Returns the resolved tag:
    /// the explicit pin when given, otherwise the repository's latest tag.
    pub async fn pull(&self, pin: Option<&str>, out: &OutputManager) -> Result<String> {
        if self.repo.is_valid().await {
            out.step(&self.name, "resetting");
            self.repo.reset().await?;
            out.step(&self.name, "pulling");
            self.repo.pull().await?;
        } else {
            out.step(&self.name, "removing");
            self.repo.remove()?;
            out.step(&self.name, "cloning");
            self.repo.clone().await?;
        }

        out.step(&self.name, "fetching");
        self.repo.fetch().await?;

        let tag = match pin {
            Some(tag) => tag.to_string(),
            None => self.repo.latest_tag().await?,
        };

        out.step(&self.name, &format!("checking out '{tag}'"));
        self.repo.checkout_tag(&tag).await?;

        out.step(&self.name, "archiving");
        self.repo
            .archive(&self.name, &tag, &self.cache.build_dir(&self.name))
            .await?;

        Ok(tag)
    }

    /// Build artifacts for every requested python version and platform.
    ///
    /// Works against the frozen snapshot, not the live working tree: the
    /// tarball is unpacked into build scratch, the recipe's version and
    /// dependency constraints are rewritten from the run's resolved tags,
    /// then the external tool builds one native artifact per python
    /// version and converts it for every other platform. All resulting
    /// artifacts are staged under the upload cache.
    pub async fn build(
        &self,
        tag: &str,
        tags: &TagSet,
        conda: &CondaBuild,
        python_versions: &[String],
        out: &OutputManager,
    ) -> Result<Vec<BuiltArtifact>> {
        // Stale artifacts from a previous run must not be re-uploaded
        for platform in PLATFORMS {
            let dir = self.cache.platform_dir(&self.name, platform);
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
        }

        let tarball = self.snapshot_tarball(tag);
        let scratch = self.snapshot_dir(tag);
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch)?;
        }
        let file = std::fs::File::open(&tarball).map_err(|e| BuildError::BadSnapshot {
            package: self.name.clone(),
            path: tarball.clone(),
            reason: e.to_string(),
        })?;
        tar::Archive::new(file)
            .unpack(self.cache.build_dir(&self.name))
            .map_err(|e| BuildError::BadSnapshot {
                package: self.name.clone(),
                path: tarball.clone(),
                reason: e.to_string(),
            })?;

        let recipe = crate::recipe::Recipe::locate(&scratch)?;
        recipe.set_version(tag)?;
        for dep in &self.dependencies {
            match tags.get(dep) {
                Some(dep_tag) => recipe.pin_dependency(dep, dep_tag)?,
                // Only-last runs assume dependencies are already published;
                // their recipe constraints are left as committed.
                None => log::warn!(
                    "[{}] no resolved tag for dependency '{dep}'; keeping its committed constraint",
                    self.name
                ),
            }
        }

        let mut artifacts = Vec::new();
        for python in python_versions {
            out.step(&self.name, &format!("building {python}"));
            conda
                .build(recipe.dir(), python, &scratch)
                .await
                .map_err(|source| BuildError::Command {
                    operation: "build".to_string(),
                    package: self.name.clone(),
                    source,
                })?;

            let native = conda
                .output_path(recipe.dir(), python, &scratch)
                .await
                .map_err(|source| BuildError::Command {
                    operation: "output".to_string(),
                    package: self.name.clone(),
                    source,
                })?;
            if !native.exists() {
                return Err(BuildError::MissingArtifact { path: native }.into());
            }

            // The native platform is the artifact's parent directory name
            // (e.g. .../conda-bld/linux-64/pkg.tar.bz2), and converted
            // artifacts land in sibling per-platform directories.
            let native_dir = native.parent().ok_or_else(|| BuildError::MissingArtifact {
                path: native.clone(),
            })?;
            let native_platform = native_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let convert_root = native_dir.parent().ok_or_else(|| {
                BuildError::MissingArtifact {
                    path: native.clone(),
                }
            })?;

            for platform in PLATFORMS {
                if *platform == native_platform {
                    continue;
                }
                out.step(&self.name, &format!("converting to {platform}"));
                conda
                    .convert(&native, platform, convert_root)
                    .await
                    .map_err(|source| BuildError::Command {
                        operation: "convert".to_string(),
                        package: self.name.clone(),
                        source,
                    })?;
            }

            out.step(&self.name, "caching packages");
            for platform in PLATFORMS {
                let dest_dir = self.cache.platform_dir(&self.name, platform);
                std::fs::create_dir_all(&dest_dir)?;

                if *platform == native_platform {
                    let dest = dest_dir.join(native.file_name().unwrap_or_default());
                    std::fs::copy(&native, &dest)?;
                    artifacts.push(BuiltArtifact {
                        package: self.name.clone(),
                        tag: tag.to_string(),
                        python: python.clone(),
                        platform: (*platform).to_string(),
                        path: dest,
                    });
                    continue;
                }

                let pattern = convert_root.join(platform).join("*.tar.bz2");
                for converted in
                    glob::glob(&pattern.to_string_lossy()).into_iter().flatten().flatten()
                {
                    let dest = dest_dir.join(converted.file_name().unwrap_or_default());
                    std::fs::copy(&converted, &dest)?;
                    artifacts.push(BuiltArtifact {
                        package: self.name.clone(),
                        tag: tag.to_string(),
                        python: python.clone(),
                        platform: (*platform).to_string(),
                        path: dest,
                    });
                }
            }
        }

        Ok(artifacts)
    }

    /// Publish every staged artifact for this package, one typed outcome
    /// per artifact. Conflicts ("already exists") are tolerated; other
    /// failures are recorded without stopping sibling uploads.
    pub async fn upload(
        &self,
        anaconda: &Anaconda,
        out: &OutputManager,
    ) -> Result<Vec<ArtifactUpload>> {
        let staged = self.cache.upload_dir(&self.name);
        let mut results = Vec::new();

        for entry in walkdir::WalkDir::new(&staged)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let platform = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file = entry.file_name().to_string_lossy().into_owned();

            out.step(&self.name, &format!("uploading {platform}/{file}"));
            let outcome = anaconda.upload(entry.path()).await;
            match &outcome {
                UploadOutcome::Uploaded => log::info!("uploaded {}", entry.path().display()),
                UploadOutcome::AlreadyExists => out.warn(&format!(
                    "[{}] {platform}/{file} already exists at the destination - skipping",
                    self.name
                )),
                UploadOutcome::Failed { reason } => out.error(&format!(
                    "[{}] upload of {platform}/{file} failed: {reason}",
                    self.name
                )),
            }
            results.push(ArtifactUpload {
                package: self.name.clone(),
                platform,
                file,
                outcome,
            });
        }

        if results.is_empty() {
            return Err(UploadError::EmptyCache {
                package: self.name.clone(),
            }
            .into());
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn snapshot_paths_are_tag_stamped() {
        let cache = CacheLayout::new(Path::new("/work"));
        let package = Package::new(
            "taxcalc",
            Repository::new("https://example.com/taxcalc", cache.pull_dir("taxcalc")),
            vec![],
            cache,
        );
        assert_eq!(
            package.snapshot_tarball("0.24.0"),
            Path::new("/work/pkg/build/taxcalc/taxcalc-0.24.0.tar")
        );
    }
}
