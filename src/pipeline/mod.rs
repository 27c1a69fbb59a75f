//! Pipeline driver: walks the resolved build order through its phases.
//!
//! The driver is deliberately sequential. Packages later in the order may
//! need the resolved tags of earlier ones to rewrite their recipes, so the
//! build phase is a single pass; uploads are best-effort per artifact.

pub mod summary;

use crate::cli::OutputManager;
use crate::conda::{Anaconda, CondaBuild};
use crate::error::{AuthError, Result};
use crate::registry::PackageSet;
use crate::resolver::BuildOrder;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use summary::{PackageFailure, RunSummary, SkippedPackage};

/// Resolved tags for the current run, written once per package by the
/// build phase and read by dependents when pinning their recipes.
#[derive(Debug, Default)]
pub struct TagSet {
    tags: HashMap<String, String>,
}

impl TagSet {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved tag for a package, if its pull has completed
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Record the resolved tag for a package
    pub fn record(&mut self, name: impl Into<String>, tag: impl Into<String>) {
        let name = name.into();
        let tag = tag.into();
        if let Some(previous) = self.tags.insert(name.clone(), tag.clone())
            && previous != tag
        {
            log::warn!("tag for '{name}' changed within one run: {previous} -> {tag}");
        }
    }

    fn into_map(self) -> HashMap<String, String> {
        self.tags
    }
}

/// Everything a run needs besides the package set and the order.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Build tool configuration; absent for upload-only runs, which never
    /// invoke it
    pub conda: Option<CondaBuild>,
    /// Upload tool configuration
    pub anaconda: Anaconda,
    /// Python versions to build each package for
    pub python_versions: Vec<String>,
    /// Working directory the run summary is written under
    pub workdir: PathBuf,
}

impl PipelineConfig {
    /// Configuration for a build-only run; no upload credentials involved
    pub fn for_build(conda: CondaBuild, python_versions: Vec<String>, workdir: PathBuf) -> Self {
        Self {
            conda: Some(conda),
            anaconda: Anaconda::new(None, "main", None, false),
            python_versions,
            workdir,
        }
    }

    /// Configuration for a full release run
    pub fn for_release(
        conda: CondaBuild,
        python_versions: Vec<String>,
        anaconda: Anaconda,
        workdir: PathBuf,
    ) -> Self {
        Self {
            conda: Some(conda),
            anaconda,
            python_versions,
            workdir,
        }
    }

    /// Configuration for an upload-only run; the build tool is never
    /// invoked
    pub fn for_upload(anaconda: Anaconda, workdir: PathBuf) -> Self {
        Self {
            conda: None,
            anaconda,
            python_versions: Vec::new(),
            workdir,
        }
    }
}

/// Drives the resolved build order through the build and upload phases.
pub struct Pipeline<'a> {
    set: &'a PackageSet,
    order: BuildOrder,
    config: PipelineConfig,
    out: &'a OutputManager,
}

impl<'a> Pipeline<'a> {
    /// Create a driver for one run
    pub fn new(
        set: &'a PackageSet,
        order: BuildOrder,
        config: PipelineConfig,
        out: &'a OutputManager,
    ) -> Self {
        Self {
            set,
            order,
            config,
            out,
        }
    }

    /// Pull and build every package in the order, without uploading
    pub async fn run_build(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::start("build");
        self.build_phase(&mut summary).await;
        self.close(summary)
    }

    /// Build everything, then publish what was built
    pub async fn run_release(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::start("release");
        let built = self.build_phase(&mut summary).await;
        if !built.is_empty() {
            self.ensure_authenticated().await?;
            self.upload_phase(&built, &mut summary).await;
        }
        self.close(summary)
    }

    /// Publish previously staged artifacts for every package in the order
    pub async fn run_upload(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::start("upload");
        self.ensure_authenticated().await?;
        self.upload_phase(&self.order.names, &mut summary).await;
        self.close(summary)
    }

    /// Verify upload credentials before any artifact leaves the machine.
    ///
    /// An explicit token is taken at face value; otherwise the session must
    /// not be anonymous. Checking up front keeps a credential problem from
    /// surfacing halfway through a multi-package publish.
    async fn ensure_authenticated(&self) -> Result<()> {
        if self.config.anaconda.has_token() {
            return Ok(());
        }
        self.out.verbose("checking upload credentials");
        let authenticated = self
            .config
            .anaconda
            .is_authenticated()
            .await
            .map_err(AuthError::WhoamiFailed)?;
        if authenticated {
            Ok(())
        } else {
            Err(AuthError::AnonymousSession.into())
        }
    }

    /// One pass over the order: pull, record the resolved tag, build.
    ///
    /// A failed package does not abort the run; its transitive dependents
    /// are skipped (their recipes would pin a tag that never resolved) and
    /// independent packages continue. Returns the names that built.
    async fn build_phase(&self, summary: &mut RunSummary) -> Vec<String> {
        // Explicit pins seed the run's tags, including pins for packages
        // the order excludes (only-last), so dependent recipe rewrites can
        // read them without the dependency being built here.
        let mut tags = TagSet::new();
        for (name, tag) in &self.order.pins {
            tags.record(name.clone(), tag.clone());
        }
        let mut unusable: HashSet<&str> = HashSet::new();
        let mut built = Vec::new();

        for name in &self.order.names {
            let Some(package) = self.set.get(name) else {
                // The resolver validated every name; a miss here means the
                // set changed between resolution and the run.
                summary.failures.push(PackageFailure {
                    package: name.clone(),
                    phase: "build".to_string(),
                    reason: "package disappeared from the set".to_string(),
                });
                unusable.insert(name);
                continue;
            };

            if let Some(dep) = package
                .dependencies()
                .iter()
                .find(|d| unusable.contains(d.as_str()))
            {
                let reason = format!("dependency '{dep}' did not build");
                self.out.warn(&format!("[{name}] skipping: {reason}"));
                summary.skipped.push(SkippedPackage {
                    package: name.clone(),
                    reason,
                });
                unusable.insert(name);
                continue;
            }

            let pin = self.order.pins.get(name).map(String::as_str);
            match self.build_one(package, pin, &tags).await {
                Ok((tag, artifacts)) => {
                    self.out.success(&format!("[{name}] built at {tag}"));
                    tags.record(name, tag);
                    summary.built.extend(artifacts);
                    built.push(name.clone());
                }
                Err(err) => {
                    self.out.error(&format!("[{name}] build failed: {err}"));
                    summary.failures.push(PackageFailure {
                        package: name.clone(),
                        phase: "build".to_string(),
                        reason: err.to_string(),
                    });
                    unusable.insert(name);
                }
            }
        }

        summary.tags = tags.into_map();
        built
    }

    async fn build_one(
        &self,
        package: &crate::package::Package,
        pin: Option<&str>,
        tags: &TagSet,
    ) -> Result<(String, Vec<crate::package::BuiltArtifact>)> {
        let conda = self
            .config
            .conda
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("build phase started without build configuration"))?;
        let tag = package.pull(pin, self.out).await?;
        let artifacts = package
            .build(&tag, tags, conda, &self.config.python_versions, self.out)
            .await?;
        Ok((tag, artifacts))
    }

    /// Publish staged artifacts for `names`, best-effort per package.
    async fn upload_phase(&self, names: &[String], summary: &mut RunSummary) {
        for name in names {
            let Some(package) = self.set.get(name) else {
                continue;
            };
            match package.upload(&self.config.anaconda, self.out).await {
                Ok(uploads) => summary.uploads.extend(uploads),
                Err(err) => {
                    self.out.error(&format!("[{name}] upload failed: {err}"));
                    summary.failures.push(PackageFailure {
                        package: name.clone(),
                        phase: "upload".to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    fn close(&self, mut summary: RunSummary) -> Result<RunSummary> {
        summary.finish();
        summary.persist(&self.config.workdir)?;
        summary.render(self.out);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Repository;
    use crate::package::Package;
    use crate::registry::CacheLayout;

    fn quiet() -> OutputManager {
        OutputManager::new(false, true)
    }

    fn build_config(workdir: &std::path::Path) -> PipelineConfig {
        PipelineConfig::for_build(
            CondaBuild::new("pslmodels"),
            vec!["3.6".to_string()],
            workdir.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn failed_package_skips_its_dependents_transitively() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheLayout::new(tmp.path());

        // taxcalc is in the order but missing from the set, so it fails
        // without touching any external tool; btax depends on it and ogusa
        // depends on btax.
        let mut set = PackageSet::new();
        set.insert(Package::new(
            "btax",
            Repository::new("https://example.com/btax", cache.pull_dir("btax")),
            vec!["taxcalc".to_string()],
            cache.clone(),
        ));
        set.insert(Package::new(
            "ogusa",
            Repository::new("https://example.com/ogusa", cache.pull_dir("ogusa")),
            vec!["btax".to_string()],
            cache.clone(),
        ));
        let order = BuildOrder {
            names: vec!["taxcalc".into(), "btax".into(), "ogusa".into()],
            pins: HashMap::new(),
        };

        let out = quiet();
        let pipeline = Pipeline::new(&set, order, build_config(tmp.path()), &out);
        let mut summary = RunSummary::start("build");
        let built = pipeline.build_phase(&mut summary).await;

        assert!(built.is_empty());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].package, "taxcalc");

        let skipped: Vec<_> = summary.skipped.iter().map(|s| s.package.as_str()).collect();
        assert_eq!(skipped, ["btax", "ogusa"]);
        assert!(summary.skipped[0].reason.contains("taxcalc"));
        assert!(summary.skipped[1].reason.contains("btax"));
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn explicit_pins_seed_the_run_tags() {
        let tmp = tempfile::tempdir().unwrap();

        // Only-last shape: the pinned dependency is not in the order, but
        // its tag must be readable by dependent recipe rewrites and end up
        // in the summary.
        let set = PackageSet::new();
        let order = BuildOrder {
            names: vec!["btax".into()],
            pins: HashMap::from([("taxcalc".to_string(), "1.2.0".to_string())]),
        };

        let out = quiet();
        let pipeline = Pipeline::new(&set, order, build_config(tmp.path()), &out);
        let mut summary = RunSummary::start("build");
        pipeline.build_phase(&mut summary).await;

        assert_eq!(
            summary.tags.get("taxcalc").map(String::as_str),
            Some("1.2.0")
        );
    }

    #[test]
    fn upload_config_carries_no_build_tool() {
        let config = PipelineConfig::for_upload(
            Anaconda::new(None, "main", None, false),
            std::path::PathBuf::from("/tmp"),
        );
        assert!(config.conda.is_none());
    }
}
