//! Run summary: what a pipeline run did, persisted alongside the cache.

use crate::cli::OutputManager;
use crate::package::{ArtifactUpload, BuiltArtifact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One package whose phase failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageFailure {
    /// Package name
    pub package: String,
    /// Phase that failed ("build" or "upload")
    pub phase: String,
    /// What went wrong
    pub reason: String,
}

/// One package skipped because a dependency did not build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedPackage {
    /// Package name
    pub package: String,
    /// Why it was skipped
    pub reason: String,
}

/// Complete record of one pipeline run.
///
/// Written as `run-summary.json` under the working directory after every
/// run, so a partially failed release can be inspected and resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Phase(s) the run performed
    pub command: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Resolved tag per package, in request order semantics
    pub tags: HashMap<String, String>,
    /// Artifacts staged by the build phase
    pub built: Vec<BuiltArtifact>,
    /// Per-artifact upload outcomes
    pub uploads: Vec<ArtifactUpload>,
    /// Packages whose phase failed
    pub failures: Vec<PackageFailure>,
    /// Packages skipped because a dependency failed
    pub skipped: Vec<SkippedPackage>,
}

impl RunSummary {
    /// Start an empty summary for `command`
    pub fn start(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            started_at: Utc::now(),
            finished_at: None,
            tags: HashMap::new(),
            built: Vec::new(),
            uploads: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Whether anything in the run should fail the process.
    ///
    /// Skips caused by failures are implied by the failure itself;
    /// "already exists" uploads are deliberate non-failures.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.uploads.iter().any(|u| u.outcome.is_failure())
    }

    /// Persist the summary as JSON under `workdir`, returning its path
    pub fn persist(&self, workdir: &Path) -> crate::error::Result<PathBuf> {
        let path = workdir.join("run-summary.json");
        std::fs::create_dir_all(workdir)?;
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        log::debug!("run summary written to {}", path.display());
        Ok(path)
    }

    /// Render a human-readable closing report
    pub fn render(&self, out: &OutputManager) {
        out.section("Run summary");

        if !self.tags.is_empty() {
            let mut tags: Vec<_> = self.tags.iter().collect();
            tags.sort();
            for (name, tag) in tags {
                out.info(&format!("  {name} @ {tag}"));
            }
        }
        if !self.built.is_empty() {
            out.info(&format!("  {} artifact(s) staged", self.built.len()));
        }

        let uploaded = self
            .uploads
            .iter()
            .filter(|u| matches!(u.outcome, crate::conda::UploadOutcome::Uploaded))
            .count();
        let existing = self
            .uploads
            .iter()
            .filter(|u| matches!(u.outcome, crate::conda::UploadOutcome::AlreadyExists))
            .count();
        if !self.uploads.is_empty() {
            out.info(&format!(
                "  {uploaded} artifact(s) uploaded, {existing} already present"
            ));
        }

        for skip in &self.skipped {
            out.warn(&format!("  skipped {}: {}", skip.package, skip.reason));
        }
        for failure in &self.failures {
            out.error(&format!(
                "  {} {} failed: {}",
                failure.package, failure.phase, failure.reason
            ));
        }
        for upload in &self.uploads {
            if let crate::conda::UploadOutcome::Failed { reason } = &upload.outcome {
                out.error(&format!(
                    "  upload of {}/{} failed: {}",
                    upload.platform, upload.file, reason
                ));
            }
        }

        if self.has_failures() {
            out.error("Run finished with failures");
        } else {
            out.success("Run finished successfully");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conda::UploadOutcome;

    #[test]
    fn clean_run_has_no_failures() {
        let mut summary = RunSummary::start("release");
        summary.uploads.push(ArtifactUpload {
            package: "taxcalc".to_string(),
            platform: "linux-64".to_string(),
            file: "taxcalc-1.0.0-py36_0.tar.bz2".to_string(),
            outcome: UploadOutcome::AlreadyExists,
        });
        summary.finish();
        assert!(!summary.has_failures());
    }

    #[test]
    fn failed_upload_fails_the_run() {
        let mut summary = RunSummary::start("upload");
        summary.uploads.push(ArtifactUpload {
            package: "btax".to_string(),
            platform: "win-64".to_string(),
            file: "btax-0.2.0-py36_0.tar.bz2".to_string(),
            outcome: UploadOutcome::Failed {
                reason: "network unreachable".to_string(),
            },
        });
        assert!(summary.has_failures());
    }

    #[test]
    fn summary_round_trips_through_json() {
        let mut summary = RunSummary::start("build");
        summary.tags.insert("taxcalc".to_string(), "1.0.0".to_string());
        summary.failures.push(PackageFailure {
            package: "ogusa".to_string(),
            phase: "build".to_string(),
            reason: "recipe not found".to_string(),
        });
        summary.finish();

        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.command, "build");
        assert_eq!(back.tags.get("taxcalc").map(String::as_str), Some("1.0.0"));
        assert!(back.has_failures());
    }
}
