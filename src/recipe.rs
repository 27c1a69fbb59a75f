//! Conda recipe location and version rewriting.
//!
//! The recipe (`meta.yaml`) is a contract of textual `key: value` lines and
//! `- name` dependency constraints; the pipeline rewrites it with exact
//! pattern substitution rather than parsing YAML, matching what the build
//! tool accepts.

use crate::error::BuildError;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Relative recipe directories probed inside a source snapshot, in order.
/// Repository layouts differ between the older and newer PSL models.
pub const CANDIDATE_DIRS: &[&str] = &["conda.recipe", "Python/conda.recipe"];

/// A located build recipe inside an unpacked source snapshot.
#[derive(Debug, Clone)]
pub struct Recipe {
    dir: PathBuf,
    meta: PathBuf,
}

impl Recipe {
    /// Locate the recipe under `snapshot_dir`, probing [`CANDIDATE_DIRS`]
    pub fn locate(snapshot_dir: &Path) -> std::result::Result<Self, BuildError> {
        for candidate in CANDIDATE_DIRS {
            let dir = snapshot_dir.join(candidate);
            let meta = dir.join("meta.yaml");
            if meta.exists() {
                return Ok(Self { dir, meta });
            }
        }
        Err(BuildError::RecipeNotFound {
            snapshot: snapshot_dir.to_path_buf(),
            tried: CANDIDATE_DIRS.join(", "),
        })
    }

    /// Recipe directory, passed to the build tool
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the `meta.yaml` file
    pub fn meta_path(&self) -> &Path {
        &self.meta
    }

    /// Rewrite the recipe's `version:` line to `tag`.
    ///
    /// Idempotent: re-applying with the same tag leaves the file unchanged.
    pub fn set_version(&self, tag: &str) -> std::io::Result<()> {
        let pattern = Regex::new(r"version: .*").expect("version pattern is valid");
        rewrite_lines(&self.meta, &pattern, &format!("version: {tag}"))
    }

    /// Rewrite the constraint line for dependency `name` to require at
    /// least `tag` (`- name >=tag`).
    ///
    /// Only lines whose listed name is exactly `name` are touched; a
    /// dependency named `name-extra` keeps its own constraint.
    pub fn pin_dependency(&self, name: &str, tag: &str) -> std::io::Result<()> {
        let pattern = Regex::new(&format!(r"- {}(\s.*)?$", regex::escape(name)))
            .expect("dependency pattern is valid");
        rewrite_lines(&self.meta, &pattern, &format!("- {name} >={tag}"))
    }
}

/// Apply `pattern -> replacement` to every line of `path`, in place
fn rewrite_lines(path: &Path, pattern: &Regex, replacement: &str) -> std::io::Result<()> {
    log::debug!(
        "rewriting {} with `{}` -> `{replacement}`",
        path.display(),
        pattern.as_str()
    );
    let content = std::fs::read_to_string(path)?;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| pattern.replace(line, replacement).into_owned())
        .collect();
    if content.ends_with('\n') {
        lines.push(String::new());
    }
    std::fs::write(path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = "\
package:
  name: btax
  version: 0.1.9

requirements:
  build:
    - python
    - taxcalc
  run:
    - python
    - taxcalc >=0.9.0
    - taxcalc-data
";

    fn recipe_in(dir: &Path) -> Recipe {
        let recipe_dir = dir.join("conda.recipe");
        std::fs::create_dir_all(&recipe_dir).unwrap();
        std::fs::write(recipe_dir.join("meta.yaml"), META).unwrap();
        Recipe::locate(dir).unwrap()
    }

    #[test]
    fn locate_probes_candidates_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("Python").join("conda.recipe");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("meta.yaml"), META).unwrap();

        let recipe = Recipe::locate(tmp.path()).unwrap();
        assert!(recipe.dir().ends_with("Python/conda.recipe"));
    }

    #[test]
    fn locate_fails_without_a_recipe() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Recipe::locate(tmp.path()).unwrap_err();
        assert!(matches!(err, BuildError::RecipeNotFound { .. }));
    }

    #[test]
    fn set_version_rewrites_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let recipe = recipe_in(tmp.path());

        recipe.set_version("0.2.0").unwrap();
        let once = std::fs::read_to_string(recipe.meta_path()).unwrap();
        assert!(once.contains("  version: 0.2.0\n"));

        recipe.set_version("0.2.0").unwrap();
        let twice = std::fs::read_to_string(recipe.meta_path()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn pin_dependency_writes_exact_constraint() {
        let tmp = tempfile::tempdir().unwrap();
        let recipe = recipe_in(tmp.path());

        recipe.pin_dependency("taxcalc", "1.2.0").unwrap();
        let content = std::fs::read_to_string(recipe.meta_path()).unwrap();
        assert!(content.contains("    - taxcalc >=1.2.0\n"));
        // Both the build and run constraints are pinned
        assert_eq!(content.matches("- taxcalc >=1.2.0").count(), 2);
        // A dependency sharing the prefix keeps its own line
        assert!(content.contains("    - taxcalc-data\n"));
    }

    #[test]
    fn pin_dependency_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let recipe = recipe_in(tmp.path());

        recipe.pin_dependency("taxcalc", "1.2.0").unwrap();
        let once = std::fs::read_to_string(recipe.meta_path()).unwrap();
        recipe.pin_dependency("taxcalc", "1.2.0").unwrap();
        let twice = std::fs::read_to_string(recipe.meta_path()).unwrap();
        assert_eq!(once, twice);
    }
}
