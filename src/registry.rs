//! Package set construction and cache layout.
//!
//! The descriptor graph is built explicitly and passed through the resolver
//! and the pipeline driver; there is no process-wide registry, so tests can
//! construct throwaway sets.

use crate::git::Repository;
use crate::package::Package;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// GitHub organization hosting the default PSL package sources
pub const DEFAULT_BASE_URL: &str = "https://github.com/open-source-economics";

/// On-disk cache layout for one pipeline run.
///
/// Everything lives under `<workdir>/pkg`:
/// `pull/<name>` is the git working tree, `build/<name>` holds the archived
/// snapshot and build scratch, `upload/<name>/<platform>` holds artifacts
/// awaiting publication. The cache is owned by a single run; concurrent
/// runs must use distinct workdirs (not enforced by locking).
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Create the layout rooted under `workdir`
    pub fn new(workdir: &Path) -> Self {
        Self {
            root: workdir.join("pkg"),
        }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working tree location for a package
    pub fn pull_dir(&self, name: &str) -> PathBuf {
        self.root.join("pull").join(name)
    }

    /// Snapshot archive and build scratch location for a package
    pub fn build_dir(&self, name: &str) -> PathBuf {
        self.root.join("build").join(name)
    }

    /// Artifact staging location for a package
    pub fn upload_dir(&self, name: &str) -> PathBuf {
        self.root.join("upload").join(name)
    }

    /// Artifact staging location for one platform of a package
    pub fn platform_dir(&self, name: &str, platform: &str) -> PathBuf {
        self.upload_dir(name).join(platform)
    }

    /// Create the cache root, optionally wiping a previous run first
    pub fn ensure(&self, clean: bool) -> std::io::Result<()> {
        if clean && self.root.exists() {
            log::info!("removing cache directory {}", self.root.display());
            std::fs::remove_dir_all(&self.root)?;
        }
        std::fs::create_dir_all(&self.root)
    }
}

/// The full descriptor graph, keyed by package name.
///
/// Insertion order is preserved and used as the deterministic tie-breaker
/// for independent packages in the build order.
#[derive(Debug, Default)]
pub struct PackageSet {
    packages: Vec<Package>,
    index: HashMap<String, usize>,
}

impl PackageSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package descriptor. Later inserts with the same name replace
    /// the earlier descriptor but keep its position.
    pub fn insert(&mut self, package: Package) {
        match self.index.get(package.name()) {
            Some(&i) => self.packages[i] = package,
            None => {
                self.index
                    .insert(package.name().to_string(), self.packages.len());
                self.packages.push(package);
            }
        }
    }

    /// Look up a descriptor by name
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    /// Whether a package is in the set
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Package names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|p| p.name())
    }

    /// All descriptors in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    /// Number of packages in the set
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Build the default PSL package set.
///
/// `taxcalc` is the root model; `btax` and `ogusa` both build against a
/// pinned `taxcalc` release, so their recipes are rewritten with its
/// resolved tag during a run.
pub fn default_set(base_url: &str, cache: &CacheLayout) -> PackageSet {
    let base = base_url.trim_end_matches('/');
    let mut set = PackageSet::new();

    set.insert(Package::new(
        "taxcalc",
        Repository::new(format!("{base}/Tax-Calculator"), cache.pull_dir("taxcalc")),
        vec![],
        cache.clone(),
    ));
    set.insert(Package::new(
        "btax",
        Repository::new(format!("{base}/B-Tax"), cache.pull_dir("btax")),
        vec!["taxcalc".to_string()],
        cache.clone(),
    ));
    set.insert(Package::new(
        "ogusa",
        Repository::new(format!("{base}/OG-USA"), cache.pull_dir("ogusa")),
        vec!["taxcalc".to_string()],
        cache.clone(),
    ));

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_is_ordered_and_linked() {
        let cache = CacheLayout::new(Path::new("/tmp/pslpkg-test"));
        let set = default_set(DEFAULT_BASE_URL, &cache);

        let names: Vec<_> = set.names().collect();
        assert_eq!(names, ["taxcalc", "btax", "ogusa"]);
        assert_eq!(set.get("btax").unwrap().dependencies(), ["taxcalc"]);
        assert!(
            set.get("taxcalc")
                .unwrap()
                .repository()
                .url()
                .ends_with("/Tax-Calculator")
        );
    }

    #[test]
    fn cache_layout_paths() {
        let cache = CacheLayout::new(Path::new("/work"));
        assert_eq!(cache.pull_dir("taxcalc"), Path::new("/work/pkg/pull/taxcalc"));
        assert_eq!(
            cache.platform_dir("btax", "linux-64"),
            Path::new("/work/pkg/upload/btax/linux-64")
        );
    }
}
