//! Dependency-ordered build resolution.
//!
//! Requested packages are expanded to their transitive dependency closure
//! and topologically sorted so every dependency builds before each of its
//! dependents. Cycles and unknown names are detected here, before the
//! pipeline performs any side effect.

use crate::error::ResolveError;
use crate::registry::PackageSet;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{HashMap, HashSet};

/// Result type for resolution
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// One requested package, parsed from `name` or `name=tag` at the CLI
/// boundary so the resolver never deals with string formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    /// Package name
    pub name: String,
    /// Explicit version pin overriding latest-tag resolution
    pub pin: Option<String>,
}

impl PackageRequest {
    /// Request a package without a pin
    pub fn unpinned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pin: None,
        }
    }

    /// Parse a command-line specifier (`name` or `name=tag`)
    pub fn parse(spec: &str) -> ResolveResult<Self> {
        let (name, pin) = match spec.split_once('=') {
            Some((name, tag)) => (name, Some(tag)),
            None => (spec, None),
        };
        if name.trim().is_empty() {
            return Err(ResolveError::InvalidSpecifier {
                spec: spec.to_string(),
                reason: "missing package name".to_string(),
            });
        }
        if let Some(tag) = pin
            && tag.trim().is_empty()
        {
            return Err(ResolveError::InvalidSpecifier {
                spec: spec.to_string(),
                reason: "missing tag after '='".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            pin: pin.map(str::to_string),
        })
    }
}

/// A resolved, dependency-respecting build order plus explicit pins.
#[derive(Debug, Clone, Default)]
pub struct BuildOrder {
    /// Package names, every dependency before each of its dependents
    pub names: Vec<String>,
    /// Tags pre-assigned from explicit `name=tag` requests. Pins are kept
    /// even for packages the order excludes (only-last), so a dependent's
    /// recipe can still be rewritten with its dependency's pinned tag.
    pub pins: HashMap<String, String>,
}

impl BuildOrder {
    /// Position of a package in the order, if present
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Compute the build order for `requests` over `set`.
///
/// An empty request list means "everything in the set". With `only_last`
/// the order is restricted to its final (most-dependent) element, for
/// callers whose dependencies are already satisfied externally.
pub fn resolve(
    set: &PackageSet,
    requests: &[PackageRequest],
    only_last: bool,
) -> ResolveResult<BuildOrder> {
    let unknown = |name: &str| ResolveError::UnknownPackage {
        name: name.to_string(),
        known: set.names().collect::<Vec<_>>().join(", "),
    };

    // Collect pins up front; conflicting pins for one package are an error
    // rather than a silent last-wins.
    let mut pins: HashMap<String, String> = HashMap::new();
    for request in requests {
        if !set.contains(&request.name) {
            return Err(unknown(&request.name));
        }
        if let Some(tag) = &request.pin {
            if let Some(previous) = pins.insert(request.name.clone(), tag.clone())
                && previous != *tag
            {
                return Err(ResolveError::InvalidSpecifier {
                    spec: format!("{}={tag}", request.name),
                    reason: format!("conflicts with earlier pin {previous}"),
                });
            }
        }
    }

    // Expand to the transitive dependency closure. The visited set keeps
    // the walk finite even when the relation is cyclic; the cycle itself is
    // reported by the sort below.
    let mut closure: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = if requests.is_empty() {
        set.names().collect()
    } else {
        requests.iter().map(|r| r.name.as_str()).collect()
    };
    while let Some(name) = stack.pop() {
        let package = set.get(name).ok_or_else(|| unknown(name))?;
        if closure.insert(package.name()) {
            for dep in package.dependencies() {
                stack.push(dep);
            }
        }
    }

    // Edges run dependency -> dependent, so a topological order yields
    // dependencies first. Nodes are added in set order, which keeps ties
    // between independent packages deterministic.
    let mut graph = DiGraph::<&str, ()>::new();
    let mut nodes = HashMap::new();
    for name in set.names().filter(|n| closure.contains(n)) {
        nodes.insert(name, graph.add_node(name));
    }
    for name in set.names().filter(|n| closure.contains(n)) {
        let package = set.get(name).ok_or_else(|| unknown(name))?;
        for dep in package.dependencies() {
            graph.add_edge(nodes[dep.as_str()], nodes[name], ());
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| ResolveError::CyclicDependency {
        package: graph[cycle.node_id()].to_string(),
    })?;

    let mut names: Vec<String> = sorted.into_iter().map(|ix| graph[ix].to_string()).collect();
    if only_last && names.len() > 1 {
        names = names.split_off(names.len() - 1);
    }

    Ok(BuildOrder { names, pins })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Repository;
    use crate::package::Package;
    use crate::registry::CacheLayout;
    use std::path::Path;

    fn fake_set(edges: &[(&str, &[&str])]) -> PackageSet {
        let cache = CacheLayout::new(Path::new("/tmp/pslpkg-resolver-test"));
        let mut set = PackageSet::new();
        for (name, deps) in edges {
            set.insert(Package::new(
                *name,
                Repository::new(format!("https://example.com/{name}"), cache.pull_dir(name)),
                deps.iter().map(|d| d.to_string()).collect(),
                cache.clone(),
            ));
        }
        set
    }

    #[test]
    fn dependencies_precede_dependents() {
        let set = fake_set(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["b"]),
            ("d", &["a"]),
        ]);
        let order = resolve(&set, &[], false).unwrap();
        for name in ["b", "c", "d"] {
            let package = set.get(name).unwrap();
            for dep in package.dependencies() {
                assert!(
                    order.position(dep).unwrap() < order.position(name).unwrap(),
                    "{dep} must come before {name} in {:?}",
                    order.names
                );
            }
        }
    }

    #[test]
    fn requesting_a_dependent_pulls_in_its_dependencies() {
        let set = fake_set(&[("taxcalc", &[]), ("btax", &["taxcalc"])]);
        let order = resolve(&set, &[PackageRequest::unpinned("btax")], false).unwrap();
        assert_eq!(order.names, ["taxcalc", "btax"]);
    }

    #[test]
    fn only_last_keeps_the_most_dependent_package() {
        let set = fake_set(&[("taxcalc", &[]), ("btax", &["taxcalc"])]);
        let order = resolve(&set, &[PackageRequest::unpinned("btax")], true).unwrap();
        assert_eq!(order.names, ["btax"]);
    }

    #[test]
    fn only_last_on_a_chain_returns_the_tail() {
        let set = fake_set(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let order = resolve(
            &set,
            &[
                PackageRequest::unpinned("a"),
                PackageRequest::unpinned("b"),
                PackageRequest::unpinned("c"),
            ],
            true,
        )
        .unwrap();
        assert_eq!(order.names, ["c"]);
    }

    #[test]
    fn unknown_package_is_rejected() {
        let set = fake_set(&[("a", &[])]);
        let err = resolve(&set, &[PackageRequest::unpinned("nope")], false).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownPackage { .. }));
    }

    #[test]
    fn cycles_are_detected() {
        let set = fake_set(&[("a", &["b"]), ("b", &["a"])]);
        let err = resolve(&set, &[], false).unwrap_err();
        assert!(matches!(err, ResolveError::CyclicDependency { .. }));
    }

    #[test]
    fn independent_packages_keep_set_order() {
        let set = fake_set(&[("z", &[]), ("m", &[]), ("a", &[])]);
        let first = resolve(&set, &[], false).unwrap();
        let second = resolve(&set, &[], false).unwrap();
        assert_eq!(first.names, second.names);
        assert_eq!(first.names, ["z", "m", "a"]);
    }

    #[test]
    fn pins_are_assigned_during_resolution() {
        let set = fake_set(&[("taxcalc", &[]), ("btax", &["taxcalc"])]);
        let requests = [
            PackageRequest::parse("taxcalc=1.2.0").unwrap(),
            PackageRequest::unpinned("btax"),
        ];
        let order = resolve(&set, &requests, false).unwrap();
        assert_eq!(order.pins.get("taxcalc").map(String::as_str), Some("1.2.0"));
        assert!(!order.pins.contains_key("btax"));
    }

    #[test]
    fn only_last_retains_pins_for_excluded_dependencies() {
        let set = fake_set(&[("taxcalc", &[]), ("btax", &["taxcalc"])]);
        let requests = [
            PackageRequest::parse("taxcalc=1.2.0").unwrap(),
            PackageRequest::unpinned("btax"),
        ];
        let order = resolve(&set, &requests, true).unwrap();
        assert_eq!(order.names, ["btax"]);
        // btax's recipe rewrite still needs the taxcalc pin even though
        // taxcalc itself is not built in this run
        assert_eq!(order.pins.get("taxcalc").map(String::as_str), Some("1.2.0"));
    }

    #[test]
    fn conflicting_pins_are_rejected() {
        let set = fake_set(&[("a", &[])]);
        let requests = [
            PackageRequest::parse("a=1.0.0").unwrap(),
            PackageRequest::parse("a=2.0.0").unwrap(),
        ];
        let err = resolve(&set, &requests, false).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSpecifier { .. }));
    }

    #[test]
    fn request_parsing() {
        assert_eq!(
            PackageRequest::parse("taxcalc").unwrap(),
            PackageRequest::unpinned("taxcalc")
        );
        assert_eq!(
            PackageRequest::parse("taxcalc=0.24.0").unwrap(),
            PackageRequest {
                name: "taxcalc".to_string(),
                pin: Some("0.24.0".to_string()),
            }
        );
        assert!(PackageRequest::parse("=1.0.0").is_err());
        assert!(PackageRequest::parse("taxcalc=").is_err());
    }
}
