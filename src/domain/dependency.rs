//! Dependency node structures

use super::{Constraint, Ecosystem, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a dependency is declared to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Needed at runtime
    Runtime,
    /// Development and test only
    Dev,
    /// Expected to be provided by the consumer
    Peer,
    /// Optional feature or extra
    Optional,
    /// Build scripts and tooling
    Build,
    /// Pulled in only through a lockfile edge
    Transitive,
}

impl Scope {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Runtime => "runtime",
            Scope::Dev => "dev",
            Scope::Peer => "peer",
            Scope::Optional => "optional",
            Scope::Build => "build",
            Scope::Transitive => "transitive",
        }
    }

    /// Returns true for development-only scopes
    pub fn is_dev(&self) -> bool {
        matches!(self, Scope::Dev | Scope::Build)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the package comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageSource {
    /// The ecosystem's public registry
    #[default]
    Registry,
    /// Local path
    Path,
    /// Git repository
    Git,
    /// Tarball or other URL
    Url,
}

/// A declaration site in a manifest or lockfile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File the declaration lives in
    pub path: PathBuf,
    /// Section or table name (`devDependencies`, `[build-dependencies]`, `group :test`)
    pub section: String,
    /// 1-based line number, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// The declaring line as written
    #[serde(skip)]
    pub raw_line: Option<String>,
}

impl SourceLocation {
    /// Creates a new location without a line
    pub fn new(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
            line: None,
            raw_line: None,
        }
    }

    /// Sets the line number and its text (builder pattern)
    pub fn with_line(mut self, line: Option<usize>, content: &str) -> Self {
        self.line = line;
        self.raw_line = line
            .and_then(|l| content.lines().nth(l.saturating_sub(1)))
            .map(|l| l.trim().to_string());
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path.display(), line),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Identity of a node within one graph.
///
/// Field order is the canonical iteration order: ecosystem, then name, then
/// scope. Lockfile packages also carry their resolved version because one
/// lockfile may hold several versions of the same package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub scope: Scope,
    pub manifest: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

/// One dependency, declared in a manifest or pinned in a lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// The ecosystem this dependency belongs to
    pub ecosystem: Ecosystem,
    /// Package name (`group:artifact` for Maven, module path for Go)
    pub name: String,
    /// Declared version constraint
    pub constraint: Constraint,
    /// Version pinned by a lockfile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<Version>,
    /// Declaration scope
    pub scope: Scope,
    /// Manifest this dependency belongs to (the lockfile for transitive packages)
    pub manifest: PathBuf,
    /// Primary declaration site
    pub source: SourceLocation,
    /// Further declaration sites merged into this node
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub also_declared: Vec<SourceLocation>,
    /// Where the package comes from
    pub origin: PackageSource,
    /// Declaration order within its manifest
    #[serde(skip)]
    pub position: usize,
}

impl Dependency {
    /// Creates a new dependency declared at `source`
    pub fn new(
        ecosystem: Ecosystem,
        name: impl Into<String>,
        constraint: Constraint,
        scope: Scope,
        source: SourceLocation,
    ) -> Self {
        Self {
            ecosystem,
            name: name.into(),
            constraint,
            locked: None,
            scope,
            manifest: source.path.clone(),
            source,
            also_declared: Vec::new(),
            origin: PackageSource::Registry,
            position: 0,
        }
    }

    /// Sets the locked version (builder pattern)
    pub fn with_locked(mut self, version: Version) -> Self {
        self.locked = Some(version);
        self
    }

    /// Sets the package source (builder pattern)
    pub fn with_origin(mut self, origin: PackageSource) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the declaration order (builder pattern)
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Identity key of this node
    pub fn key(&self) -> NodeKey {
        NodeKey {
            ecosystem: self.ecosystem,
            name: self.name.clone(),
            scope: self.scope,
            manifest: self.manifest.clone(),
            resolved: if self.is_direct() {
                None
            } else {
                self.locked.as_ref().map(|v| v.as_str().to_string())
            },
        }
    }

    /// Returns true for dependencies declared in a manifest
    pub fn is_direct(&self) -> bool {
        self.scope != Scope::Transitive
    }

    /// Returns true if the dependency resolves against a public registry
    pub fn is_registry(&self) -> bool {
        self.origin == PackageSource::Registry
    }

    /// Version currently in use: the locked version, else the version named by the constraint
    pub fn current_version(&self) -> Option<Version> {
        self.locked.clone().or_else(|| self.constraint.base_version())
    }

    /// Returns true if the dependency is declared in `path`
    pub fn belongs_to(&self, path: &Path) -> bool {
        self.manifest == path
    }

    /// Number of times the package is declared in its manifest
    pub fn declaration_count(&self) -> usize {
        1 + self.also_declared.len()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.constraint)?;
        if let Some(locked) = &self.locked {
            write!(f, " (locked {})", locked)?;
        }
        write!(f, " [{} {}]", self.ecosystem, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, scope: Scope) -> Dependency {
        Dependency::new(
            Ecosystem::Npm,
            name,
            Constraint::exact("1.0.0"),
            scope,
            SourceLocation::new("/repo/package.json", "dependencies"),
        )
    }

    #[test]
    fn test_key_for_direct_dependency_ignores_lock() {
        let d = dep("lodash", Scope::Runtime).with_locked(Version::parse("1.0.3"));
        let key = d.key();
        assert_eq!(key.name, "lodash");
        assert_eq!(key.manifest, PathBuf::from("/repo/package.json"));
        assert_eq!(key.resolved, None);
    }

    #[test]
    fn test_key_for_transitive_includes_version() {
        let d = dep("ms", Scope::Transitive).with_locked(Version::parse("2.1.3"));
        assert_eq!(d.key().resolved.as_deref(), Some("2.1.3"));
    }

    #[test]
    fn test_key_ordering_is_canonical() {
        let a = dep("b", Scope::Runtime).key();
        let b = dep("a", Scope::Dev).key();
        let c = dep("a", Scope::Runtime).key();
        let mut keys = vec![a.clone(), b.clone(), c.clone()];
        keys.sort();
        assert_eq!(keys, vec![c, b, a]);
    }

    #[test]
    fn test_current_version_prefers_lock() {
        let d = dep("lodash", Scope::Runtime);
        assert_eq!(d.current_version(), Some(Version::parse("1.0.0")));
        let d = d.with_locked(Version::parse("1.0.5"));
        assert_eq!(d.current_version(), Some(Version::parse("1.0.5")));
    }

    #[test]
    fn test_source_location_with_line() {
        let content = "{\n  \"dependencies\": {\n    \"lodash\": \"1.0.0\"\n  }\n}";
        let loc = SourceLocation::new("package.json", "dependencies").with_line(Some(3), content);
        assert_eq!(loc.raw_line.as_deref(), Some("\"lodash\": \"1.0.0\""));
        assert_eq!(format!("{}", loc), "package.json:3");
    }

    #[test]
    fn test_scope_is_dev() {
        assert!(Scope::Dev.is_dev());
        assert!(Scope::Build.is_dev());
        assert!(!Scope::Peer.is_dev());
    }

    #[test]
    fn test_display() {
        let d = dep("lodash", Scope::Dev);
        assert_eq!(format!("{}", d), "lodash@1.0.0 [npm dev]");
    }
}
