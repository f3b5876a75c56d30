//! Per-file parse results merged into the dependency graph

use crate::domain::{Dependency, Ecosystem, Version};
use serde::Serialize;
use std::path::PathBuf;

/// Whether a file declares dependencies or pins them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Manifest,
    Lockfile,
}

/// A parsed manifest or lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRecord {
    /// File path as given by the caller
    pub path: PathBuf,
    /// Ecosystem of the file
    pub ecosystem: Ecosystem,
    /// Manifest or lockfile
    pub kind: FileKind,
    /// Lockfile paired with this manifest, filled in when the graph is built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockfile: Option<PathBuf>,
}

impl ManifestRecord {
    /// Creates a record without a paired lockfile
    pub fn new(path: impl Into<PathBuf>, ecosystem: Ecosystem, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            ecosystem,
            kind,
            lockfile: None,
        }
    }

    /// Returns true for lockfiles
    pub fn is_lockfile(&self) -> bool {
        self.kind == FileKind::Lockfile
    }
}

/// A dependency requirement recorded inside a lockfile entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedRequirement {
    /// Required package name
    pub name: String,
    /// Requirement as written (a range, or an exact version)
    pub requirement: Option<String>,
}

impl LockedRequirement {
    /// Creates a requirement
    pub fn new(name: impl Into<String>, requirement: Option<&str>) -> Self {
        Self {
            name: name.into(),
            requirement: requirement.map(String::from),
        }
    }
}

/// One resolved package in a lockfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    /// Package name
    pub name: String,
    /// Resolved version
    pub version: Version,
    /// Line of the entry, when known
    pub line: Option<usize>,
    /// Packages this entry depends on
    pub dependencies: Vec<LockedRequirement>,
    /// The project itself or a workspace member, never a registry package
    pub root: bool,
}

impl LockedPackage {
    /// Creates a registry package entry
    pub fn new(name: impl Into<String>, version: &str) -> Self {
        Self {
            name: name.into(),
            version: Version::parse(version),
            line: None,
            dependencies: Vec::new(),
            root: false,
        }
    }

    /// Sets the line (builder pattern)
    pub fn with_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    /// Marks the entry as the project root or a workspace member (builder pattern)
    pub fn with_root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }
}

/// Everything one file contributes to the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFragment {
    /// The file itself
    pub record: ManifestRecord,
    /// Direct dependencies declared by a manifest, in declaration order
    pub dependencies: Vec<Dependency>,
    /// Packages pinned by a lockfile
    pub packages: Vec<LockedPackage>,
}

impl GraphFragment {
    /// Creates an empty fragment for `record`
    pub fn new(record: ManifestRecord) -> Self {
        Self {
            record,
            dependencies: Vec::new(),
            packages: Vec::new(),
        }
    }

    /// Creates a manifest fragment
    pub fn manifest(path: impl Into<PathBuf>, ecosystem: Ecosystem, dependencies: Vec<Dependency>) -> Self {
        Self {
            record: ManifestRecord::new(path, ecosystem, FileKind::Manifest),
            dependencies,
            packages: Vec::new(),
        }
    }

    /// Creates a lockfile fragment
    pub fn lockfile(path: impl Into<PathBuf>, ecosystem: Ecosystem, packages: Vec<LockedPackage>) -> Self {
        Self {
            record: ManifestRecord::new(path, ecosystem, FileKind::Lockfile),
            dependencies: Vec::new(),
            packages,
        }
    }
}
