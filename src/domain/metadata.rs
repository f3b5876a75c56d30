//! Package metadata returned by registry lookups
//!
//! This module provides:
//! - PublishedVersion: one released version with its publish time
//! - PackageMetadata: everything a registry reports about one package
//! - MetadataIndex: metadata keyed by registry family and package name

use super::{Dependency, Ecosystem, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Information about a published package version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedVersion {
    /// The version
    pub version: Version,
    /// When this version was published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Deprecation message, if the registry marks the version deprecated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    /// Whether the version was yanked or retracted
    #[serde(default)]
    pub yanked: bool,
}

impl PublishedVersion {
    /// Create a new PublishedVersion
    pub fn new(version: &str, published_at: Option<DateTime<Utc>>) -> Self {
        Self {
            version: Version::parse(version),
            published_at,
            deprecated: None,
            yanked: false,
        }
    }

    /// Marks the version deprecated (builder pattern)
    pub fn with_deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    /// Marks the version yanked (builder pattern)
    pub fn with_yanked(mut self, yanked: bool) -> Self {
        self.yanked = yanked;
        self
    }

    /// Returns true for prerelease versions
    pub fn is_prerelease(&self) -> bool {
        self.version.is_prerelease()
    }
}

/// Everything a registry reports about one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Published versions, ascending
    pub versions: Vec<PublishedVersion>,
    /// SPDX license expression of the latest release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Downloads over the last week
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_downloads: Option<u64>,
    /// When the metadata was fetched
    pub fetched_at: DateTime<Utc>,
}

impl PackageMetadata {
    /// Creates metadata from a version list, sorting it ascending
    pub fn new(mut versions: Vec<PublishedVersion>) -> Self {
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Self {
            versions,
            license: None,
            weekly_downloads: None,
            fetched_at: Utc::now(),
        }
    }

    /// Sets the license (builder pattern)
    pub fn with_license(mut self, license: Option<String>) -> Self {
        self.license = license;
        self
    }

    /// Sets the weekly downloads (builder pattern)
    pub fn with_weekly_downloads(mut self, downloads: Option<u64>) -> Self {
        self.weekly_downloads = downloads;
        self
    }

    /// Finds the entry for `version`
    pub fn find(&self, version: &Version) -> Option<&PublishedVersion> {
        self.versions.iter().find(|v| &v.version == version)
    }

    /// Highest stable, non-yanked version
    pub fn latest_stable(&self) -> Option<&PublishedVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| !v.yanked && !v.is_prerelease())
    }

    /// Most recent publish time of any version
    pub fn last_published(&self) -> Option<DateTime<Utc>> {
        self.versions.iter().filter_map(|v| v.published_at).max()
    }
}

/// Metadata for every looked-up package, keyed by registry family and name
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    packages: HashMap<(Ecosystem, String), PackageMetadata>,
}

impl MetadataIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts metadata for a package
    pub fn insert(&mut self, ecosystem: Ecosystem, name: impl Into<String>, metadata: PackageMetadata) {
        self.packages
            .insert((ecosystem.registry_family(), name.into()), metadata);
    }

    /// Metadata for a package
    pub fn get(&self, ecosystem: Ecosystem, name: &str) -> Option<&PackageMetadata> {
        self.packages
            .get(&(ecosystem.registry_family(), name.to_string()))
    }

    /// Metadata for a dependency node
    pub fn for_node(&self, node: &Dependency) -> Option<&PackageMetadata> {
        self.get(node.ecosystem, &node.name)
    }

    /// Registry entry for the node's current version
    pub fn current_release(&self, node: &Dependency) -> Option<&PublishedVersion> {
        let current = node.current_version()?;
        self.for_node(node)?.find(&current)
    }

    /// Number of packages in the index
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if the index is empty
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
