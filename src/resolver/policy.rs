//! Update policy configuration
//!
//! This module provides the UpdatePolicy struct that encapsulates
//! all options the resolver applies when picking candidates.

use crate::domain::BumpKind;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which versions a candidate may be picked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Only versions the declared constraint accepts
    #[default]
    Constraint,
    /// Any newer version, reporting whether it falls outside the constraint
    Latest,
}

impl UpdateMode {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Constraint => "constraint",
            UpdateMode::Latest => "latest",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "constraint" => Ok(UpdateMode::Constraint),
            "latest" => Ok(UpdateMode::Latest),
            other => Err(format!(
                "unknown update mode '{}', expected 'constraint' or 'latest'",
                other
            )),
        }
    }
}

/// Policy for update resolution
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePolicy {
    /// Constraint-respecting or latest
    pub mode: UpdateMode,
    /// Packages never proposed for update
    pub exclude: Vec<String>,
    /// If non-empty, only these packages are proposed
    pub only: Vec<String>,
    /// Largest allowed change
    pub max_bump: BumpKind,
    /// Consider prereleases even when the current version is a release
    pub include_prerelease: bool,
    /// Versions younger than this are ineligible
    pub min_age: Option<Duration>,
    /// Propose updates for lockfile-only packages
    pub include_transitive: bool,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            mode: UpdateMode::Constraint,
            exclude: Vec::new(),
            only: Vec::new(),
            max_bump: BumpKind::Major,
            include_prerelease: false,
            min_age: None,
            include_transitive: true,
        }
    }
}

impl UpdatePolicy {
    /// Create a policy with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set packages to exclude
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Set packages to include (only list)
    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }

    /// Set the bump ceiling
    pub fn with_max_bump(mut self, max_bump: BumpKind) -> Self {
        self.max_bump = max_bump;
        self
    }

    /// Set whether prereleases are considered
    pub fn with_include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    /// Set minimum age for versions
    pub fn with_min_age(mut self, age: Duration) -> Self {
        self.min_age = Some(age);
        self
    }

    /// Set whether lockfile-only packages are considered
    pub fn with_include_transitive(mut self, include: bool) -> Self {
        self.include_transitive = include;
        self
    }

    /// Check if a package should be processed based on filters
    pub fn should_process_package(&self, name: &str) -> bool {
        if !self.only.is_empty() {
            return self.only.iter().any(|p| p == name);
        }
        !self.exclude.iter().any(|p| p == name)
    }
}
