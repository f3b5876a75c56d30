//! Ecosystem type definitions for supported package managers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported package-manager ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// npm (package.json, package-lock.json)
    Npm,
    /// Cargo (Cargo.toml, Cargo.lock)
    Cargo,
    /// pip requirement files (requirements.txt)
    Pip,
    /// Python project metadata (pyproject.toml)
    Pyproject,
    /// Bundler (Gemfile, Gemfile.lock)
    Gem,
    /// Mix (mix.exs)
    Hex,
    /// Maven (pom.xml)
    Maven,
    /// Go modules (go.mod)
    Go,
}

impl Ecosystem {
    /// Short identifier used in config files and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Cargo => "cargo",
            Ecosystem::Pip => "pip",
            Ecosystem::Pyproject => "pyproject",
            Ecosystem::Gem => "gem",
            Ecosystem::Hex => "hex",
            Ecosystem::Maven => "maven",
            Ecosystem::Go => "go",
        }
    }

    /// Returns the display name for this ecosystem
    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Cargo => "Cargo",
            Ecosystem::Pip => "pip",
            Ecosystem::Pyproject => "pyproject",
            Ecosystem::Gem => "Bundler",
            Ecosystem::Hex => "Mix",
            Ecosystem::Maven => "Maven",
            Ecosystem::Go => "Go modules",
        }
    }

    /// Name of the registry packages of this ecosystem are published to
    pub fn registry_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Cargo => "crates.io",
            Ecosystem::Pip | Ecosystem::Pyproject => "PyPI",
            Ecosystem::Gem => "RubyGems",
            Ecosystem::Hex => "Hex",
            Ecosystem::Maven => "Maven Central",
            Ecosystem::Go => "Go Proxy",
        }
    }

    /// Ecosystem whose registry serves this ecosystem's packages.
    ///
    /// pip and pyproject manifests both resolve against PyPI, so lookups and
    /// cross-manifest comparisons treat them as one family.
    pub fn registry_family(&self) -> Ecosystem {
        match self {
            Ecosystem::Pyproject => Ecosystem::Pip,
            other => *other,
        }
    }

    /// Returns the lock filenames that pair with this ecosystem's manifests
    pub fn lock_filenames(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::Npm => &[
                "package-lock.json",
                "npm-shrinkwrap.json",
                "yarn.lock",
                "pnpm-lock.yaml",
            ],
            Ecosystem::Cargo => &["Cargo.lock"],
            Ecosystem::Pip => &["requirements.lock", "pip.lock"],
            Ecosystem::Pyproject => &["poetry.lock", "uv.lock", "pdm.lock"],
            Ecosystem::Gem => &["Gemfile.lock"],
            Ecosystem::Hex => &["mix.lock"],
            Ecosystem::Maven => &[],
            Ecosystem::Go => &["go.sum"],
        }
    }

    /// Whether manifests of this ecosystem are expected to have a lockfile
    pub fn supports_lockfile(&self) -> bool {
        !self.lock_filenames().is_empty()
    }

    /// Whether a lockfile found in an ancestor directory also locks this manifest
    /// (workspaces share a single lockfile at their root)
    pub fn shares_workspace_lockfile(&self) -> bool {
        matches!(self, Ecosystem::Cargo | Ecosystem::Npm)
    }

    /// Returns all supported ecosystems
    pub fn all() -> &'static [Ecosystem] {
        &[
            Ecosystem::Npm,
            Ecosystem::Cargo,
            Ecosystem::Pip,
            Ecosystem::Pyproject,
            Ecosystem::Gem,
            Ecosystem::Hex,
            Ecosystem::Maven,
            Ecosystem::Go,
        ]
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ecosystem::all()
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown ecosystem '{}'", s))
    }
}
