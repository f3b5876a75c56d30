//! Manifest and lockfile detection and parsing
//!
//! This module provides functionality to:
//! - Recognize manifest and lockfile formats from their file names
//! - Parse each supported format into a [`GraphFragment`]
//! - Discover candidate files in a directory tree
//!
//! Adapters never execute manifest content; `mix.exs` and `Gemfile` are read
//! line by line.

mod cargo_lock;
mod cargo_toml;
mod detector;
mod fragment;
mod gemfile;
mod gemfile_lock;
mod go_mod;
mod mix_exs;
mod package_json;
mod package_lock;
mod pom_xml;
mod pyproject_toml;
mod requirements_txt;

pub use cargo_lock::CargoLockParser;
pub use cargo_toml::CargoTomlParser;
pub use detector::{discover, DiscoveredFile, DEFAULT_SKIP_DIRS};
pub use fragment::{
    FileKind, GraphFragment, LockedPackage, LockedRequirement, ManifestRecord,
};
pub use gemfile::GemfileParser;
pub use gemfile_lock::GemfileLockParser;
pub use go_mod::GoModParser;
pub use mix_exs::MixExsParser;
pub use package_json::PackageJsonParser;
pub use package_lock::PackageLockParser;
pub use pom_xml::PomXmlParser;
pub use pyproject_toml::PyprojectTomlParser;
pub use requirements_txt::RequirementsTxtParser;

use crate::domain::Ecosystem;
use crate::error::ManifestError;
use std::path::Path;

/// Trait for parsing manifest and lockfile contents
pub trait ManifestAdapter {
    /// Parse the file contents. `path` is recorded on every node and finding.
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError>;

    /// Returns the ecosystem this adapter handles
    fn ecosystem(&self) -> Ecosystem;
}

/// A recognized file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFormat {
    /// Canonical file name (`requirements.txt` stands for every requirements file)
    pub name: &'static str,
    /// Ecosystem of the format
    pub ecosystem: Ecosystem,
    /// Manifest or lockfile
    pub kind: FileKind,
    /// Whether an adapter exists
    pub supported: bool,
}

const fn format(name: &'static str, ecosystem: Ecosystem, kind: FileKind, supported: bool) -> FileFormat {
    FileFormat {
        name,
        ecosystem,
        kind,
        supported,
    }
}

const REQUIREMENTS: FileFormat = format("requirements.txt", Ecosystem::Pip, FileKind::Manifest, true);

/// Every format the engine knows about, keyed by file name
pub const FORMATS: &[FileFormat] = &[
    format("package.json", Ecosystem::Npm, FileKind::Manifest, true),
    format("package-lock.json", Ecosystem::Npm, FileKind::Lockfile, true),
    format("npm-shrinkwrap.json", Ecosystem::Npm, FileKind::Lockfile, true),
    format("yarn.lock", Ecosystem::Npm, FileKind::Lockfile, false),
    format("pnpm-lock.yaml", Ecosystem::Npm, FileKind::Lockfile, false),
    format("Cargo.toml", Ecosystem::Cargo, FileKind::Manifest, true),
    format("Cargo.lock", Ecosystem::Cargo, FileKind::Lockfile, true),
    REQUIREMENTS,
    format("requirements.lock", Ecosystem::Pip, FileKind::Lockfile, false),
    format("pip.lock", Ecosystem::Pip, FileKind::Lockfile, false),
    format("pyproject.toml", Ecosystem::Pyproject, FileKind::Manifest, true),
    format("poetry.lock", Ecosystem::Pyproject, FileKind::Lockfile, false),
    format("uv.lock", Ecosystem::Pyproject, FileKind::Lockfile, false),
    format("pdm.lock", Ecosystem::Pyproject, FileKind::Lockfile, false),
    format("Gemfile", Ecosystem::Gem, FileKind::Manifest, true),
    format("Gemfile.lock", Ecosystem::Gem, FileKind::Lockfile, true),
    format("mix.exs", Ecosystem::Hex, FileKind::Manifest, true),
    format("mix.lock", Ecosystem::Hex, FileKind::Lockfile, false),
    format("pom.xml", Ecosystem::Maven, FileKind::Manifest, true),
    format("build.gradle", Ecosystem::Maven, FileKind::Manifest, false),
    format("build.gradle.kts", Ecosystem::Maven, FileKind::Manifest, false),
    format("go.mod", Ecosystem::Go, FileKind::Manifest, true),
    format("go.sum", Ecosystem::Go, FileKind::Lockfile, false),
];

/// Returns true for pip requirement files: `requirements*.txt`, or any
/// `.txt` file inside a `requirements/` directory
fn is_requirements_file(path: &Path, name: &str) -> bool {
    if !name.ends_with(".txt") {
        return false;
    }
    name.starts_with("requirements")
        || path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .is_some_and(|dir| dir == "requirements")
}

/// Recognize the format of a file from its name
pub fn recognize(path: &Path) -> Option<FileFormat> {
    let name = path.file_name()?.to_str()?;
    if let Some(format) = FORMATS.iter().find(|f| f.name == name) {
        return Some(*format);
    }
    is_requirements_file(path, name).then_some(REQUIREMENTS)
}

/// Get the adapter for a supported format
pub fn get_adapter(format: &FileFormat) -> Option<Box<dyn ManifestAdapter>> {
    if !format.supported {
        return None;
    }
    let adapter: Box<dyn ManifestAdapter> = match format.name {
        "package.json" => Box::new(PackageJsonParser),
        "package-lock.json" | "npm-shrinkwrap.json" => Box::new(PackageLockParser),
        "Cargo.toml" => Box::new(CargoTomlParser),
        "Cargo.lock" => Box::new(CargoLockParser),
        "requirements.txt" => Box::new(RequirementsTxtParser),
        "pyproject.toml" => Box::new(PyprojectTomlParser),
        "Gemfile" => Box::new(GemfileParser),
        "Gemfile.lock" => Box::new(GemfileLockParser),
        "mix.exs" => Box::new(MixExsParser),
        "pom.xml" => Box::new(PomXmlParser),
        "go.mod" => Box::new(GoModParser),
        _ => return None,
    };
    Some(adapter)
}

/// Parse one file's contents, dispatching on its name
pub fn parse_file(path: &Path, content: &str) -> Result<GraphFragment, ManifestError> {
    let format = recognize(path).ok_or_else(|| ManifestError::Unrecognized {
        path: path.to_path_buf(),
    })?;
    let adapter = get_adapter(&format).ok_or_else(|| ManifestError::unsupported(path, format.name))?;
    adapter.parse(content, path)
}

/// Empty lockfile fragment for a recognized lockfile without an adapter, so
/// that its manifest still counts as locked
pub fn lockfile_marker(path: &Path) -> Option<GraphFragment> {
    let format = recognize(path)?;
    (format.kind == FileKind::Lockfile).then(|| GraphFragment::lockfile(path, format.ecosystem, Vec::new()))
}

/// Line lookups over file contents, 1-based
pub(crate) struct LineIndex<'a> {
    lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines().collect(),
        }
    }

    /// First line at or after `from` satisfying `predicate`
    pub(crate) fn find_where(&self, from: usize, predicate: impl Fn(&str) -> bool) -> Option<usize> {
        let start = from.max(1) - 1;
        self.lines
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, line)| predicate(line))
            .map(|(index, _)| index + 1)
    }

    /// First line at or after `from` containing `needle`
    pub(crate) fn find(&self, from: usize, needle: &str) -> Option<usize> {
        self.find_where(from, |line| line.contains(needle))
    }

    /// First line at or after `from` whose content starts with the quoted `key`
    pub(crate) fn find_key(&self, from: usize, key: &str) -> Option<usize> {
        let quoted = format!("\"{}\"", key);
        self.find_where(from, |line| line.trim_start().starts_with(&quoted))
    }

    /// Line of a TOML table header such as `[dev-dependencies]`
    pub(crate) fn find_header(&self, header: &str) -> Option<usize> {
        let wanted = format!("[{}]", header);
        self.find_where(1, |line| line.trim() == wanted)
    }

    /// First line at or after `from` assigning the TOML `key`
    /// (`key = ..`, `"key" = ..`, `key.version = ..`)
    pub(crate) fn find_toml_key(&self, from: usize, key: &str) -> Option<usize> {
        let quoted = format!("\"{}\"", key);
        self.find_where(from, |line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix(quoted.as_str())
                .or_else(|| trimmed.strip_prefix(key))
                .is_some_and(|rest| rest.trim_start().starts_with(['=', '.']))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_recognize_by_name() {
        let format = recognize(Path::new("/repo/package.json")).unwrap();
        assert_eq!(format.ecosystem, Ecosystem::Npm);
        assert_eq!(format.kind, FileKind::Manifest);
        assert!(format.supported);

        let format = recognize(Path::new("Cargo.lock")).unwrap();
        assert_eq!(format.kind, FileKind::Lockfile);
    }

    #[test]
    fn test_recognize_requirements_variants() {
        assert_eq!(recognize(Path::new("requirements-dev.txt")), Some(REQUIREMENTS));
        assert_eq!(recognize(Path::new("requirements/base.txt")), Some(REQUIREMENTS));
        assert_eq!(recognize(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_recognize_unsupported_formats() {
        for name in ["yarn.lock", "pnpm-lock.yaml", "poetry.lock", "go.sum", "build.gradle"] {
            let format = recognize(Path::new(name)).unwrap();
            assert!(!format.supported, "{name} should be unsupported");
        }
        assert!(recognize(Path::new("composer.json")).is_none());
    }

    #[test]
    fn test_parse_file_errors() {
        let err = parse_file(Path::new("README.md"), "").unwrap_err();
        assert!(matches!(err, ManifestError::Unrecognized { .. }));

        let err = parse_file(Path::new("yarn.lock"), "").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_parse_file_dispatch() {
        let fragment = parse_file(
            Path::new("/repo/package.json"),
            r#"{"dependencies": {"left-pad": "^1.0.0"}}"#,
        )
        .unwrap();
        assert_eq!(fragment.record.path, PathBuf::from("/repo/package.json"));
        assert_eq!(fragment.dependencies.len(), 1);
    }

    #[test]
    fn test_lockfile_marker() {
        let marker = lockfile_marker(Path::new("/repo/yarn.lock")).unwrap();
        assert!(marker.record.is_lockfile());
        assert!(marker.packages.is_empty());
        assert!(lockfile_marker(Path::new("/repo/package.json")).is_none());
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("{\n  \"a\": 1,\n  \"b\": 2\n}");
        assert_eq!(index.find_key(1, "b"), Some(3));
        assert_eq!(index.find(3, "\"a\""), None);
        assert_eq!(index.find(1, "}"), Some(4));
    }
}
