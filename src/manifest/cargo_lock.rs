//! Cargo.lock parser

use super::{GraphFragment, LineIndex, LockedPackage, LockedRequirement, ManifestAdapter};
use crate::domain::Ecosystem;
use crate::error::ManifestError;
use serde::Deserialize;
use std::path::Path;

/// Parser for Cargo.lock files
pub struct CargoLockParser;

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<LockEntry>,
}

#[derive(Debug, Deserialize)]
struct LockEntry {
    name: String,
    version: String,
    /// Absent for workspace members and path dependencies
    source: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// `"name"`, `"name version"` or `"name version (source)"`
fn parse_requirement(entry: &str) -> LockedRequirement {
    let mut parts = entry.split_whitespace();
    let name = parts.next().unwrap_or(entry);
    LockedRequirement::new(name, parts.next())
}

impl ManifestAdapter for CargoLockParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let lock: CargoLock = toml::from_str(content)
            .map_err(|e| ManifestError::toml_parse_error(path, content, &e))?;

        let lines = LineIndex::new(content);
        let mut cursor = 1;
        let packages = lock
            .package
            .into_iter()
            .map(|entry| {
                let needle = format!("name = \"{}\"", entry.name);
                let line = lines.find(cursor, &needle);
                if let Some(line) = line {
                    cursor = line + 1;
                }
                let mut package = LockedPackage::new(entry.name, &entry.version)
                    .with_line(line)
                    .with_root(entry.source.is_none());
                package.dependencies = entry
                    .dependencies
                    .iter()
                    .map(|d| parse_requirement(d))
                    .collect();
                package
            })
            .collect();

        Ok(GraphFragment::lockfile(path, Ecosystem::Cargo, packages))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK: &str = r#"# This file is automatically @generated by Cargo.
version = 3

[[package]]
name = "app"
version = "0.1.0"
dependencies = [
 "anyhow",
 "syn 2.0.39",
]

[[package]]
name = "anyhow"
version = "1.0.75"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "syn"
version = "1.0.109"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "syn"
version = "2.0.39"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

    fn parse(content: &str) -> Result<GraphFragment, ManifestError> {
        CargoLockParser.parse(content, Path::new("Cargo.lock"))
    }

    #[test]
    fn test_parse_packages() {
        let fragment = parse(LOCK).unwrap();
        assert_eq!(fragment.packages.len(), 4);

        let app = &fragment.packages[0];
        assert!(app.root);
        assert_eq!(app.line, Some(5));
        assert_eq!(app.dependencies[0].name, "anyhow");
        assert_eq!(app.dependencies[0].requirement, None);
        assert_eq!(app.dependencies[1].requirement.as_deref(), Some("2.0.39"));

        let anyhow = &fragment.packages[1];
        assert!(!anyhow.root);
        assert_eq!(anyhow.version.as_str(), "1.0.75");
    }

    #[test]
    fn test_parse_line_of_repeated_names() {
        let fragment = parse(LOCK).unwrap();
        assert_eq!(fragment.packages[2].line, Some(18));
        assert_eq!(fragment.packages[3].line, Some(23));
    }

    #[test]
    fn test_parse_requirement_with_source() {
        let req = parse_requirement("serde 1.0.190 (registry+https://github.com/rust-lang/crates.io-index)");
        assert_eq!(req.name, "serde");
        assert_eq!(req.requirement.as_deref(), Some("1.0.190"));
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse("[[package]]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::ParseError { .. }));
    }
}
