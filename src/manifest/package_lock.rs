//! package-lock.json / npm-shrinkwrap.json parser
//!
//! Handles:
//! - lockfileVersion 2 and 3 (`packages` map keyed by install path)
//! - lockfileVersion 1 (nested `dependencies` with `requires`)

use super::{GraphFragment, LineIndex, LockedPackage, LockedRequirement, ManifestAdapter};
use crate::domain::Ecosystem;
use crate::error::ManifestError;
use serde_json::{Map, Value};
use std::path::Path;

/// Parser for npm lockfiles
pub struct PackageLockParser;

/// Edge sections of a v2/v3 package entry
const EDGE_SECTIONS: &[&str] = &[
    "dependencies",
    "optionalDependencies",
    "peerDependencies",
];

/// The root entry also lists its dev dependencies
const ROOT_EDGE_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

impl ManifestAdapter for PackageLockParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let json: Value =
            serde_json::from_str(content).map_err(|e| ManifestError::json_parse_error(path, &e))?;
        let root = json
            .as_object()
            .ok_or_else(|| ManifestError::parse_error(path, Some(1), "expected a JSON object"))?;
        let lines = LineIndex::new(content);

        let packages = if let Some(packages) = root.get("packages").and_then(|p| p.as_object()) {
            parse_packages_map(packages, &lines)
        } else if let Some(dependencies) = root.get("dependencies").and_then(|d| d.as_object()) {
            let mut packages = Vec::new();
            parse_v1_dependencies(dependencies, &lines, &mut packages);
            packages
        } else {
            Vec::new()
        };

        Ok(GraphFragment::lockfile(path, Ecosystem::Npm, packages))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }
}

fn requirements(entry: &Map<String, Value>, sections: &[&str]) -> Vec<LockedRequirement> {
    sections
        .iter()
        .filter_map(|section| entry.get(*section).and_then(|d| d.as_object()))
        .flat_map(|deps| {
            deps.iter()
                .map(|(name, range)| LockedRequirement::new(name.clone(), range.as_str()))
        })
        .collect()
}

/// Package name from an install path: `node_modules/a/node_modules/@s/b` → `@s/b`
fn name_from_key(key: &str) -> &str {
    match key.rfind("node_modules/") {
        Some(index) => &key[index + "node_modules/".len()..],
        None => key,
    }
}

fn parse_packages_map(packages: &Map<String, Value>, lines: &LineIndex<'_>) -> Vec<LockedPackage> {
    let mut output = Vec::new();
    for (key, entry) in packages {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        // Symlinks to workspace members carry no version of their own
        if entry.get("link").and_then(|l| l.as_bool()).unwrap_or(false) {
            continue;
        }

        let is_root = key.is_empty() || !key.contains("node_modules/");
        let name = entry
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_else(|| name_from_key(key));
        let version = entry
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("0.0.0");
        let sections = if is_root { ROOT_EDGE_SECTIONS } else { EDGE_SECTIONS };

        let mut package = LockedPackage::new(name, version)
            .with_line(lines.find_key(1, key))
            .with_root(is_root);
        package.dependencies = requirements(entry, sections);
        output.push(package);
    }
    output
}

fn parse_v1_dependencies(
    dependencies: &Map<String, Value>,
    lines: &LineIndex<'_>,
    output: &mut Vec<LockedPackage>,
) {
    for (name, entry) in dependencies {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let Some(version) = entry.get("version").and_then(|v| v.as_str()) else {
            continue;
        };
        let mut package = LockedPackage::new(name.clone(), version).with_line(lines.find_key(1, name));
        package.dependencies = requirements(entry, &["requires"]);
        output.push(package);

        if let Some(nested) = entry.get("dependencies").and_then(|d| d.as_object()) {
            parse_v1_dependencies(nested, lines, output);
        }
    }
}
