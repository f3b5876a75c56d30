//! package.json parser for npm projects
//!
//! Handles:
//! - dependencies
//! - devDependencies
//! - peerDependencies
//! - optionalDependencies
//!
//! JSON objects lose their key order once parsed, so declaration order and
//! line numbers are recovered from the text.

use super::{GraphFragment, LineIndex, ManifestAdapter};
use crate::domain::{Dependency, Ecosystem, PackageSource, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use serde_json::{Map, Value};
use std::path::Path;

/// Parser for package.json files
pub struct PackageJsonParser;

const SECTIONS: &[(&str, Scope)] = &[
    ("dependencies", Scope::Runtime),
    ("devDependencies", Scope::Dev),
    ("peerDependencies", Scope::Peer),
    ("optionalDependencies", Scope::Optional),
];

impl ManifestAdapter for PackageJsonParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let json: Value =
            serde_json::from_str(content).map_err(|e| ManifestError::json_parse_error(path, &e))?;
        let root = json
            .as_object()
            .ok_or_else(|| ManifestError::parse_error(path, Some(1), "expected a JSON object"))?;

        let lines = LineIndex::new(content);
        let mut dependencies = Vec::new();

        for (section, scope) in SECTIONS {
            let Some(value) = root.get(*section) else {
                continue;
            };
            let deps = value.as_object().ok_or_else(|| {
                let line = lines.find_key(1, section);
                ManifestError::parse_error(path, line, format!("'{}' must be an object", section))
            })?;
            parse_dependency_object(deps, section, *scope, path, content, &lines, &mut dependencies);
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Npm, dependencies))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }
}

/// Where an npm specifier points when it is not a registry range
pub(crate) fn npm_origin(spec: &str) -> PackageSource {
    let spec = spec.trim();
    if ["file:", "link:", "workspace:", "portal:"]
        .iter()
        .any(|p| spec.starts_with(p))
        || spec.starts_with("./")
        || spec.starts_with("../")
    {
        PackageSource::Path
    } else if spec.starts_with("git")
        || spec.starts_with("github:")
        || spec.starts_with("gitlab:")
        || spec.starts_with("bitbucket:")
        || (spec.contains('/') && !spec.contains(':') && !spec.starts_with('@'))
    {
        PackageSource::Git
    } else if spec.starts_with("http://") || spec.starts_with("https://") {
        PackageSource::Url
    } else {
        PackageSource::Registry
    }
}

fn parse_dependency_object(
    deps: &Map<String, Value>,
    section: &str,
    scope: Scope,
    path: &Path,
    content: &str,
    lines: &LineIndex<'_>,
    output: &mut Vec<Dependency>,
) {
    let section_line = lines.find_key(1, section).unwrap_or(1);
    let mut entries: Vec<Dependency> = deps
        .iter()
        .enumerate()
        .map(|(index, (name, value))| {
            let spec = value.as_str().unwrap_or_default();
            let line = lines.find_key(section_line, name);
            let source = SourceLocation::new(path, section).with_line(line, content);
            Dependency::new(
                Ecosystem::Npm,
                name.clone(),
                parse_constraint(Ecosystem::Npm, spec),
                scope,
                source,
            )
            .with_origin(npm_origin(spec))
            .with_position(line.unwrap_or(index))
        })
        .collect();
    entries.sort_by_key(|d| d.position);
    output.extend(entries);
}
