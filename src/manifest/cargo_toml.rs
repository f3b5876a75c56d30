//! Cargo.toml parser for Rust projects
//!
//! Handles:
//! - dependencies
//! - dev-dependencies
//! - build-dependencies
//! - Target-specific tables: `[target.'cfg(unix)'.dependencies]`
//! - Inline table format: `{ version = "1.0" }`
//! - Renamed packages: `{ package = "real-name" }`
//! - Workspace dependencies and `{ workspace = true }` inheritance
//! - Path and git dependencies (kept, but never looked up)

use super::{GraphFragment, LineIndex, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, PackageSource, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use std::path::Path;
use toml::{Table, Value};

/// Parser for Cargo.toml files
pub struct CargoTomlParser;

const SECTIONS: &[(&str, Scope)] = &[
    ("dependencies", Scope::Runtime),
    ("dev-dependencies", Scope::Dev),
    ("build-dependencies", Scope::Build),
];

impl ManifestAdapter for CargoTomlParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let toml: Table = toml::from_str(content)
            .map_err(|e| ManifestError::toml_parse_error(path, content, &e))?;

        let lines = LineIndex::new(content);
        let mut ctx = CargoContext {
            path,
            content,
            lines: &lines,
            output: Vec::new(),
        };

        for (section, scope) in SECTIONS {
            if let Some(deps) = toml.get(*section).and_then(|d| d.as_table()) {
                ctx.parse_table(deps, section, *scope);
            }
        }

        if let Some(target) = toml.get("target").and_then(|t| t.as_table()) {
            for (target_name, target_config) in target {
                for (section, scope) in SECTIONS {
                    if let Some(deps) = target_config.get(*section).and_then(|d| d.as_table()) {
                        let full_section = format!("target.{}.{}", target_name, section);
                        ctx.parse_table(deps, &full_section, *scope);
                    }
                }
            }
        }

        if let Some(deps) = toml
            .get("workspace")
            .and_then(|w| w.get("dependencies"))
            .and_then(|d| d.as_table())
        {
            ctx.parse_table(deps, "workspace.dependencies", Scope::Runtime);
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Cargo, ctx.output))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }
}

struct CargoContext<'a> {
    path: &'a Path,
    content: &'a str,
    lines: &'a LineIndex<'a>,
    output: Vec<Dependency>,
}

impl CargoContext<'_> {
    /// Line of the table header, tolerating quoting differences in target names
    fn header_line(&self, section: &str) -> usize {
        if let Some(line) = self.lines.find_header(section) {
            return line;
        }
        if let Some(rest) = section.strip_prefix("target.") {
            let (target, table) = rest.rsplit_once('.').unwrap_or((rest, ""));
            let suffix = format!(".{}]", table);
            if let Some(line) = self.lines.find_where(1, |l| {
                let l = l.trim();
                l.starts_with("[target.") && l.contains(target) && l.ends_with(&suffix)
            }) {
                return line;
            }
        }
        1
    }

    fn parse_table(&mut self, deps: &Table, section: &str, scope: Scope) {
        let header = self.header_line(section);
        let mut entries = Vec::new();

        for (index, (key, value)) in deps.iter().enumerate() {
            let line = self
                .lines
                .find_header(&format!("{}.{}", section, key))
                .or_else(|| self.lines.find_toml_key(header, key));
            let source = SourceLocation::new(self.path, section).with_line(line, self.content);
            let (name, constraint, origin, optional) = cargo_entry(key, value);
            let scope = if optional && scope == Scope::Runtime {
                Scope::Optional
            } else {
                scope
            };
            let dep = Dependency::new(Ecosystem::Cargo, name, constraint, scope, source)
                .with_origin(origin)
                .with_position(line.unwrap_or(index));
            entries.push(dep);
        }

        entries.sort_by_key(|d| d.position);
        self.output.extend(entries);
    }
}

/// Name, constraint, source and optional flag of one dependency entry
fn cargo_entry(key: &str, value: &Value) -> (String, Constraint, PackageSource, bool) {
    match value {
        // Simple string: package = "1.0.0"
        Value::String(s) => (
            key.to_string(),
            parse_constraint(Ecosystem::Cargo, s),
            PackageSource::Registry,
            false,
        ),
        // Inline or dotted table: package = { version = "1.0.0", features = [...] }
        Value::Table(t) => {
            let name = t
                .get("package")
                .and_then(|p| p.as_str())
                .unwrap_or(key)
                .to_string();
            let optional = t.get("optional").and_then(|o| o.as_bool()).unwrap_or(false);
            let version = t.get("version").and_then(|v| v.as_str());

            let origin = if t.contains_key("path") {
                PackageSource::Path
            } else if t.contains_key("git") {
                PackageSource::Git
            } else {
                PackageSource::Registry
            };

            let constraint = match version {
                Some(version) => parse_constraint(Ecosystem::Cargo, version),
                None if t.get("workspace").and_then(|w| w.as_bool()).unwrap_or(false) => {
                    Constraint::unparsed("workspace = true")
                }
                None => {
                    let location = t
                        .get("path")
                        .or_else(|| t.get("git"))
                        .and_then(|l| l.as_str())
                        .unwrap_or_default();
                    Constraint::unparsed(location)
                }
            };
            (name, constraint, origin, optional)
        }
        _ => (
            key.to_string(),
            Constraint::unparsed(value.to_string()),
            PackageSource::Registry,
            false,
        ),
    }
}
