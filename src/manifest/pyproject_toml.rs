//! pyproject.toml parser for Python projects
//!
//! Handles:
//! - project.dependencies (PEP 621)
//! - project.optional-dependencies (PEP 621)
//! - tool.poetry.dependencies (Poetry)
//! - tool.poetry.dev-dependencies (Poetry)
//! - tool.poetry.group.<name>.dependencies (Poetry 1.2+)

use super::requirements_txt::parse_requirement;
use super::{GraphFragment, LineIndex, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, PackageSource, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use std::path::Path;
use toml::{Table, Value};

/// Parser for pyproject.toml files
pub struct PyprojectTomlParser;

/// Scope of a named extra or dependency group
fn group_scope(group: &str, fallback: Scope) -> Scope {
    let group = group.to_lowercase();
    if ["dev", "test", "lint", "docs"].iter().any(|m| group.contains(m)) {
        Scope::Dev
    } else {
        fallback
    }
}

impl ManifestAdapter for PyprojectTomlParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let toml: Table = toml::from_str(content)
            .map_err(|e| ManifestError::toml_parse_error(path, content, &e))?;

        let lines = LineIndex::new(content);
        let mut ctx = PyprojectContext {
            path,
            content,
            lines: &lines,
            output: Vec::new(),
        };

        if let Some(project) = toml.get("project").and_then(|p| p.as_table()) {
            if let Some(deps) = project.get("dependencies").and_then(|d| d.as_array()) {
                ctx.parse_pep621(deps, "project.dependencies", "project", Scope::Runtime);
            }

            if let Some(optional) = project.get("optional-dependencies").and_then(|d| d.as_table()) {
                for (group, deps) in optional {
                    if let Some(deps) = deps.as_array() {
                        let section = format!("project.optional-dependencies.{}", group);
                        ctx.parse_pep621(
                            deps,
                            &section,
                            "project.optional-dependencies",
                            group_scope(group, Scope::Optional),
                        );
                    }
                }
            }
        }

        if let Some(poetry) = toml
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.as_table())
        {
            if let Some(deps) = poetry.get("dependencies").and_then(|d| d.as_table()) {
                ctx.parse_poetry(deps, "tool.poetry.dependencies", Scope::Runtime);
            }

            if let Some(deps) = poetry.get("dev-dependencies").and_then(|d| d.as_table()) {
                ctx.parse_poetry(deps, "tool.poetry.dev-dependencies", Scope::Dev);
            }

            if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
                for (group, config) in groups {
                    if let Some(deps) = config.get("dependencies").and_then(|d| d.as_table()) {
                        let section = format!("tool.poetry.group.{}.dependencies", group);
                        ctx.parse_poetry(deps, &section, group_scope(group, Scope::Optional));
                    }
                }
            }
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Pyproject, ctx.output))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Pyproject
    }
}

struct PyprojectContext<'a> {
    path: &'a Path,
    content: &'a str,
    lines: &'a LineIndex<'a>,
    output: Vec<Dependency>,
}

impl PyprojectContext<'_> {
    /// PEP 508 strings inside an array; `table` is the header the array lives under
    fn parse_pep621(&mut self, deps: &[Value], section: &str, table: &str, scope: Scope) {
        let start = self.lines.find_header(table).unwrap_or(1);
        let mut cursor = start;

        for (index, dep) in deps.iter().enumerate() {
            let Some(text) = dep.as_str() else {
                continue;
            };
            let Some((name, constraint, origin)) = parse_requirement(Ecosystem::Pyproject, text)
            else {
                continue;
            };

            let line = self
                .lines
                .find(cursor, &format!("\"{}\"", text))
                .or_else(|| self.lines.find(cursor, &format!("'{}'", text)));
            if let Some(line) = line {
                cursor = line;
            }

            let source = SourceLocation::new(self.path, section).with_line(line, self.content);
            self.output.push(
                Dependency::new(Ecosystem::Pyproject, name, constraint, scope, source)
                    .with_origin(origin)
                    .with_position(line.unwrap_or(index)),
            );
        }
    }

    fn parse_poetry(&mut self, deps: &Table, section: &str, scope: Scope) {
        let header = self.lines.find_header(section).unwrap_or(1);
        let mut entries = Vec::new();

        for (index, (name, value)) in deps.iter().enumerate() {
            // The interpreter requirement is not a package
            if name.eq_ignore_ascii_case("python") {
                continue;
            }

            let line = self
                .lines
                .find_header(&format!("{}.{}", section, name))
                .or_else(|| self.lines.find_toml_key(header, name));
            let source = SourceLocation::new(self.path, section).with_line(line, self.content);
            let (constraint, origin, optional) = poetry_entry(value);
            let scope = if optional && scope == Scope::Runtime {
                Scope::Optional
            } else {
                scope
            };
            entries.push(
                Dependency::new(Ecosystem::Pyproject, name.as_str(), constraint, scope, source)
                    .with_origin(origin)
                    .with_position(line.unwrap_or(index)),
            );
        }

        entries.sort_by_key(|d| d.position);
        self.output.extend(entries);
    }
}

/// Constraint, source and optional flag of a Poetry dependency value
fn poetry_entry(value: &Value) -> (Constraint, PackageSource, bool) {
    match value {
        Value::String(s) => (
            parse_constraint(Ecosystem::Pyproject, s),
            PackageSource::Registry,
            false,
        ),
        Value::Table(t) => {
            let optional = t.get("optional").and_then(|o| o.as_bool()).unwrap_or(false);
            let (origin, location) = if let Some(p) = t.get("path") {
                (PackageSource::Path, p.as_str())
            } else if let Some(g) = t.get("git") {
                (PackageSource::Git, g.as_str())
            } else if let Some(u) = t.get("url") {
                (PackageSource::Url, u.as_str())
            } else {
                (PackageSource::Registry, None)
            };

            let constraint = match t.get("version").and_then(|v| v.as_str()) {
                Some(version) => parse_constraint(Ecosystem::Pyproject, version),
                None if origin == PackageSource::Registry => Constraint::any(""),
                None => Constraint::unparsed(location.unwrap_or_default()),
            };
            (constraint, origin, optional)
        }
        // Multiple constraints keyed by python version or platform
        other => (
            Constraint::unparsed(other.to_string()),
            PackageSource::Registry,
            false,
        ),
    }
}
