//! mix.exs parser for Elixir projects
//!
//! Reads the tuples of the `defp deps do` block:
//! `{:ecto, "~> 3.7"}`, `{:credo, "~> 1.7", only: [:dev, :test], runtime: false}`.
//! git and path dependencies are kept with their source but never looked up.

use super::{GraphFragment, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, PackageSource, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Parser for mix.exs files
pub struct MixExsParser;

static DEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\{\s*:(\w+)\s*(?:,\s*"([^"]*)")?\s*(?:,(.*?))?\}?\s*,?\s*$"#).unwrap()
});

static ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"only:\s*(\[[^\]]*\]|:\w+)").unwrap());

static SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(git|github|path):\s*"([^"]*)""#).unwrap());

fn dependency_scope(options: &str) -> Scope {
    let Some(caps) = ONLY_RE.captures(options) else {
        return Scope::Runtime;
    };
    let envs = &caps[1];
    if envs.contains(":prod") {
        Scope::Runtime
    } else {
        Scope::Dev
    }
}

impl ManifestAdapter for MixExsParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let mut dependencies = Vec::new();
        let mut in_deps = false;

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.starts_with("defp deps do") || trimmed.starts_with("defp deps() do") {
                in_deps = true;
                continue;
            }
            if !in_deps {
                continue;
            }
            if trimmed == "end" {
                break;
            }
            if !trimmed.starts_with('{') {
                continue;
            }

            let Some(caps) = DEP_RE.captures(trimmed) else {
                continue;
            };
            let line_number = index + 1;
            let name = &caps[1];
            let requirement = caps.get(2).map(|m| m.as_str());
            let options = caps.get(3).map(|m| m.as_str()).unwrap_or("");

            let (constraint, origin) = match SOURCE_RE.captures(options) {
                Some(source) => {
                    let origin = if &source[1] == "path" {
                        PackageSource::Path
                    } else {
                        PackageSource::Git
                    };
                    (Constraint::unparsed(&source[2]), origin)
                }
                None => (
                    parse_constraint(Ecosystem::Hex, requirement.unwrap_or("")),
                    PackageSource::Registry,
                ),
            };

            let source = SourceLocation::new(path, "deps").with_line(Some(line_number), content);
            dependencies.push(
                Dependency::new(Ecosystem::Hex, name, constraint, dependency_scope(options), source)
                    .with_origin(origin)
                    .with_position(line_number),
            );
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Hex, dependencies))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Hex
    }
}
