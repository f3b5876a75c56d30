//! go.mod parser for Go projects
//!
//! Handles:
//! - require statements (single and block)
//! - `// indirect` requirements, recorded with transitive scope
//! - `// pinned` comments for version pinning
//! - replace, exclude and retract directives (skipped)

use super::{GraphFragment, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Parser for go.mod files
pub struct GoModParser;

// Regex for single require: require module/path v1.2.3
static SINGLE_REQUIRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^require\s+(\S+)\s+(v\S+)\s*(//.*)?$").unwrap());

// Regex for require block entry: module/path v1.2.3
static BLOCK_ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+(v\S+)\s*(//.*)?$").unwrap());

static PINNED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//\s*pinned").unwrap());
static INDIRECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//\s*indirect").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Require,
    Skipped,
}

impl ManifestAdapter for GoModParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let mut dependencies = Vec::new();
        let mut block = Block::None;

        for (index, line) in content.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }

            if let Some(directive) = trimmed.strip_suffix('(').map(str::trim) {
                block = match directive {
                    "require" => Block::Require,
                    _ => Block::Skipped,
                };
                continue;
            }
            if trimmed == ")" {
                if block == Block::None {
                    return Err(ManifestError::parse_error(
                        path,
                        Some(line_number),
                        "unexpected ')'",
                    ));
                }
                block = Block::None;
                continue;
            }

            let caps = match block {
                Block::Skipped => continue,
                Block::Require => BLOCK_ENTRY_RE.captures(trimmed),
                Block::None => SINGLE_REQUIRE_RE.captures(trimmed),
            };
            let Some(caps) = caps else {
                if block == Block::Require {
                    return Err(ManifestError::parse_error(
                        path,
                        Some(line_number),
                        format!("invalid require entry '{}'", trimmed),
                    ));
                }
                continue;
            };

            let module = &caps[1];
            let version = &caps[2];
            let comment = caps.get(3).map(|m| m.as_str()).unwrap_or("");

            let constraint = if PINNED_RE.is_match(comment) {
                Constraint::exact(version)
            } else {
                parse_constraint(Ecosystem::Go, version)
            };
            let scope = if INDIRECT_RE.is_match(comment) {
                Scope::Transitive
            } else {
                Scope::Runtime
            };

            let source = SourceLocation::new(path, "require").with_line(Some(line_number), content);
            dependencies.push(
                Dependency::new(Ecosystem::Go, module, constraint, scope, source)
                    .with_position(line_number),
            );
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Go, dependencies))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConstraintKind;

    fn parse(content: &str) -> Result<Vec<Dependency>, ManifestError> {
        GoModParser
            .parse(content, Path::new("go.mod"))
            .map(|f| f.dependencies)
    }

    #[test]
    fn test_parse_require_block() {
        let content = r#"module example.com/app

go 1.21

require (
	github.com/gin-gonic/gin v1.9.1
	golang.org/x/text v0.14.0 // indirect
)
"#;

        let deps = parse(content).unwrap();
        assert_eq!(deps.len(), 2);

        assert_eq!(deps[0].name, "github.com/gin-gonic/gin");
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Minimum);
        assert_eq!(deps[0].constraint.version.as_deref(), Some("v1.9.1"));
        assert_eq!(deps[0].source.line, Some(6));
        assert_eq!(deps[0].scope, Scope::Runtime);

        assert_eq!(deps[1].scope, Scope::Transitive);
    }

    #[test]
    fn test_parse_single_require() {
        let deps = parse("module m\n\nrequire github.com/pkg/errors v0.9.1\n").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "github.com/pkg/errors");
        assert_eq!(deps[0].source.line, Some(3));
    }

    #[test]
    fn test_parse_pinned() {
        let deps = parse("require github.com/pkg/errors v0.9.1 // pinned\n").unwrap();
        assert!(deps[0].constraint.is_pinned());
    }

    #[test]
    fn test_skip_replace_and_exclude() {
        let content = r#"module m

require github.com/a/b v1.0.0

replace (
	github.com/a/b => ../b
)

replace github.com/c/d v1.0.0 => github.com/c/d v1.1.0

exclude (
	github.com/e/f v1.0.0
)
"#;
        let deps = parse(content).unwrap();
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_parse_incompatible_suffix() {
        let deps = parse("require github.com/docker/docker v20.10.24+incompatible\n").unwrap();
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Minimum);
    }

    #[test]
    fn test_parse_invalid_block_entry() {
        let err = parse("require (\n\tbroken\n)\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }
}
