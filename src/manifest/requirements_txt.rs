//! requirements.txt parser for pip projects
//!
//! Handles:
//! - PEP 508 requirement lines: `requests[socks]>=2.31,<3 ; python_version >= "3.8"`
//! - Direct references: `name @ https://...`
//! - Comments, blank lines and line continuations
//!
//! Option lines (`-r`, `-e`, `-c`, `--index-url`) and bare URLs are skipped.

use super::{GraphFragment, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, PackageSource, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Parser for pip requirement files
pub struct RequirementsTxtParser;

// name, optional extras, rest of the specifier
static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(.*)$").unwrap()
});

/// Development requirement files are recognized by name
fn scope_for(path: &Path) -> Scope {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if ["dev", "test", "lint", "docs"].iter().any(|m| name.contains(m)) {
        Scope::Dev
    } else {
        Scope::Runtime
    }
}

/// Splits a PEP 508 requirement into name, constraint and source.
/// Shared with the pyproject adapter.
pub(crate) fn parse_requirement(
    ecosystem: Ecosystem,
    text: &str,
) -> Option<(&str, Constraint, PackageSource)> {
    let caps = REQUIREMENT_RE.captures(text.trim())?;
    let name = caps.get(1)?.as_str();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    // Environment markers and per-requirement options do not constrain the version
    let rest = rest.split(';').next().unwrap_or("");
    let rest = rest.split(" --").next().unwrap_or("").trim();

    Some(match rest.strip_prefix('@') {
        Some(url) => (name, Constraint::unparsed(url.trim()), PackageSource::Url),
        None => (name, parse_constraint(ecosystem, rest), PackageSource::Registry),
    })
}

/// Joins `\` continuations, keeping the line number of the first physical line
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut output = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    for (index, line) in content.lines().enumerate() {
        let (start, mut text) = pending.take().unwrap_or((index + 1, String::new()));
        match line.trim_end().strip_suffix('\\') {
            Some(head) => {
                text.push_str(head);
                text.push(' ');
                pending = Some((start, text));
            }
            None => {
                text.push_str(line);
                output.push((start, text));
            }
        }
    }
    if let Some(rest) = pending {
        output.push(rest);
    }
    output
}

impl ManifestAdapter for RequirementsTxtParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let scope = scope_for(path);
        let section = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("requirements.txt")
            .to_string();
        let mut dependencies = Vec::new();

        for (line_number, line) in logical_lines(content) {
            // Comments start at ` #` or at the beginning of the line
            let line = match line.find(" #") {
                Some(index) => &line[..index],
                None => line.as_str(),
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
                continue;
            }
            if line.contains("://") && !line.contains('@') {
                continue;
            }

            let Some((name, constraint, origin)) = parse_requirement(Ecosystem::Pip, line) else {
                return Err(ManifestError::parse_error(
                    path,
                    Some(line_number),
                    format!("invalid requirement '{}'", line),
                ));
            };

            let source =
                SourceLocation::new(path, section.as_str()).with_line(Some(line_number), content);
            dependencies.push(
                Dependency::new(Ecosystem::Pip, name, constraint, scope, source)
                    .with_origin(origin)
                    .with_position(line_number),
            );
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Pip, dependencies))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Pip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConstraintKind;

    fn parse_at(path: &str, content: &str) -> Result<Vec<Dependency>, ManifestError> {
        RequirementsTxtParser
            .parse(content, Path::new(path))
            .map(|f| f.dependencies)
    }

    fn parse(content: &str) -> Result<Vec<Dependency>, ManifestError> {
        parse_at("requirements.txt", content)
    }

    #[test]
    fn test_parse_requirements() {
        let content = "\
# runtime
requests==2.31.0
flask>=2.0,<3.0
django
";
        let deps = parse(content).unwrap();
        assert_eq!(deps.len(), 3);

        assert_eq!(deps[0].name, "requests");
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Exact);
        assert_eq!(deps[0].source.line, Some(2));

        assert_eq!(deps[1].constraint.kind, ConstraintKind::Range);
        assert_eq!(deps[2].constraint.kind, ConstraintKind::Any);
        assert_eq!(deps[2].scope, Scope::Runtime);
    }

    #[test]
    fn test_parse_extras_markers_and_comments() {
        let content = "requests[socks,security] >= 2.31 ; python_version >= \"3.8\"  # http\n";
        let deps = parse(content).unwrap();
        assert_eq!(deps[0].name, "requests");
        assert_eq!(deps[0].constraint.raw, ">= 2.31");
        assert_eq!(deps[0].constraint.kind, ConstraintKind::GreaterOrEqual);
    }

    #[test]
    fn test_parse_skips_options() {
        let content = "\
-r base.txt
-e git+https://github.com/a/b.git#egg=b
--index-url https://pypi.org/simple
https://example.com/pkg.whl
numpy==1.26.0 --hash=sha256:abc
";
        let deps = parse(content).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "numpy");
        assert_eq!(deps[0].constraint.raw, "==1.26.0");
        assert_eq!(deps[0].source.line, Some(5));
    }

    #[test]
    fn test_parse_continuation() {
        let content = "pandas==2.1.0 \\\n    --hash=sha256:abc\nscipy\n";
        let deps = parse(content).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].constraint.raw, "==2.1.0");
        assert_eq!(deps[1].source.line, Some(3));
    }

    #[test]
    fn test_parse_direct_reference() {
        let deps = parse("pkg @ https://example.com/pkg-1.0.tar.gz\n").unwrap();
        assert_eq!(deps[0].origin, PackageSource::Url);
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Unparsed);
    }

    #[test]
    fn test_dev_file_scope() {
        let deps = parse_at("requirements-dev.txt", "pytest\n").unwrap();
        assert_eq!(deps[0].scope, Scope::Dev);
        assert_eq!(deps[0].source.section, "requirements-dev.txt");
    }

    #[test]
    fn test_parse_invalid_line() {
        let err = parse("requests\n!!!\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }
}
