//! Gemfile parser for Ruby projects
//!
//! Handles:
//! - gem declarations with one or more version constraints
//! - `group :development, :test do` blocks and `group:` options
//! - path, git and github sources (kept, but never looked up)
//!
//! The Gemfile is Ruby code; it is read line by line and never evaluated.

use super::{GraphFragment, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, PackageSource, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Parser for Gemfile files
pub struct GemfileParser;

// gem 'name', '~> 1.2', '>= 1.2.1', require: false
static GEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^gem\s*\(?\s*['"]([^'"]+)['"]((?:\s*,\s*['"][^'"]*['"])*)\s*,?(.*)$"#).unwrap()
});

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"['"]([^'"]*)['"]"#).unwrap());

static GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^group\s*\(?\s*((?::\w+\s*,?\s*)+)\)?\s*do\b").unwrap());

// group: :test, groups: [:development, :test], :group => :test
static GROUP_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bgroups?:|:groups?\s*=>)\s*(\[[^\]]*\]|:\w+)").unwrap()
});

static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":(\w+)").unwrap());

const DEV_GROUPS: &[&str] = &["development", "test"];

fn symbols(text: &str) -> Vec<String> {
    SYMBOL_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Source of a gem from its trailing options
fn gem_origin(options: &str) -> PackageSource {
    if options.contains("path:") || options.contains(":path =>") {
        PackageSource::Path
    } else if ["git:", "github:", ":git =>", ":github =>"]
        .iter()
        .any(|o| options.contains(o))
    {
        PackageSource::Git
    } else {
        PackageSource::Registry
    }
}

impl ManifestAdapter for GemfileParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let mut dependencies = Vec::new();
        // One entry per open `do` block; only group blocks carry names
        let mut blocks: Vec<Vec<String>> = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = match line.find(" #") {
                Some(i) => line[..i].trim(),
                None => line.trim(),
            };
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(caps) = GROUP_RE.captures(trimmed) {
                blocks.push(symbols(&caps[1]));
                continue;
            }
            if trimmed == "end" {
                blocks.pop();
                continue;
            }
            if trimmed.ends_with(" do") || trimmed.contains(" do |") {
                blocks.push(Vec::new());
                continue;
            }

            let Some(caps) = GEM_RE.captures(trimmed) else {
                continue;
            };
            let name = &caps[1];
            let clauses: Vec<String> = QUOTED_RE
                .captures_iter(&caps[2])
                .map(|c| c[1].trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            let options = caps.get(3).map(|m| m.as_str()).unwrap_or("");

            let mut groups: Vec<String> = blocks.iter().flatten().cloned().collect();
            if let Some(option) = GROUP_OPTION_RE.captures(options) {
                groups.extend(symbols(&option[1]));
            }
            let scope = if groups.iter().any(|g| DEV_GROUPS.contains(&g.as_str())) {
                Scope::Dev
            } else {
                Scope::Runtime
            };
            let section = if groups.is_empty() {
                "default".to_string()
            } else {
                format!("group :{}", groups.join(", :"))
            };

            let origin = gem_origin(options);
            let constraint = match origin {
                PackageSource::Registry => parse_constraint(Ecosystem::Gem, &clauses.join(", ")),
                _ => Constraint::unparsed(options.trim()),
            };

            let source = SourceLocation::new(path, section).with_line(Some(line_number), content);
            dependencies.push(
                Dependency::new(Ecosystem::Gem, name, constraint, scope, source)
                    .with_origin(origin)
                    .with_position(line_number),
            );
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Gem, dependencies))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Gem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConstraintKind;

    fn parse(content: &str) -> Vec<Dependency> {
        GemfileParser
            .parse(content, Path::new("Gemfile"))
            .unwrap()
            .dependencies
    }

    #[test]
    fn test_parse_gems() {
        let content = r#"source "https://rubygems.org"

gem 'rails', '~> 7.0.4'
gem "puma", ">= 5.0"
gem 'bootsnap', require: false
"#;
        let deps = parse(content);
        assert_eq!(deps.len(), 3);

        assert_eq!(deps[0].name, "rails");
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Pessimistic);
        assert_eq!(deps[0].source.line, Some(3));
        assert_eq!(deps[0].scope, Scope::Runtime);

        assert_eq!(deps[1].constraint.kind, ConstraintKind::GreaterOrEqual);
        assert!(deps[2].constraint.is_any_tag());
    }

    #[test]
    fn test_parse_multiple_constraints() {
        let deps = parse("gem 'nokogiri', '~> 1.15', '>= 1.15.2'\n");
        assert_eq!(deps[0].constraint.raw, "~> 1.15, >= 1.15.2");
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Range);
    }

    #[test]
    fn test_parse_groups() {
        let content = r#"gem 'rails', '~> 7.0'

group :development, :test do
  gem 'rspec-rails', '~> 6.0'
  platforms :mri do
    gem 'byebug'
  end
end

gem 'pg'
gem 'capybara', group: :test
"#;
        let deps = parse(content);
        let scope_of = |name: &str| deps.iter().find(|d| d.name == name).unwrap().scope;
        assert_eq!(scope_of("rails"), Scope::Runtime);
        assert_eq!(scope_of("rspec-rails"), Scope::Dev);
        assert_eq!(scope_of("byebug"), Scope::Dev);
        assert_eq!(scope_of("pg"), Scope::Runtime);
        assert_eq!(scope_of("capybara"), Scope::Dev);

        let rspec = deps.iter().find(|d| d.name == "rspec-rails").unwrap();
        assert_eq!(rspec.source.section, "group :development, :test");
    }

    #[test]
    fn test_parse_git_and_path_sources() {
        let content = "gem 'engine', path: 'engines/engine'\ngem 'forked', github: 'me/forked'\n";
        let deps = parse(content);
        assert_eq!(deps[0].origin, PackageSource::Path);
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Unparsed);
        assert_eq!(deps[1].origin, PackageSource::Git);
    }

    #[test]
    fn test_parse_ignores_comments() {
        let deps = parse("# gem 'old'\ngem 'new' # replaces old\n");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "new");
    }
}
