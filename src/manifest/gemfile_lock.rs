//! Gemfile.lock parser
//!
//! Reads the `specs:` lists of the GEM, PATH and GIT sections. Gems from PATH
//! and GIT sources are the project's own and are marked as roots.

use super::{GraphFragment, LockedPackage, LockedRequirement, ManifestAdapter};
use crate::domain::Ecosystem;
use crate::error::ManifestError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Parser for Gemfile.lock files
pub struct GemfileLockParser;

// `    name (version)` or `      name (requirement)`
static SPEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s+)([^\s(]+)(?:\s+\(([^)]*)\))?\s*$").unwrap());

/// Drops the platform suffix: `1.15.4-x86_64-linux` → `1.15.4`
fn strip_platform(version: &str) -> &str {
    version.split('-').next().unwrap_or(version)
}

impl ManifestAdapter for GemfileLockParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let mut packages: Vec<LockedPackage> = Vec::new();
        let mut section = "";
        let mut in_specs = false;

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                in_specs = false;
                continue;
            }
            if !line.starts_with(' ') {
                section = line.trim();
                in_specs = false;
                continue;
            }
            if line.trim() == "specs:" {
                in_specs = true;
                continue;
            }
            if !in_specs || !matches!(section, "GEM" | "PATH" | "GIT") {
                continue;
            }

            let Some(caps) = SPEC_RE.captures(line) else {
                return Err(ManifestError::parse_error(
                    path,
                    Some(index + 1),
                    format!("invalid spec line '{}'", line.trim()),
                ));
            };
            let indent = caps[1].len();
            let name = &caps[2];
            let detail = caps.get(3).map(|m| m.as_str());

            match indent {
                4 => {
                    let version = strip_platform(detail.unwrap_or("0.0.0"));
                    packages.push(
                        LockedPackage::new(name, version)
                            .with_line(Some(index + 1))
                            .with_root(section != "GEM"),
                    );
                }
                6 => {
                    if let Some(parent) = packages.last_mut() {
                        parent
                            .dependencies
                            .push(LockedRequirement::new(name, detail));
                    }
                }
                _ => {}
            }
        }

        Ok(GraphFragment::lockfile(path, Ecosystem::Gem, packages))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Gem
    }
}
