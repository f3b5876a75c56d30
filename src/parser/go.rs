//! Go module version parser
//!
//! Handles version formats:
//! - Semantic version: `v1.2.3`
//! - Prerelease: `v1.2.3-beta.1`
//! - Pseudo-version: `v0.0.0-20210101120000-abcdef123456`
//! - Incompatible: `v2.0.0+incompatible`
//!
//! A `require` line names the minimum version; minimal version selection
//! may pick anything newer within the same major module path.

use super::ConstraintParser;
use crate::domain::{go_minimum, Constraint, ConstraintKind, Ecosystem, Version};
use regex::Regex;
use std::sync::LazyLock;

/// Go module version parser
pub struct GoConstraintParser;

// v1.2.3, v1.2.3-beta.1, v0.0.0-20210101120000-abcdef123456, v2.0.0+incompatible
static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(\d+\.\d+\.\d+)(?:-[0-9A-Za-z.-]+)?(?:\+incompatible)?$").unwrap()
});

impl ConstraintParser for GoConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();

        if !SEMVER_RE.is_match(trimmed) {
            return None;
        }

        let version = Version::parse(trimmed);
        Some(
            Constraint::new(
                ConstraintKind::Minimum,
                trimmed,
                Some(trimmed),
                vec![go_minimum(&version)],
            )
            .with_prefix("v"),
        )
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }
}
