//! Built-in rules
//!
//! Handles:
//! - Declaration hygiene: sorted, no-any-tag, no-duplicates, lockfile
//! - Version quality: no-unstable, no-pre-release, no-multiple-versions
//! - Registry health: max-package-age, no-deprecated, min-weekly-downloads,
//!   allowed-licenses
//! - Drift: max-libyear, max-major-updates, max-minor-updates, max-patch-updates
//! - Graph shape: max-depth, no-cycles

mod declaration;
mod drift;
mod health;
mod shape;
mod version;

pub use declaration::{Lockfile, NoAnyTag, NoDuplicates, Sorted};
pub use drift::{MaxLibyear, MaxUpdates};
pub use health::{AllowedLicenses, MaxPackageAge, MinWeeklyDownloads, NoDeprecated};
pub use shape::{MaxDepth, NoCycles};
pub use version::{NoMultipleVersions, NoPreRelease, NoUnstable};

use super::Rule;
use crate::domain::BumpKind;

/// Every built-in rule, in documentation order
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::Graph(Box::new(Sorted)),
        Rule::Node(Box::new(NoAnyTag)),
        Rule::Graph(Box::new(NoDuplicates)),
        Rule::Node(Box::new(NoUnstable)),
        Rule::Node(Box::new(NoPreRelease)),
        Rule::Graph(Box::new(Lockfile)),
        Rule::Graph(Box::new(NoMultipleVersions)),
        Rule::Node(Box::new(MaxPackageAge)),
        Rule::Node(Box::new(NoDeprecated)),
        Rule::Graph(Box::new(MaxLibyear)),
        Rule::Node(Box::new(MinWeeklyDownloads)),
        Rule::Node(Box::new(AllowedLicenses)),
        Rule::Graph(Box::new(MaxUpdates::new(BumpKind::Major))),
        Rule::Graph(Box::new(MaxUpdates::new(BumpKind::Minor))),
        Rule::Graph(Box::new(MaxUpdates::new(BumpKind::Patch))),
        Rule::Graph(Box::new(MaxDepth)),
        Rule::Graph(Box::new(NoCycles)),
    ]
}

/// Built-in rule by id
pub fn find_builtin(id: &str) -> Option<Rule> {
    builtin_rules().into_iter().find(|rule| rule.id() == id)
}
