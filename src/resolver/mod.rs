//! Update resolution for dependency nodes
//!
//! This module provides:
//! - Update policy configuration (mode, exclusions, bump ceiling, age)
//! - `UpdateResolver`, which picks the best newer version for each node

mod policy;

pub use policy::{UpdateMode, UpdatePolicy};

use crate::domain::{
    ConstraintStatus, Dependency, MetadataIndex, NodeId, PublishedVersion, UpdateCandidate,
    Version,
};
use crate::graph::Graph;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Picks update candidates under an `UpdatePolicy`
pub struct UpdateResolver {
    /// Policy configuration
    policy: UpdatePolicy,
    /// Current time for age calculations
    now: DateTime<Utc>,
}

impl UpdateResolver {
    /// Create a resolver with the given policy
    pub fn new(policy: UpdatePolicy) -> Self {
        Self {
            policy,
            now: Utc::now(),
        }
    }

    /// Create a resolver with a custom current time (for testing)
    pub fn with_time(policy: UpdatePolicy, now: DateTime<Utc>) -> Self {
        Self { policy, now }
    }

    /// Candidates for every node of the graph, in canonical node order
    pub fn resolve(&self, graph: &Graph, metadata: &MetadataIndex) -> Vec<UpdateCandidate> {
        let candidates: Vec<UpdateCandidate> = graph
            .nodes()
            .filter_map(|(id, node)| self.candidate_for(graph, id, node, metadata))
            .collect();
        debug!(candidates = candidates.len(), mode = %self.policy.mode, "updates resolved");
        candidates
    }

    /// Check if a node is considered at all
    fn should_consider(&self, node: &Dependency) -> bool {
        node.is_registry()
            && (node.is_direct() || self.policy.include_transitive)
            && self.policy.should_process_package(&node.name)
    }

    fn eligible(&self, node: &Dependency, current: &Version, release: &PublishedVersion) -> bool {
        if release.yanked || release.version <= *current {
            return false;
        }

        // Only stable releases unless asked, or unless the current version is already a prerelease
        if release.is_prerelease() && !self.policy.include_prerelease && !current.is_prerelease() {
            return false;
        }

        if let Some(min_age) = self.policy.min_age {
            let Ok(min_age) = chrono::Duration::from_std(min_age) else {
                return false;
            };
            let youngest_allowed = self.now - min_age;
            if !release.published_at.is_some_and(|at| at <= youngest_allowed) {
                return false;
            }
        }

        if !current.bump_to(&release.version).within(self.policy.max_bump) {
            return false;
        }

        match self.policy.mode {
            UpdateMode::Constraint => node.constraint.matches(&release.version) == Some(true),
            UpdateMode::Latest => true,
        }
    }

    /// Highest eligible version newer than the node's current one
    pub fn candidate_for(
        &self,
        graph: &Graph,
        id: NodeId,
        node: &Dependency,
        metadata: &MetadataIndex,
    ) -> Option<UpdateCandidate> {
        if !self.should_consider(node) {
            return None;
        }
        let current = node.current_version()?;
        let published = metadata.for_node(node)?;

        // Versions are ascending, so the first eligible one from the end is the highest
        let best = published
            .versions
            .iter()
            .rev()
            .find(|release| self.eligible(node, &current, release))?;

        let constraint = ConstraintStatus::from_match(node.constraint.matches(&best.version));
        let suggested_constraint = (node.is_direct()
            && constraint != ConstraintStatus::Satisfied
            && node.constraint.is_evaluable())
        .then(|| node.constraint.format_updated(best.version.as_str()));

        Some(UpdateCandidate {
            node: id,
            package: graph.package_ref(id)?,
            manifest: node.manifest.clone(),
            bump: current.bump_to(&best.version),
            current,
            candidate: best.version.clone(),
            constraint,
            requires_relock: !node.is_direct(),
            suggested_constraint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BumpKind, Ecosystem, PackageMetadata, Scope, SourceLocation};
    use crate::manifest::{GraphFragment, LockedPackage, LockedRequirement};
    use crate::parser::parse_constraint;
    use chrono::TimeZone;
    use std::time::Duration;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        fixed_time() - chrono::Duration::days(days)
    }

    fn make_dependency(name: &str, constraint: &str) -> Dependency {
        Dependency::new(
            Ecosystem::Npm,
            name,
            parse_constraint(Ecosystem::Npm, constraint),
            Scope::Runtime,
            SourceLocation::new("package.json", "dependencies"),
        )
    }

    fn make_metadata(versions: &[(&str, i64)]) -> PackageMetadata {
        PackageMetadata::new(
            versions
                .iter()
                .map(|(v, age)| PublishedVersion::new(v, Some(days_ago(*age))))
                .collect(),
        )
    }

    fn single(dep: Dependency, versions: &[(&str, i64)]) -> (Graph, MetadataIndex) {
        let mut metadata = MetadataIndex::new();
        metadata.insert(Ecosystem::Npm, dep.name.clone(), make_metadata(versions));
        let graph = Graph::merge(vec![GraphFragment::manifest("package.json", Ecosystem::Npm, vec![dep])]);
        (graph, metadata)
    }

    fn resolve(policy: UpdatePolicy, graph: &Graph, metadata: &MetadataIndex) -> Vec<UpdateCandidate> {
        UpdateResolver::with_time(policy, fixed_time()).resolve(graph, metadata)
    }

    #[test]
    fn test_left_pad_minor_update() {
        let (graph, metadata) = single(
            make_dependency("left-pad", "^1.0.0"),
            &[("1.0.0", 900), ("1.1.0", 800), ("1.3.0", 700)],
        );
        let candidates = resolve(UpdatePolicy::new(), &graph, &metadata);
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.candidate.as_str(), "1.3.0");
        assert_eq!(candidate.bump, BumpKind::Minor);
        assert_eq!(candidate.constraint, ConstraintStatus::Satisfied);
        assert!(!candidate.requires_relock);
        assert!(candidate.suggested_constraint.is_none());
    }

    #[test]
    fn test_constraint_mode_never_violates() {
        let (graph, metadata) = single(
            make_dependency("lodash", "~1.0.0"),
            &[("1.0.0", 100), ("1.0.5", 50), ("1.2.0", 20), ("2.0.0", 10)],
        );
        let candidates = resolve(UpdatePolicy::new(), &graph, &metadata);
        assert_eq!(candidates[0].candidate.as_str(), "1.0.5");
        assert_eq!(candidates[0].bump, BumpKind::Patch);
    }

    #[test]
    fn test_latest_mode_suggests_constraint() {
        let (graph, metadata) = single(
            make_dependency("lodash", "^1.0.0"),
            &[("1.0.0", 100), ("2.0.0", 10)],
        );
        let candidates = resolve(
            UpdatePolicy::new().with_mode(UpdateMode::Latest),
            &graph,
            &metadata,
        );
        assert_eq!(candidates[0].candidate.as_str(), "2.0.0");
        assert_eq!(candidates[0].constraint, ConstraintStatus::Violates);
        assert_eq!(candidates[0].suggested_constraint.as_deref(), Some("^2.0.0"));
        assert!(candidates[0].is_major());
    }

    #[test]
    fn test_max_bump_ceiling() {
        let (graph, metadata) = single(
            make_dependency("lodash", "^1.0.0"),
            &[("1.0.0", 100), ("1.0.1", 90), ("1.1.0", 50), ("2.0.0", 10)],
        );
        let policy = UpdatePolicy::new()
            .with_mode(UpdateMode::Latest)
            .with_max_bump(BumpKind::Patch);
        let candidates = resolve(policy, &graph, &metadata);
        assert_eq!(candidates[0].candidate.as_str(), "1.0.1");
    }

    #[test]
    fn test_prerelease_excluded_unless_current_is_prerelease() {
        let versions = [("1.0.0", 100), ("1.1.0-beta.1", 10)];
        let (graph, metadata) = single(make_dependency("lib", "^1.0.0"), &versions);
        let policy = UpdatePolicy::new().with_mode(UpdateMode::Latest);
        assert!(resolve(policy.clone(), &graph, &metadata).is_empty());

        let candidates = resolve(policy.with_include_prerelease(true), &graph, &metadata);
        assert_eq!(candidates[0].candidate.as_str(), "1.1.0-beta.1");

        let (graph, metadata) = single(
            make_dependency("lib", "1.0.0-beta.1"),
            &[("1.0.0-beta.1", 30), ("1.0.0-beta.2", 10)],
        );
        let candidates = resolve(
            UpdatePolicy::new().with_mode(UpdateMode::Latest),
            &graph,
            &metadata,
        );
        assert_eq!(candidates[0].candidate.as_str(), "1.0.0-beta.2");
    }

    #[test]
    fn test_min_age_filter() {
        let (graph, metadata) = single(
            make_dependency("lodash", "^1.0.0"),
            &[("1.0.0", 100), ("1.1.0", 30), ("1.2.0", 2)],
        );
        let policy = UpdatePolicy::new().with_min_age(Duration::from_secs(7 * 86400));
        let candidates = resolve(policy, &graph, &metadata);
        assert_eq!(candidates[0].candidate.as_str(), "1.1.0");
    }

    #[test]
    fn test_yanked_versions_skipped() {
        let dep = make_dependency("lib", "^1.0.0");
        let mut metadata = MetadataIndex::new();
        metadata.insert(
            Ecosystem::Npm,
            "lib",
            PackageMetadata::new(vec![
                PublishedVersion::new("1.0.0", None),
                PublishedVersion::new("1.1.0", None),
                PublishedVersion::new("1.2.0", None).with_yanked(true),
            ]),
        );
        let graph = Graph::merge(vec![GraphFragment::manifest("package.json", Ecosystem::Npm, vec![dep])]);
        let candidates = resolve(UpdatePolicy::new(), &graph, &metadata);
        assert_eq!(candidates[0].candidate.as_str(), "1.1.0");
    }

    #[test]
    fn test_no_downgrade_and_no_data() {
        let (graph, metadata) = single(make_dependency("lib", "^2.0.0"), &[("1.0.0", 100), ("2.0.0", 50)]);
        assert!(resolve(UpdatePolicy::new(), &graph, &metadata).is_empty());
        assert!(resolve(UpdatePolicy::new(), &graph, &MetadataIndex::new()).is_empty());
    }

    #[test]
    fn test_excluded_package() {
        let (graph, metadata) = single(make_dependency("left-pad", "^1.0.0"), &[("1.0.0", 100), ("1.3.0", 10)]);
        let policy = UpdatePolicy::new().with_exclude(vec!["left-pad".to_string()]);
        assert!(resolve(policy, &graph, &metadata).is_empty());
    }

    #[test]
    fn test_transitive_requires_relock() {
        let mut parent = LockedPackage::new("express", "4.18.2");
        parent.dependencies = vec![LockedRequirement::new("qs", Some("^6.11.0"))];
        let graph = Graph::merge(vec![
            GraphFragment::manifest(
                "package.json",
                Ecosystem::Npm,
                vec![make_dependency("express", "^4.18.0")],
            ),
            GraphFragment::lockfile(
                "package-lock.json",
                Ecosystem::Npm,
                vec![parent, LockedPackage::new("qs", "6.11.0")],
            ),
        ]);
        let mut metadata = MetadataIndex::new();
        metadata.insert(Ecosystem::Npm, "qs", make_metadata(&[("6.11.0", 300), ("6.12.1", 30)]));

        let candidates = resolve(UpdatePolicy::new(), &graph, &metadata);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].requires_relock);
        assert!(candidates[0].suggested_constraint.is_none());
        assert_eq!(candidates[0].manifest, std::path::PathBuf::from("package-lock.json"));

        let policy = UpdatePolicy::new().with_include_transitive(false);
        assert!(resolve(policy, &graph, &metadata).is_empty());
    }

    #[test]
    fn test_unknown_bump_only_under_major_ceiling() {
        let dep = Dependency::new(
            Ecosystem::Pip,
            "certifi",
            parse_constraint(Ecosystem::Pip, "==2023.7.22"),
            Scope::Runtime,
            SourceLocation::new("requirements.txt", "requirements"),
        );
        let mut metadata = MetadataIndex::new();
        metadata.insert(
            Ecosystem::Pip,
            "certifi",
            make_metadata(&[("2023.7.22", 300), ("2024.2.2", 100)]),
        );
        let graph = Graph::merge(vec![GraphFragment::manifest(
            "requirements.txt",
            Ecosystem::Pip,
            vec![dep],
        )]);

        let latest = UpdatePolicy::new().with_mode(UpdateMode::Latest);
        let candidates = resolve(latest.clone(), &graph, &metadata);
        assert_eq!(candidates[0].bump, BumpKind::Unknown);
        assert!(resolve(latest.with_max_bump(BumpKind::Minor), &graph, &metadata).is_empty());
    }
}
