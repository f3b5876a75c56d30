//! Rules about how dependencies are declared

use crate::domain::{Dependency, Finding, NodeId, Severity};
use crate::error::RuleFault;
use crate::rules::{GraphRule, NodeRule, RuleContext, RuleSettings};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Dependencies within a manifest section must be in alphabetical order
pub struct Sorted;

impl GraphRule for Sorted {
    fn id(&self) -> &str {
        "sorted"
    }

    fn description(&self) -> &str {
        "All the dependencies should be ordered alphabetically"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        let mut sections: BTreeMap<(PathBuf, &str), Vec<(NodeId, &Dependency)>> = BTreeMap::new();
        for (id, node) in ctx.graph.direct_nodes() {
            sections
                .entry((node.manifest.clone(), node.source.section.as_str()))
                .or_default()
                .push((id, node));
        }

        let mut findings = Vec::new();
        for ((_, section), mut nodes) in sections {
            nodes.sort_by_key(|(_, node)| node.position);
            for pair in nodes.windows(2) {
                let (id, current) = pair[0];
                let (_, next) = pair[1];
                if current.name.to_lowercase() > next.name.to_lowercase() {
                    findings.push(
                        ctx.node_finding(
                            id,
                            format!("{} should come after {} in {}", current.name, next.name, section),
                        )
                        .with_hint("sort the section alphabetically"),
                    );
                }
            }
        }
        Ok(findings)
    }
}

/// Constraints must not accept any version
pub struct NoAnyTag;

impl NodeRule for NoAnyTag {
    fn id(&self) -> &str {
        "no-any-tag"
    }

    fn description(&self) -> &str {
        "Disallow the use of the \"any\" version tag"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Warning)
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        if !node.is_registry() || !node.constraint.is_any_tag() {
            return Ok(None);
        }
        let shown = if node.constraint.raw.trim().is_empty() {
            "an empty constraint"
        } else {
            node.constraint.raw.trim()
        };
        Ok(Some(
            ctx.node_finding(id, format!("{} accepts any version ({})", node.name, shown))
                .with_hint("declare a version range"),
        ))
    }
}

/// A package must be declared only once per manifest
pub struct NoDuplicates;

impl GraphRule for NoDuplicates {
    fn id(&self) -> &str {
        "no-duplicates"
    }

    fn description(&self) -> &str {
        "Disallow the same package to be listed multiple times"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        // Nodes come in canonical order, so the first node of a group is its representative
        let mut groups: BTreeMap<(PathBuf, String, String), (NodeId, usize)> = BTreeMap::new();
        for (id, node) in ctx.graph.direct_nodes() {
            let key = (
                node.manifest.clone(),
                node.ecosystem.registry_family().to_string(),
                node.name.clone(),
            );
            groups
                .entry(key)
                .and_modify(|(_, count)| *count += node.declaration_count())
                .or_insert((id, node.declaration_count()));
        }

        Ok(groups
            .into_iter()
            .filter(|(_, (_, count))| *count > 1)
            .map(|((_, _, name), (id, count))| {
                ctx.node_finding(id, format!("{} is declared {} times", name, count))
                    .with_hint("keep a single declaration")
            })
            .collect())
    }
}

/// Manifests of ecosystems with lockfiles must have one
pub struct Lockfile;

impl GraphRule for Lockfile {
    fn id(&self) -> &str {
        "lockfile"
    }

    fn description(&self) -> &str {
        "The lockfile should be always present"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        Ok(ctx
            .graph
            .manifests()
            .iter()
            .filter(|record| !record.is_lockfile())
            .filter(|record| record.ecosystem.supports_lockfile() && record.lockfile.is_none())
            .map(|record| {
                let expected = record.ecosystem.lock_filenames().join(" or ");
                ctx.manifest_finding(
                    &record.path,
                    format!("{} has no lockfile", record.path.display()),
                )
                .with_hint(format!("commit {}", expected))
            })
            .collect())
    }
}
