//! Rules about the versions in use

use crate::domain::{Dependency, Ecosystem, Finding, NodeId, Severity};
use crate::error::RuleFault;
use crate::rules::{GraphRule, NodeRule, RuleContext, RuleSettings};
use std::collections::BTreeMap;

/// Versions below 1.0.0 are not allowed
pub struct NoUnstable;

impl NodeRule for NoUnstable {
    fn id(&self) -> &str {
        "no-unstable"
    }

    fn description(&self) -> &str {
        "Disallow the use of unstable versions (< 1.0.0)"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        let Some(current) = node.current_version() else {
            return Ok(None);
        };
        if current.is_calendar() || current.major() != Some(0) {
            return Ok(None);
        }
        Ok(Some(ctx.node_finding(
            id,
            format!("{} uses unstable version {}", node.name, current),
        )))
    }
}

/// Prerelease versions are not allowed
pub struct NoPreRelease;

impl NodeRule for NoPreRelease {
    fn id(&self) -> &str {
        "no-pre-release"
    }

    fn description(&self) -> &str {
        "Disallow the use of \"alpha\", \"beta\", \"rc\", etc. version tags"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        let Some(current) = node.current_version() else {
            return Ok(None);
        };
        if !current.is_prerelease() {
            return Ok(None);
        }
        Ok(Some(ctx.node_finding(
            id,
            format!("{} uses pre-release version {}", node.name, current),
        )))
    }
}

/// The same package must not be used with different major versions
pub struct NoMultipleVersions;

impl GraphRule for NoMultipleVersions {
    fn id(&self) -> &str {
        "no-multiple-versions"
    }

    fn description(&self) -> &str {
        "Disallow the use of multiple versions of the same package"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        let mut groups: BTreeMap<(Ecosystem, &str), Vec<(NodeId, &Dependency, u64)>> =
            BTreeMap::new();
        for (id, node) in ctx.graph.direct_nodes() {
            let Some(major) = node.current_version().and_then(|v| v.major()) else {
                continue;
            };
            groups
                .entry((node.ecosystem.registry_family(), node.name.as_str()))
                .or_default()
                .push((id, node, major));
        }

        let mut findings = Vec::new();
        for ((_, name), members) in groups {
            let Some(&(_, newest, highest)) = members.iter().max_by_key(|(_, _, major)| *major)
            else {
                continue;
            };
            for &(id, _, major) in &members {
                if major < highest {
                    findings.push(
                        ctx.node_finding(
                            id,
                            format!(
                                "{} major version {} differs from major version {} in {}",
                                name,
                                major,
                                highest,
                                newest.manifest.display()
                            ),
                        )
                        .with_hint(format!("align every manifest on {} {}.x", name, highest)),
                    );
                }
            }
        }
        Ok(findings)
    }
}
