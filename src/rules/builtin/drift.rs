//! Aggregate drift rules, evaluated per manifest

use crate::domain::{BumpKind, Dependency, Finding, PackageMetadata, Severity, Version};
use crate::error::RuleFault;
use crate::rules::{GraphRule, ParamKind, ParamValue, RuleContext, RuleSettings};
use std::collections::BTreeMap;
use std::path::PathBuf;

const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

/// Direct registry nodes with metadata, grouped by manifest
fn by_manifest<'a>(
    ctx: &'a RuleContext<'_>,
) -> BTreeMap<PathBuf, Vec<(&'a Dependency, &'a PackageMetadata)>> {
    let mut groups: BTreeMap<PathBuf, Vec<_>> = BTreeMap::new();
    for (_, node) in ctx.graph.direct_nodes() {
        if let Some(metadata) = ctx.metadata.for_node(node) {
            groups
                .entry(node.manifest.clone())
                .or_default()
                .push((node, metadata));
        }
    }
    groups
}

/// Total libyear of a manifest must not exceed `value`
///
/// A dependency's libyear is the time between the release of its current
/// version and the release of the latest stable version.
pub struct MaxLibyear;

impl MaxLibyear {
    fn libyear(node: &Dependency, metadata: &PackageMetadata) -> Option<f64> {
        let current = metadata.find(&node.current_version()?)?.published_at?;
        let latest = metadata.latest_stable()?.published_at?;
        let hours = latest.signed_duration_since(current).num_hours();
        Some((hours.max(0) as f64) / HOURS_PER_YEAR)
    }
}

impl GraphRule for MaxLibyear {
    fn id(&self) -> &str {
        "max-libyear"
    }

    fn description(&self) -> &str {
        "The total libyear of all dependencies is too high"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error).with_parameter("value", ParamValue::Number(25.0))
    }

    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[("value", ParamKind::Number)]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        let allowed = ctx.number("value")?;
        let mut findings = Vec::new();
        for (manifest, members) in by_manifest(ctx) {
            let total: f64 = members
                .iter()
                .filter_map(|(node, metadata)| Self::libyear(node, metadata))
                .sum();
            if total > allowed {
                findings.push(ctx.manifest_finding(
                    &manifest,
                    format!("Allowed libyear: {:.2}. Total libyear: {:.2}", allowed, total),
                ));
            }
        }
        Ok(findings)
    }
}

/// Share of dependencies with a pending update of one size must not exceed `percent`
pub struct MaxUpdates {
    bump: BumpKind,
}

impl MaxUpdates {
    /// Rule for major, minor or patch updates
    pub fn new(bump: BumpKind) -> Self {
        Self { bump }
    }

    fn default_percent(&self) -> f64 {
        match self.bump {
            BumpKind::Major => 20.0,
            BumpKind::Minor => 40.0,
            _ => 60.0,
        }
    }

    /// Returns true if a stable release newer by exactly this bump size exists
    fn has_update(&self, current: &Version, metadata: &PackageMetadata) -> bool {
        metadata
            .versions
            .iter()
            .filter(|v| !v.yanked && !v.is_prerelease() && v.version > *current)
            .any(|v| current.bump_to(&v.version) == self.bump)
    }
}

impl GraphRule for MaxUpdates {
    fn id(&self) -> &str {
        match self.bump {
            BumpKind::Major => "max-major-updates",
            BumpKind::Minor => "max-minor-updates",
            _ => "max-patch-updates",
        }
    }

    fn description(&self) -> &str {
        match self.bump {
            BumpKind::Major => "The total number of major updates is too high",
            BumpKind::Minor => "The total number of minor updates is too high",
            _ => "The total number of patch updates is too high",
        }
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error)
            .with_parameter("percent", ParamValue::Number(self.default_percent()))
    }

    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[("percent", ParamKind::Number)]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        let allowed = ctx.number("percent")?;
        let mut findings = Vec::new();
        for (manifest, members) in by_manifest(ctx) {
            let judged: Vec<(&Dependency, bool)> = members
                .iter()
                .filter_map(|(node, metadata)| {
                    let current = node.current_version()?;
                    Some((*node, self.has_update(&current, metadata)))
                })
                .collect();
            if judged.is_empty() {
                continue;
            }
            let behind: Vec<&str> = judged
                .iter()
                .filter(|(_, behind)| *behind)
                .map(|(node, _)| node.name.as_str())
                .collect();
            let share = behind.len() as f64 / judged.len() as f64 * 100.0;
            if share > allowed {
                findings.push(
                    ctx.manifest_finding(
                        &manifest,
                        format!(
                            "{} of {} dependencies ({:.0}%) have a pending {} update, allowed {:.0}%",
                            behind.len(),
                            judged.len(),
                            share,
                            self.bump,
                            allowed
                        ),
                    )
                    .with_hint(format!("update {}", behind.join(", "))),
                );
            }
        }
        Ok(findings)
    }
}
