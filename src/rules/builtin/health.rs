//! Rules backed by registry metadata
//!
//! Nodes without metadata (offline runs, failed lookups, non-registry
//! sources) never produce findings here.

use crate::domain::{Dependency, Finding, NodeId, Severity};
use crate::error::RuleFault;
use crate::rules::{NodeRule, ParamKind, ParamValue, RuleContext, RuleSettings};
use chrono::Months;

/// Current version must not be older than `months`
pub struct MaxPackageAge;

impl NodeRule for MaxPackageAge {
    fn id(&self) -> &str {
        "max-package-age"
    }

    fn description(&self) -> &str {
        "Disallow the use of any package that is older than a certain age (in months)"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error).with_parameter("months", ParamValue::Number(36.0))
    }

    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[("months", ParamKind::Number)]
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        let months = ctx.number("months")?.round() as u32;
        let Some(published) = ctx
            .metadata
            .current_release(node)
            .and_then(|release| release.published_at)
        else {
            return Ok(None);
        };
        let Some(cutoff) = ctx.now.checked_sub_months(Months::new(months)) else {
            return Ok(None);
        };
        if published >= cutoff {
            return Ok(None);
        }
        let version = node
            .current_version()
            .map(|v| v.to_string())
            .unwrap_or_default();
        Ok(Some(ctx.node_finding(
            id,
            format!(
                "{} {} was published on {}, more than {} months ago",
                node.name,
                version,
                published.format("%Y-%m-%d"),
                months
            ),
        )))
    }
}

/// Current version must not be deprecated or yanked
pub struct NoDeprecated;

impl NodeRule for NoDeprecated {
    fn id(&self) -> &str {
        "no-deprecated"
    }

    fn description(&self) -> &str {
        "Disallow the use of deprecated package versions"
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
        let Some(release) = ctx.metadata.current_release(node) else {
            return Ok(None);
        };
        let reason = match (&release.deprecated, release.yanked) {
            (Some(message), _) if !message.is_empty() => format!(": {}", message),
            (Some(_), _) => String::new(),
            (None, true) => " (yanked)".to_string(),
            (None, false) => return Ok(None),
        };
        let mut finding = ctx.node_finding(
            id,
            format!("{} {} is deprecated{}", node.name, release.version, reason),
        );
        if let Some(latest) = ctx.metadata.for_node(node).and_then(|m| m.latest_stable()) {
            if latest.version > release.version && latest.deprecated.is_none() {
                finding = finding.with_hint(format!("upgrade to {}", latest.version));
            }
        }
        Ok(Some(finding))
    }
}

/// Package must be downloaded at least `value` times a week
pub struct MinWeeklyDownloads;

impl NodeRule for MinWeeklyDownloads {
    fn id(&self) -> &str {
        "min-weekly-downloads"
    }

    fn description(&self) -> &str {
        "Minimum weekly downloads not met"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error).with_parameter("value", ParamValue::Number(1000.0))
    }

    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[("value", ParamKind::Number)]
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        let minimum = ctx.number("value")?;
        let Some(downloads) = ctx.metadata.for_node(node).and_then(|m| m.weekly_downloads) else {
            return Ok(None);
        };
        if downloads as f64 >= minimum {
            return Ok(None);
        }
        Ok(Some(ctx.node_finding(
            id,
            format!(
                "{} has {} weekly downloads, below the minimum of {}",
                node.name, downloads, minimum
            ),
        )))
    }
}

/// Package license must be in the allowed list
pub struct AllowedLicenses;

impl AllowedLicenses {
    /// SPDX `OR` expressions pass when any alternative is allowed
    fn allowed(license: &str, list: &[String]) -> bool {
        let license = license.trim();
        if list.iter().any(|allowed| allowed.trim() == license) {
            return true;
        }
        let stripped = license.trim_start_matches('(').trim_end_matches(')');
        stripped.contains(" OR ")
            && stripped
                .split(" OR ")
                .any(|part| list.iter().any(|allowed| allowed.trim() == part.trim()))
    }
}

impl NodeRule for AllowedLicenses {
    fn id(&self) -> &str {
        "allowed-licenses"
    }

    fn description(&self) -> &str {
        "The license of the package is not allowed"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Error).with_parameter(
            "licenses",
            ParamValue::List(vec![
                String::new(),
                "MIT".to_string(),
                "Apache-2.0".to_string(),
            ]),
        )
    }

    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[("licenses", ParamKind::List)]
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        let list = ctx.list("licenses")?;
        let Some(metadata) = ctx.metadata.for_node(node) else {
            return Ok(None);
        };
        let license = metadata.license.as_deref().unwrap_or("");
        if Self::allowed(license, list) {
            return Ok(None);
        }
        let shown = if license.is_empty() { "no license" } else { license };
        Ok(Some(ctx.node_finding(
            id,
            format!("{} is published under {}, which is not allowed", node.name, shown),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ecosystem, MetadataIndex, PackageMetadata, PublishedVersion};
    use crate::graph::Graph;
    use crate::manifest::GraphFragment;
    use crate::rules::builtin::testing::{date, exact, index, releases, run};
    use crate::rules::Rule;

    fn graph(names: &[(&str, &str)]) -> Graph {
        Graph::merge(vec![GraphFragment::manifest(
            "package.json",
            Ecosystem::Npm,
            names
                .iter()
                .map(|(name, version)| exact(Ecosystem::Npm, "package.json", name, version))
                .collect(),
        )])
    }

    #[test]
    fn test_max_package_age() {
        let graph = graph(&[("old", "1.0.0"), ("fresh", "2.0.0"), ("unknown", "1.0.0")]);
        let metadata = index(vec![
            (Ecosystem::Npm, "old", releases(&[("1.0.0", date(2020, 1, 1))])),
            (Ecosystem::Npm, "fresh", releases(&[("2.0.0", date(2023, 1, 1))])),
        ]);
        let findings = run(Rule::Node(Box::new(MaxPackageAge)), &graph, &metadata);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("2020-01-01"));
    }

    #[test]
    fn test_max_package_age_without_metadata() {
        let graph = graph(&[("old", "1.0.0")]);
        assert!(run(Rule::Node(Box::new(MaxPackageAge)), &graph, &MetadataIndex::new()).is_empty());
    }

    #[test]
    fn test_no_deprecated() {
        let graph = graph(&[("request", "2.88.2"), ("crate", "1.0.0"), ("ok", "1.0.0")]);
        let metadata = index(vec![
            (
                Ecosystem::Npm,
                "request",
                PackageMetadata::new(vec![PublishedVersion::new("2.88.2", None)
                    .with_deprecated("request has been deprecated")]),
            ),
            (
                Ecosystem::Npm,
                "crate",
                PackageMetadata::new(vec![
                    PublishedVersion::new("1.0.0", None).with_yanked(true),
                    PublishedVersion::new("1.0.1", None),
                ]),
            ),
            (Ecosystem::Npm, "ok", releases(&[("1.0.0", date(2024, 1, 1))])),
        ]);
        let findings = run(Rule::Node(Box::new(NoDeprecated)), &graph, &metadata);
        assert_eq!(findings.len(), 2);
        let yanked = findings
            .iter()
            .find(|f| f.package.as_ref().unwrap().name == "crate")
            .unwrap();
        assert!(yanked.message.contains("yanked"));
        assert_eq!(yanked.hint.as_deref(), Some("upgrade to 1.0.1"));
    }

    #[test]
    fn test_min_weekly_downloads() {
        let graph = graph(&[("tiny", "1.0.0"), ("huge", "1.0.0"), ("unknown", "1.0.0")]);
        let metadata = index(vec![
            (
                Ecosystem::Npm,
                "tiny",
                releases(&[("1.0.0", date(2024, 1, 1))]).with_weekly_downloads(Some(12)),
            ),
            (
                Ecosystem::Npm,
                "huge",
                releases(&[("1.0.0", date(2024, 1, 1))]).with_weekly_downloads(Some(50_000)),
            ),
            (Ecosystem::Npm, "unknown", releases(&[("1.0.0", date(2024, 1, 1))])),
        ]);
        let findings = run(Rule::Node(Box::new(MinWeeklyDownloads)), &graph, &metadata);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].package.as_ref().unwrap().name, "tiny");
    }

    #[test]
    fn test_allowed_licenses() {
        let graph = graph(&[("gpl", "1.0.0"), ("mit", "1.0.0"), ("dual", "1.0.0"), ("none", "1.0.0")]);
        let meta = |license: Option<&str>| {
            releases(&[("1.0.0", date(2024, 1, 1))]).with_license(license.map(String::from))
        };
        let metadata = index(vec![
            (Ecosystem::Npm, "gpl", meta(Some("GPL-3.0"))),
            (Ecosystem::Npm, "mit", meta(Some("MIT"))),
            (Ecosystem::Npm, "dual", meta(Some("(MIT OR GPL-3.0)"))),
            (Ecosystem::Npm, "none", meta(None)),
        ]);
        let findings = run(Rule::Node(Box::new(AllowedLicenses)), &graph, &metadata);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].package.as_ref().unwrap().name, "gpl");
    }
}
