//! Rule evaluation with fault isolation and per-manifest overrides

use super::{ParamValue, Rule, RuleContext, RuleSettings};
use crate::domain::{Finding, MetadataIndex, Severity};
use crate::error::RuleFault;
use crate::graph::Graph;
use chrono::{DateTime, Utc};
use globset::GlobMatcher;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rule id of the finding reported for a failed rule
pub const RULE_FAULT_ID: &str = "rule-fault";

/// A rule together with its resolved settings
#[derive(Debug)]
pub struct ConfiguredRule {
    pub rule: Rule,
    pub settings: RuleSettings,
}

impl ConfiguredRule {
    /// Configure a rule with its defaults
    pub fn new(rule: Rule) -> Self {
        let settings = rule.defaults();
        Self { rule, settings }
    }

    /// Replace the settings (builder pattern)
    pub fn with_settings(mut self, settings: RuleSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Change to one rule inside a `ManifestOverride`
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOverride {
    /// Rule id
    pub rule: String,
    /// Drop the rule's findings
    pub disabled: bool,
    /// Replace the severity of the rule's findings
    pub severity: Option<Severity>,
    /// Replace the rule's primary parameter
    pub value: Option<ParamValue>,
}

impl RuleOverride {
    /// Override that changes nothing yet
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            disabled: false,
            severity: None,
            value: None,
        }
    }
}

/// Rule changes for manifests matching a glob
#[derive(Debug, Clone)]
pub struct ManifestOverride {
    /// Glob as written in the configuration
    pub pattern: String,
    matcher: GlobMatcher,
    /// Restrict to these packages; empty means every finding of the manifest
    pub packages: Vec<String>,
    /// Changes per rule
    pub rules: Vec<RuleOverride>,
}

impl ManifestOverride {
    /// Create an override for manifests matching `matcher`
    pub fn new(pattern: impl Into<String>, matcher: GlobMatcher) -> Self {
        Self {
            pattern: pattern.into(),
            matcher,
            packages: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Restrict to packages (builder pattern)
    pub fn with_packages(mut self, packages: Vec<String>) -> Self {
        self.packages = packages;
        self
    }

    /// Add a rule change (builder pattern)
    pub fn with_rule(mut self, rule: RuleOverride) -> Self {
        self.rules.push(rule);
        self
    }

    fn for_rule(&self, rule: &str) -> Option<&RuleOverride> {
        self.rules.iter().find(|r| r.rule == rule)
    }

    fn matches_path(&self, path: &Path, root: Option<&Path>) -> bool {
        if self.matcher.is_match(path) {
            return true;
        }
        root.and_then(|root| path.strip_prefix(root).ok())
            .is_some_and(|relative| self.matcher.is_match(relative))
    }

    fn applies_to(&self, finding: &Finding, root: Option<&Path>) -> bool {
        let Some(manifest) = &finding.manifest else {
            return false;
        };
        if !self.matches_path(manifest, root) {
            return false;
        }
        self.packages.is_empty()
            || finding
                .package
                .as_ref()
                .is_some_and(|p| self.packages.iter().any(|name| name == &p.name))
    }
}

/// What the overrides make of one finding
struct Effective {
    /// Index of the settings variant whose result counts (0 is the global one)
    variant: usize,
    severity: Option<Severity>,
    disabled: bool,
}

/// Evaluates configured rules over a graph
pub struct RuleEngine {
    rules: Vec<ConfiguredRule>,
    overrides: Vec<ManifestOverride>,
    root: Option<PathBuf>,
    now: DateTime<Utc>,
}

impl RuleEngine {
    /// Create an engine evaluating at the current time
    pub fn new(rules: Vec<ConfiguredRule>) -> Self {
        Self {
            rules,
            overrides: Vec::new(),
            root: None,
            now: Utc::now(),
        }
    }

    /// Per-manifest overrides (builder pattern)
    pub fn with_overrides(mut self, overrides: Vec<ManifestOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Directory override globs are relative to (builder pattern)
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Evaluation clock (builder pattern)
    pub fn with_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Configured rules
    pub fn rules(&self) -> &[ConfiguredRule] {
        &self.rules
    }

    /// Run every enabled rule and return the findings in canonical order
    pub fn evaluate(&self, graph: &Graph, metadata: &MetadataIndex) -> Vec<Finding> {
        let mut findings = Vec::new();

        for configured in self.rules.iter().filter(|c| c.settings.enabled) {
            let rule_id = configured.rule.id();
            let variants = self.settings_variants(configured);

            for (index, settings) in variants.iter().enumerate() {
                let produced = match self.run_rule(&configured.rule, settings, graph, metadata) {
                    Ok(produced) => produced,
                    Err(fault) => {
                        warn!(rule = rule_id, error = %fault, "rule fault");
                        findings.push(fault_finding(&fault));
                        break;
                    }
                };
                for mut finding in produced {
                    let effective = self.effective(rule_id, &finding);
                    if effective.variant != index || effective.disabled {
                        continue;
                    }
                    if let Some(severity) = effective.severity {
                        finding.severity = severity;
                    }
                    findings.push(finding);
                }
            }
        }

        findings.sort_by(Finding::canonical_cmp);
        findings.dedup();
        debug!(findings = findings.len(), "rules evaluated");
        findings
    }

    /// Global settings first, then one variant per override that sets a value
    fn settings_variants(&self, configured: &ConfiguredRule) -> Vec<RuleSettings> {
        let mut variants = vec![configured.settings.clone()];
        let Some((parameter, _)) = configured.rule.primary_parameter() else {
            return variants;
        };
        for manifest_override in &self.overrides {
            let value = manifest_override
                .for_rule(configured.rule.id())
                .and_then(|r| r.value.clone());
            if let Some(value) = value {
                let mut settings = configured.settings.clone();
                settings.parameters.insert(parameter.to_string(), value);
                variants.push(settings);
            }
        }
        variants
    }

    fn effective(&self, rule_id: &str, finding: &Finding) -> Effective {
        let mut effective = Effective {
            variant: 0,
            severity: None,
            disabled: false,
        };
        let mut value_index = 0;
        for manifest_override in &self.overrides {
            let Some(rule_override) = manifest_override.for_rule(rule_id) else {
                continue;
            };
            if rule_override.value.is_some() {
                value_index += 1;
            }
            if !manifest_override.applies_to(finding, self.root.as_deref()) {
                continue;
            }
            if rule_override.value.is_some() {
                effective.variant = value_index;
            }
            if rule_override.severity.is_some() {
                effective.severity = rule_override.severity;
            }
            effective.disabled |= rule_override.disabled;
        }
        effective
    }

    fn run_rule(
        &self,
        rule: &Rule,
        settings: &RuleSettings,
        graph: &Graph,
        metadata: &MetadataIndex,
    ) -> Result<Vec<Finding>, RuleFault> {
        let ctx = RuleContext {
            graph,
            metadata,
            settings,
            rule_id: rule.id(),
            now: self.now,
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| match rule {
            Rule::Node(node_rule) => {
                let mut findings = Vec::new();
                for (id, node) in graph.nodes() {
                    if !node.is_direct() && !node_rule.includes_transitive() {
                        continue;
                    }
                    if let Some(finding) = node_rule.check(&ctx, id, node)? {
                        findings.push(finding);
                    }
                }
                Ok(findings)
            }
            Rule::Graph(graph_rule) => graph_rule.check(&ctx),
        }));

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(RuleFault::Panicked {
                rule: rule.id().to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn fault_finding(fault: &RuleFault) -> Finding {
    Finding::new(RULE_FAULT_ID, Severity::Error, fault.to_string())
        .with_hint(format!("rule '{}' produced no results", fault.rule()))
}
