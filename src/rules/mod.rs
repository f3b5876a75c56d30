//! Rule engine: lint rules evaluated over the dependency graph
//!
//! This module provides:
//! - `NodeRule` (one node at a time) and `GraphRule` (whole graph) shapes
//! - Rule settings (enabled, severity, typed parameters)
//! - The built-in rule set and declarative custom rules
//! - `RuleEngine`, which runs rules with fault isolation and applies
//!   per-manifest overrides

pub mod builtin;
mod custom;
mod engine;

pub use custom::{Condition, ConditionDef, ConditionOp, CustomRule, CustomRuleDef, Field};
pub use engine::{ConfiguredRule, ManifestOverride, RuleEngine, RuleOverride, RULE_FAULT_ID};

use crate::domain::{Dependency, Finding, MetadataIndex, NodeId, Severity};
use crate::error::RuleFault;
use crate::graph::Graph;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Type of a rule parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Non-negative number
    Number,
    /// List of strings
    List,
}

/// Value of a rule parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    List(Vec<String>),
}

impl ParamValue {
    /// Convert a configuration value, checking it against `kind`
    pub fn from_yaml(kind: ParamKind, value: &serde_yaml::Value) -> Result<Self, String> {
        match kind {
            ParamKind::Number => match value.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => Ok(ParamValue::Number(n)),
                Some(n) => Err(format!("expected a non-negative number, got {}", n)),
                None => Err("expected a number".to_string()),
            },
            ParamKind::List => match value {
                serde_yaml::Value::String(s) => Ok(ParamValue::List(vec![s.clone()])),
                serde_yaml::Value::Sequence(items) => items
                    .iter()
                    .map(|item| match item {
                        serde_yaml::Value::String(s) => Ok(s.clone()),
                        serde_yaml::Value::Null => Ok(String::new()),
                        _ => Err("expected a list of strings".to_string()),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(ParamValue::List),
                _ => Err("expected a list of strings".to_string()),
            },
        }
    }
}

/// Resolved settings of one rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSettings {
    /// Whether the rule runs at all
    pub enabled: bool,
    /// Severity of the rule's findings
    pub severity: Severity,
    /// Typed parameters
    pub parameters: BTreeMap<String, ParamValue>,
}

impl RuleSettings {
    /// Enabled settings with the given severity and no parameters
    pub fn new(severity: Severity) -> Self {
        Self {
            enabled: true,
            severity,
            parameters: BTreeMap::new(),
        }
    }

    /// Disabled unless configured otherwise (builder pattern)
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Sets a parameter (builder pattern)
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Numeric parameter
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.parameters.get(name) {
            Some(ParamValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// List parameter
    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.parameters.get(name) {
            Some(ParamValue::List(items)) => Some(items),
            _ => None,
        }
    }
}

/// Everything a rule may look at
pub struct RuleContext<'a> {
    /// The merged dependency graph
    pub graph: &'a Graph,
    /// Registry metadata of the graph's packages
    pub metadata: &'a MetadataIndex,
    /// Settings of the rule being evaluated
    pub settings: &'a RuleSettings,
    /// Id of the rule being evaluated
    pub rule_id: &'a str,
    /// Evaluation clock
    pub now: DateTime<Utc>,
}

impl RuleContext<'_> {
    /// Finding about a node, located at its declaration
    pub fn node_finding(&self, id: NodeId, message: impl Into<String>) -> Finding {
        let finding = Finding::new(self.rule_id, self.settings.severity, message);
        let (Some(node), Some(package)) = (self.graph.node(id), self.graph.package_ref(id)) else {
            return finding;
        };
        finding
            .with_node(id, package)
            .with_location(&node.source.path, node.source.line)
    }

    /// Finding about a whole manifest
    pub fn manifest_finding(&self, path: &Path, message: impl Into<String>) -> Finding {
        Finding::new(self.rule_id, self.settings.severity, message).with_location(path, None)
    }

    /// Numeric parameter, or a fault when it is missing
    pub fn number(&self, name: &str) -> Result<f64, RuleFault> {
        self.settings
            .number(name)
            .ok_or_else(|| RuleFault::failed(self.rule_id, format!("missing parameter '{}'", name)))
    }

    /// List parameter, or a fault when it is missing
    pub fn list(&self, name: &str) -> Result<&[String], RuleFault> {
        self.settings
            .list(name)
            .ok_or_else(|| RuleFault::failed(self.rule_id, format!("missing parameter '{}'", name)))
    }
}

/// A rule that judges one node at a time
pub trait NodeRule: Send + Sync {
    /// Rule id used in configuration and findings
    fn id(&self) -> &str;

    /// One-line description
    fn description(&self) -> &str;

    /// Default settings
    fn defaults(&self) -> RuleSettings;

    /// Parameters the rule accepts; the first one is set by a per-manifest `value`
    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[]
    }

    /// Whether transitive nodes are visited too
    fn includes_transitive(&self) -> bool {
        false
    }

    /// Judge one node
    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault>;
}

/// A rule that looks at the graph as a whole
pub trait GraphRule: Send + Sync {
    /// Rule id used in configuration and findings
    fn id(&self) -> &str;

    /// One-line description
    fn description(&self) -> &str;

    /// Default settings
    fn defaults(&self) -> RuleSettings;

    /// Parameters the rule accepts; the first one is set by a per-manifest `value`
    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[]
    }

    /// Judge the graph
    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault>;
}

/// A rule of either shape
pub enum Rule {
    Node(Box<dyn NodeRule>),
    Graph(Box<dyn GraphRule>),
}

impl Rule {
    /// Rule id
    pub fn id(&self) -> &str {
        match self {
            Rule::Node(rule) => rule.id(),
            Rule::Graph(rule) => rule.id(),
        }
    }

    /// One-line description
    pub fn description(&self) -> &str {
        match self {
            Rule::Node(rule) => rule.description(),
            Rule::Graph(rule) => rule.description(),
        }
    }

    /// Default settings
    pub fn defaults(&self) -> RuleSettings {
        match self {
            Rule::Node(rule) => rule.defaults(),
            Rule::Graph(rule) => rule.defaults(),
        }
    }

    /// Accepted parameters
    pub fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        match self {
            Rule::Node(rule) => rule.parameters(),
            Rule::Graph(rule) => rule.parameters(),
        }
    }

    /// Parameter a per-manifest `value` sets
    pub fn primary_parameter(&self) -> Option<(&'static str, ParamKind)> {
        self.parameters().first().copied()
    }

    /// "node" or "graph"
    pub fn shape(&self) -> &'static str {
        match self {
            Rule::Node(_) => "node",
            Rule::Graph(_) => "graph",
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id())
            .field("shape", &self.shape())
            .finish()
    }
}
