//! Findings produced by the rule engine

use super::{Ecosystem, Scope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(other.to_string()),
        }
    }
}

/// Position of a node in the graph's canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Index into the graph's node list
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Human-facing identity of the node a finding or candidate refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRef {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One rule firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Id of the rule that fired
    pub rule: String,
    /// Effective severity
    pub severity: Severity,
    /// Node the finding is about, absent for manifest-level findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// Package details of the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageRef>,
    /// Manifest the finding belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    /// Line in the manifest, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Human-readable message
    pub message: String,
    /// Optional remediation hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Finding {
    /// Creates a new finding with no node or location
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            node: None,
            package: None,
            manifest: None,
            line: None,
            message: message.into(),
            hint: None,
        }
    }

    /// Attaches the node (builder pattern)
    pub fn with_node(mut self, node: NodeId, package: PackageRef) -> Self {
        self.node = Some(node);
        self.package = Some(package);
        self
    }

    /// Attaches the manifest location (builder pattern)
    pub fn with_location(mut self, manifest: impl Into<PathBuf>, line: Option<usize>) -> Self {
        self.manifest = Some(manifest.into());
        self.line = line;
        self
    }

    /// Attaches a remediation hint (builder pattern)
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Deterministic order: severity descending, canonical node order (node-less
    /// findings last), rule id, then manifest and message as tie-breakers
    pub fn canonical_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| match (self.node, other.node) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| self.rule.cmp(&other.rule))
            .then_with(|| self.manifest.cmp(&other.manifest))
            .then_with(|| self.line.cmp(&other.line))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule, self.message)
    }
}
