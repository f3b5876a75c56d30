//! Report building
//!
//! This module provides:
//! - The `Report` value every run produces, even a partial one
//! - Per-manifest grouping of findings and update candidates
//! - Exit classification against the blocking severity threshold
//! - Diagnostics for files and packages that could not be processed

use crate::domain::{Ecosystem, Finding, Severity, UpdateCandidate};
use crate::error::{LookupError, ManifestError};
use crate::registry::LookupFailure;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Run-level outcome used to pick the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitClass {
    /// No findings at all
    Ok,
    /// Findings exist, all below the threshold
    WarningsOnly,
    /// At least one finding at or above the threshold
    Blocking,
}

impl ExitClass {
    /// Kebab-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitClass::Ok => "ok",
            ExitClass::WarningsOnly => "warnings-only",
            ExitClass::Blocking => "blocking",
        }
    }

    /// Returns true when the run should fail
    pub fn is_blocking(&self) -> bool {
        *self == ExitClass::Blocking
    }
}

impl fmt::Display for ExitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Clean,
    FindingsPresent,
    Incomplete,
}

impl RunStatus {
    /// Kebab-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Clean => "clean",
            RunStatus::FindingsPresent => "findings-present",
            RunStatus::Incomplete => "incomplete",
        }
    }
}

/// What kind of problem a diagnostic describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A file could not be read or parsed; it was not analyzed
    ParseError,
    /// A recognized file has no adapter; informational
    UnsupportedFormat,
    /// Registry metadata for a package is missing
    LookupError,
}

/// A contained, non-fatal problem met during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// File the problem belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Line within the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Ecosystem of the package that failed to resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<Ecosystem>,
    /// Package that failed to resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Failure category of a lookup (`timeout`, `not_found`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic for a file-level error
    pub fn from_manifest_error(error: &ManifestError) -> Self {
        let (kind, path, line) = match error {
            ManifestError::ParseError { path, line, .. } => {
                (DiagnosticKind::ParseError, path.clone(), *line)
            }
            ManifestError::ReadError { path, .. } => (DiagnosticKind::ParseError, path.clone(), None),
            ManifestError::UnsupportedFormat { path, .. } | ManifestError::Unrecognized { path } => {
                (DiagnosticKind::UnsupportedFormat, path.clone(), None)
            }
        };
        Self {
            kind,
            path: Some(path),
            line,
            ecosystem: None,
            package: None,
            reason: None,
            message: error.to_string(),
        }
    }

    /// Diagnostic for a failed registry lookup
    pub fn from_lookup_failure(failure: &LookupFailure) -> Self {
        Self {
            kind: DiagnosticKind::LookupError,
            path: None,
            line: None,
            ecosystem: Some(failure.ecosystem),
            package: Some(failure.name.clone()),
            reason: Some(failure.error.kind()),
            message: failure.error.to_string(),
        }
    }

    fn sort_key(&self) -> (DiagnosticKind, Option<&Path>, Option<Ecosystem>, Option<&str>) {
        (
            self.kind,
            self.path.as_deref(),
            self.ecosystem,
            self.package.as_deref(),
        )
    }
}

/// Findings and candidates of one manifest or lockfile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestSection {
    pub path: PathBuf,
    pub findings: Vec<Finding>,
    pub candidates: Vec<UpdateCandidate>,
}

impl ManifestSection {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            findings: Vec::new(),
            candidates: Vec::new(),
        }
    }
}

/// Result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub status: RunStatus,
    pub exit: ExitClass,
    /// Severity at which findings block
    pub threshold: Severity,
    /// The run was cut short or, in strict mode, a lookup failed
    pub incomplete: bool,
    /// Manifests that could not be analyzed
    pub not_analyzed: Vec<PathBuf>,
    /// All findings, in canonical order
    pub findings: Vec<Finding>,
    /// All update candidates, in node order
    pub candidates: Vec<UpdateCandidate>,
    /// Findings and candidates grouped by file, sorted by path
    pub manifests: Vec<ManifestSection>,
    /// Contained problems, in (kind, path, package) order
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Number of findings with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Findings at or above the threshold
    pub fn blocking_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity >= self.threshold)
    }

    /// Diagnostics of one kind
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Section of one manifest
    pub fn section(&self, path: &Path) -> Option<&ManifestSection> {
        self.manifests.iter().find(|s| s.path == path)
    }
}

/// Collects the pieces of a run and builds the `Report`
#[derive(Debug, Default)]
pub struct ReportBuilder {
    threshold: Option<Severity>,
    strict: bool,
    findings: Vec<Finding>,
    candidates: Vec<UpdateCandidate>,
    manifests: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
    not_analyzed: Vec<PathBuf>,
    cancelled: bool,
    lookup_failed: bool,
}

impl ReportBuilder {
    /// Builder blocking at `threshold`
    pub fn new(threshold: Severity) -> Self {
        Self {
            threshold: Some(threshold),
            ..Self::default()
        }
    }

    /// Lookup failures mark the report incomplete (builder pattern)
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Adds rule findings
    pub fn findings(&mut self, findings: impl IntoIterator<Item = Finding>) -> &mut Self {
        self.findings.extend(findings);
        self
    }

    /// Adds update candidates
    pub fn candidates(&mut self, candidates: impl IntoIterator<Item = UpdateCandidate>) -> &mut Self {
        self.candidates.extend(candidates);
        self
    }

    /// Registers an analyzed file so it gets a section even when it has nothing to report
    pub fn manifest(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.manifests.push(path.into());
        self
    }

    /// Records a file-level error. Parse and read errors leave the file unanalyzed.
    pub fn manifest_error(&mut self, error: &ManifestError) -> &mut Self {
        let diagnostic = Diagnostic::from_manifest_error(error);
        if diagnostic.kind == DiagnosticKind::ParseError {
            if let Some(path) = &diagnostic.path {
                self.not_analyzed.push(path.clone());
            }
        }
        self.diagnostics.push(diagnostic);
        self
    }

    /// Records a failed registry lookup. Cancelled lookups are covered by
    /// `cancelled` and produce no diagnostic.
    pub fn lookup_failure(&mut self, failure: &LookupFailure) -> &mut Self {
        if matches!(failure.error, LookupError::Cancelled { .. }) {
            return self;
        }
        self.lookup_failed = true;
        self.diagnostics.push(Diagnostic::from_lookup_failure(failure));
        self
    }

    /// Records a file the run never got to
    pub fn not_analyzed(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.not_analyzed.push(path.into());
        self
    }

    /// Marks the run as cut short by cancellation or timeout
    pub fn cancelled(&mut self) -> &mut Self {
        self.cancelled = true;
        self
    }

    /// Assembles the report in deterministic order
    pub fn build(mut self) -> Report {
        let threshold = self.threshold.unwrap_or(Severity::Error);

        self.findings.sort_by(|a, b| a.canonical_cmp(b));
        self.findings.dedup();
        self.candidates
            .sort_by(|a, b| a.node.cmp(&b.node).then_with(|| a.manifest.cmp(&b.manifest)));
        self.diagnostics.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.message.cmp(&b.message))
        });
        self.not_analyzed.sort();
        self.not_analyzed.dedup();

        let mut sections: BTreeMap<PathBuf, ManifestSection> = self
            .manifests
            .into_iter()
            .map(|path| (path.clone(), ManifestSection::new(path)))
            .collect();
        for finding in &self.findings {
            if let Some(path) = &finding.manifest {
                sections
                    .entry(path.clone())
                    .or_insert_with(|| ManifestSection::new(path.clone()))
                    .findings
                    .push(finding.clone());
            }
        }
        for candidate in &self.candidates {
            sections
                .entry(candidate.manifest.clone())
                .or_insert_with(|| ManifestSection::new(candidate.manifest.clone()))
                .candidates
                .push(candidate.clone());
        }

        let exit = classify(&self.findings, threshold);
        let incomplete = self.cancelled || (self.strict && self.lookup_failed);
        let status = if incomplete {
            RunStatus::Incomplete
        } else if self.findings.is_empty() {
            RunStatus::Clean
        } else {
            RunStatus::FindingsPresent
        };

        Report {
            status,
            exit,
            threshold,
            incomplete,
            not_analyzed: self.not_analyzed,
            findings: self.findings,
            candidates: self.candidates,
            manifests: sections.into_values().collect(),
            diagnostics: self.diagnostics,
        }
    }
}

/// Exit classification of a set of findings
pub fn classify(findings: &[Finding], threshold: Severity) -> ExitClass {
    if findings.iter().any(|f| f.severity >= threshold) {
        ExitClass::Blocking
    } else if findings.is_empty() {
        ExitClass::Ok
    } else {
        ExitClass::WarningsOnly
    }
}

/// Builds a report from findings and candidates alone
pub fn build(findings: Vec<Finding>, candidates: Vec<UpdateCandidate>, threshold: Severity) -> Report {
    let mut builder = ReportBuilder::new(threshold);
    builder.findings(findings).candidates(candidates);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BumpKind, ConstraintStatus, NodeId, PackageRef, Scope, Version};

    fn finding(rule: &str, severity: Severity, manifest: &str, node: usize) -> Finding {
        Finding::new(rule, severity, format!("{} fired", rule))
            .with_node(
                NodeId(node),
                PackageRef {
                    ecosystem: Ecosystem::Npm,
                    name: format!("pkg-{}", node),
                    scope: Scope::Runtime,
                    version: None,
                },
            )
            .with_location(manifest, Some(node + 1))
    }

    fn candidate(manifest: &str, node: usize) -> UpdateCandidate {
        UpdateCandidate {
            node: NodeId(node),
            package: PackageRef {
                ecosystem: Ecosystem::Npm,
                name: format!("pkg-{}", node),
                scope: Scope::Runtime,
                version: Some("1.0.0".to_string()),
            },
            manifest: PathBuf::from(manifest),
            current: Version::parse("1.0.0"),
            candidate: Version::parse("1.3.0"),
            constraint: ConstraintStatus::Satisfied,
            bump: BumpKind::Minor,
            requires_relock: false,
            suggested_constraint: None,
        }
    }

    #[test]
    fn test_clean_report() {
        let report = build(Vec::new(), Vec::new(), Severity::Error);
        assert_eq!(report.exit, ExitClass::Ok);
        assert_eq!(report.status, RunStatus::Clean);
        assert!(!report.incomplete);
        assert!(report.manifests.is_empty());
    }

    #[test]
    fn test_classification_against_threshold() {
        let warnings = vec![finding("sorted", Severity::Warning, "package.json", 0)];
        assert_eq!(classify(&warnings, Severity::Error), ExitClass::WarningsOnly);
        assert_eq!(classify(&warnings, Severity::Warning), ExitClass::Blocking);
        assert_eq!(classify(&warnings, Severity::Info), ExitClass::Blocking);

        let report = build(warnings, Vec::new(), Severity::Error);
        assert_eq!(report.status, RunStatus::FindingsPresent);
        assert_eq!(report.blocking_findings().count(), 0);
    }

    #[test]
    fn test_ok_implies_nothing_at_threshold() {
        for threshold in [Severity::Info, Severity::Warning, Severity::Error] {
            let findings = vec![
                finding("a", Severity::Info, "package.json", 0),
                finding("b", Severity::Warning, "package.json", 1),
            ];
            let report = build(findings, Vec::new(), threshold);
            if report.exit == ExitClass::Ok {
                assert_eq!(report.blocking_findings().count(), 0);
            }
            assert_eq!(
                report.exit.is_blocking(),
                report.blocking_findings().count() > 0
            );
        }
    }

    #[test]
    fn test_sections_grouped_and_sorted() {
        let findings = vec![
            finding("sorted", Severity::Warning, "web/package.json", 2),
            finding("no-unstable", Severity::Error, "api/package.json", 0),
            finding("sorted", Severity::Warning, "api/package.json", 1),
        ];
        let mut builder = ReportBuilder::new(Severity::Error);
        builder
            .findings(findings)
            .candidates(vec![candidate("web/package.json", 2)])
            .manifest("empty/package.json");
        let report = builder.build();

        let paths: Vec<&Path> = report.manifests.iter().map(|s| s.path.as_path()).collect();
        assert_eq!(
            paths,
            [
                Path::new("api/package.json"),
                Path::new("empty/package.json"),
                Path::new("web/package.json")
            ]
        );
        assert_eq!(report.section(Path::new("api/package.json")).unwrap().findings.len(), 2);
        let web = report.section(Path::new("web/package.json")).unwrap();
        assert_eq!(web.findings.len(), 1);
        assert_eq!(web.candidates.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Error);
        assert_eq!(report.exit, ExitClass::Blocking);
    }

    #[test]
    fn test_parse_error_is_not_analyzed() {
        let mut builder = ReportBuilder::new(Severity::Error);
        builder.manifest_error(&ManifestError::ParseError {
            path: PathBuf::from("b/package.json"),
            line: Some(3),
            message: "expected value".to_string(),
        });
        builder.manifest_error(&ManifestError::unsupported("yarn.lock", "yarn.lock"));
        let report = builder.build();

        assert_eq!(report.not_analyzed, vec![PathBuf::from("b/package.json")]);
        assert_eq!(report.diagnostics_of(DiagnosticKind::ParseError).count(), 1);
        assert_eq!(report.diagnostics_of(DiagnosticKind::UnsupportedFormat).count(), 1);
        assert_eq!(report.diagnostics[0].line, Some(3));
        assert!(!report.incomplete);
    }

    #[test]
    fn test_lookup_failure_incomplete_only_when_strict() {
        let failure = LookupFailure {
            ecosystem: Ecosystem::Npm,
            name: "slow".to_string(),
            error: LookupError::timeout("slow", "npm"),
        };

        let mut lenient = ReportBuilder::new(Severity::Error);
        lenient.lookup_failure(&failure);
        let report = lenient.build();
        assert!(!report.incomplete);
        assert_eq!(report.status, RunStatus::Clean);
        assert_eq!(report.diagnostics[0].reason, Some("timeout"));

        let mut strict = ReportBuilder::new(Severity::Error).with_strict(true);
        strict.lookup_failure(&failure);
        let report = strict.build();
        assert!(report.incomplete);
        assert_eq!(report.status, RunStatus::Incomplete);
    }

    #[test]
    fn test_cancelled_run() {
        let mut builder = ReportBuilder::new(Severity::Error);
        builder
            .lookup_failure(&LookupFailure {
                ecosystem: Ecosystem::Npm,
                name: "react".to_string(),
                error: LookupError::Cancelled {
                    package: "react".to_string(),
                },
            })
            .not_analyzed("package.json")
            .cancelled();
        let report = builder.build();
        assert!(report.incomplete);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.not_analyzed, vec![PathBuf::from("package.json")]);
    }

    #[test]
    fn test_serialized_names() {
        let report = build(
            vec![finding("sorted", Severity::Warning, "package.json", 0)],
            Vec::new(),
            Severity::Error,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["exit"], "warnings-only");
        assert_eq!(json["status"], "findings-present");
        assert_eq!(json["threshold"], "error");
    }
}
