//! JSON output formatter for machine processing
//!
//! The report is written as one pretty-printed object: the serialized
//! `Report` plus a `summary` block of counts.

use crate::domain::{BumpKind, Severity};
use crate::output::{OutputFormatter, Verbosity};
use crate::report::{DiagnosticKind, Report};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Quiet drops the per-manifest sections
    verbosity: Verbosity,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// Counts shown at the top of the output
#[derive(Serialize)]
struct JsonSummary {
    manifests: usize,
    errors: usize,
    warnings: usize,
    info: usize,
    updates: usize,
    major_updates: usize,
    parse_errors: usize,
    lookup_errors: usize,
}

impl JsonSummary {
    fn from_report(report: &Report) -> Self {
        Self {
            manifests: report.manifests.len(),
            errors: report.count(Severity::Error),
            warnings: report.count(Severity::Warning),
            info: report.count(Severity::Info),
            updates: report.candidates.len(),
            major_updates: report
                .candidates
                .iter()
                .filter(|c| c.bump == BumpKind::Major)
                .count(),
            parse_errors: report.diagnostics_of(DiagnosticKind::ParseError).count(),
            lookup_errors: report.diagnostics_of(DiagnosticKind::LookupError).count(),
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    summary: JsonSummary,
    #[serde(flatten)]
    report: &'a Report,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &Report, writer: &mut dyn Write) -> std::io::Result<()> {
        let trimmed;
        let report = if self.verbosity == Verbosity::Quiet {
            trimmed = Report {
                manifests: Vec::new(),
                ..report.clone()
            };
            &trimmed
        } else {
            report
        };
        let output = JsonOutput {
            summary: JsonSummary::from_report(report),
            report,
        };
        serde_json::to_writer_pretty(&mut *writer, &output).map_err(std::io::Error::other)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ecosystem, Finding, NodeId, PackageRef, Scope};
    use crate::report::build;

    fn sample_report() -> Report {
        let finding = Finding::new("no-unstable", Severity::Error, "react 0.14.0 is unstable")
            .with_node(
                NodeId(0),
                PackageRef {
                    ecosystem: Ecosystem::Npm,
                    name: "react".to_string(),
                    scope: Scope::Runtime,
                    version: Some("0.14.0".to_string()),
                },
            )
            .with_location("package.json", Some(3));
        build(vec![finding], Vec::new(), Severity::Error)
    }

    fn render(verbosity: Verbosity, report: &Report) -> serde_json::Value {
        let mut out = Vec::new();
        JsonFormatter::new(verbosity).format(report, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_json_output_shape() {
        let json = render(Verbosity::Normal, &sample_report());
        assert_eq!(json["summary"]["errors"], 1);
        assert_eq!(json["summary"]["manifests"], 1);
        assert_eq!(json["exit"], "blocking");
        assert_eq!(json["incomplete"], false);
        assert_eq!(json["findings"][0]["rule"], "no-unstable");
        assert_eq!(json["findings"][0]["package"]["ecosystem"], "npm");
        assert_eq!(json["findings"][0]["line"], 3);
        assert_eq!(json["manifests"][0]["path"], "package.json");
    }

    #[test]
    fn test_json_quiet_drops_sections() {
        let json = render(Verbosity::Quiet, &sample_report());
        assert_eq!(json["manifests"].as_array().unwrap().len(), 0);
        assert_eq!(json["findings"].as_array().unwrap().len(), 1);
        assert_eq!(json["summary"]["manifests"], 0);
    }
}
