//! Text output formatter for human-readable display
//!
//! This module provides:
//! - One block per manifest with its findings and proposed updates
//! - Bump size indication (major/minor/patch) with colors
//! - File diagnostics, and failed lookups in verbose mode
//! - A closing summary line with the exit classification

use crate::domain::{BumpKind, Finding, Severity, UpdateCandidate};
use crate::output::{OutputFormatter, Verbosity};
use crate::report::{Diagnostic, DiagnosticKind, ExitClass, ManifestSection, Report};
use colored::Colorize;
use std::io::Write;

/// Colored label of a bump size
fn colored_bump(bump: BumpKind) -> String {
    match bump {
        BumpKind::Major => "major".red().bold().to_string(),
        BumpKind::Minor => "minor".yellow().to_string(),
        BumpKind::Patch => "patch".green().to_string(),
        BumpKind::Prerelease => "pre".cyan().to_string(),
        BumpKind::Unknown => "?".dimmed().to_string(),
    }
}

/// Plain label of a bump size
fn bump_label(bump: BumpKind) -> &'static str {
    match bump {
        BumpKind::Prerelease => "pre",
        BumpKind::Unknown => "?",
        other => other.as_str(),
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn severity_label(&self, severity: Severity) -> String {
        let label = format!("{:7}", severity.as_str());
        if !self.color {
            return label;
        }
        match severity {
            Severity::Error => label.red().bold().to_string(),
            Severity::Warning => label.yellow().to_string(),
            Severity::Info => label.blue().to_string(),
        }
    }

    fn format_finding(
        &self,
        finding: &Finding,
        rule_width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let line = finding
            .line
            .map(|l| format!("{:>4}:", l))
            .unwrap_or_else(|| "     ".to_string());
        let rule = format!("{:width$}", finding.rule, width = rule_width);

        if self.color {
            writeln!(
                writer,
                "  {} {} {} {}",
                line.dimmed(),
                self.severity_label(finding.severity),
                rule.bold(),
                finding.message
            )?;
        } else {
            writeln!(
                writer,
                "  {} {} {} {}",
                line,
                self.severity_label(finding.severity),
                rule,
                finding.message
            )?;
        }

        if let Some(hint) = &finding.hint {
            let hint = format!("hint: {}", hint);
            if self.color {
                writeln!(writer, "        {}", hint.dimmed())?;
            } else {
                writeln!(writer, "        {}", hint)?;
            }
        }
        Ok(())
    }

    fn format_candidate(
        &self,
        candidate: &UpdateCandidate,
        name_width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let mut notes = Vec::new();
        if candidate.requires_relock {
            notes.push("re-lock".to_string());
        }
        if let Some(constraint) = &candidate.suggested_constraint {
            notes.push(format!("set {}", constraint));
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", "))
        };

        if self.color {
            let name = format!("{:width$}", candidate.package.name, width = name_width);
            writeln!(
                writer,
                "  {} {} {} {} [{}]{}",
                name,
                candidate.current.as_str().dimmed(),
                "→".dimmed(),
                candidate.candidate.as_str().bright_white().bold(),
                colored_bump(candidate.bump),
                notes.dimmed()
            )
        } else {
            writeln!(
                writer,
                "  {:width$} {} -> {} [{}]{}",
                candidate.package.name,
                candidate.current,
                candidate.candidate,
                bump_label(candidate.bump),
                notes,
                width = name_width
            )
        }
    }

    fn format_section(&self, section: &ManifestSection, writer: &mut dyn Write) -> std::io::Result<()> {
        if section.findings.is_empty() && section.candidates.is_empty() {
            if self.verbosity == Verbosity::Verbose {
                let line = format!("{} — nothing to report", section.path.display());
                if self.color {
                    writeln!(writer, "{}", line.dimmed())?;
                } else {
                    writeln!(writer, "{}", line)?;
                }
            }
            return Ok(());
        }

        let counts = format!(
            "{}, {}",
            plural(section.findings.len(), "finding"),
            plural(section.candidates.len(), "update")
        );
        if self.color {
            writeln!(
                writer,
                "{} {}",
                section.path.display().to_string().bold(),
                format!("— {}", counts).dimmed()
            )?;
        } else {
            writeln!(writer, "{} — {}", section.path.display(), counts)?;
        }

        let rule_width = section.findings.iter().map(|f| f.rule.len()).max().unwrap_or(0);
        for finding in &section.findings {
            self.format_finding(finding, rule_width, writer)?;
        }

        if !section.candidates.is_empty() {
            if !section.findings.is_empty() {
                writeln!(writer)?;
            }
            let name_width = section
                .candidates
                .iter()
                .map(|c| c.package.name.len())
                .max()
                .unwrap_or(0)
                .max(20);
            for candidate in &section.candidates {
                self.format_candidate(candidate, name_width, writer)?;
            }
        }

        writeln!(writer)
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic, writer: &mut dyn Write) -> std::io::Result<()> {
        let label = match diagnostic.kind {
            DiagnosticKind::ParseError => "parse error",
            DiagnosticKind::UnsupportedFormat => "unsupported",
            DiagnosticKind::LookupError => "lookup",
        };
        let label = format!("{:11}", label);
        if self.color {
            let label = match diagnostic.kind {
                DiagnosticKind::ParseError => label.red().to_string(),
                _ => label.dimmed().to_string(),
            };
            writeln!(writer, "  {} {}", label, diagnostic.message)
        } else {
            writeln!(writer, "  {} {}", label, diagnostic.message)
        }
    }

    fn format_diagnostics(&self, report: &Report, writer: &mut dyn Write) -> std::io::Result<()> {
        let shown: Vec<&Diagnostic> = report
            .diagnostics
            .iter()
            .filter(|d| d.kind != DiagnosticKind::LookupError || self.verbosity == Verbosity::Verbose)
            .collect();
        let hidden_lookups = report.diagnostics.len() - shown.len();

        if !shown.is_empty() {
            if self.color {
                writeln!(writer, "{}", "Diagnostics".bold())?;
            } else {
                writeln!(writer, "Diagnostics")?;
            }
            for diagnostic in shown {
                self.format_diagnostic(diagnostic, writer)?;
            }
            writeln!(writer)?;
        }

        if hidden_lookups > 0 {
            let line = format!(
                "{} failed (use --verbose to list them)",
                plural(hidden_lookups, "package lookup")
            );
            if self.color {
                writeln!(writer, "{}", line.dimmed())?;
            } else {
                writeln!(writer, "{}", line)?;
            }
        }

        if !report.not_analyzed.is_empty() {
            let paths: Vec<String> = report
                .not_analyzed
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            writeln!(writer, "Not analyzed: {}", paths.join(", "))?;
        }
        Ok(())
    }

    fn format_summary(&self, report: &Report, writer: &mut dyn Write) -> std::io::Result<()> {
        let errors = plural(report.count(Severity::Error), "error");
        let warnings = plural(report.count(Severity::Warning), "warning");
        let info = format!("{} info", report.count(Severity::Info));
        let updates = plural(report.candidates.len(), "update");

        if self.color {
            let exit = match report.exit {
                ExitClass::Ok => report.exit.as_str().green().bold(),
                ExitClass::WarningsOnly => report.exit.as_str().yellow().bold(),
                ExitClass::Blocking => report.exit.as_str().red().bold(),
            };
            write!(
                writer,
                "{} {}, {}, {} · {} · {}",
                "Summary:".bold(),
                errors.red(),
                warnings.yellow(),
                info.blue(),
                updates.cyan(),
                exit
            )?;
            if report.incomplete {
                write!(writer, " {}", "(incomplete)".red())?;
            }
        } else {
            write!(
                writer,
                "Summary: {}, {}, {} · {} · {}",
                errors,
                warnings,
                info,
                updates,
                report.exit
            )?;
            if report.incomplete {
                write!(writer, " (incomplete)")?;
            }
        }
        writeln!(writer)
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &Report, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity != Verbosity::Quiet {
            for section in &report.manifests {
                self.format_section(section, writer)?;
            }
            // Faults of rules that could not be tied to a file
            let unplaced: Vec<&Finding> = report
                .findings
                .iter()
                .filter(|f| f.manifest.is_none())
                .collect();
            if !unplaced.is_empty() {
                let rule_width = unplaced.iter().map(|f| f.rule.len()).max().unwrap_or(0);
                for finding in unplaced {
                    self.format_finding(finding, rule_width, writer)?;
                }
                writeln!(writer)?;
            }
            self.format_diagnostics(report, writer)?;
        }
        self.format_summary(report, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConstraintStatus, Ecosystem, NodeId, PackageRef, Scope, Version};
    use crate::error::{LookupError, ManifestError};
    use crate::registry::LookupFailure;
    use crate::report::ReportBuilder;
    use std::path::PathBuf;

    fn package(name: &str) -> PackageRef {
        PackageRef {
            ecosystem: Ecosystem::Npm,
            name: name.to_string(),
            scope: Scope::Runtime,
            version: None,
        }
    }

    fn sample_report() -> Report {
        let mut builder = ReportBuilder::new(Severity::Error);
        builder
            .findings(vec![
                Finding::new("lockfile", Severity::Error, "package.json has no lockfile")
                    .with_location("package.json", None)
                    .with_hint("commit package-lock.json or npm-shrinkwrap.json"),
                Finding::new("no-any-tag", Severity::Warning, "react uses any version")
                    .with_node(NodeId(1), package("react"))
                    .with_location("package.json", Some(4)),
            ])
            .candidates(vec![UpdateCandidate {
                node: NodeId(0),
                package: package("left-pad"),
                manifest: PathBuf::from("package.json"),
                current: Version::parse("1.0.0"),
                candidate: Version::parse("1.3.0"),
                constraint: ConstraintStatus::Satisfied,
                bump: BumpKind::Minor,
                requires_relock: false,
                suggested_constraint: None,
            }])
            .manifest_error(&ManifestError::parse_error(
                "broken/package.json",
                Some(2),
                "expected value",
            ))
            .lookup_failure(&LookupFailure {
                ecosystem: Ecosystem::Npm,
                name: "ghost".to_string(),
                error: LookupError::not_found("ghost", "npm"),
            });
        builder.build()
    }

    fn render(verbosity: Verbosity, report: &Report) -> String {
        let mut out = Vec::new();
        TextFormatter::with_color(verbosity, false)
            .format(report, &mut out)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_output_normal() {
        let text = render(Verbosity::Normal, &sample_report());
        assert!(text.contains("package.json — 2 findings, 1 update"));
        assert!(text.contains("   4: warning no-any-tag react uses any version"));
        assert!(text.contains("hint: commit package-lock.json"));
        assert!(text.contains("left-pad"));
        assert!(text.contains("1.0.0 -> 1.3.0 [minor]"));
        assert!(text.contains("parse error"));
        assert!(text.contains("1 package lookup failed"));
        assert!(!text.contains("ghost"));
        assert!(text.contains("Not analyzed: broken/package.json"));
        assert!(text.contains("Summary: 1 error, 1 warning, 0 info · 1 update · blocking"));
    }

    #[test]
    fn test_text_output_verbose_lists_lookups() {
        let text = render(Verbosity::Verbose, &sample_report());
        assert!(text.contains("ghost"));
        assert!(!text.contains("use --verbose"));
    }

    #[test]
    fn test_text_output_quiet() {
        let text = render(Verbosity::Quiet, &sample_report());
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("Summary:"));
    }

    #[test]
    fn test_relock_note() {
        let candidate = UpdateCandidate {
            node: NodeId(3),
            package: package("tslib"),
            manifest: PathBuf::from("package-lock.json"),
            current: Version::parse("2.0.0"),
            candidate: Version::parse("3.0.0"),
            constraint: ConstraintStatus::Unknown,
            bump: BumpKind::Major,
            requires_relock: true,
            suggested_constraint: None,
        };
        let mut out = Vec::new();
        TextFormatter::with_color(Verbosity::Normal, false)
            .format_candidate(&candidate, 10, &mut out)
            .unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.contains("2.0.0 -> 3.0.0 [major] (re-lock)"));
    }

    #[test]
    fn test_clean_report() {
        let report = ReportBuilder::new(Severity::Error).build();
        let text = render(Verbosity::Normal, &report);
        assert_eq!(text, "Summary: 0 errors, 0 warnings, 0 info · 0 updates · ok\n");
    }
}
