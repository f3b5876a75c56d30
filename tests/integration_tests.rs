//! Integration tests for depshub
//!
//! These tests verify:
//! - Whole runs over projects on disk with an in-memory registry
//! - Custom rules and per-manifest overrides loaded from depshub.yaml
//! - Partial failure handling (malformed files, lookup failures, timeouts)
//! - Deterministic output regardless of input order

use chrono::{DateTime, TimeZone, Utc};
use depshub::analysis::{Analyzer, SourceFile};
use depshub::cancel::CancelSignal;
use depshub::config::RunConfig;
use depshub::domain::{
    BumpKind, ConstraintStatus, Ecosystem, PackageMetadata, PublishedVersion, Severity,
};
use depshub::registry::{StaticFailure, StaticLookup};
use depshub::report::{DiagnosticKind, ExitClass, Report, RunStatus};
use depshub::resolver::UpdateMode;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test fixture directory creation helper
fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Metadata with every version published on the given date
fn releases(versions: &[&str], published: DateTime<Utc>) -> PackageMetadata {
    PackageMetadata::new(
        versions
            .iter()
            .map(|v| PublishedVersion::new(v, Some(published)))
            .collect(),
    )
    .with_license(Some("MIT".to_string()))
    .with_weekly_downloads(Some(5_000_000))
}

fn registry() -> StaticLookup {
    StaticLookup::new()
        .with_package(
            Ecosystem::Npm,
            "left-pad",
            releases(&["1.0.0", "1.0.1", "1.3.0", "2.0.0"], date(2024, 1, 10)),
        )
        .with_package(
            Ecosystem::Npm,
            "express",
            releases(&["4.18.0", "4.19.2", "5.0.0"], date(2024, 3, 1)),
        )
        .with_package(
            Ecosystem::Cargo,
            "serde",
            releases(&["1.0.190", "1.0.200"], date(2024, 4, 1)),
        )
        .with_package(
            Ecosystem::Pip,
            "requests",
            releases(&["2.28.0", "2.31.0"], date(2024, 2, 1)),
        )
}

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn create_project() -> TempDir {
    let dir = create_test_dir();
    write(
        dir.path(),
        "package.json",
        r#"{
  "name": "web",
  "dependencies": {
    "express": "^4.18.0",
    "left-pad": "^1.0.0"
  }
}
"#,
    );
    write(dir.path(), "yarn.lock", "# yarn lockfile v1\n");
    write(
        dir.path(),
        "service/Cargo.toml",
        r#"[package]
name = "service"
version = "0.1.0"

[dependencies]
serde = "1.0.190"
"#,
    );
    write(dir.path(), "tools/requirements.txt", "requests==2.28.0\n");
    dir
}

async fn analyze(dir: &Path, config: RunConfig, lookup: StaticLookup) -> Report {
    Analyzer::new(config)
        .with_root(dir)
        .with_time(now())
        .analyze_path(dir, Arc::new(lookup), &CancelSignal::new())
        .await
        .expect("project should be analyzable")
}

mod whole_runs {
    use super::*;

    #[tokio::test]
    async fn test_multi_ecosystem_project() {
        let dir = create_project();
        let report = analyze(dir.path(), RunConfig::default(), registry()).await;

        let names: Vec<&str> = report
            .candidates
            .iter()
            .map(|c| c.package.name.as_str())
            .collect();
        assert!(names.contains(&"left-pad"));
        assert!(names.contains(&"express"));
        assert!(names.contains(&"serde"));
        // An exact pin has nothing newer inside its constraint
        assert!(!names.contains(&"requests"));

        let left_pad = report
            .candidates
            .iter()
            .find(|c| c.package.name == "left-pad")
            .unwrap();
        assert_eq!(left_pad.candidate.as_str(), "1.3.0");
        assert_eq!(left_pad.bump, BumpKind::Minor);

        let serde = report
            .candidates
            .iter()
            .find(|c| c.package.name == "serde")
            .unwrap();
        assert_eq!(serde.candidate.as_str(), "1.0.200");
        assert_eq!(serde.bump, BumpKind::Patch);

        assert_eq!(report.manifests.len(), 4);
        assert!(report.diagnostics_of(DiagnosticKind::ParseError).next().is_none());
        assert_eq!(report.diagnostics_of(DiagnosticKind::UnsupportedFormat).count(), 1);
        assert!(!report.incomplete);

        // Cargo.toml and requirements.txt have no lockfile; package.json has yarn.lock
        let lockfile: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.rule == "lockfile")
            .collect();
        assert_eq!(lockfile.len(), 2);
        assert!(lockfile
            .iter()
            .all(|f| !f.manifest.as_ref().unwrap().ends_with("package.json")));
        assert_eq!(report.exit, ExitClass::Blocking);
    }

    #[tokio::test]
    async fn test_constraint_mode_never_violates() {
        let dir = create_project();
        let report = analyze(dir.path(), RunConfig::default(), registry()).await;
        assert!(!report.candidates.is_empty());
        for candidate in &report.candidates {
            assert_eq!(candidate.constraint, ConstraintStatus::Satisfied);
            assert!(candidate.candidate > candidate.current);
            assert!(candidate.suggested_constraint.is_none());
        }
    }

    #[tokio::test]
    async fn test_latest_mode_suggests_constraints() {
        let dir = create_project();
        let config = RunConfig::from_yaml("update:\n  mode: latest\n", Path::new("depshub.yaml")).unwrap();
        assert_eq!(config.policy.mode, UpdateMode::Latest);
        let report = analyze(dir.path(), config, registry()).await;

        let left_pad = report
            .candidates
            .iter()
            .find(|c| c.package.name == "left-pad")
            .unwrap();
        assert_eq!(left_pad.candidate.as_str(), "2.0.0");
        assert_eq!(left_pad.bump, BumpKind::Major);
        assert_eq!(left_pad.constraint, ConstraintStatus::Violates);
        assert_eq!(left_pad.suggested_constraint.as_deref(), Some("^2.0.0"));

        let requests = report
            .candidates
            .iter()
            .find(|c| c.package.name == "requests")
            .unwrap();
        assert_eq!(requests.candidate.as_str(), "2.31.0");
        assert!(requests.suggested_constraint.is_some());
    }

    #[tokio::test]
    async fn test_max_bump_from_config() {
        let dir = create_project();
        let config = RunConfig::from_yaml(
            "update:\n  mode: latest\n  max_bump: minor\n  exclude: [express]\n",
            Path::new("depshub.yaml"),
        )
        .unwrap();
        let report = analyze(dir.path(), config, registry()).await;

        let left_pad = report
            .candidates
            .iter()
            .find(|c| c.package.name == "left-pad")
            .unwrap();
        assert_eq!(left_pad.candidate.as_str(), "1.3.0");
        assert!(report.candidates.iter().all(|c| c.package.name != "express"));
        assert!(report.candidates.iter().all(|c| !c.is_major()));
    }
}

mod configuration {
    use super::*;

    #[tokio::test]
    async fn test_stale_custom_rule() {
        let dir = create_test_dir();
        write(
            dir.path(),
            "package.json",
            r#"{ "dependencies": { "fresh": "^1.0.0", "stale": "^1.0.0" } }"#,
        );
        write(dir.path(), "yarn.lock", "# yarn lockfile v1\n");
        write(
            dir.path(),
            "depshub.yaml",
            r#"
rules:
  max-package-age: { enabled: false }
custom_rules:
  - id: stale-dependency
    severity: warning
    message: "{name} has not been published for over two years"
    when:
      - { field: last_publish_days, op: gt, value: 730 }
"#,
        );
        let lookup = StaticLookup::new()
            .with_package(Ecosystem::Npm, "fresh", releases(&["1.0.0"], date(2024, 1, 1)))
            .with_package(Ecosystem::Npm, "stale", releases(&["1.0.0"], date(2019, 1, 1)));

        let config = RunConfig::discover(dir.path()).unwrap();
        let report = analyze(dir.path(), config, lookup).await;

        let stale: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.rule == "stale-dependency")
            .collect();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].severity, Severity::Warning);
        assert_eq!(stale[0].message, "stale has not been published for over two years");
        assert_eq!(report.exit, ExitClass::WarningsOnly);
        assert_eq!(report.status, RunStatus::FindingsPresent);
    }

    #[tokio::test]
    async fn test_manifest_override_disables_rule() {
        let dir = create_test_dir();
        write(dir.path(), "app/package.json", r#"{ "dependencies": { "left-pad": "^1.0.0" } }"#);
        write(
            dir.path(),
            "legacy/package.json",
            r#"{ "dependencies": { "left-pad": "^1.0.0" } }"#,
        );
        write(
            dir.path(),
            "depshub.yaml",
            r#"
manifest_files:
  - filter: "legacy/**"
    rules:
      - { name: lockfile, disabled: true }
"#,
        );

        let config = RunConfig::discover(dir.path()).unwrap();
        let report = analyze(dir.path(), config, registry()).await;

        let flagged: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.rule == "lockfile")
            .filter_map(|f| f.manifest.as_ref())
            .collect();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].ends_with("app/package.json"));
    }

    #[tokio::test]
    async fn test_threshold_from_config() {
        let dir = create_test_dir();
        write(dir.path(), "package.json", r#"{ "dependencies": { "left-pad": "*" } }"#);
        write(dir.path(), "yarn.lock", "# yarn lockfile v1\n");

        let report = analyze(dir.path(), RunConfig::default(), registry()).await;
        assert_eq!(report.exit, ExitClass::WarningsOnly);

        let config = RunConfig::from_yaml("severity_threshold: warning\n", Path::new("depshub.yaml"))
            .unwrap();
        let report = analyze(dir.path(), config, registry()).await;
        assert_eq!(report.exit, ExitClass::Blocking);
        assert!(report.findings.iter().any(|f| f.rule == "no-any-tag"));
    }
}

mod partial_failures {
    use super::*;

    #[tokio::test]
    async fn test_one_malformed_file_among_five() {
        let dir = create_test_dir();
        for name in ["a", "b", "c", "d"] {
            write(
                dir.path(),
                &format!("{}/package.json", name),
                r#"{ "dependencies": { "left-pad": "^1.0.0" } }"#,
            );
        }
        write(dir.path(), "e/package.json", r#"{ "dependencies": { "left-pad": "#);

        let report = analyze(dir.path(), RunConfig::default(), registry()).await;

        let parse_errors: Vec<_> = report.diagnostics_of(DiagnosticKind::ParseError).collect();
        assert_eq!(parse_errors.len(), 1);
        assert!(parse_errors[0]
            .path
            .as_ref()
            .unwrap()
            .ends_with("e/package.json"));
        assert_eq!(report.not_analyzed.len(), 1);
        assert_eq!(report.candidates.len(), 4);
        assert_eq!(report.manifests.len(), 4);
        assert!(report
            .manifests
            .iter()
            .all(|s| !s.findings.is_empty() && s.candidates.len() == 1));
    }

    #[tokio::test]
    async fn test_lookup_timeout_for_one_package() {
        let dir = create_project();
        let lookup = registry().with_failure(Ecosystem::Npm, "express", StaticFailure::Timeout);

        let report = analyze(dir.path(), RunConfig::default(), lookup.clone()).await;
        assert!(report.candidates.iter().all(|c| c.package.name != "express"));
        assert!(report.candidates.iter().any(|c| c.package.name == "left-pad"));
        assert!(report.candidates.iter().any(|c| c.package.name == "serde"));
        assert!(!report.incomplete);

        let strict = RunConfig::default().with_strict(true);
        let report = analyze(dir.path(), strict, lookup).await;
        assert!(report.incomplete);
        assert_eq!(report.status, RunStatus::Incomplete);
        let lookups: Vec<_> = report.diagnostics_of(DiagnosticKind::LookupError).collect();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].package.as_deref(), Some("express"));
        assert_eq!(lookups[0].reason, Some("timeout"));
    }

    #[tokio::test]
    async fn test_timeout_still_returns_report() {
        let dir = create_project();
        let lookup = registry().with_failure(Ecosystem::Cargo, "serde", StaticFailure::Hang);
        let config = RunConfig::default().with_timeout(Duration::from_millis(300));

        let report = analyze(dir.path(), config, lookup).await;
        assert!(report.incomplete);
        assert!(report.candidates.iter().any(|c| c.package.name == "left-pad"));
        assert!(report.candidates.iter().all(|c| c.package.name != "serde"));
    }
}

mod determinism {
    use super::*;

    fn inputs() -> Vec<SourceFile> {
        vec![
            SourceFile::new(
                "web/package.json",
                r#"{ "dependencies": { "left-pad": "^1.0.0", "express": "*", "react": "0.14.0" } }"#,
            ),
            SourceFile::new("service/Cargo.toml", "[dependencies]\nserde = \"1.0.190\"\n"),
            SourceFile::new("tools/requirements.txt", "requests>=2.0\nrequests==2.28.0\n"),
            SourceFile::new("broken/package.json", "{"),
        ]
    }

    async fn run(inputs: Vec<SourceFile>) -> Report {
        Analyzer::new(RunConfig::default())
            .with_time(now())
            .run(inputs, Arc::new(registry()), &CancelSignal::new())
            .await
    }

    #[tokio::test]
    async fn test_input_order_does_not_matter() {
        let forward = run(inputs()).await;
        let mut reversed_inputs = inputs();
        reversed_inputs.reverse();
        let reversed = run(reversed_inputs).await;

        assert_eq!(forward, reversed);
        assert!(!forward.findings.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let first = run(inputs()).await;
        let second = run(inputs()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_findings_in_canonical_order() {
        let report = run(inputs()).await;
        for pair in report.findings.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
    }
}
