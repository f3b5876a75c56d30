//! Analysis runs
//!
//! Workflow: discover → read and parse (one task per file) → merge →
//! look up metadata (one task per package) → evaluate rules → resolve
//! updates → build the report.
//!
//! Only configuration errors are fatal, and those are raised before a run
//! starts. Everything that goes wrong during a run ends up in the report.

use crate::cancel::CancelSignal;
use crate::config::RunConfig;
use crate::domain::Severity;
use crate::error::{IoError, ManifestError};
use crate::graph::Graph;
use crate::manifest::{self, discover, GraphFragment};
use crate::progress::Progress;
use crate::registry::{fetch_all, RegistryLookup};
use crate::report::{Report, ReportBuilder};
use crate::resolver::{UpdatePolicy, UpdateResolver};
use crate::rules::RuleEngine;
use chrono::{DateTime, Utc};
use globset::GlobSet;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A manifest or lockfile handed to the analyzer as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A file to parse; without content it is read from disk first
struct ParseJob {
    path: PathBuf,
    content: Option<String>,
}

impl From<SourceFile> for ParseJob {
    fn from(file: SourceFile) -> Self {
        Self {
            path: file.path,
            content: Some(file.content),
        }
    }
}

enum ParseOutcome {
    Parsed(GraphFragment),
    Failed(ManifestError),
    Cancelled,
}

/// Runs the analysis pipeline with one validated configuration
pub struct Analyzer {
    engine: RuleEngine,
    policy: UpdatePolicy,
    ignore: GlobSet,
    threshold: Severity,
    strict: bool,
    timeout: Option<Duration>,
    concurrency: usize,
    now: Option<DateTime<Utc>>,
    show_progress: bool,
}

impl Analyzer {
    /// Create an analyzer for `config`
    pub fn new(config: RunConfig) -> Self {
        let RunConfig {
            ignore,
            threshold,
            strict,
            timeout,
            concurrency,
            rules,
            overrides,
            policy,
            ..
        } = config;
        Self {
            engine: RuleEngine::new(rules).with_overrides(overrides),
            policy,
            ignore,
            threshold,
            strict,
            timeout,
            concurrency,
            now: None,
            show_progress: false,
        }
    }

    /// Directory manifest override globs are relative to (builder pattern)
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.engine = self.engine.with_root(root);
        self
    }

    /// Clock used by rules and the resolver (builder pattern)
    pub fn with_time(mut self, now: DateTime<Utc>) -> Self {
        self.engine = self.engine.with_time(now);
        self.now = Some(now);
        self
    }

    /// Draw progress spinners on stderr (builder pattern)
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Discover every manifest and lockfile under `root` and analyze them
    ///
    /// Fails only when `root` cannot be walked.
    pub async fn analyze_path(
        &self,
        root: &Path,
        lookup: Arc<dyn RegistryLookup>,
        cancel: &CancelSignal,
    ) -> Result<Report, IoError> {
        let files = discover(root, &self.ignore)?;
        let jobs = files
            .into_iter()
            .map(|file| ParseJob {
                path: file.path,
                content: None,
            })
            .collect();
        Ok(self.execute(jobs, lookup, cancel).await)
    }

    /// Analyze files supplied as text
    pub async fn run(
        &self,
        inputs: Vec<SourceFile>,
        lookup: Arc<dyn RegistryLookup>,
        cancel: &CancelSignal,
    ) -> Report {
        let jobs = inputs.into_iter().map(ParseJob::from).collect();
        self.execute(jobs, lookup, cancel).await
    }

    async fn execute(
        &self,
        jobs: Vec<ParseJob>,
        lookup: Arc<dyn RegistryLookup>,
        cancel: &CancelSignal,
    ) -> Report {
        let timer = self.timeout.map(|timeout| cancel.cancel_after(timeout));
        let mut progress = Progress::new(self.show_progress);
        let mut builder = ReportBuilder::new(self.threshold).with_strict(self.strict);

        // Step 1: Parse every file concurrently
        progress.start(jobs.len() as u64, "Parsing manifests");
        let fragments = parse_all(jobs, cancel, &progress, &mut builder).await;

        // Step 2: Merge into one immutable graph
        let graph = Graph::merge(fragments);
        for record in graph.manifests() {
            builder.manifest(&record.path);
        }
        debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            manifests = graph.manifests().len(),
            "dependency graph built"
        );

        // Step 3: Look up registry metadata concurrently
        progress.spinner("Looking up package metadata");
        let outcome = fetch_all(&graph, lookup, self.concurrency, cancel).await;
        for failure in &outcome.failures {
            builder.lookup_failure(failure);
        }
        if outcome.cancelled || cancel.is_cancelled() {
            builder.cancelled();
        }

        // Step 4: Rules and updates over whatever metadata arrived
        progress.spinner("Evaluating rules");
        builder.findings(self.engine.evaluate(&graph, &outcome.metadata));
        let resolver = match self.now {
            Some(now) => UpdateResolver::with_time(self.policy.clone(), now),
            None => UpdateResolver::new(self.policy.clone()),
        };
        builder.candidates(resolver.resolve(&graph, &outcome.metadata));
        progress.finish_and_clear();

        if let Some(timer) = timer {
            timer.abort();
        }

        let report = builder.build();
        info!(
            findings = report.findings.len(),
            candidates = report.candidates.len(),
            exit = %report.exit,
            incomplete = report.incomplete,
            "analysis finished"
        );
        report
    }
}

async fn parse_job(job: ParseJob) -> ParseOutcome {
    let content = match job.content {
        Some(content) => content,
        None => match tokio::fs::read_to_string(&job.path).await {
            Ok(content) => content,
            Err(source) => {
                return ParseOutcome::Failed(ManifestError::ReadError {
                    path: job.path,
                    source,
                })
            }
        },
    };
    match manifest::parse_file(&job.path, &content) {
        Ok(fragment) => ParseOutcome::Parsed(fragment),
        Err(error) => ParseOutcome::Failed(error),
    }
}

/// Parse every job in its own task. Failures are recorded on `builder`;
/// files cut off by cancellation are listed as not analyzed.
async fn parse_all(
    jobs: Vec<ParseJob>,
    cancel: &CancelSignal,
    progress: &Progress,
    builder: &mut ReportBuilder,
) -> Vec<GraphFragment> {
    let mut tasks = JoinSet::new();
    let mut task_paths = HashMap::new();

    for job in jobs {
        let cancel = cancel.clone();
        let path = job.path.clone();
        let handle = tasks.spawn(async move {
            let path = job.path.clone();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => ParseOutcome::Cancelled,
                outcome = parse_job(job) => outcome,
            };
            (path, outcome)
        });
        task_paths.insert(handle.id(), path);
    }

    let mut fragments = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        progress.inc();
        match joined {
            Ok((path, ParseOutcome::Parsed(fragment))) => {
                debug!(
                    path = %path.display(),
                    dependencies = fragment.dependencies.len(),
                    packages = fragment.packages.len(),
                    "parsed"
                );
                fragments.push(fragment);
            }
            Ok((path, ParseOutcome::Failed(error))) => {
                match &error {
                    ManifestError::UnsupportedFormat { .. } | ManifestError::Unrecognized { .. } => {
                        debug!(path = %path.display(), error = %error, "no adapter");
                        // An unparsed lockfile still marks its manifest as locked
                        fragments.extend(manifest::lockfile_marker(&path));
                    }
                    _ => warn!(path = %path.display(), error = %error, "failed to parse"),
                }
                builder.manifest_error(&error);
            }
            Ok((path, ParseOutcome::Cancelled)) => {
                debug!(path = %path.display(), "parse cancelled");
                builder.not_analyzed(path);
            }
            Err(join_error) => {
                // A panicking parser only loses its own file
                if let Some(path) = task_paths.remove(&join_error.id()) {
                    warn!(path = %path.display(), "parse task failed");
                    builder.manifest_error(&ManifestError::parse_error(
                        path,
                        None,
                        format!("parser failed: {}", join_error),
                    ));
                }
            }
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BumpKind, Ecosystem, PackageMetadata, PublishedVersion};
    use crate::registry::{StaticFailure, StaticLookup};
    use crate::report::{DiagnosticKind, ExitClass, RunStatus};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn releases(versions: &[&str]) -> PackageMetadata {
        let published = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PackageMetadata::new(
            versions
                .iter()
                .map(|v| PublishedVersion::new(v, Some(published)))
                .collect(),
        )
        .with_license(Some("MIT".to_string()))
        .with_weekly_downloads(Some(1_000_000))
    }

    fn package_json(deps: &[(&str, &str)]) -> String {
        let body: Vec<String> = deps
            .iter()
            .map(|(name, constraint)| format!("    \"{}\": \"{}\"", name, constraint))
            .collect();
        format!("{{\n  \"dependencies\": {{\n{}\n  }}\n}}\n", body.join(",\n"))
    }

    fn analyzer() -> Analyzer {
        Analyzer::new(RunConfig::default()).with_time(now())
    }

    #[tokio::test]
    async fn test_run_left_pad_minor_update() {
        let lookup = StaticLookup::new().with_package(
            Ecosystem::Npm,
            "left-pad",
            releases(&["1.0.0", "1.0.1", "1.3.0", "2.0.0"]),
        );
        let inputs = vec![SourceFile::new(
            "package.json",
            package_json(&[("left-pad", "^1.0.0")]),
        )];

        let report = analyzer()
            .run(inputs, Arc::new(lookup), &CancelSignal::new())
            .await;

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].candidate.as_str(), "1.3.0");
        assert_eq!(report.candidates[0].bump, BumpKind::Minor);
        assert!(!report.incomplete);
        // No lockfile next to package.json
        assert!(report.findings.iter().any(|f| f.rule == "lockfile"));
        assert_eq!(report.exit, ExitClass::Blocking);
    }

    #[tokio::test]
    async fn test_run_malformed_file_among_five() {
        let mut inputs: Vec<SourceFile> = (0..4)
            .map(|i| {
                SourceFile::new(
                    format!("app{}/package.json", i),
                    package_json(&[("left-pad", "^1.0.0")]),
                )
            })
            .collect();
        inputs.push(SourceFile::new("broken/package.json", "{ \"dependencies\": "));
        let lookup = StaticLookup::new().with_package(
            Ecosystem::Npm,
            "left-pad",
            releases(&["1.0.0", "1.3.0"]),
        );

        let report = analyzer()
            .run(inputs, Arc::new(lookup), &CancelSignal::new())
            .await;

        assert_eq!(report.diagnostics_of(DiagnosticKind::ParseError).count(), 1);
        assert_eq!(report.not_analyzed, vec![PathBuf::from("broken/package.json")]);
        assert_eq!(report.candidates.len(), 4);
        for i in 0..4 {
            let path = PathBuf::from(format!("app{}/package.json", i));
            let section = report.section(&path).unwrap();
            assert_eq!(section.candidates.len(), 1);
            assert!(!section.findings.is_empty());
        }
        assert!(!report.incomplete);
    }

    #[tokio::test]
    async fn test_run_lookup_timeout() {
        let inputs = vec![SourceFile::new(
            "package.json",
            package_json(&[("left-pad", "^1.0.0"), ("slow", "^1.0.0")]),
        )];
        let lookup = Arc::new(
            StaticLookup::new()
                .with_package(Ecosystem::Npm, "left-pad", releases(&["1.0.0", "1.3.0"]))
                .with_failure(Ecosystem::Npm, "slow", StaticFailure::Timeout),
        );

        let report = analyzer()
            .run(inputs.clone(), lookup.clone(), &CancelSignal::new())
            .await;
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].package.name, "left-pad");
        assert!(!report.incomplete);
        assert_eq!(report.diagnostics_of(DiagnosticKind::LookupError).count(), 1);

        let strict = Analyzer::new(RunConfig::default().with_strict(true)).with_time(now());
        let report = strict.run(inputs, lookup, &CancelSignal::new()).await;
        assert_eq!(report.candidates.len(), 1);
        assert!(report.incomplete);
        assert_eq!(report.status, RunStatus::Incomplete);
    }

    #[tokio::test]
    async fn test_run_timeout_returns_partial_report() {
        let inputs = vec![SourceFile::new(
            "package.json",
            package_json(&[("left-pad", "^1.0.0"), ("stuck", "^1.0.0")]),
        )];
        let lookup = StaticLookup::new()
            .with_package(Ecosystem::Npm, "left-pad", releases(&["1.0.0", "1.3.0"]))
            .with_failure(Ecosystem::Npm, "stuck", StaticFailure::Hang);
        let config = RunConfig::default().with_timeout(Duration::from_millis(200));

        let report = Analyzer::new(config)
            .with_time(now())
            .run(inputs, Arc::new(lookup), &CancelSignal::new())
            .await;

        assert!(report.incomplete);
        assert_eq!(report.status, RunStatus::Incomplete);
        assert_eq!(report.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let inputs = vec![SourceFile::new(
            "package.json",
            package_json(&[("left-pad", "^1.0.0")]),
        )];

        let report = analyzer()
            .run(inputs, Arc::new(StaticLookup::new()), &cancel)
            .await;

        assert!(report.incomplete);
        assert_eq!(report.not_analyzed, vec![PathBuf::from("package.json")]);
        assert!(report.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_lockfile_still_locks_manifest() {
        let inputs = vec![
            SourceFile::new("package.json", package_json(&[("left-pad", "^1.0.0")])),
            SourceFile::new("yarn.lock", "# yarn lockfile v1\n"),
        ];

        let report = analyzer()
            .run(inputs, Arc::new(StaticLookup::new()), &CancelSignal::new())
            .await;

        assert!(report.findings.iter().all(|f| f.rule != "lockfile"));
        assert_eq!(report.diagnostics_of(DiagnosticKind::UnsupportedFormat).count(), 1);
        assert!(report.not_analyzed.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_path_respects_ignore() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            package_json(&[("left-pad", "^1.0.0")]),
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("legacy")).unwrap();
        fs::write(dir.path().join("legacy/package.json"), "not json").unwrap();
        fs::write(
            dir.path().join("depshub.yaml"),
            "ignore: [\"legacy/**\"]\n",
        )
        .unwrap();

        let config = RunConfig::discover(dir.path()).unwrap();
        let report = Analyzer::new(config)
            .with_root(dir.path())
            .with_time(now())
            .analyze_path(dir.path(), Arc::new(StaticLookup::new()), &CancelSignal::new())
            .await
            .unwrap();

        assert!(report.diagnostics_of(DiagnosticKind::ParseError).next().is_none());
        assert_eq!(report.manifests.len(), 1);
        assert_eq!(report.diagnostics_of(DiagnosticKind::LookupError).count(), 1);
    }

    #[tokio::test]
    async fn test_analyze_missing_path() {
        let result = analyzer()
            .analyze_path(
                Path::new("/nonexistent/project"),
                Arc::new(StaticLookup::new()),
                &CancelSignal::new(),
            )
            .await;
        assert!(result.is_err());
    }
}
