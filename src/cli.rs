//! CLI argument parsing module for depshub

use crate::config::RunConfig;
use crate::domain::{BumpKind, Severity};
use crate::error::ConfigError;
use crate::report::ExitClass;
use crate::resolver::UpdateMode;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit status for `ok` and `warnings-only` runs
pub const EXIT_OK: u8 = 0;
/// Exit status when a finding reaches the threshold
pub const EXIT_BLOCKING: u8 = 1;
/// Exit status for invalid configuration and unusable input paths
pub const EXIT_FATAL: u8 = 2;

/// Parse duration string in format: Nd (days), Nw (weeks), Nm (months)
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, days_per_unit) = if let Some(n) = s.strip_suffix('d') {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('w') {
        (n, 7)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 30)
    } else {
        return Err(format!("invalid duration format: {}", s));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", num_str))?;

    Ok(Duration::from_secs(num * days_per_unit * 24 * 60 * 60))
}

/// Multi-ecosystem dependency linter and update resolver
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depshub",
    version,
    about = "Lint dependencies and propose updates across ecosystems"
)]
pub struct CliArgs {
    /// Project directory or single manifest (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Configuration file (default: depshub.yaml in the project directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    // Output options
    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output and debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the summary line only
    #[arg(short, long)]
    pub quiet: bool,

    // Run options
    /// Mark the report incomplete when a registry lookup fails
    #[arg(long)]
    pub strict: bool,

    /// Do not contact any registry
    #[arg(long)]
    pub offline: bool,

    /// Stop the run after this many seconds and report what was gathered
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Severity at which findings fail the run
    #[arg(long, value_name = "error|warning|info")]
    pub threshold: Option<Severity>,

    // Update options
    /// Pick updates within the declared constraint or the latest version
    #[arg(long, value_name = "constraint|latest")]
    pub mode: Option<UpdateMode>,

    /// Largest update to propose
    #[arg(long, value_name = "patch|minor|major")]
    pub max_bump: Option<BumpKind>,

    /// Never propose updates for a package (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Only propose updates for these packages (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    /// Only propose versions released at least this long ago (e.g., 2w, 10d, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub min_age: Option<Duration>,

    /// Consider prerelease versions
    #[arg(long)]
    pub prerelease: bool,
}

impl CliArgs {
    /// Directory the project lives in
    pub fn root_dir(&self) -> &Path {
        if self.path.is_file() {
            self.path.parent().unwrap_or(Path::new("."))
        } else {
            &self.path
        }
    }

    /// Load the configuration named by `--config`, or the project's own
    pub fn load_config(&self) -> Result<RunConfig, ConfigError> {
        match &self.config {
            Some(path) => RunConfig::load(path),
            None => RunConfig::discover(self.root_dir()),
        }
    }

    /// Apply flags on top of file configuration
    pub fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if self.strict {
            config.strict = true;
        }
        if let Some(secs) = self.timeout {
            config.timeout = Some(Duration::from_secs(secs));
        }

        let policy = &mut config.policy;
        if let Some(mode) = self.mode {
            policy.mode = mode;
        }
        if let Some(max_bump) = self.max_bump {
            policy.max_bump = max_bump;
        }
        policy.exclude.extend(self.exclude.iter().cloned());
        if !self.only.is_empty() {
            policy.only = self.only.clone();
        }
        if let Some(age) = self.min_age {
            policy.min_age = Some(age);
        }
        if self.prerelease {
            policy.include_prerelease = true;
        }
        config
    }
}

/// Process exit status for a run outcome
pub fn exit_code(exit: ExitClass) -> u8 {
    match exit {
        ExitClass::Ok | ExitClass::WarningsOnly => EXIT_OK,
        ExitClass::Blocking => EXIT_BLOCKING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["depshub"]);
        assert_eq!(args.path, PathBuf::from("."));
        assert!(args.config.is_none());
        assert!(!args.json);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(!args.strict);
        assert!(!args.offline);
        assert!(args.timeout.is_none());
        assert!(args.threshold.is_none());
        assert!(args.mode.is_none());
        assert!(args.max_bump.is_none());
        assert!(args.exclude.is_empty());
        assert!(args.only.is_empty());
        assert!(args.min_age.is_none());
        assert!(!args.prerelease);
    }

    #[test]
    fn test_path_and_config() {
        let args = CliArgs::parse_from(["depshub", "/some/path", "--config", "ci/depshub.yaml"]);
        assert_eq!(args.path, PathBuf::from("/some/path"));
        assert_eq!(args.config, Some(PathBuf::from("ci/depshub.yaml")));
    }

    #[test]
    fn test_typed_flags() {
        let args = CliArgs::parse_from([
            "depshub",
            "--threshold",
            "warning",
            "--mode",
            "latest",
            "--max-bump",
            "minor",
            "--timeout",
            "30",
        ]);
        assert_eq!(args.threshold, Some(Severity::Warning));
        assert_eq!(args.mode, Some(UpdateMode::Latest));
        assert_eq!(args.max_bump, Some(BumpKind::Minor));
        assert_eq!(args.timeout, Some(30));
    }

    #[test]
    fn test_invalid_typed_flags() {
        assert!(CliArgs::try_parse_from(["depshub", "--mode", "newest"]).is_err());
        assert!(CliArgs::try_parse_from(["depshub", "--max-bump", "huge"]).is_err());
        assert!(CliArgs::try_parse_from(["depshub", "--threshold", "fatal"]).is_err());
    }

    #[test]
    fn test_exclude_multiple() {
        let args = CliArgs::parse_from(["depshub", "--exclude", "foo", "--exclude", "bar"]);
        assert_eq!(args.exclude, vec!["foo", "bar"]);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(14 * 86400));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(30 * 86400));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn test_apply_overrides_file_values() {
        let config = RunConfig::from_yaml(
            "strict: false\nseverity_threshold: error\nupdate:\n  exclude: [left-pad]\n  max_bump: major\n",
            Path::new("depshub.yaml"),
        )
        .unwrap();
        let args = CliArgs::parse_from([
            "depshub",
            "--strict",
            "--threshold",
            "info",
            "--max-bump",
            "patch",
            "--exclude",
            "react",
            "--min-age",
            "1w",
            "--prerelease",
        ]);

        let config = args.apply(config);
        assert!(config.strict);
        assert_eq!(config.threshold, Severity::Info);
        assert_eq!(config.policy.max_bump, BumpKind::Patch);
        assert_eq!(config.policy.exclude, vec!["left-pad", "react"]);
        assert_eq!(config.policy.min_age, Some(Duration::from_secs(7 * 86400)));
        assert!(config.policy.include_prerelease);
    }

    #[test]
    fn test_apply_keeps_file_values_without_flags() {
        let config = RunConfig::from_yaml(
            "strict: true\ntimeout: 5\nupdate:\n  mode: latest\n",
            Path::new("depshub.yaml"),
        )
        .unwrap();
        let config = CliArgs::parse_from(["depshub"]).apply(config);
        assert!(config.strict);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.policy.mode, UpdateMode::Latest);
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(ExitClass::Ok), EXIT_OK);
        assert_eq!(exit_code(ExitClass::WarningsOnly), EXIT_OK);
        assert_eq!(exit_code(ExitClass::Blocking), EXIT_BLOCKING);
    }
}
