//! Run configuration
//!
//! Handles:
//! - Reading `depshub.yaml` / `depshub.yml`
//! - Validating rule ids, severities, parameters, globs and custom rules
//! - Producing a `RunConfig` value threaded through the run
//!
//! Every problem is reported as a `ConfigError` before analysis starts.

use crate::domain::{BumpKind, Severity};
use crate::error::ConfigError;
use crate::registry::DEFAULT_CONCURRENCY;
use crate::resolver::{UpdateMode, UpdatePolicy};
use crate::rules::builtin::builtin_rules;
use crate::rules::{
    ConfiguredRule, CustomRule, CustomRuleDef, ManifestOverride, ParamValue, Rule, RuleOverride,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File names looked up in the project root
pub const CONFIG_FILE_NAMES: &[&str] = &["depshub.yaml", "depshub.yml"];

/// Only supported configuration version
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    version: Option<u32>,
    #[serde(default)]
    ignore: Vec<String>,
    severity_threshold: Option<String>,
    strict: Option<bool>,
    /// Whole-run timeout in seconds
    timeout: Option<u64>,
    concurrency: Option<usize>,
    #[serde(default)]
    rules: BTreeMap<String, RuleEntry>,
    #[serde(default)]
    manifest_files: Vec<ManifestEntry>,
    #[serde(default)]
    custom_rules: Vec<CustomRuleDef>,
    update: Option<UpdateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    enabled: Option<bool>,
    severity: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    filter: String,
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    rules: Vec<RuleOverrideEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleOverrideEntry {
    name: String,
    #[serde(default)]
    disabled: bool,
    level: Option<String>,
    value: Option<serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateEntry {
    mode: Option<String>,
    max_bump: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    only: Vec<String>,
    include_prerelease: Option<bool>,
    min_age_days: Option<u64>,
    include_transitive: Option<bool>,
}

/// Validated configuration of one run
#[derive(Debug)]
pub struct RunConfig {
    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
    /// Ignore globs as written
    pub ignore_patterns: Vec<String>,
    /// Compiled ignore globs; matching manifests are never parsed
    pub ignore: GlobSet,
    /// Findings at or above this severity block
    pub threshold: Severity,
    /// Lookup failures mark the report incomplete
    pub strict: bool,
    /// Whole-run timeout
    pub timeout: Option<Duration>,
    /// Maximum registry lookups in flight
    pub concurrency: usize,
    /// Rules with their resolved settings
    pub rules: Vec<ConfiguredRule>,
    /// Per-manifest overrides
    pub overrides: Vec<ManifestOverride>,
    /// Update resolution policy
    pub policy: UpdatePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: None,
            ignore_patterns: Vec::new(),
            ignore: GlobSet::empty(),
            threshold: Severity::Error,
            strict: false,
            timeout: None,
            concurrency: DEFAULT_CONCURRENCY,
            rules: builtin_rules().into_iter().map(ConfiguredRule::new).collect(),
            overrides: Vec::new(),
            policy: UpdatePolicy::default(),
        }
    }
}

fn parse_severity(value: &str) -> Result<Severity, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidSeverity {
        value: value.to_string(),
    })
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::invalid_glob(pattern, &e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::invalid_glob(patterns.join(", "), &e))
}

fn primary_value(rule: &Rule, value: &serde_yaml::Value) -> Result<ParamValue, ConfigError> {
    let Some((parameter, kind)) = rule.primary_parameter() else {
        return Err(ConfigError::invalid_parameter(
            rule.id(),
            "value",
            "rule takes no value",
        ));
    };
    ParamValue::from_yaml(kind, value)
        .map_err(|message| ConfigError::invalid_parameter(rule.id(), parameter, message))
}

impl RunConfig {
    /// Parse and validate configuration text; `path` is used in error messages
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = if text.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        let mut config = Self::from_file(file)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }

    /// Load the configuration file of a project root, or defaults when there is none
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let dir = if root.is_file() {
            root.parent().unwrap_or(Path::new("."))
        } else {
            root
        };
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using configuration file");
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// Sets the blocking threshold (builder pattern)
    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets strict mode (builder pattern)
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the whole-run timeout (builder pattern)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the update policy (builder pattern)
    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Settings of a configured rule
    pub fn rule(&self, id: &str) -> Option<&ConfiguredRule> {
        self.rules.iter().find(|r| r.rule.id() == id)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(version) = file.version {
            if version != CONFIG_VERSION {
                return Err(ConfigError::UnsupportedVersion { version });
            }
        }

        let mut config = Self {
            ignore: compile_globs(&file.ignore)?,
            ignore_patterns: file.ignore,
            ..Self::default()
        };
        if let Some(threshold) = &file.severity_threshold {
            config.threshold = parse_severity(threshold)?;
        }
        config.strict = file.strict.unwrap_or(false);
        config.timeout = file.timeout.map(Duration::from_secs);
        if let Some(concurrency) = file.concurrency {
            config.concurrency = concurrency.max(1);
        }

        // Custom rules join the built-ins before any settings are applied
        let mut ids: HashSet<String> = config.rules.iter().map(|r| r.rule.id().to_string()).collect();
        for def in &file.custom_rules {
            let custom = CustomRule::compile(def)?;
            let rule = Rule::Node(Box::new(custom));
            if !ids.insert(rule.id().to_string()) {
                return Err(ConfigError::DuplicateRule {
                    rule: rule.id().to_string(),
                });
            }
            config.rules.push(ConfiguredRule::new(rule));
        }

        for (id, entry) in &file.rules {
            let configured = config
                .rules
                .iter_mut()
                .find(|r| r.rule.id() == id)
                .ok_or_else(|| ConfigError::UnknownRule { rule: id.clone() })?;
            if let Some(enabled) = entry.enabled {
                configured.settings.enabled = enabled;
            }
            if let Some(severity) = &entry.severity {
                configured.settings.severity = parse_severity(severity)?;
            }
            for (name, value) in &entry.parameters {
                let kind = configured
                    .rule
                    .parameters()
                    .iter()
                    .find(|(known, _)| known == name)
                    .map(|(_, kind)| *kind)
                    .ok_or_else(|| {
                        ConfigError::invalid_parameter(id, name, "unknown parameter")
                    })?;
                let value = ParamValue::from_yaml(kind, value)
                    .map_err(|message| ConfigError::invalid_parameter(id, name, message))?;
                configured.settings.parameters.insert(name.clone(), value);
            }
        }

        for entry in &file.manifest_files {
            let matcher = Glob::new(&entry.filter)
                .map_err(|e| ConfigError::invalid_glob(&entry.filter, &e))?
                .compile_matcher();
            let mut manifest_override = ManifestOverride::new(&entry.filter, matcher)
                .with_packages(entry.packages.clone());
            for rule_entry in &entry.rules {
                let configured = config
                    .rules
                    .iter()
                    .find(|r| r.rule.id() == rule_entry.name)
                    .ok_or_else(|| ConfigError::UnknownRule {
                        rule: rule_entry.name.clone(),
                    })?;
                let mut rule_override = RuleOverride::new(&rule_entry.name);
                rule_override.disabled = rule_entry.disabled;
                if let Some(level) = &rule_entry.level {
                    rule_override.severity = Some(parse_severity(level)?);
                }
                if let Some(value) = &rule_entry.value {
                    rule_override.value = Some(primary_value(&configured.rule, value)?);
                }
                manifest_override = manifest_override.with_rule(rule_override);
            }
            config.overrides.push(manifest_override);
        }

        if let Some(update) = file.update {
            config.policy = policy_from(update)?;
        }

        Ok(config)
    }
}

fn policy_from(entry: UpdateEntry) -> Result<UpdatePolicy, ConfigError> {
    let mut policy = UpdatePolicy::new()
        .with_exclude(entry.exclude)
        .with_only(entry.only);
    if let Some(mode) = &entry.mode {
        let mode: UpdateMode = mode
            .parse()
            .map_err(|message| ConfigError::InvalidPolicy { message })?;
        policy = policy.with_mode(mode);
    }
    if let Some(max_bump) = &entry.max_bump {
        let max_bump: BumpKind = max_bump
            .parse()
            .map_err(|message| ConfigError::InvalidPolicy { message })?;
        policy = policy.with_max_bump(max_bump);
    }
    if let Some(include) = entry.include_prerelease {
        policy = policy.with_include_prerelease(include);
    }
    if let Some(days) = entry.min_age_days.filter(|days| *days > 0) {
        policy = policy.with_min_age(Duration::from_secs(days * 24 * 60 * 60));
    }
    if let Some(include) = entry.include_transitive {
        policy = policy.with_include_transitive(include);
    }
    Ok(policy)
}
