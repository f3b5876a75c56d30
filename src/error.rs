//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ManifestError: a manifest or lockfile could not be read or parsed
//! - LookupError: a registry lookup failed for one package
//! - RuleFault: a rule failed while evaluating
//! - ConfigError: the run configuration is invalid (the only fatal class)
//! - IoError: file system operation failures during discovery

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Manifest file related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Registry lookup related errors
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO related errors
    #[error(transparent)]
    Io(#[from] IoError),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(":{}", line),
        None => String::new(),
    }
}

/// Errors related to manifest and lockfile parsing
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Malformed input, with the offending location when known
    #[error("failed to parse {path}{}: {message}", line_suffix(.line))]
    ParseError {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// Recognized file without an adapter
    #[error("unsupported format '{format}': {path}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File that no adapter recognizes
    #[error("unrecognized manifest file: {path}")]
    Unrecognized { path: PathBuf },

    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to package registry lookups
#[derive(Error, Debug)]
pub enum LookupError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    NotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    Network {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimited { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    /// No registry is configured for the ecosystem
    #[error("no registry available for {ecosystem} packages")]
    Unsupported { ecosystem: String },

    /// The run was cancelled before the lookup finished
    #[error("lookup of '{package}' cancelled")]
    Cancelled { package: String },
}

/// A rule implementation failed during evaluation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleFault {
    /// The rule returned an error
    #[error("rule '{rule}' failed: {message}")]
    Failed { rule: String, message: String },

    /// The rule panicked
    #[error("rule '{rule}' panicked: {message}")]
    Panicked { rule: String, message: String },
}

/// Errors related to configuration. Any of these aborts the run before analysis.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML or has the wrong shape
    #[error("invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Unsupported config file version
    #[error("unsupported config version {version}, expected 1")]
    UnsupportedVersion { version: u32 },

    /// Rule id that is neither built in nor defined as a custom rule
    #[error("unknown rule '{rule}'")]
    UnknownRule { rule: String },

    /// Two custom rules, or a custom and a built-in rule, share an id
    #[error("duplicate rule id '{rule}'")]
    DuplicateRule { rule: String },

    /// Rule parameter has the wrong type or is out of range
    #[error("invalid parameter '{parameter}' for rule '{rule}': {message}")]
    InvalidParameter {
        rule: String,
        parameter: String,
        message: String,
    },

    /// Unknown severity name
    #[error("invalid severity '{value}': expected 'error', 'warning' or 'info'")]
    InvalidSeverity { value: String },

    /// Glob pattern failed to compile
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Custom rule definition is malformed
    #[error("invalid custom rule '{rule}': {message}")]
    InvalidCustomRule { rule: String, message: String },

    /// Update policy value is malformed
    #[error("invalid update policy: {message}")]
    InvalidPolicy { message: String },
}

/// Errors related to IO operations
#[derive(Error, Debug)]
pub enum IoError {
    /// Directory not found
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Generic IO error
    #[error("IO error at {path}: {source}")]
    Generic {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ManifestError {
    /// Creates a new ParseError with a known line
    pub fn parse_error(
        path: impl Into<PathBuf>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        ManifestError::ParseError {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates a ParseError from a serde_json error, which carries its own line
    pub fn json_parse_error(path: impl Into<PathBuf>, err: &serde_json::Error) -> Self {
        ManifestError::ParseError {
            path: path.into(),
            line: Some(err.line()),
            message: err.to_string(),
        }
    }

    /// Creates a ParseError from a TOML error, translating the byte span into a line
    pub fn toml_parse_error(
        path: impl Into<PathBuf>,
        content: &str,
        err: &toml::de::Error,
    ) -> Self {
        let line = err.span().map(|span| {
            content
                .get(..span.start)
                .unwrap_or(content)
                .matches('\n')
                .count()
                + 1
        });
        ManifestError::ParseError {
            path: path.into(),
            line,
            message: err.message().to_string(),
        }
    }

    /// Creates a new UnsupportedFormat error
    pub fn unsupported(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        ManifestError::UnsupportedFormat {
            path: path.into(),
            format: format.into(),
        }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Returns true for files that were recognized but have no adapter
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ManifestError::UnsupportedFormat { .. })
    }

    /// Path of the file the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            ManifestError::ParseError { path, .. }
            | ManifestError::UnsupportedFormat { path, .. }
            | ManifestError::Unrecognized { path }
            | ManifestError::ReadError { path, .. } => path,
        }
    }

    /// Line of the offending input, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            ManifestError::ParseError { line, .. } => *line,
            _ => None,
        }
    }
}

impl LookupError {
    /// Creates a new NotFound error
    pub fn not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        LookupError::NotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new Network error
    pub fn network(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LookupError::Network {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new RateLimited error
    pub fn rate_limited(registry: impl Into<String>) -> Self {
        LookupError::RateLimited {
            registry: registry.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        LookupError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LookupError::InvalidResponse {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::NotFound { .. } => "not_found",
            LookupError::Network { .. } => "network",
            LookupError::RateLimited { .. } => "rate_limited",
            LookupError::InvalidResponse { .. } => "invalid_response",
            LookupError::Timeout { .. } => "timeout",
            LookupError::Unsupported { .. } => "unsupported",
            LookupError::Cancelled { .. } => "cancelled",
        }
    }
}

impl RuleFault {
    /// Creates a new Failed fault
    pub fn failed(rule: impl Into<String>, message: impl Into<String>) -> Self {
        RuleFault::Failed {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Id of the faulty rule
    pub fn rule(&self) -> &str {
        match self {
            RuleFault::Failed { rule, .. } | RuleFault::Panicked { rule, .. } => rule,
        }
    }
}

impl ConfigError {
    /// Creates a new InvalidParameter error
    pub fn invalid_parameter(
        rule: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidParameter {
            rule: rule.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidCustomRule error
    pub fn invalid_custom_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidCustomRule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidGlob error
    pub fn invalid_glob(pattern: impl Into<String>, err: &globset::Error) -> Self {
        ConfigError::InvalidGlob {
            pattern: pattern.into(),
            message: err.kind().to_string(),
        }
    }
}

impl IoError {
    /// Creates a new DirectoryNotFound error
    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        IoError::DirectoryNotFound { path: path.into() }
    }

    /// Creates a new Generic IO error
    pub fn generic(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IoError::Generic {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_with_line() {
        let err = ManifestError::parse_error("/repo/package.json", Some(4), "unexpected token");
        let msg = format!("{}", err);
        assert!(msg.contains("/repo/package.json:4"));
        assert!(msg.contains("unexpected token"));
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_parse_error_without_line() {
        let err = ManifestError::parse_error("/repo/Gemfile", None, "bad");
        assert_eq!(format!("{}", err), "failed to parse /repo/Gemfile: bad");
    }

    #[test]
    fn test_json_parse_error_carries_line() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\n\"a\": ,\n}").unwrap_err();
        let err = ManifestError::json_parse_error("package.json", &json_err);
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_toml_parse_error_carries_line() {
        let content = "[package]\nname = \"x\"\nversion = \n";
        let toml_err = content.parse::<toml::Value>().unwrap_err();
        let err = ManifestError::toml_parse_error("Cargo.toml", content, &toml_err);
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_unsupported_format() {
        let err = ManifestError::unsupported("/repo/yarn.lock", "yarn.lock");
        assert!(err.is_unsupported());
        assert!(format!("{}", err).contains("yarn.lock"));
        assert_eq!(err.path(), &PathBuf::from("/repo/yarn.lock"));
    }

    #[test]
    fn test_lookup_error_kinds() {
        assert_eq!(LookupError::not_found("pkg", "npm").kind(), "not_found");
        assert_eq!(LookupError::timeout("serde", "crates.io").kind(), "timeout");
        assert_eq!(LookupError::rate_limited("npm").kind(), "rate_limited");
        assert_eq!(
            LookupError::network("lodash", "npm", "connection refused").kind(),
            "network"
        );
    }

    #[test]
    fn test_lookup_error_messages() {
        let msg = format!("{}", LookupError::not_found("nonexistent-package", "npm"));
        assert!(msg.contains("package 'nonexistent-package' not found"));

        let msg = format!("{}", LookupError::timeout("serde", "crates.io"));
        assert!(msg.contains("timeout"));
        assert!(msg.contains("serde"));
    }

    #[test]
    fn test_rule_fault_rule_id() {
        let fault = RuleFault::failed("max-libyear", "missing metadata");
        assert_eq!(fault.rule(), "max-libyear");
        assert!(format!("{}", fault).contains("missing metadata"));
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::UnknownRule {
            rule: "no-such-rule".to_string(),
        };
        assert!(format!("{}", err).contains("no-such-rule"));

        let err = ConfigError::invalid_parameter("max-libyear", "value", "expected a number");
        let msg = format!("{}", err);
        assert!(msg.contains("max-libyear"));
        assert!(msg.contains("expected a number"));
    }

    #[test]
    fn test_app_error_from_config_error() {
        let app_err: AppError = ConfigError::InvalidSeverity {
            value: "fatal".to_string(),
        }
        .into();
        assert!(format!("{}", app_err).contains("invalid severity 'fatal'"));
    }

    #[test]
    fn test_app_error_from_io_error() {
        let app_err: AppError = IoError::directory_not_found("/missing").into();
        assert!(format!("{}", app_err).contains("directory not found"));
    }
}
