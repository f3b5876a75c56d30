//! Version constraint types shared by every ecosystem
//!
//! A constraint keeps the declaration as written plus a structured form: a
//! disjunction of conjunctions of comparators (`>=1.2.3 <2.0.0 || >=3.0.0`).
//! Each ecosystem parser desugars its operators (`^`, `~`, `~>`, `~=`, Maven
//! ranges) into comparators with the helpers at the bottom of this module.

use super::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of version constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Exact/pinned version (`1.2.3` for npm, `==1.2.3` for pip, `=1.2.3` for Cargo)
    Exact,
    /// Caret range (`^1.2.3`, bare `1.2.3` in Cargo)
    Caret,
    /// Tilde range (`~1.2.3`)
    Tilde,
    /// PEP 440 compatible release (`~=1.4.2`)
    Compatible,
    /// Pessimistic operator (`~> 1.2` in Bundler and Mix)
    Pessimistic,
    /// Greater than or equal (`>=1.2.3`)
    GreaterOrEqual,
    /// Greater than (`>1.2.3`)
    Greater,
    /// Less than or equal (`<=1.2.3`)
    LessOrEqual,
    /// Less than (`<1.2.3`)
    Less,
    /// Exclusion (`!=1.2.3`)
    NotEqual,
    /// Wildcard (`1.2.*`, `1.x`)
    Wildcard,
    /// Several comparators or alternatives (`>=1.0.0 <2.0.0`, `[1.0,2.0)`)
    Range,
    /// Minimum version selected by the tool (go.mod requirements)
    Minimum,
    /// Any version (`*`, empty, no version given)
    Any,
    /// Dist-tag or symbolic version (`latest`, `next`, `RELEASE`)
    Tag,
    /// Not understood, or not a registry version (path, git, url)
    Unparsed,
}

impl ConstraintKind {
    /// Returns true if this kind represents a pinned/exact version
    pub fn is_pinned(&self) -> bool {
        matches!(self, ConstraintKind::Exact)
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single `op version` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    /// Creates a new comparator
    pub fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// Evaluates the comparator, or None when the versions are not comparable
    pub fn matches(&self, version: &Version) -> Option<bool> {
        if !version.is_structured() || !self.version.is_structured() {
            return match self.op {
                Op::Eq if !version.is_structured() && !self.version.is_structured() => {
                    Some(version.as_str() == self.version.as_str())
                }
                _ => None,
            };
        }
        let ordering = version.cmp(&self.version);
        Some(match self.op {
            Op::Eq => ordering.is_eq(),
            Op::Ne => ordering.is_ne(),
            Op::Gt => ordering.is_gt(),
            Op::Gte => ordering.is_ge(),
            Op::Lt => ordering.is_lt(),
            Op::Lte => ordering.is_le(),
        })
    }
}

/// A declared version constraint with its original string representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The kind of constraint
    pub kind: ConstraintKind,
    /// The raw constraint string as it appears in the manifest
    pub raw: String,
    /// The base version named by the constraint, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Operator prefix to preserve when suggesting a new constraint (`^`, `~>`, `>=`)
    #[serde(skip)]
    pub prefix: Option<String>,
    /// Alternatives, each a conjunction of comparators. An empty conjunction matches anything.
    #[serde(skip)]
    alternatives: Vec<Vec<Comparator>>,
}

impl Constraint {
    /// Creates a new constraint from its parsed parts
    pub fn new(
        kind: ConstraintKind,
        raw: impl Into<String>,
        version: Option<&str>,
        alternatives: Vec<Vec<Comparator>>,
    ) -> Self {
        Self {
            kind,
            raw: raw.into(),
            version: version.map(String::from),
            prefix: None,
            alternatives,
        }
    }

    /// Sets the operator prefix (builder pattern)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Constraint accepting any version
    pub fn any(raw: impl Into<String>) -> Self {
        Self::new(ConstraintKind::Any, raw, None, vec![Vec::new()])
    }

    /// Constraint naming exactly one version
    pub fn exact(version: &str) -> Self {
        Self::new(
            ConstraintKind::Exact,
            version,
            Some(version),
            vec![vec![Comparator::new(Op::Eq, Version::parse(version))]],
        )
    }

    /// Symbolic constraint such as a dist-tag
    pub fn tag(raw: impl Into<String>) -> Self {
        Self::new(ConstraintKind::Tag, raw, None, Vec::new())
    }

    /// Constraint that could not be understood
    pub fn unparsed(raw: impl Into<String>) -> Self {
        Self::new(ConstraintKind::Unparsed, raw, None, Vec::new())
    }

    /// Returns true if this constraint is pinned
    pub fn is_pinned(&self) -> bool {
        self.kind.is_pinned()
    }

    /// Returns true for `*`, empty and tag constraints such as `latest`
    pub fn is_any_tag(&self) -> bool {
        let raw = self.raw.trim();
        raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("latest")
    }

    /// The version named by the constraint
    pub fn base_version(&self) -> Option<Version> {
        self.version.as_deref().map(Version::parse)
    }

    /// Returns true if the constraint has a structured form that can be evaluated
    pub fn is_evaluable(&self) -> bool {
        !self.alternatives.is_empty()
    }

    /// Checks whether `version` satisfies the constraint.
    ///
    /// Returns None when the constraint or the version cannot be compared
    /// structurally. Prerelease versions only satisfy an alternative that itself
    /// names a prerelease of the same release.
    pub fn matches(&self, version: &Version) -> Option<bool> {
        if self.alternatives.is_empty() {
            return None;
        }

        let mut undecided = false;
        for alternative in &self.alternatives {
            match alternative_matches(alternative, version) {
                Some(true) => return Some(true),
                Some(false) => {}
                None => undecided = true,
            }
        }

        if undecided {
            None
        } else {
            Some(false)
        }
    }

    /// Formats a suggested constraint for a new version, keeping the operator
    pub fn format_updated(&self, new_version: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, new_version),
            None => new_version.to_string(),
        }
    }
}

fn alternative_matches(comparators: &[Comparator], version: &Version) -> Option<bool> {
    if version.is_structured() && version.is_prerelease() {
        let named = comparators
            .iter()
            .any(|c| c.version.is_prerelease() && same_release(&c.version, version));
        if !named {
            return Some(false);
        }
    }

    let mut result = Some(true);
    for comparator in comparators {
        match comparator.matches(version) {
            Some(true) => {}
            Some(false) => return Some(false),
            None => result = None,
        }
    }
    result
}

fn same_release(a: &Version, b: &Version) -> bool {
    (a.major(), a.minor(), a.patch()) == (b.major(), b.minor(), b.patch())
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A possibly partial version as written in a constraint (`1`, `1.2`, `1.2.x`, `1.2.3-rc.1`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    /// Numeric components that were written out
    pub release: Vec<u64>,
    /// Prerelease tail, including its separator
    pub pre: String,
    /// Release ended with `*`, `x` or `X`
    pub wildcard: bool,
}

impl Partial {
    /// Parses a partial version. `*`, `x` and `X` end the release early.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix(['v', 'V']).unwrap_or(text);
        if text.is_empty() {
            return None;
        }

        let mut release = Vec::new();
        let mut wildcard = false;
        let mut rest = text;
        loop {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            if end == 0 {
                if rest.starts_with(['*', 'x', 'X']) && (rest.len() == 1 || rest[1..].starts_with('.'))
                {
                    wildcard = true;
                    rest = "";
                    break;
                }
                if release.is_empty() {
                    return None;
                }
                break;
            }
            release.push(rest[..end].parse().ok()?);
            rest = &rest[end..];
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(is_component_start) => rest = next,
                _ => break,
            }
        }

        // Build metadata is ignored
        let pre = rest.split('+').next().unwrap_or("").to_string();
        Some(Self {
            release,
            pre,
            wildcard,
        })
    }

    /// Returns true if the release has no components (`*`)
    pub fn is_wildcard(&self) -> bool {
        self.release.is_empty()
    }

    /// Lowest version described by the partial
    pub fn lower(&self) -> Version {
        let mut text = join(&self.release, 3);
        text.push_str(&self.pre);
        Version::parse(&text)
    }

    fn component(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }
}

fn is_component_start(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '*' | 'x' | 'X')
}

fn join(parts: &[u64], min_len: usize) -> String {
    let mut parts = parts.to_vec();
    while parts.len() < min_len {
        parts.push(0);
    }
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn upper(parts: &[u64]) -> Version {
    Version::parse(&join(parts, 3))
}

fn bounded(lower: Version, upper: Version) -> Vec<Comparator> {
    vec![
        Comparator::new(Op::Gte, lower),
        Comparator::new(Op::Lt, upper),
    ]
}

/// `^1.2.3` → `>=1.2.3 <2.0.0`, `^0.2.3` → `<0.3.0`, `^0.0.3` → `<0.0.4`
pub fn caret(partial: &Partial) -> Vec<Comparator> {
    let release = &partial.release;
    if release.is_empty() {
        return Vec::new();
    }
    let major = partial.component(0);
    let minor = partial.component(1);
    let bound = if major > 0 || release.len() == 1 {
        vec![major.saturating_add(1)]
    } else if minor > 0 || release.len() == 2 {
        vec![0, minor.saturating_add(1)]
    } else {
        vec![0, 0, partial.component(2).saturating_add(1)]
    };
    bounded(partial.lower(), upper(&bound))
}

/// `~1.2.3` → `>=1.2.3 <1.3.0`, `~1` → `>=1.0.0 <2.0.0`
pub fn tilde(partial: &Partial) -> Vec<Comparator> {
    match partial.release.len() {
        0 => Vec::new(),
        1 => bounded(partial.lower(), upper(&[partial.component(0).saturating_add(1)])),
        _ => bounded(
            partial.lower(),
            upper(&[partial.component(0), partial.component(1).saturating_add(1)]),
        ),
    }
}

/// `~> 1.2` → `>=1.2 <2`, `~> 1.2.3` → `>=1.2.3 <1.3`, `~= 1.4.2` → `>=1.4.2 <1.5`
pub fn pessimistic(partial: &Partial) -> Vec<Comparator> {
    let release = &partial.release;
    match release.len() {
        0 => Vec::new(),
        1 => bounded(partial.lower(), upper(&[release[0].saturating_add(1)])),
        len => {
            let mut bound = release[..len - 1].to_vec();
            if let Some(last) = bound.last_mut() {
                *last = last.saturating_add(1);
            }
            bounded(partial.lower(), upper(&bound))
        }
    }
}

/// `1.2.x` / `1.2` → `>=1.2.0 <1.3.0`; a version with `full_len` components is an exact match
pub fn x_range(partial: &Partial, full_len: usize) -> Vec<Comparator> {
    let release = &partial.release;
    if release.is_empty() {
        return Vec::new();
    }
    if !partial.wildcard && (release.len() >= full_len || !partial.pre.is_empty()) {
        return vec![Comparator::new(Op::Eq, partial.lower())];
    }
    let mut bound = release.clone();
    if let Some(last) = bound.last_mut() {
        *last = last.saturating_add(1);
    }
    bounded(partial.lower(), upper(&bound))
}

/// Go module requirement: at least this version, within the same major path
pub fn go_minimum(version: &Version) -> Vec<Comparator> {
    let next_major = match version.major() {
        Some(0) | Some(1) => 2,
        Some(major) => major.saturating_add(1),
        None => return Vec::new(),
    };
    bounded(version.clone(), upper(&[next_major]))
}

/// Single comparator from an operator string
pub fn comparator(op: &str, partial: &Partial) -> Option<Comparator> {
    let op = match op {
        "=" | "==" | "===" => Op::Eq,
        "!=" => Op::Ne,
        ">" => Op::Gt,
        ">=" => Op::Gte,
        "<" => Op::Lt,
        "<=" => Op::Lte,
        _ => return None,
    };
    Some(Comparator::new(op, partial.lower()))
}

/// Constraint kind implied by a single operator
pub fn kind_for_op(op: &str) -> ConstraintKind {
    match op {
        "^" => ConstraintKind::Caret,
        "~" => ConstraintKind::Tilde,
        "~=" => ConstraintKind::Compatible,
        "~>" => ConstraintKind::Pessimistic,
        ">=" => ConstraintKind::GreaterOrEqual,
        ">" => ConstraintKind::Greater,
        "<=" => ConstraintKind::LessOrEqual,
        "<" => ConstraintKind::Less,
        "!=" => ConstraintKind::NotEqual,
        _ => ConstraintKind::Exact,
    }
}
