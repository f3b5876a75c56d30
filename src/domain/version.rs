//! Lenient version parsing shared by every ecosystem
//!
//! Handles version formats like:
//! - semver: `1.2.3`, `1.2.3-beta.1`, `v1.2.3`
//! - PEP 440: `2.0b1`, `1.0.0rc1`, `1.0.dev0`
//! - RubyGems: `1.0.0.beta1`, `7.1.3.2`
//! - Maven: `1.0-SNAPSHOT`, `31.1-jre`, `5.3.20.Final`
//! - Go: `v1.2.3+incompatible`, pseudo-versions
//!
//! Anything without a leading numeric release is kept as an opaque string that
//! compares lexically and never gets a bump magnitude.

use regex::Regex;
use semver::Prerelease;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[vV]?(\d+(?:\.\d+)*)(.*)$").unwrap());

/// Qualifiers that mark a final release rather than a prerelease
const RELEASE_QUALIFIERS: &[&str] = &["final", "release", "ga", "jre", "android", "r"];

/// First release component treated as a calendar year (or yyyymmdd stamp)
const CALENDAR_MAJOR_THRESHOLD: u64 = 1000;

/// A published or declared version
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parsed: Option<Structured>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Structured {
    release: Vec<u64>,
    pre: Prerelease,
}

impl Version {
    /// Parse a version string. Never fails: unparseable input becomes opaque.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let parsed = parse_structured(&raw);
        Self { raw, parsed }
    }

    /// The version as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if the version has a numeric release
    pub fn is_structured(&self) -> bool {
        self.parsed.is_some()
    }

    /// Numeric release components, if structured
    pub fn release(&self) -> Option<&[u64]> {
        self.parsed.as_ref().map(|s| s.release.as_slice())
    }

    fn component(&self, index: usize) -> Option<u64> {
        self.parsed
            .as_ref()
            .map(|s| s.release.get(index).copied().unwrap_or(0))
    }

    /// Major component
    pub fn major(&self) -> Option<u64> {
        self.component(0)
    }

    /// Minor component (0 when not written)
    pub fn minor(&self) -> Option<u64> {
        self.component(1)
    }

    /// Patch component (0 when not written)
    pub fn patch(&self) -> Option<u64> {
        self.component(2)
    }

    /// Prerelease tag, empty for releases
    pub fn prerelease(&self) -> Option<&str> {
        self.parsed
            .as_ref()
            .filter(|s| !s.pre.is_empty())
            .map(|s| s.pre.as_str())
    }

    /// Returns true for alpha, beta, rc, dev, snapshot and similar builds
    pub fn is_prerelease(&self) -> bool {
        match &self.parsed {
            Some(s) => !s.pre.is_empty(),
            None => is_prerelease_text(&self.raw),
        }
    }

    /// Returns true for calendar-style versions (`2024.01.15`, `20240115`),
    /// whose components carry no compatibility meaning
    pub fn is_calendar(&self) -> bool {
        self.major()
            .map(|major| major >= CALENDAR_MAJOR_THRESHOLD)
            .unwrap_or(false)
    }

    /// Classify the size of a move from this version to `target`
    pub fn bump_to(&self, target: &Version) -> BumpKind {
        let (Some(from), Some(to)) = (&self.parsed, &target.parsed) else {
            return BumpKind::Unknown;
        };
        if self.is_calendar() || target.is_calendar() {
            return BumpKind::Unknown;
        }

        let len = from.release.len().max(to.release.len()).max(3);
        for index in 0..len {
            let a = from.release.get(index).copied().unwrap_or(0);
            let b = to.release.get(index).copied().unwrap_or(0);
            if a != b {
                return match index {
                    0 => BumpKind::Major,
                    1 => BumpKind::Minor,
                    _ => BumpKind::Patch,
                };
            }
        }

        if from.pre != to.pre {
            BumpKind::Prerelease
        } else {
            BumpKind::Unknown
        }
    }
}

/// Text-only prerelease heuristic for opaque versions
pub fn is_prerelease_text(version: &str) -> bool {
    let lower = version.to_lowercase();
    ["alpha", "beta", "rc", "canary", "dev", "preview", "snapshot", "nightly"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn parse_structured(raw: &str) -> Option<Structured> {
    // Build metadata never affects precedence
    let without_build = raw.split('+').next().unwrap_or(raw);
    let caps = RELEASE_RE.captures(without_build)?;

    let release = caps
        .get(1)?
        .as_str()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let qualifier = rest.trim_start_matches(['-', '.', '_']);
    let pre = normalize_prerelease(qualifier)?;

    Some(Structured { release, pre })
}

fn normalize_prerelease(qualifier: &str) -> Option<Prerelease> {
    if qualifier.is_empty() {
        return Some(Prerelease::EMPTY);
    }
    let lower = qualifier.to_lowercase();
    if RELEASE_QUALIFIERS.contains(&lower.as_str()) || lower.starts_with("post") {
        return Some(Prerelease::EMPTY);
    }

    let mut identifiers = Vec::new();
    for chunk in lower.split(|c: char| !c.is_ascii_alphanumeric()) {
        if chunk.is_empty() {
            continue;
        }
        // `rc10` sorts after `rc9` once split into `rc.10`
        let mut current = String::new();
        let mut current_is_digit = None;
        for ch in chunk.chars() {
            let is_digit = ch.is_ascii_digit();
            if current_is_digit.is_some_and(|d| d != is_digit) {
                identifiers.push(finish_identifier(&current));
                current.clear();
            }
            current.push(ch);
            current_is_digit = Some(is_digit);
        }
        if !current.is_empty() {
            identifiers.push(finish_identifier(&current));
        }
    }

    if identifiers.is_empty() {
        return Some(Prerelease::EMPTY);
    }
    Prerelease::new(&identifiers.join(".")).ok()
}

fn finish_identifier(identifier: &str) -> String {
    if identifier.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = identifier.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        identifier.to_string()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => {
                let len = a.release.len().max(b.release.len());
                for index in 0..len {
                    let x = a.release.get(index).copied().unwrap_or(0);
                    let y = b.release.get(index).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.pre.cmp(&b.pre)
            }
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.parsed {
            Some(s) => {
                let significant = s
                    .release
                    .iter()
                    .rposition(|&c| c != 0)
                    .map(|i| &s.release[..=i])
                    .unwrap_or(&[]);
                significant.hash(state);
                s.pre.as_str().hash(state);
            }
            None => self.raw.hash(state),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Version::parse(&raw))
    }
}

/// Magnitude of a version change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Only the prerelease tag changed
    Prerelease,
    /// Patch (or later) component changed
    Patch,
    /// Minor component changed
    Minor,
    /// Major component changed
    Major,
    /// Versions could not be compared structurally
    Unknown,
}

impl BumpKind {
    fn rank(&self) -> Option<u8> {
        match self {
            BumpKind::Prerelease => Some(0),
            BumpKind::Patch => Some(1),
            BumpKind::Minor => Some(2),
            BumpKind::Major => Some(3),
            BumpKind::Unknown => None,
        }
    }

    /// Returns true if a bump of this size is allowed under `ceiling`.
    ///
    /// An unknown magnitude is only allowed when every structured bump is.
    pub fn within(&self, ceiling: BumpKind) -> bool {
        match (self.rank(), ceiling.rank()) {
            (Some(own), Some(max)) => own <= max,
            (None, _) => ceiling == BumpKind::Major || ceiling == BumpKind::Unknown,
            (Some(_), None) => true,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::Prerelease => "prerelease",
            BumpKind::Patch => "patch",
            BumpKind::Minor => "minor",
            BumpKind::Major => "major",
            BumpKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BumpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patch" => Ok(BumpKind::Patch),
            "minor" => Ok(BumpKind::Minor),
            "major" => Ok(BumpKind::Major),
            other => Err(format!(
                "invalid bump '{}': expected 'patch', 'minor' or 'major'",
                other
            )),
        }
    }
}
