//! Maven version requirement parser
//!
//! Handles:
//! - Soft requirements: `1.2.3`, `1.2.3.Final`, `2.0-SNAPSHOT`
//! - Hard pins: `[1.2.3]`
//! - Ranges: `[1.0,2.0]`, `[1.0,)`, `(,2.0]`, `[1.0,2.0)`
//! - Range unions: `(,1.0],[1.2,)`
//!
//! Property references (`${jackson.version}`) that the manifest could not
//! substitute are left unparsed. `LATEST` and `RELEASE` become tags.

use super::ConstraintParser;
use crate::domain::{Comparator, Constraint, ConstraintKind, Ecosystem, Op, Version};
use regex::Regex;
use std::sync::LazyLock;

/// Parser for Maven version requirements
pub struct MavenConstraintParser;

// Plain version: 1.2.3, 1.2.3-SNAPSHOT, 1.2.3.RELEASE
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*(?:[.-][A-Za-z0-9]+)*)$").unwrap());

// One bracketed range: [lower,upper) with either side optional, or [exact]
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\[\(])\s*([^,\[\]\(\)]*?)\s*(?:(,)\s*([^,\[\]\(\)]*?)\s*)?([\]\)])").unwrap());

/// Comparators for one bracketed range, plus the version it names first
fn parse_range(caps: &regex::Captures<'_>) -> Option<(Vec<Comparator>, Option<String>)> {
    let open = caps.get(1)?.as_str();
    let lower = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let has_comma = caps.get(3).is_some();
    let upper = caps.get(4).map(|m| m.as_str()).unwrap_or("");
    let close = caps.get(5)?.as_str();

    for side in [lower, upper] {
        if !side.is_empty() && !VERSION_RE.is_match(side) {
            return None;
        }
    }

    if !has_comma {
        // `[1.2.3]` pins; `(1.2.3)` is meaningless
        if open != "[" || close != "]" || lower.is_empty() {
            return None;
        }
        return Some((
            vec![Comparator::new(Op::Eq, Version::parse(lower))],
            Some(lower.to_string()),
        ));
    }

    let mut comparators = Vec::new();
    if !lower.is_empty() {
        let op = if open == "[" { Op::Gte } else { Op::Gt };
        comparators.push(Comparator::new(op, Version::parse(lower)));
    }
    if !upper.is_empty() {
        let op = if close == "]" { Op::Lte } else { Op::Lt };
        comparators.push(Comparator::new(op, Version::parse(upper)));
    }
    let base = if lower.is_empty() { upper } else { lower };
    Some((comparators, (!base.is_empty()).then(|| base.to_string())))
}

impl ConstraintParser for MavenConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Some(Constraint::any(trimmed));
        }

        if trimmed.starts_with(['[', '(']) {
            let mut alternatives = Vec::new();
            let mut base = None;
            let mut consumed = 0;
            for caps in RANGE_RE.captures_iter(trimmed) {
                let whole = caps.get(0)?;
                // Only commas may sit between ranges
                if !trimmed[consumed..whole.start()].trim().trim_matches(',').trim().is_empty() {
                    return None;
                }
                consumed = whole.end();
                let (comparators, named) = parse_range(&caps)?;
                if base.is_none() {
                    base = named;
                }
                alternatives.push(comparators);
            }
            if alternatives.is_empty() || !trimmed[consumed..].trim().is_empty() {
                return None;
            }
            let pinned = alternatives.len() == 1
                && matches!(alternatives[0].as_slice(), [c] if c.op == Op::Eq);
            let kind = if pinned {
                ConstraintKind::Exact
            } else {
                ConstraintKind::Range
            };
            return Some(Constraint::new(kind, trimmed, base.as_deref(), alternatives));
        }

        if VERSION_RE.is_match(trimmed) {
            return Some(Constraint::exact(trimmed));
        }

        None
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }
}
