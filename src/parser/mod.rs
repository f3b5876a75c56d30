//! Version constraint parsers for different package ecosystems
//!
//! This module provides parsers for constraints in:
//! - npm (`package.json`)
//! - Cargo
//! - Python (requirements files, PEP 621 and Poetry)
//! - RubyGems (Bundler)
//! - Hex (Mix)
//! - Maven
//! - Go modules
//!
//! Every parser desugars into the shared comparator form of
//! [`Constraint`]. Text no parser understands still becomes a constraint:
//! a tag for bare words (`latest`, `next`, `RELEASE`) and unparsed otherwise.

mod go;
mod hex;
mod maven;
mod node;
mod python;
mod ruby;
mod rust;

pub use go::GoConstraintParser;
pub use hex::HexConstraintParser;
pub use maven::MavenConstraintParser;
pub use node::NodeConstraintParser;
pub use python::PythonConstraintParser;
pub use ruby::RubyConstraintParser;
pub use rust::RustConstraintParser;

use crate::domain::{
    caret, comparator, kind_for_op, pessimistic, tilde, Comparator, Constraint, ConstraintKind,
    Ecosystem, Partial,
};
use regex::Regex;
use std::sync::LazyLock;

/// Trait for parsing version constraints
pub trait ConstraintParser {
    /// Parse a constraint string, or None when the text is not understood
    fn parse(&self, raw: &str) -> Option<Constraint>;

    /// Returns the ecosystem this parser handles
    fn ecosystem(&self) -> Ecosystem;
}

/// Get a constraint parser for the specified ecosystem
pub fn get_parser(ecosystem: Ecosystem) -> Box<dyn ConstraintParser> {
    match ecosystem {
        Ecosystem::Npm => Box::new(NodeConstraintParser),
        Ecosystem::Cargo => Box::new(RustConstraintParser),
        Ecosystem::Pip => Box::new(PythonConstraintParser::new(Ecosystem::Pip)),
        Ecosystem::Pyproject => Box::new(PythonConstraintParser::new(Ecosystem::Pyproject)),
        Ecosystem::Gem => Box::new(RubyConstraintParser),
        Ecosystem::Hex => Box::new(HexConstraintParser),
        Ecosystem::Maven => Box::new(MavenConstraintParser),
        Ecosystem::Go => Box::new(GoConstraintParser),
    }
}

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9._-]*$").unwrap());

/// Parses a constraint, never failing: empty and `*` mean any version,
/// bare words become tags and everything else is kept unparsed
pub fn parse_constraint(ecosystem: Ecosystem, raw: &str) -> Constraint {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Constraint::any(trimmed);
    }
    if let Some(constraint) = get_parser(ecosystem).parse(trimmed) {
        return constraint;
    }
    if TAG_RE.is_match(trimmed) {
        Constraint::tag(trimmed)
    } else {
        Constraint::unparsed(trimmed)
    }
}

/// Operators shared across ecosystems, longest first
const OPERATORS: &[&str] = &[
    "===", "~=", "~>", ">=", "<=", "==", "!=", "^", "~", ">", "<", "=",
];

/// Splits a clause into its operator (possibly empty) and version text
pub(crate) fn split_op(clause: &str) -> (&'static str, &str) {
    let clause = clause.trim();
    for op in OPERATORS {
        if let Some(rest) = clause.strip_prefix(*op) {
            return (*op, rest.trim());
        }
    }
    ("", clause)
}

/// Splits whitespace-separated clauses, joining operators written apart
/// from their version (`>= 1.2 < 2`)
pub(crate) fn clause_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    for word in text.split_whitespace() {
        if OPERATORS.contains(&word) {
            pending.push_str(word);
            continue;
        }
        tokens.push(format!("{}{}", std::mem::take(&mut pending), word));
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

/// Per-ecosystem meaning of one `op version` clause
pub(crate) type Expand = fn(&str, &Partial) -> Option<(ConstraintKind, Vec<Comparator>)>;

/// Operator meanings common to every ecosystem
pub(crate) fn standard_clause(op: &str, partial: &Partial) -> Option<(ConstraintKind, Vec<Comparator>)> {
    match op {
        "^" => Some((ConstraintKind::Caret, caret(partial))),
        "~" => Some((ConstraintKind::Tilde, tilde(partial))),
        "~>" => Some((ConstraintKind::Pessimistic, pessimistic(partial))),
        "~=" if partial.release.len() >= 2 => {
            Some((ConstraintKind::Compatible, pessimistic(partial)))
        }
        "~=" => None,
        _ => comparator(op, partial).map(|c| (kind_for_op(op), vec![c])),
    }
}

/// Builds a constraint from alternatives of clauses.
///
/// A single clause keeps its own kind and operator prefix; anything longer
/// is a range whose base version is its first lower bound.
pub(crate) fn assemble(raw: &str, alternatives: &[Vec<String>], expand: Expand) -> Option<Constraint> {
    if alternatives.is_empty() {
        return None;
    }

    let mut parsed = Vec::with_capacity(alternatives.len());
    let mut kinds = Vec::new();
    let mut base: Option<(&'static str, String)> = None;

    for alternative in alternatives {
        if alternative.is_empty() {
            return None;
        }
        let mut comparators = Vec::new();
        for clause in alternative {
            let (op, text) = split_op(clause);
            let partial = Partial::parse(text)?;
            let (kind, expanded) = if partial.is_wildcard() {
                if !op.is_empty() {
                    return None;
                }
                (ConstraintKind::Any, Vec::new())
            } else {
                expand(op, &partial)?
            };
            if base.is_none() && !matches!(op, "<" | "<=" | "!=") {
                // `1.x` reads as prerelease `x` if kept as text
                let version = if partial.wildcard {
                    partial.lower().to_string()
                } else {
                    text.to_string()
                };
                base = Some((op, version));
            }
            kinds.push(kind);
            comparators.extend(expanded);
        }
        parsed.push(comparators);
    }

    let kind = match kinds.as_slice() {
        [single] => *single,
        _ => ConstraintKind::Range,
    };
    let version = match kind {
        ConstraintKind::Any | ConstraintKind::Wildcard => None,
        _ => base.as_ref().map(|(_, text)| text.as_str()),
    };

    let mut constraint = Constraint::new(kind, raw, version, parsed);
    if kinds.len() == 1 {
        if let Some((op, _)) = base.filter(|(op, _)| !op.is_empty()) {
            let spaced = format!("{} ", op);
            let prefix = if raw.trim_start().starts_with(&spaced) {
                spaced
            } else {
                op.to_string()
            };
            constraint = constraint.with_prefix(prefix);
        }
    }
    Some(constraint)
}
