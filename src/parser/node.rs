//! npm version constraint parser
//!
//! Handles constraint formats:
//! - Exact: `1.2.3`, `=1.2.3`
//! - Caret: `^1.2.3`
//! - Tilde: `~1.2.3`
//! - Comparison: `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`
//! - Wildcard: `*`, `1.x`, `1.2.*`, `1.2`
//! - Range: `>=1.0.0 <2.0.0`, `1.0.0 - 2.0.0`
//! - Alternatives: `^1.0.0 || ^2.0.0`
//! - Aliases: `npm:other-package@^1.0.0`

use super::{assemble, clause_tokens, standard_clause, ConstraintParser};
use crate::domain::{x_range, Comparator, Constraint, ConstraintKind, Ecosystem, Partial};

/// npm version constraint parser
pub struct NodeConstraintParser;

/// Bare npm versions are x-ranges: `1.2` means any `1.2.x`
fn expand(op: &str, partial: &Partial) -> Option<(ConstraintKind, Vec<Comparator>)> {
    if !op.is_empty() {
        return standard_clause(op, partial);
    }
    let comparators = x_range(partial, 3);
    let kind = if partial.wildcard || (partial.release.len() < 3 && partial.pre.is_empty()) {
        ConstraintKind::Wildcard
    } else {
        ConstraintKind::Exact
    };
    Some((kind, comparators))
}

/// Rewrites `a - b` into `>=a <=b` (or `<next` when `b` is partial)
fn hyphen_range(alternative: &str) -> Option<Vec<String>> {
    let (lower, upper) = alternative.split_once(" - ")?;
    let upper_partial = Partial::parse(upper)?;
    let upper_clause = if upper_partial.release.len() >= 3 || upper_partial.is_wildcard() {
        format!("<={}", upper.trim())
    } else {
        let mut bound = upper_partial.release.clone();
        if let Some(last) = bound.last_mut() {
            *last = last.saturating_add(1);
        }
        let bound: Vec<String> = bound.iter().map(|p| p.to_string()).collect();
        format!("<{}", bound.join("."))
    };
    Some(vec![format!(">={}", lower.trim()), upper_clause])
}

impl ConstraintParser for NodeConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("x") {
            return Some(Constraint::any(trimmed));
        }

        // `npm:real-name@range` resolves against the aliased range
        if let Some(alias) = trimmed.strip_prefix("npm:") {
            let (_, range) = alias.rsplit_once('@')?;
            let mut constraint = self.parse(range)?;
            constraint.raw = trimmed.to_string();
            constraint.prefix = None;
            return Some(constraint);
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                alternatives.push(vec!["*".to_string()]);
                continue;
            }
            match hyphen_range(alternative) {
                Some(clauses) => alternatives.push(clauses),
                None => alternatives.push(clause_tokens(alternative)),
            }
        }

        assemble(trimmed, &alternatives, expand)
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }
}
