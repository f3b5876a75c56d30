//! RubyGems version requirement parser
//!
//! Handles:
//! - Fixed versions: `= 1.2.3`, `1.2.3`
//! - Pessimistic constraints: `~> 1.2`, `~> 1.2.3`
//! - Comparison operators: `>=`, `<`, `>`, `<=`, `!=`
//! - Compound constraints: `~> 1.2, >= 1.2.1`

use super::{assemble, standard_clause, ConstraintParser};
use crate::domain::{x_range, Comparator, Constraint, ConstraintKind, Ecosystem, Partial};

/// Parser for RubyGems version requirements
pub struct RubyConstraintParser;

fn expand(op: &str, partial: &Partial) -> Option<(ConstraintKind, Vec<Comparator>)> {
    if partial.wildcard {
        return None;
    }
    match op {
        "" | "=" => Some((ConstraintKind::Exact, x_range(partial, 0))),
        "~>" | ">=" | ">" | "<=" | "<" | "!=" => standard_clause(op, partial),
        _ => None,
    }
}

impl ConstraintParser for RubyConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Some(Constraint::any(trimmed));
        }

        let clauses: Vec<String> = trimmed
            .split(',')
            .map(|c| c.trim().trim_matches(['\'', '"']).trim().to_string())
            .collect();
        assemble(trimmed, &[clauses], expand)
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Gem
    }
}
