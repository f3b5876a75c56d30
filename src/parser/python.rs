//! Python version specifier parser
//!
//! Handles PEP 440 specifiers used by requirements files and PEP 621:
//! - Exact: `==1.2.3`, `===1.2.3`
//! - Compatible release: `~=1.4.2`
//! - Comparison: `>=1.2`, `>1.2`, `<=1.2`, `<2`, `!=1.3`
//! - Prefix match: `==1.2.*`
//! - Compound: `>=1.2,<2.0`
//!
//! and the Poetry dialect used by `[tool.poetry]` tables:
//! - Caret: `^1.2.3`
//! - Tilde: `~1.2.3`
//! - Bare: `1.2.3` (exact)

use super::{assemble, standard_clause, ConstraintParser};
use crate::domain::{x_range, Comparator, Constraint, ConstraintKind, Ecosystem, Partial};

/// Python version specifier parser
pub struct PythonConstraintParser {
    ecosystem: Ecosystem,
}

impl PythonConstraintParser {
    /// Creates a parser reporting the given Python ecosystem
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self { ecosystem }
    }
}

fn expand(op: &str, partial: &Partial) -> Option<(ConstraintKind, Vec<Comparator>)> {
    if partial.wildcard {
        // Prefix matching is only defined for `==` (and bare Poetry wildcards)
        return matches!(op, "" | "==").then(|| (ConstraintKind::Wildcard, x_range(partial, 0)));
    }
    match op {
        "" | "==" | "===" => Some((ConstraintKind::Exact, x_range(partial, 0))),
        "~>" | "=" => None,
        _ => standard_clause(op, partial),
    }
}

impl ConstraintParser for PythonConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();
        // Legacy `name (>=1.0)` form keeps the specifier in parentheses
        let trimmed = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(trimmed)
            .trim();

        if trimmed.is_empty() || trimmed == "*" {
            return Some(Constraint::any(trimmed));
        }

        // Poetry allows `||` between alternatives
        let alternatives: Vec<Vec<String>> = trimmed
            .split("||")
            .map(|alternative| {
                alternative
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .collect();

        assemble(trimmed, &alternatives, expand)
    }

    fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }
}
