//! Hex (Mix) version requirement parser
//!
//! Requirements combine clauses with `and` / `or`:
//! `~> 1.14`, `>= 0.5.0 and < 0.7.0`, `~> 1.0 or ~> 2.0`, `== 1.2.3`

use super::{assemble, standard_clause, ConstraintParser};
use crate::domain::{x_range, Comparator, Constraint, ConstraintKind, Ecosystem, Partial};

/// Parser for Hex version requirements
pub struct HexConstraintParser;

fn expand(op: &str, partial: &Partial) -> Option<(ConstraintKind, Vec<Comparator>)> {
    if partial.wildcard {
        return None;
    }
    match op {
        "" | "==" => Some((ConstraintKind::Exact, x_range(partial, 0))),
        "~>" | ">=" | ">" | "<=" | "<" | "!=" => standard_clause(op, partial),
        _ => None,
    }
}

impl ConstraintParser for HexConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Some(Constraint::any(trimmed));
        }

        let alternatives: Vec<Vec<String>> = trimmed
            .split(" or ")
            .map(|alternative| {
                alternative
                    .split(" and ")
                    .map(|c| c.trim().to_string())
                    .collect()
            })
            .collect();
        assemble(trimmed, &alternatives, expand)
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Version;

    fn parse(requirement: &str) -> Option<Constraint> {
        HexConstraintParser.parse(requirement)
    }

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn test_parse_pessimistic() {
        let c = parse("~> 1.14").unwrap();
        assert_eq!(c.kind, ConstraintKind::Pessimistic);
        assert_eq!(c.matches(&v("1.16.0")), Some(true));
        assert_eq!(c.matches(&v("2.0.0")), Some(false));
    }

    #[test]
    fn test_parse_and() {
        let c = parse(">= 0.5.0 and < 0.7.0").unwrap();
        assert_eq!(c.kind, ConstraintKind::Range);
        assert_eq!(c.version.as_deref(), Some("0.5.0"));
        assert_eq!(c.matches(&v("0.6.3")), Some(true));
        assert_eq!(c.matches(&v("0.7.0")), Some(false));
    }

    #[test]
    fn test_parse_or() {
        let c = parse("~> 1.0 or ~> 3.0").unwrap();
        assert_eq!(c.matches(&v("3.4.0")), Some(true));
        assert_eq!(c.matches(&v("2.4.0")), Some(false));
    }

    #[test]
    fn test_parse_exact() {
        let c = parse("== 1.2.3").unwrap();
        assert!(c.is_pinned());
        assert_eq!(c.prefix.as_deref(), Some("== "));
    }
}
