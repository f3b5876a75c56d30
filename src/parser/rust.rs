//! Cargo version requirement parser
//!
//! Handles requirement formats:
//! - Default (caret): `1.2.3`, `1.2`, `0.3`
//! - Caret: `^1.2.3`
//! - Tilde: `~1.2.3`
//! - Exact: `=1.2.3`
//! - Wildcard: `*`, `1.*`, `1.2.*`
//! - Comparison and compound: `>=1.2, <1.5`

use super::{assemble, standard_clause, ConstraintParser};
use crate::domain::{caret, x_range, Comparator, Constraint, ConstraintKind, Ecosystem, Partial};

/// Cargo version requirement parser
pub struct RustConstraintParser;

/// A bare Cargo requirement is a caret requirement; `=` pins
fn expand(op: &str, partial: &Partial) -> Option<(ConstraintKind, Vec<Comparator>)> {
    if partial.wildcard {
        return op
            .is_empty()
            .then(|| (ConstraintKind::Wildcard, x_range(partial, 3)));
    }
    match op {
        "" => Some((ConstraintKind::Caret, caret(partial))),
        "=" => Some((ConstraintKind::Exact, x_range(partial, 3))),
        "==" | "===" | "~>" | "~=" => None,
        _ => standard_clause(op, partial),
    }
}

impl ConstraintParser for RustConstraintParser {
    fn parse(&self, raw: &str) -> Option<Constraint> {
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed == "*" {
            return Some(Constraint::any(trimmed));
        }

        let clauses: Vec<String> = trimmed.split(',').map(|c| c.trim().to_string()).collect();
        assemble(trimmed, &[clauses], expand)
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Version;

    fn parse(requirement: &str) -> Option<Constraint> {
        RustConstraintParser.parse(requirement)
    }

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn test_parse_bare_is_caret() {
        let c = parse("1.2.3").unwrap();
        assert_eq!(c.kind, ConstraintKind::Caret);
        assert_eq!(c.version.as_deref(), Some("1.2.3"));
        assert!(c.prefix.is_none());
        assert_eq!(c.matches(&v("1.9.0")), Some(true));
        assert_eq!(c.matches(&v("2.0.0")), Some(false));
        assert_eq!(c.format_updated("1.9.0"), "1.9.0");
    }

    #[test]
    fn test_parse_bare_zero_major() {
        let c = parse("0.3").unwrap();
        assert_eq!(c.matches(&v("0.3.9")), Some(true));
        assert_eq!(c.matches(&v("0.4.0")), Some(false));
    }

    #[test]
    fn test_parse_exact() {
        let c = parse("=1.2.3").unwrap();
        assert_eq!(c.kind, ConstraintKind::Exact);
        assert_eq!(c.prefix.as_deref(), Some("="));
        assert!(c.is_pinned());
        assert_eq!(c.matches(&v("1.2.4")), Some(false));
    }

    #[test]
    fn test_parse_tilde() {
        let c = parse("~1.2").unwrap();
        assert_eq!(c.kind, ConstraintKind::Tilde);
        assert_eq!(c.matches(&v("1.2.7")), Some(true));
        assert_eq!(c.matches(&v("1.3.0")), Some(false));
    }

    #[test]
    fn test_parse_wildcard() {
        let c = parse("1.*").unwrap();
        assert_eq!(c.kind, ConstraintKind::Wildcard);
        assert_eq!(c.matches(&v("1.8.0")), Some(true));
        assert_eq!(parse("*").unwrap().kind, ConstraintKind::Any);
    }

    #[test]
    fn test_parse_compound() {
        let c = parse(">=1.2, <1.5").unwrap();
        assert_eq!(c.kind, ConstraintKind::Range);
        assert_eq!(c.version.as_deref(), Some("1.2"));
        assert_eq!(c.matches(&v("1.4.9")), Some(true));
        assert_eq!(c.matches(&v("1.5.0")), Some(false));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse("~> 1.0").is_none());
        assert!(parse("abc").is_none());
    }
}
