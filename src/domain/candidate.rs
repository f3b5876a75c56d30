//! Update candidate types

use super::{BumpKind, NodeId, PackageRef, Version};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Whether a candidate version satisfies the node's declared constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStatus {
    /// Candidate satisfies the constraint
    Satisfied,
    /// Candidate falls outside the constraint (latest mode only)
    Violates,
    /// Constraint or version could not be evaluated
    Unknown,
}

impl ConstraintStatus {
    /// Status from a tri-state match result
    pub fn from_match(result: Option<bool>) -> Self {
        match result {
            Some(true) => ConstraintStatus::Satisfied,
            Some(false) => ConstraintStatus::Violates,
            None => ConstraintStatus::Unknown,
        }
    }
}

impl fmt::Display for ConstraintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintStatus::Satisfied => write!(f, "satisfies constraint"),
            ConstraintStatus::Violates => write!(f, "outside constraint"),
            ConstraintStatus::Unknown => write!(f, "constraint not evaluated"),
        }
    }
}

/// A proposed new version for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCandidate {
    /// Node the candidate is for
    pub node: NodeId,
    /// Package details of the node
    pub package: PackageRef,
    /// Manifest (or lockfile) the node belongs to
    pub manifest: PathBuf,
    /// Version currently in use
    pub current: Version,
    /// Proposed version
    pub candidate: Version,
    /// Constraint satisfaction of the proposed version
    pub constraint: ConstraintStatus,
    /// Size of the change
    pub bump: BumpKind,
    /// Node is only reachable through a lockfile; apply by re-locking the parent manifest
    pub requires_relock: bool,
    /// Constraint text to write for direct nodes whose constraint must change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_constraint: Option<String>,
}

impl UpdateCandidate {
    /// Returns true for breaking-size changes
    pub fn is_major(&self) -> bool {
        self.bump == BumpKind::Major
    }
}

impl fmt::Display for UpdateCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.package.name, self.current, self.candidate, self.bump
        )?;
        if self.requires_relock {
            write!(f, " [re-lock]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ecosystem, Scope};

    fn candidate(requires_relock: bool) -> UpdateCandidate {
        UpdateCandidate {
            node: NodeId(0),
            package: PackageRef {
                ecosystem: Ecosystem::Npm,
                name: "left-pad".to_string(),
                scope: Scope::Runtime,
                version: Some("1.0.0".to_string()),
            },
            manifest: PathBuf::from("package.json"),
            current: Version::parse("1.0.0"),
            candidate: Version::parse("1.3.0"),
            constraint: ConstraintStatus::Satisfied,
            bump: BumpKind::Minor,
            requires_relock,
            suggested_constraint: None,
        }
    }

    #[test]
    fn test_status_from_match() {
        assert_eq!(
            ConstraintStatus::from_match(Some(true)),
            ConstraintStatus::Satisfied
        );
        assert_eq!(
            ConstraintStatus::from_match(Some(false)),
            ConstraintStatus::Violates
        );
        assert_eq!(ConstraintStatus::from_match(None), ConstraintStatus::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", candidate(false)),
            "left-pad: 1.0.0 -> 1.3.0 (minor)"
        );
        assert_eq!(
            format!("{}", candidate(true)),
            "left-pad: 1.0.0 -> 1.3.0 (minor) [re-lock]"
        );
    }

    #[test]
    fn test_serialize_fields() {
        let json = serde_json::to_value(candidate(false)).unwrap();
        assert_eq!(json["bump"], "minor");
        assert_eq!(json["constraint"], "satisfied");
        assert_eq!(json["candidate"], "1.3.0");
        assert!(json.get("suggested_constraint").is_none());
    }
}
