//! Core domain models for depshub
//!
//! This module contains the fundamental types used throughout the engine:
//! - Ecosystem types for supported package managers
//! - Lenient versions and declared constraints
//! - Dependency nodes and their declaration sites
//! - Findings, update candidates and registry metadata

mod candidate;
mod constraint;
mod dependency;
mod ecosystem;
mod finding;
mod metadata;
mod version;

pub use candidate::{ConstraintStatus, UpdateCandidate};
pub use constraint::{
    caret, comparator, go_minimum, kind_for_op, pessimistic, tilde, x_range, Comparator,
    Constraint, ConstraintKind, Op, Partial,
};
pub use dependency::{Dependency, NodeKey, PackageSource, Scope, SourceLocation};
pub use ecosystem::Ecosystem;
pub use finding::{Finding, NodeId, PackageRef, Severity};
pub use metadata::{MetadataIndex, PackageMetadata, PublishedVersion};
pub use version::{is_prerelease_text, BumpKind, Version};
