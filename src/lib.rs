//! depshub - Multi-ecosystem dependency analysis library
//!
//! This library provides the core of the depshub linter:
//! - Manifest and lockfile adapters for npm, Cargo, pip, pyproject, Bundler,
//!   Mix, Maven and Go modules
//! - A merged dependency graph over every file of a project
//! - A rule engine with built-in and declarative custom rules
//! - An update resolver driven by registry metadata
//! - A report with findings, update candidates and an exit classification

pub mod analysis;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod output;
pub mod parser;
pub mod progress;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod rules;
