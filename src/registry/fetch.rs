//! Concurrent metadata lookup for every package in a graph
//!
//! One task per distinct (registry family, name) pair, bounded by a
//! semaphore. A failed lookup is recorded against its package and never
//! stops the others. Cancellation ends pending lookups with
//! `LookupError::Cancelled`.

use super::RegistryLookup;
use crate::cancel::CancelSignal;
use crate::domain::{Ecosystem, MetadataIndex};
use crate::error::LookupError;
use crate::graph::Graph;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Maximum number of lookups in flight
pub const DEFAULT_CONCURRENCY: usize = 30;

/// A lookup that did not produce metadata
#[derive(Debug)]
pub struct LookupFailure {
    /// Ecosystem of the package (the registry family)
    pub ecosystem: Ecosystem,
    /// Package name
    pub name: String,
    /// What went wrong
    pub error: LookupError,
}

/// Result of looking up every package of a graph
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Metadata of the packages that were found
    pub metadata: MetadataIndex,
    /// Failed lookups, in (ecosystem, name) order
    pub failures: Vec<LookupFailure>,
    /// Whether cancellation cut the lookups short
    pub cancelled: bool,
}

impl FetchOutcome {
    /// Failures other than cancellations
    pub fn lookup_errors(&self) -> impl Iterator<Item = &LookupFailure> {
        self.failures
            .iter()
            .filter(|f| !matches!(f.error, LookupError::Cancelled { .. }))
    }
}

/// Distinct registry packages of the graph, in deterministic order
fn distinct_packages(graph: &Graph) -> BTreeSet<(Ecosystem, String)> {
    graph
        .nodes()
        .filter(|(_, node)| node.is_registry())
        .map(|(_, node)| (node.ecosystem.registry_family(), node.name.clone()))
        .collect()
}

/// Look up metadata for every registry package in `graph`
pub async fn fetch_all(
    graph: &Graph,
    lookup: Arc<dyn RegistryLookup>,
    concurrency: usize,
    cancel: &CancelSignal,
) -> FetchOutcome {
    let packages = distinct_packages(graph);
    debug!(packages = packages.len(), concurrency, "looking up package metadata");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut task_packages = HashMap::new();

    for (ecosystem, name) in packages {
        let lookup = lookup.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let task_name = name.clone();

        let handle = tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(LookupError::Cancelled {
                    package: task_name.clone(),
                }),
                result = async {
                    let _permit = semaphore.acquire_owned().await.map_err(|_| {
                        LookupError::Cancelled {
                            package: task_name.clone(),
                        }
                    })?;
                    lookup.list_versions(ecosystem, &task_name).await
                } => result,
            };
            (ecosystem, task_name, result)
        });
        task_packages.insert(handle.id(), (ecosystem, name));
    }

    let mut outcome = FetchOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((ecosystem, name, Ok(metadata))) => {
                outcome.metadata.insert(ecosystem, name, metadata);
            }
            Ok((ecosystem, name, Err(error))) => {
                if !matches!(error, LookupError::Cancelled { .. }) {
                    warn!(ecosystem = %ecosystem, package = %name, error = %error, "lookup failed");
                }
                outcome.failures.push(LookupFailure {
                    ecosystem,
                    name,
                    error,
                });
            }
            Err(join_error) => {
                // A panicking lookup only loses its own package
                if let Some((ecosystem, name)) = task_packages.remove(&join_error.id()) {
                    warn!(ecosystem = %ecosystem, package = %name, "lookup task failed");
                    outcome.failures.push(LookupFailure {
                        ecosystem,
                        error: LookupError::network(
                            name.clone(),
                            ecosystem.registry_name(),
                            format!("lookup task failed: {}", join_error),
                        ),
                        name,
                    });
                }
            }
        }
    }

    outcome
        .failures
        .sort_by(|a, b| (a.ecosystem, &a.name).cmp(&(b.ecosystem, &b.name)));
    outcome.cancelled = cancel.is_cancelled();
    debug!(
        found = outcome.metadata.len(),
        failed = outcome.failures.len(),
        cancelled = outcome.cancelled,
        "metadata lookup finished"
    );
    outcome
}
