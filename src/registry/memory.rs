//! In-memory registry
//!
//! Serves metadata registered up front. Used for offline runs, where every
//! lookup is answered as not found, and by tests, which can also inject
//! failures per package.

use super::RegistryLookup;
use crate::domain::{Ecosystem, PackageMetadata};
use crate::error::LookupError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Failure a `StaticLookup` reports for one package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticFailure {
    /// Report a timeout
    Timeout,
    /// Report a network failure
    Network,
    /// Never answer; only cancellation ends the lookup
    Hang,
}

/// Registry lookup answered from memory
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    packages: HashMap<(Ecosystem, String), PackageMetadata>,
    failures: HashMap<(Ecosystem, String), StaticFailure>,
    delay: Option<Duration>,
}

impl StaticLookup {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for a package (builder pattern)
    pub fn with_package(
        mut self,
        ecosystem: Ecosystem,
        name: impl Into<String>,
        metadata: PackageMetadata,
    ) -> Self {
        self.insert(ecosystem, name, metadata);
        self
    }

    /// Make lookups of a package fail (builder pattern)
    pub fn with_failure(
        mut self,
        ecosystem: Ecosystem,
        name: impl Into<String>,
        failure: StaticFailure,
    ) -> Self {
        self.failures
            .insert((ecosystem.registry_family(), name.into()), failure);
        self
    }

    /// Delay every answer (builder pattern)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register metadata for a package
    pub fn insert(&mut self, ecosystem: Ecosystem, name: impl Into<String>, metadata: PackageMetadata) {
        self.packages
            .insert((ecosystem.registry_family(), name.into()), metadata);
    }
}

#[async_trait]
impl RegistryLookup for StaticLookup {
    async fn list_versions(
        &self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Result<PackageMetadata, LookupError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = (ecosystem.registry_family(), name.to_string());
        let registry = ecosystem.registry_name();
        match self.failures.get(&key) {
            Some(StaticFailure::Timeout) => return Err(LookupError::timeout(name, registry)),
            Some(StaticFailure::Network) => {
                return Err(LookupError::network(name, registry, "connection refused"))
            }
            Some(StaticFailure::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        self.packages
            .get(&key)
            .cloned()
            .ok_or_else(|| LookupError::not_found(name, registry))
    }
}
