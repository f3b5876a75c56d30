//! Registry lookups for package metadata
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - One adapter per public registry (npm, crates.io, PyPI, RubyGems, Hex,
//!   Maven Central, Go Module Proxy)
//! - `RegistryClient`, which routes a lookup to the adapter for its ecosystem
//! - `CachedLookup`, a TTL cache in front of any lookup
//! - `StaticLookup`, an in-memory registry for offline runs and tests
//! - `fetch_all`, the concurrent, cancellable batch lookup used by a run

mod cache;
mod client;
mod crates_io;
mod fetch;
mod go_proxy;
mod hex;
mod maven;
mod memory;
mod npm;
mod pypi;
mod rubygems;

pub use cache::{CachedLookup, DEFAULT_CACHE_TTL};
pub use client::HttpClient;
pub use crates_io::CratesIoAdapter;
pub use fetch::{fetch_all, FetchOutcome, LookupFailure, DEFAULT_CONCURRENCY};
pub use go_proxy::GoProxyAdapter;
pub use hex::HexAdapter;
pub use maven::MavenAdapter;
pub use memory::{StaticFailure, StaticLookup};
pub use npm::NpmAdapter;
pub use pypi::PyPIAdapter;
pub use rubygems::RubyGemsAdapter;

use crate::domain::{Ecosystem, PackageMetadata};
use crate::error::LookupError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of package metadata, keyed by ecosystem and package name
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    /// List the published versions and metadata of a package
    async fn list_versions(
        &self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Result<PackageMetadata, LookupError>;
}

#[async_trait]
impl<T: RegistryLookup + ?Sized> RegistryLookup for Arc<T> {
    async fn list_versions(
        &self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Result<PackageMetadata, LookupError> {
        (**self).list_versions(ecosystem, name).await
    }
}

/// Trait for single-registry adapters
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Registry family this adapter serves
    fn ecosystem(&self) -> Ecosystem;

    /// Get the registry name
    fn registry_name(&self) -> &'static str;

    /// Fetch metadata for a package
    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, LookupError>;
}

/// Create a registry adapter for the given ecosystem's registry family
pub fn create_adapter(ecosystem: Ecosystem, client: HttpClient) -> Box<dyn RegistryAdapter> {
    match ecosystem.registry_family() {
        Ecosystem::Npm => Box::new(NpmAdapter::new(client)),
        Ecosystem::Cargo => Box::new(CratesIoAdapter::new(client)),
        Ecosystem::Pip | Ecosystem::Pyproject => Box::new(PyPIAdapter::new(client)),
        Ecosystem::Gem => Box::new(RubyGemsAdapter::new(client)),
        Ecosystem::Hex => Box::new(HexAdapter::new(client)),
        Ecosystem::Maven => Box::new(MavenAdapter::new(client)),
        Ecosystem::Go => Box::new(GoProxyAdapter::new(client)),
    }
}

/// Lookup backed by the public registries
pub struct RegistryClient {
    adapters: HashMap<Ecosystem, Box<dyn RegistryAdapter>>,
}

impl RegistryClient {
    /// Create a client with an adapter for every registry family
    pub fn new() -> Result<Self, LookupError> {
        Ok(Self::with_client(HttpClient::new()?))
    }

    /// Create a client sharing the given HTTP client
    pub fn with_client(client: HttpClient) -> Self {
        let adapters = Ecosystem::all()
            .iter()
            .map(|eco| eco.registry_family())
            .map(|family| (family, create_adapter(family, client.clone())))
            .collect();
        Self { adapters }
    }
}

#[async_trait]
impl RegistryLookup for RegistryClient {
    async fn list_versions(
        &self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Result<PackageMetadata, LookupError> {
        match self.adapters.get(&ecosystem.registry_family()) {
            Some(adapter) => adapter.fetch_metadata(name).await,
            None => Err(LookupError::Unsupported {
                ecosystem: ecosystem.to_string(),
            }),
        }
    }
}
