//! TTL cache in front of a registry lookup
//!
//! Entries are keyed by registry family and package name, so requirement
//! files and pyproject.toml share PyPI results. Failures are not cached.

use super::RegistryLookup;
use crate::domain::{Ecosystem, PackageMetadata};
use crate::error::LookupError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

/// Default lifetime of a cache entry (48 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(48 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    metadata: PackageMetadata,
    stored_at: DateTime<Utc>,
}

/// Caching wrapper around any `RegistryLookup`
pub struct CachedLookup<L> {
    inner: L,
    entries: DashMap<(Ecosystem, String), CacheEntry>,
    ttl: Duration,
}

impl<L: RegistryLookup> CachedLookup<L> {
    /// Wrap `inner` with the default TTL
    pub fn new(inner: L) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    /// Wrap `inner` with a custom TTL
    pub fn with_ttl(inner: L, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Number of cached entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.stored_at);
        age.to_std().map(|age| age < self.ttl).unwrap_or(true)
    }
}

#[async_trait]
impl<L: RegistryLookup> RegistryLookup for CachedLookup<L> {
    async fn list_versions(
        &self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Result<PackageMetadata, LookupError> {
        let key = (ecosystem.registry_family(), name.to_string());
        let now = Utc::now();

        // Clone out of the shard before awaiting anything
        let cached = self
            .entries
            .get(&key)
            .filter(|entry| self.fresh(entry, now))
            .map(|entry| entry.metadata.clone());
        if let Some(metadata) = cached {
            debug!(ecosystem = %key.0, package = name, "cache hit");
            return Ok(metadata);
        }

        let metadata = self.inner.list_versions(ecosystem, name).await?;
        self.entries.insert(
            key,
            CacheEntry {
                metadata: metadata.clone(),
                stored_at: now,
            },
        );
        Ok(metadata)
    }
}
