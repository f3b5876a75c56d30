//! RubyGems Registry adapter
//!
//! Fetches package version information from the RubyGems registry.
//! API endpoint: https://rubygems.org/api/v1/versions/{gem}.json

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion, Version};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// RubyGems registry base URL
const RUBYGEMS_API_URL: &str = "https://rubygems.org/api/v1/versions";

/// RubyGems Registry adapter
pub struct RubyGemsAdapter {
    client: HttpClient,
}

/// One entry of the versions listing
#[derive(Debug, Deserialize)]
struct GemVersion {
    number: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    licenses: Option<Vec<String>>,
    #[serde(default)]
    downloads_count: Option<u64>,
}

impl RubyGemsAdapter {
    /// Create a new RubyGems adapter
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build the URL for a gem
    fn build_url(&self, gem: &str) -> String {
        format!("{}/{}.json", RUBYGEMS_API_URL, gem)
    }
}

fn into_metadata(listing: Vec<GemVersion>) -> PackageMetadata {
    let mut versions: Vec<PublishedVersion> = Vec::new();
    let mut latest: Option<&GemVersion> = None;

    for gem in &listing {
        // Platform-specific builds repeat the same version number
        if gem.platform.as_deref().is_some_and(|p| p != "ruby") {
            continue;
        }
        let published_at = gem
            .created_at
            .as_deref()
            .and_then(|t| t.parse::<DateTime<Utc>>().ok());
        let published = PublishedVersion::new(&gem.number, published_at);
        if !published.is_prerelease()
            && latest.is_none_or(|l| Version::parse(&l.number) < published.version)
        {
            latest = Some(gem);
        }
        versions.push(published);
    }

    // RubyGems has no weekly count; the per-version total of the latest
    // release stands in for it
    let license = latest
        .and_then(|g| g.licenses.as_ref())
        .and_then(|l| l.first().cloned());
    let downloads = latest.and_then(|g| g.downloads_count);
    PackageMetadata::new(versions)
        .with_license(license)
        .with_weekly_downloads(downloads)
}

#[async_trait]
impl RegistryAdapter for RubyGemsAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Gem
    }

    fn registry_name(&self) -> &'static str {
        "RubyGems"
    }

    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        let url = self.build_url(package);
        let listing: Vec<GemVersion> = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        Ok(into_metadata(listing))
    }
}
