//! npm Registry adapter
//!
//! Fetches package version information from the npm registry.
//! API endpoints:
//! - Packument: https://registry.npmjs.org/{package}
//! - Downloads: https://api.npmjs.org/downloads/point/last-week/{package}

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// npm registry base URL
const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm downloads API base URL
const NPM_DOWNLOADS_URL: &str = "https://api.npmjs.org/downloads/point/last-week";

/// npm Registry adapter
pub struct NpmAdapter {
    client: HttpClient,
}

/// npm package metadata response
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    /// Version time information
    #[serde(default)]
    time: HashMap<String, String>,
    /// Available versions
    #[serde(default)]
    versions: HashMap<String, NpmVersion>,
    /// Tags such as `latest`
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    /// Package-level license
    #[serde(default)]
    license: Option<NpmLicense>,
}

#[derive(Debug, Deserialize)]
struct NpmVersion {
    #[serde(default)]
    deprecated: Option<String>,
    #[serde(default)]
    license: Option<NpmLicense>,
}

/// Licenses appear either as an SPDX string or as the legacy `{ type }` object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NpmLicense {
    Spdx(String),
    Legacy {
        #[serde(rename = "type")]
        kind: String,
    },
}

impl NpmLicense {
    fn into_string(self) -> String {
        match self {
            NpmLicense::Spdx(s) => s,
            NpmLicense::Legacy { kind } => kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NpmDownloadsResponse {
    downloads: u64,
}

impl NpmAdapter {
    /// Create a new npm adapter
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", NPM_REGISTRY_URL, package)
    }

    /// Build the weekly downloads URL for a package
    fn build_downloads_url(&self, package: &str) -> String {
        format!("{}/{}", NPM_DOWNLOADS_URL, package)
    }
}

fn into_metadata(mut response: NpmPackageResponse) -> PackageMetadata {
    let latest = response.dist_tags.get("latest").cloned();
    let mut license = None;

    let mut versions = Vec::with_capacity(response.versions.len());
    for (version, info) in response.versions {
        let published_at = response
            .time
            .get(&version)
            .and_then(|t| t.parse::<DateTime<Utc>>().ok());
        let mut published = PublishedVersion::new(&version, published_at);
        if let Some(message) = info.deprecated.filter(|m| !m.is_empty()) {
            published = published.with_deprecated(message);
        }
        if latest.as_deref() == Some(version.as_str()) {
            license = info.license.map(NpmLicense::into_string);
        }
        versions.push(published);
    }

    let license = license.or_else(|| response.license.take().map(NpmLicense::into_string));
    PackageMetadata::new(versions).with_license(license)
}

#[async_trait]
impl RegistryAdapter for NpmAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    fn registry_name(&self) -> &'static str {
        "npm"
    }

    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        let url = self.build_url(package);
        let response: NpmPackageResponse = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        // Download counts are best effort; a missing count only disables
        // the download rule for this package
        let downloads = match self
            .client
            .get_json::<NpmDownloadsResponse>(
                &self.build_downloads_url(package),
                package,
                self.registry_name(),
            )
            .await
        {
            Ok(d) => Some(d.downloads),
            Err(e) => {
                debug!(package, error = %e, "npm downloads unavailable");
                None
            }
        };

        Ok(into_metadata(response).with_weekly_downloads(downloads))
    }
}
