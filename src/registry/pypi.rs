//! PyPI JSON API adapter
//!
//! Fetches package version information from PyPI.
//! API endpoint: https://pypi.org/pypi/{package}/json
//!
//! PyPI serves both requirement files and pyproject.toml.

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// PyPI API base URL
const PYPI_API_URL: &str = "https://pypi.org/pypi";

/// PyPI adapter
pub struct PyPIAdapter {
    client: HttpClient,
}

/// PyPI package metadata response
#[derive(Debug, Deserialize)]
struct PyPIResponse {
    #[serde(default)]
    info: PyPIInfo,
    /// Release information keyed by version
    #[serde(default)]
    releases: HashMap<String, Vec<ReleaseInfo>>,
}

#[derive(Debug, Default, Deserialize)]
struct PyPIInfo {
    #[serde(default)]
    license: Option<String>,
}

/// Release file information
#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    /// Upload time for the release file
    upload_time_iso_8601: Option<String>,
    #[serde(default)]
    yanked: bool,
    #[serde(default)]
    yanked_reason: Option<String>,
}

impl PyPIAdapter {
    /// Create a new PyPI adapter
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}/json", PYPI_API_URL, package)
    }
}

fn into_metadata(response: PyPIResponse) -> PackageMetadata {
    let mut versions = Vec::new();

    for (version, release_files) in response.releases {
        // Releases without files were never installable
        if release_files.is_empty() {
            continue;
        }

        // The earliest upload time is the publish time
        let published_at = release_files
            .iter()
            .filter_map(|f| f.upload_time_iso_8601.as_deref())
            .filter_map(|t| t.parse::<DateTime<Utc>>().ok())
            .min();

        let yanked = release_files.iter().all(|f| f.yanked);
        let mut published = PublishedVersion::new(&version, published_at).with_yanked(yanked);
        if yanked {
            let reason = release_files.iter().find_map(|f| f.yanked_reason.as_deref());
            if let Some(reason) = reason.filter(|r| !r.is_empty()) {
                published = published.with_deprecated(format!("yanked: {}", reason));
            }
        }
        versions.push(published);
    }

    // Long license texts are not license identifiers
    let license = response
        .info
        .license
        .filter(|l| !l.is_empty() && !l.contains('\n'));
    PackageMetadata::new(versions).with_license(license)
}

#[async_trait]
impl RegistryAdapter for PyPIAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Pip
    }

    fn registry_name(&self) -> &'static str {
        "PyPI"
    }

    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        let url = self.build_url(package);
        let response: PyPIResponse = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        Ok(into_metadata(response))
    }
}
