//! Hex package registry adapter
//!
//! Fetches package version information from hex.pm.
//! API endpoint: https://hex.pm/api/packages/{package}

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Hex API base URL
const HEX_API_URL: &str = "https://hex.pm/api/packages";

/// Hex adapter
pub struct HexAdapter {
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct HexPackage {
    #[serde(default)]
    meta: HexMeta,
    #[serde(default)]
    downloads: HexDownloads,
    #[serde(default)]
    releases: Vec<HexRelease>,
    #[serde(default)]
    retirements: std::collections::HashMap<String, HexRetirement>,
}

#[derive(Debug, Default, Deserialize)]
struct HexMeta {
    #[serde(default)]
    licenses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HexDownloads {
    #[serde(default)]
    week: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HexRelease {
    version: String,
    #[serde(default)]
    inserted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HexRetirement {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HexAdapter {
    /// Create a new Hex adapter
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", HEX_API_URL, package)
    }
}

fn into_metadata(package: HexPackage) -> PackageMetadata {
    let versions = package
        .releases
        .into_iter()
        .map(|release| {
            let published_at = release
                .inserted_at
                .as_deref()
                .and_then(|t| t.parse::<DateTime<Utc>>().ok());
            let published = PublishedVersion::new(&release.version, published_at);
            match package.retirements.get(&release.version) {
                // Retired releases are the Hex form of deprecation
                Some(retirement) => {
                    let reason = retirement
                        .message
                        .clone()
                        .or_else(|| retirement.reason.clone())
                        .unwrap_or_else(|| "retired".to_string());
                    published.with_deprecated(reason)
                }
                None => published,
            }
        })
        .collect();

    PackageMetadata::new(versions)
        .with_license(package.meta.licenses.into_iter().next())
        .with_weekly_downloads(package.downloads.week)
}

#[async_trait]
impl RegistryAdapter for HexAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Hex
    }

    fn registry_name(&self) -> &'static str {
        "Hex"
    }

    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        let url = self.build_url(package);
        let response: HexPackage = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        Ok(into_metadata(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let adapter = HexAdapter::new(HttpClient::new().unwrap());
        assert_eq!(adapter.build_url("phoenix"), "https://hex.pm/api/packages/phoenix");
        assert_eq!(adapter.registry_name(), "Hex");
    }

    #[test]
    fn test_into_metadata() {
        let json = r#"{
            "name": "phoenix",
            "meta": { "licenses": ["MIT"] },
            "downloads": { "week": 120000, "all": 90000000 },
            "releases": [
                { "version": "1.7.10", "inserted_at": "2023-11-03T19:00:00.000000Z" },
                { "version": "1.7.9", "inserted_at": "2023-10-11T19:00:00.000000Z" }
            ],
            "retirements": {
                "1.7.9": { "reason": "security", "message": "CVE fix in 1.7.10" }
            }
        }"#;
        let package: HexPackage = serde_json::from_str(json).unwrap();
        let metadata = into_metadata(package);

        assert_eq!(metadata.versions[0].version.as_str(), "1.7.9");
        assert_eq!(
            metadata.versions[0].deprecated.as_deref(),
            Some("CVE fix in 1.7.10")
        );
        assert!(metadata.versions[1].deprecated.is_none());
        assert_eq!(metadata.license.as_deref(), Some("MIT"));
        assert_eq!(metadata.weekly_downloads, Some(120000));
    }
}
