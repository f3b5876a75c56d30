//! crates.io API adapter
//!
//! Fetches crate version information from crates.io.
//! API endpoint: https://crates.io/api/v1/crates/{crate}
//!
//! Note: crates.io requires a User-Agent header (handled by HttpClient)
//! and has rate limiting (1 request/second).

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// crates.io API base URL
const CRATES_IO_API_URL: &str = "https://crates.io/api/v1/crates";

/// Rate limit: 1 request per second
const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

/// crates.io reports downloads over the last 90 days
const RECENT_DOWNLOAD_DAYS: u64 = 90;

/// crates.io adapter with rate limiting
pub struct CratesIoAdapter {
    client: HttpClient,
    last_request: Mutex<Option<Instant>>,
}

/// crates.io crate response
#[derive(Debug, Deserialize)]
struct CratesIoResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    #[serde(default)]
    recent_downloads: Option<u64>,
    #[serde(default)]
    max_stable_version: Option<String>,
}

/// Crate version information
#[derive(Debug, Deserialize)]
struct CrateVersion {
    /// Version number
    num: String,
    /// Created at timestamp
    created_at: String,
    /// Whether this version is yanked
    #[serde(default)]
    yanked: bool,
    #[serde(default)]
    yank_message: Option<String>,
    #[serde(default)]
    license: Option<String>,
}

impl CratesIoAdapter {
    /// Create a new crates.io adapter
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            last_request: Mutex::new(None),
        }
    }

    /// Build the URL for a crate
    fn build_url(&self, crate_name: &str) -> String {
        format!("{}/{}", CRATES_IO_API_URL, crate_name)
    }

    /// Apply rate limiting before making a request
    ///
    /// The lock is held while waiting, which serializes concurrent callers.
    async fn apply_rate_limit(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < RATE_LIMIT_INTERVAL {
                tokio::time::sleep(RATE_LIMIT_INTERVAL - elapsed).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

fn into_metadata(response: CratesIoResponse) -> PackageMetadata {
    let mut license = None;
    let versions = response
        .versions
        .into_iter()
        .map(|v| {
            if response.krate.max_stable_version.as_deref() == Some(v.num.as_str()) {
                license = v.license.clone();
            }
            let published_at = v.created_at.parse::<DateTime<Utc>>().ok();
            let published = PublishedVersion::new(&v.num, published_at).with_yanked(v.yanked);
            match v.yank_message.filter(|m| v.yanked && !m.is_empty()) {
                Some(message) => published.with_deprecated(format!("yanked: {}", message)),
                None => published,
            }
        })
        .collect();

    let weekly = response
        .krate
        .recent_downloads
        .map(|d| d * 7 / RECENT_DOWNLOAD_DAYS);
    PackageMetadata::new(versions)
        .with_license(license)
        .with_weekly_downloads(weekly)
}

#[async_trait]
impl RegistryAdapter for CratesIoAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    fn registry_name(&self) -> &'static str {
        "crates.io"
    }

    async fn fetch_metadata(&self, crate_name: &str) -> Result<PackageMetadata, LookupError> {
        self.apply_rate_limit().await;

        let url = self.build_url(crate_name);
        let response: CratesIoResponse = self
            .client
            .get_json(&url, crate_name, self.registry_name())
            .await?;

        Ok(into_metadata(response))
    }
}
