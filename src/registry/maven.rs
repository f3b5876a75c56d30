//! Maven adapter
//!
//! API endpoints:
//! - Versions: https://search.maven.org/solrsearch/select?q=g:{group}+AND+a:{artifact}&core=gav
//! - License: https://api.deps.dev/v3/systems/maven/packages/{group:artifact}/versions/{version}
//!
//! The search index has every version with its publish timestamp but no
//! license; the license of the newest version comes from deps.dev.

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

const MAVEN_SEARCH_URL: &str = "https://search.maven.org/solrsearch/select";

const DEPS_DEV_MAVEN_URL: &str = "https://api.deps.dev/v3/systems/maven/packages";

/// Search page size; the newest versions come first
const SEARCH_ROWS: u32 = 200;

pub struct MavenAdapter {
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

/// One artifact version; `timestamp` is in milliseconds since the epoch
#[derive(Debug, Deserialize)]
struct SearchDoc {
    v: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DepsDevVersion {
    #[serde(default)]
    licenses: Vec<String>,
}

/// Split `group:artifact`
fn coordinate(package: &str) -> Option<(&str, &str)> {
    let (group, artifact) = package.split_once(':')?;
    (!group.is_empty() && !artifact.is_empty() && !artifact.contains(':'))
        .then_some((group, artifact))
}

fn published_at(timestamp_ms: Option<i64>) -> Option<DateTime<Utc>> {
    timestamp_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

impl MavenAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn search_url(&self, package: &str) -> Result<String, LookupError> {
        let (group, artifact) = coordinate(package).ok_or_else(|| {
            LookupError::invalid_response(
                package,
                self.registry_name(),
                "expected package name format 'groupId:artifactId'",
            )
        })?;
        Ok(format!(
            "{}?q=g:{}+AND+a:{}&core=gav&rows={}&wt=json",
            MAVEN_SEARCH_URL, group, artifact, SEARCH_ROWS
        ))
    }

    fn license_url(package: &str, version: &str) -> String {
        format!(
            "{}/{}/versions/{}",
            DEPS_DEV_MAVEN_URL,
            package.replace(':', "%3A"),
            version
        )
    }

    async fn license(&self, package: &str, version: &str) -> Option<String> {
        let url = Self::license_url(package, version);
        match self
            .client
            .get_json::<DepsDevVersion>(&url, package, "deps.dev")
            .await
        {
            Ok(details) => details.licenses.into_iter().next(),
            Err(e) => {
                debug!(package, version, error = %e, "maven license unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl RegistryAdapter for MavenAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    fn registry_name(&self) -> &'static str {
        "Maven Central"
    }

    async fn fetch_metadata(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        let url = self.search_url(package)?;
        let response: SearchResponse = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;
        if response.response.docs.is_empty() {
            return Err(LookupError::not_found(package, self.registry_name()));
        }

        let metadata = PackageMetadata::new(
            response
                .response
                .docs
                .iter()
                .map(|doc| PublishedVersion::new(&doc.v, published_at(doc.timestamp)))
                .collect(),
        );
        let newest = metadata
            .latest_stable()
            .or(metadata.versions.last())
            .map(|v| v.version.to_string());
        let license = match newest {
            Some(version) => self.license(package, &version).await,
            None => None,
        };
        Ok(metadata.with_license(license))
    }
}
