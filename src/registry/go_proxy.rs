//! Go Module Proxy adapter
//!
//! API endpoints:
//! - Version list: https://proxy.golang.org/{module}/@v/list
//! - Version info: https://proxy.golang.org/{module}/@v/{version}.info
//! - go.mod of a version: https://proxy.golang.org/{module}/@v/{version}.mod
//!
//! Publish times need one request per version; those run concurrently and a
//! failed one only leaves that version undated. A `// Deprecated:` comment
//! in the newest go.mod marks the newest version deprecated.

use crate::domain::{Ecosystem, PackageMetadata, PublishedVersion, Version};
use crate::error::LookupError;
use crate::registry::{HttpClient, RegistryAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::debug;

const GO_PROXY_URL: &str = "https://proxy.golang.org";

/// Only the newest versions are dated
const MAX_DATED_VERSIONS: usize = 50;

pub struct GoProxyAdapter {
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Time")]
    time: String,
}

/// Case-encode a module path: uppercase letters become `!` + lowercase
fn escape_module_path(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len() + 4);
    for ch in module.chars() {
        if ch.is_uppercase() {
            escaped.push('!');
            escaped.extend(ch.to_lowercase());
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// Deprecation message from a go.mod file, if the module is deprecated
fn deprecation_notice(go_mod: &str) -> Option<String> {
    let mut notice: Vec<&str> = Vec::new();
    for line in go_mod.lines().map(str::trim) {
        if let Some(comment) = line.strip_prefix("//") {
            notice.push(comment.trim());
        } else if line.starts_with("module") {
            break;
        } else {
            notice.clear();
        }
    }
    let start = notice.iter().position(|l| l.starts_with("Deprecated:"))?;
    let text = notice[start..].join(" ");
    let message = text.trim_start_matches("Deprecated:").trim();
    Some(if message.is_empty() {
        "deprecated".to_string()
    } else {
        message.to_string()
    })
}

impl GoProxyAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn version_url(module: &str, file: &str) -> String {
        format!("{}/{}/@v/{}", GO_PROXY_URL, escape_module_path(module), file)
    }

    async fn publish_times(
        &self,
        module: &str,
        versions: &[String],
    ) -> Vec<(String, Option<DateTime<Utc>>)> {
        let mut tasks = JoinSet::new();
        for version in versions {
            let client = self.client.clone();
            let module = module.to_string();
            let version = version.clone();
            let registry = self.registry_name();
            tasks.spawn(async move {
                let url = Self::version_url(&module, &format!("{}.info", version));
                let published = match client.get_json::<VersionInfo>(&url, &module, registry).await {
                    Ok(info) => info.time.parse::<DateTime<Utc>>().ok(),
                    Err(e) => {
                        debug!(module = %module, version = %version, error = %e, "version info unavailable");
                        None
                    }
                };
                (version, published)
            });
        }

        let mut dated = Vec::with_capacity(versions.len());
        while let Some(joined) = tasks.join_next().await {
            if let Ok(entry) = joined {
                dated.push(entry);
            }
        }
        dated
    }
}

#[async_trait]
impl RegistryAdapter for GoProxyAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn registry_name(&self) -> &'static str {
        "Go Proxy"
    }

    async fn fetch_metadata(&self, module: &str) -> Result<PackageMetadata, LookupError> {
        let list = self
            .client
            .get_text(&Self::version_url(module, "list"), module, self.registry_name())
            .await?;

        let mut listed: Vec<String> = list
            .lines()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        listed.sort_by_key(|v| std::cmp::Reverse(Version::parse(v)));

        let split = listed.len().min(MAX_DATED_VERSIONS);
        let mut dated = self.publish_times(module, &listed[..split]).await;
        // Versions the info task lost still count as published
        for version in &listed[..split] {
            if !dated.iter().any(|(v, _)| v == version) {
                dated.push((version.clone(), None));
            }
        }
        dated.extend(listed[split..].iter().map(|v| (v.clone(), None)));

        let deprecated = match listed.first() {
            Some(newest) => {
                let url = Self::version_url(module, &format!("{}.mod", newest));
                match self.client.get_text(&url, module, self.registry_name()).await {
                    Ok(go_mod) => deprecation_notice(&go_mod),
                    Err(e) => {
                        debug!(module, error = %e, "go.mod unavailable");
                        None
                    }
                }
            }
            None => None,
        };

        let versions = dated
            .into_iter()
            .map(|(version, published)| {
                let entry = PublishedVersion::new(&version, published);
                match &deprecated {
                    Some(message) if listed.first() == Some(&version) => {
                        entry.with_deprecated(message.clone())
                    }
                    _ => entry,
                }
            })
            .collect();

        Ok(PackageMetadata::new(versions))
    }
}
