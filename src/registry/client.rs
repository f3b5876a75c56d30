//! HTTP transport shared by the registry adapters
//!
//! Handles:
//! - One reqwest client per run (timeout, User-Agent)
//! - Retries with exponential backoff for rate limits, 5xx and transport errors
//! - Mapping HTTP outcomes onto `LookupError` for the package being looked up

use crate::error::LookupError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_USER_AGENT: &str = concat!("depshub/", env!("CARGO_PKG_VERSION"));

/// Retries after the first attempt
const MAX_RETRIES: u32 = 3;

/// First backoff delay, doubled after every retry
const BASE_DELAY: Duration = Duration::from_millis(100);

/// What to do with a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusAction {
    Accept,
    Retry,
    NotFound,
    Fail,
}

fn status_action(status: StatusCode) -> StatusAction {
    if status.is_success() {
        StatusAction::Accept
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        StatusAction::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else {
        StatusAction::Fail
    }
}

/// Package and registry a request is made for, used in errors
struct Target<'a> {
    package: &'a str,
    registry: &'a str,
}

impl Target<'_> {
    fn transport_error(&self, error: &reqwest::Error) -> LookupError {
        if error.is_timeout() {
            LookupError::timeout(self.package, self.registry)
        } else {
            LookupError::network(self.package, self.registry, error.to_string())
        }
    }

    fn status_error(&self, status: StatusCode) -> LookupError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            LookupError::rate_limited(self.registry)
        } else {
            LookupError::network(self.package, self.registry, format!("HTTP {}", status))
        }
    }
}

/// Registry HTTP client with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    pub fn new() -> Result<Self, LookupError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Client with a custom per-request timeout and User-Agent
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                LookupError::network("", "HTTP client", format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the number of retries after the first attempt (builder pattern)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Fetch `url` and decode its JSON body
    ///
    /// A body that does not decode is an invalid response; it is not retried.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        package: &str,
        registry: &str,
    ) -> Result<T, LookupError> {
        let body = self.get_text(url, package, registry).await?;
        serde_json::from_str(&body).map_err(|e| {
            LookupError::invalid_response(package, registry, format!("failed to parse JSON: {}", e))
        })
    }

    /// Fetch `url` and return its body as text
    pub async fn get_text(
        &self,
        url: &str,
        package: &str,
        registry: &str,
    ) -> Result<String, LookupError> {
        let target = Target { package, registry };
        let mut delay = BASE_DELAY;
        let mut attempt = 0;

        loop {
            let error = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    match status_action(status) {
                        StatusAction::Accept => match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => target.transport_error(&e),
                        },
                        StatusAction::NotFound => {
                            return Err(LookupError::not_found(package, registry))
                        }
                        StatusAction::Fail => return Err(target.status_error(status)),
                        StatusAction::Retry => target.status_error(status),
                    }
                }
                Err(e) => target.transport_error(&e),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }
            debug!(url, attempt, error = %error, "retrying registry request");
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(HttpClient::new().is_ok());
        assert!(HttpClient::with_config(Duration::from_secs(5), "test-agent/1.0").is_ok());
    }

    #[test]
    fn test_max_retries() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.max_retries, MAX_RETRIES);
        let client = client.with_max_retries(0);
        assert_eq!(client.max_retries, 0);
    }

    #[test]
    fn test_status_action() {
        assert_eq!(status_action(StatusCode::OK), StatusAction::Accept);
        assert_eq!(status_action(StatusCode::NOT_FOUND), StatusAction::NotFound);
        assert_eq!(status_action(StatusCode::GONE), StatusAction::NotFound);
        assert_eq!(status_action(StatusCode::TOO_MANY_REQUESTS), StatusAction::Retry);
        assert_eq!(status_action(StatusCode::BAD_GATEWAY), StatusAction::Retry);
        assert_eq!(status_action(StatusCode::FORBIDDEN), StatusAction::Fail);
    }

    #[test]
    fn test_status_errors() {
        let target = Target {
            package: "left-pad",
            registry: "npm",
        };
        assert_eq!(
            target.status_error(StatusCode::TOO_MANY_REQUESTS).kind(),
            LookupError::rate_limited("npm").kind()
        );
        let err = target.status_error(StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("HTTP 403"));
        assert!(err.to_string().contains("left-pad"));
    }

    #[test]
    fn test_user_agent() {
        assert!(DEFAULT_USER_AGENT.starts_with("depshub/"));
    }
}
