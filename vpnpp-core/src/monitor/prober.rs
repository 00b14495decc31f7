//! External reachability probing
//!
//! Asks a remote port-check service whether the bound port accepts inbound
//! connections and classifies the answer as a [`StatusId`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::ProbeError;
use crate::monitor::status::StatusId;

/// Answer of a remote port check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
    /// The service answered but could not decide
    Indeterminate,
}

/// A remote "is my port open" service
#[async_trait]
pub trait PortCheckService: Send + Sync {
    async fn check_external_port(&self, port: u16) -> Result<PortState, ProbeError>;
}

/// Classified probe result with a diagnostic text for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: StatusId,
    pub text: String,
}

/// Runs one bounded port check and classifies it
#[derive(Clone)]
pub struct ReachabilityProber {
    service: Arc<dyn PortCheckService>,
    timeout: Duration,
}

impl ReachabilityProber {
    pub fn new(service: Arc<dyn PortCheckService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `port` once
    ///
    /// OPEN maps to OK, CLOSED to BAD. Anything else (indeterminate answers,
    /// errors, or no answer within the timeout) maps to WARN. There is no
    /// retry here; the next scheduled cycle is the retry.
    #[tracing::instrument(skip(self), fields(timeout_ms = self.timeout.as_millis()))]
    pub async fn probe(&self, port: u16) -> ProbeOutcome {
        let start = Instant::now();
        let answer = tokio::time::timeout(self.timeout, self.service.check_external_port(port))
            .await
            .unwrap_or(Err(ProbeError::Timeout {
                seconds: self.timeout.as_secs(),
            }));

        let outcome = match answer {
            Ok(PortState::Open) => ProbeOutcome {
                status: StatusId::Ok,
                text: format!("Port {} is open", port),
            },
            Ok(PortState::Closed) => ProbeOutcome {
                status: StatusId::Bad,
                text: format!("Port {} is closed", port),
            },
            Ok(PortState::Indeterminate) => ProbeOutcome {
                status: StatusId::Warn,
                text: format!("Port {} could not be verified", port),
            },
            Err(e) => {
                warn!(port, error = %e, "Port check failed");
                ProbeOutcome {
                    status: StatusId::Warn,
                    text: format!("Port {} could not be verified: {}", port, e),
                }
            }
        };

        debug!(
            port,
            status = %outcome.status,
            duration_ms = start.elapsed().as_millis(),
            "Port check finished"
        );
        outcome
    }
}

/// Body returned by the HTTP port-check endpoint
#[derive(Debug, Deserialize)]
struct PortCheckResponse {
    open: bool,
}

/// Port-check service reached over HTTP/HTTPS
///
/// Sends `GET <endpoint>?port=<n>` and expects a JSON body `{"open": bool}`.
#[derive(Debug)]
pub struct HttpPortChecker {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpPortChecker {
    /// Create a new port checker
    ///
    /// # Arguments
    /// * `endpoint` - HTTP/HTTPS URL of the service (must use http:// or https:// scheme)
    /// * `timeout` - Maximum duration to wait for a response
    #[tracing::instrument(skip(timeout), fields(endpoint = %endpoint, timeout_ms = timeout.as_millis()))]
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let url = Url::parse(endpoint).map_err(|e| ProbeError::InvalidEndpoint {
            reason: format!("Failed to parse URL: {}", e),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ProbeError::InvalidEndpoint {
                    reason: format!("Only HTTP/HTTPS schemes are supported, got: {}", scheme),
                });
            }
        }

        let client = Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| ProbeError::InvalidEndpoint {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: url,
            timeout,
        })
    }

    fn url_for(&self, port: u16) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("port", &port.to_string());
        url
    }
}

#[async_trait]
impl PortCheckService for HttpPortChecker {
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn check_external_port(&self, port: u16) -> Result<PortState, ProbeError> {
        let response = self.client.get(self.url_for(port)).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else if e.is_connect() {
                ProbeError::RequestFailed {
                    reason: "Connection refused or unreachable".to_string(),
                }
            } else {
                ProbeError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Port check service answered with error status");
            return Ok(PortState::Indeterminate);
        }

        match response.json::<PortCheckResponse>().await {
            Ok(body) if body.open => Ok(PortState::Open),
            Ok(_) => Ok(PortState::Closed),
            Err(e) => {
                warn!(error = %e, "Unreadable port check response");
                Ok(PortState::Indeterminate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_checker_new_valid_https() {
        let result = HttpPortChecker::new("https://portcheck.example.net/check", Duration::from_secs(5));
        assert!(result.is_ok());
    }

    #[test]
    fn test_port_checker_new_invalid_scheme() {
        let result = HttpPortChecker::new("ftp://portcheck.example.net", Duration::from_secs(5));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Only HTTP/HTTPS schemes"));
    }

    #[test]
    fn test_port_checker_new_invalid_url() {
        let result = HttpPortChecker::new("not a url", Duration::from_secs(5));
        assert!(result.unwrap_err().to_string().contains("parse URL"));
    }

    #[test]
    fn test_url_keeps_existing_query() {
        let checker = HttpPortChecker::new(
            "https://portcheck.example.net/check?v=2",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            checker.url_for(6881).as_str(),
            "https://portcheck.example.net/check?v=2&port=6881"
        );
    }
}
