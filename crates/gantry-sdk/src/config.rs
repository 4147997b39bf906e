// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the SDK.

use std::time::Duration;

use crate::error::{Result, SdkError};

/// User-Agent the SDK identifies itself with unless overridden.
pub fn default_user_agent() -> String {
    format!(
        "gantry-sdk/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// Normalize an endpoint: trim whitespace, strip trailing slashes, and
/// default the scheme to https.
pub(crate) fn clean_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Configuration for the GantryClient.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Platform API endpoint, scheme included.
    pub endpoint: String,
    /// Access key for request signing. Unauthenticated when absent.
    pub access_key: Option<String>,
    /// Secret key for request signing.
    pub secret_key: Option<String>,
    /// User-Agent sent on every request.
    pub user_agent: String,
    /// Skip TLS certificate verification on upgraded connections
    /// (development only).
    pub skip_cert_verification: bool,
    /// Dial timeout for upgraded connections.
    pub connect_timeout: Duration,
    /// Request timeout for REST calls.
    pub request_timeout: Duration,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8700".to_string(), // Platform API default port
            access_key: None,
            secret_key: None,
            user_agent: default_user_agent(),
            skip_cert_verification: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SdkConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration for localhost development.
    ///
    /// This enables certificate verification skipping.
    pub fn localhost() -> Self {
        Self {
            skip_cert_verification: true,
            ..Self::default()
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GANTRY_ENDPOINT`: Platform API endpoint (default: "http://127.0.0.1:8700")
    /// - `GANTRY_ACCESS_KEY` / `GANTRY_SECRET_KEY`: Signing credentials (optional, set together)
    /// - `GANTRY_SKIP_CERT_VERIFICATION`: Skip TLS verification (default: "false")
    /// - `GANTRY_CONNECT_TIMEOUT_MS`: Dial timeout in milliseconds (default: 10000)
    /// - `GANTRY_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds (default: 30000)
    pub fn from_env() -> Result<Self> {
        let endpoint = clean_endpoint(
            &std::env::var("GANTRY_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8700".to_string()),
        );

        let access_key = std::env::var("GANTRY_ACCESS_KEY").ok();
        let secret_key = std::env::var("GANTRY_SECRET_KEY").ok();
        if access_key.is_some() != secret_key.is_some() {
            return Err(SdkError::Config(
                "GANTRY_ACCESS_KEY and GANTRY_SECRET_KEY must be set together".to_string(),
            ));
        }

        let skip_cert_verification = std::env::var("GANTRY_SKIP_CERT_VERIFICATION")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let connect_timeout_ms: u64 = std::env::var("GANTRY_CONNECT_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid GANTRY_CONNECT_TIMEOUT_MS: {}", e)))?;

        let request_timeout_ms: u64 = std::env::var("GANTRY_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid GANTRY_REQUEST_TIMEOUT_MS: {}", e)))?;

        Ok(Self {
            endpoint,
            access_key,
            secret_key,
            user_agent: default_user_agent(),
            skip_cert_verification,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    /// Set the API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl AsRef<str>) -> Self {
        self.endpoint = clean_endpoint(endpoint.as_ref());
        self
    }

    /// Set the signing credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable certificate verification skipping.
    pub fn with_skip_cert_verification(mut self, skip: bool) -> Self {
        self.skip_cert_verification = skip;
        self
    }

    /// Set the dial timeout for upgraded connections.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout for REST calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn credentials(&self) -> Option<crate::auth::Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(ak), Some(sk)) => Some(crate::auth::Credentials::new(ak.clone(), sk.clone())),
            _ => None,
        }
    }
}

/// Configuration for the image registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry API endpoint, scheme included.
    pub endpoint: String,
    /// Token service endpoint; the registry endpoint when absent.
    pub auth_endpoint: Option<String>,
    /// Access key for signing token requests.
    pub access_key: String,
    /// Secret key for signing token requests.
    pub secret_key: String,
    /// Root application namespace, used to derive token scopes.
    pub root_app: String,
    /// User-Agent sent on every request.
    pub user_agent: String,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl RegistryConfig {
    /// Create a registry configuration.
    pub fn new(
        endpoint: impl AsRef<str>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        root_app: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: clean_endpoint(endpoint.as_ref()),
            auth_endpoint: None,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            root_app: root_app.into(),
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set a dedicated token service endpoint.
    pub fn with_auth_endpoint(mut self, endpoint: impl AsRef<str>) -> Self {
        self.auth_endpoint = Some(clean_endpoint(endpoint.as_ref()));
        self
    }

    /// Set the User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Endpoint token requests go to.
    pub fn auth_endpoint(&self) -> &str {
        self.auth_endpoint.as_deref().unwrap_or(&self.endpoint)
    }

    /// Signing credentials, absent when no access key is configured (the
    /// registry is then assumed reachable unauthenticated from an intranet).
    pub(crate) fn credentials(&self) -> Option<crate::auth::Credentials> {
        if self.access_key.is_empty() {
            return None;
        }
        Some(crate::auth::Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
        ))
    }
}
