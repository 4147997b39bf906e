// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Image registry client.
//!
//! Data requests authenticate with bearer tokens from the registry's token
//! service; tokens are cached in a [`TokenCache`] and refreshed shortly
//! before they expire. Token requests themselves are signed with the
//! configured credentials, or sent unauthenticated in intranet mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::rest::{RestClient, encode_segment};
use crate::token::{AuthToken, TokenCache, TokenIssuer};

// ============================================================================
// Registry Types
// ============================================================================

/// Content-addressed image digest, usually `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wrap a digest string.
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The digest with its `sha256:` algorithm prefix removed.
    pub fn id(&self) -> &str {
        self.0.strip_prefix("sha256:").unwrap_or(&self.0)
    }

    /// The full digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repository in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    /// Repository name.
    pub name: String,
}

/// A tag within a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// When the tag was pushed.
    pub created: DateTime<Utc>,
    /// Metadata of the image the tag points at.
    pub detail: ImageConfig,
}

/// Stored image metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Manifest digest.
    pub digest: Digest,
    /// Image config blob as stored.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Build-time container config as stored.
    #[serde(default)]
    pub container_config: serde_json::Value,
    /// When the image was built.
    pub created: DateTime<Utc>,
    /// Compressed size in bytes.
    pub size: i64,
}

/// Reference to an image as `<username>/<repo>` at a tag or digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Owning namespace.
    pub username: String,
    /// Repository name.
    pub repo: String,
    /// Tag name or digest.
    pub reference: String,
}

fn token_scopes(root_app: &str) -> Vec<String> {
    vec![
        format!("repository:{root_app}/*:pull,push,del"),
        "repository:library/*:pull".to_string(),
    ]
}

// ============================================================================
// Token Service
// ============================================================================

/// Client for the registry's token service.
#[derive(Debug)]
pub struct TokenService {
    rest: RestClient,
}

impl TokenService {
    /// Create a token service client from the registry configuration.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let rest = RestClient::new(
            config.auth_endpoint(),
            config.credentials(),
            &config.user_agent,
            None,
            config.request_timeout,
            false,
        )?;
        Ok(Self { rest })
    }
}

#[async_trait]
impl TokenIssuer for TokenService {
    async fn request_token(&self, scopes: &[String]) -> Result<AuthToken> {
        let query: Vec<(&str, &str)> = scopes.iter().map(|s| ("scope", s.as_str())).collect();
        self.rest.get_json("/token", &query).await
    }
}

// ============================================================================
// Registry Client
// ============================================================================

/// High-level client for the image registry.
pub struct RegistryClient {
    rest: RestClient,
    tokens: TokenCache,
    issuer: TokenService,
    config: RegistryConfig,
}

impl RegistryClient {
    /// Create a registry client with the given configuration.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let rest = RestClient::new(
            &config.endpoint,
            None,
            &config.user_agent,
            None,
            config.request_timeout,
            false,
        )?;
        let issuer = TokenService::new(&config)?;
        let tokens = TokenCache::new(token_scopes(&config.root_app));

        Ok(Self {
            rest,
            tokens,
            issuer,
            config,
        })
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// List repositories under a user namespace.
    #[instrument(skip(self))]
    pub async fn list_repos(&self, username: &str) -> Result<Vec<Repo>> {
        let token = self.tokens.bearer(&self.issuer).await?;
        let path = format!("/api/{}/repos", encode_segment(username));
        self.rest.get_json_bearer(&path, &[], &token).await
    }

    /// List the tags of a repository.
    #[instrument(skip(self))]
    pub async fn list_repo_tags(&self, username: &str, repo: &str) -> Result<Vec<Tag>> {
        let token = self.tokens.bearer(&self.issuer).await?;
        let path = format!(
            "/api/{}/{}/tags",
            encode_segment(username),
            encode_segment(repo)
        );
        self.rest.get_json_bearer(&path, &[], &token).await
    }

    /// List one page of a repository's tags.
    #[instrument(skip(self))]
    pub async fn list_repo_tags_page(
        &self,
        username: &str,
        repo: &str,
        start: u32,
        size: u32,
    ) -> Result<Vec<Tag>> {
        let token = self.tokens.bearer(&self.issuer).await?;
        let path = format!(
            "/api/{}/{}/tags",
            encode_segment(username),
            encode_segment(repo)
        );
        let start = start.to_string();
        let size = size.to_string();
        let query = [("start", start.as_str()), ("size", size.as_str())];
        self.rest.get_json_bearer(&path, &query, &token).await
    }

    /// Get the stored config of an image at a tag or digest.
    #[instrument(skip(self))]
    pub async fn get_image_config(
        &self,
        username: &str,
        repo: &str,
        reference: &str,
    ) -> Result<ImageConfig> {
        let token = self.tokens.bearer(&self.issuer).await?;
        let path = format!(
            "/api/{}/{}/repo/{}",
            encode_segment(username),
            encode_segment(repo),
            encode_segment(reference)
        );
        self.rest.get_json_bearer(&path, &[], &token).await
    }

    /// Delete a tag from a repository.
    #[instrument(skip(self))]
    pub async fn delete_repo_tag(
        &self,
        username: &str,
        repo: &str,
        reference: &str,
    ) -> Result<()> {
        let token = self.tokens.bearer(&self.issuer).await?;
        let path = format!(
            "/api/{}/{}/repo/{}",
            encode_segment(username),
            encode_segment(repo),
            encode_segment(reference)
        );
        self.rest.delete_bearer(&path, &token).await
    }

    /// Create a tag in a repository pointing at an existing image.
    #[instrument(skip(self, from))]
    pub async fn create_tag_from_repo(
        &self,
        username: &str,
        repo: &str,
        tag: &str,
        from: &ImageSpec,
    ) -> Result<ImageSpec> {
        let token = self.tokens.bearer(&self.issuer).await?;
        let path = format!(
            "/api/{}/{}/repo/{}",
            encode_segment(username),
            encode_segment(repo),
            encode_segment(tag)
        );
        let source = format!("{}/{}", from.username, from.repo);
        let query = [("from", source.as_str()), ("reference", from.reference.as_str())];
        self.rest.post_json_bearer(&path, &query, &token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Digest tests
    // ========================================================================

    #[test]
    fn test_digest_id_strips_sha256_prefix() {
        let digest = Digest::new("sha256:abcdef0123");
        assert_eq!(digest.id(), "abcdef0123");
        assert_eq!(digest.as_str(), "sha256:abcdef0123");
    }

    #[test]
    fn test_digest_id_keeps_unprefixed_value() {
        assert_eq!(Digest::new("abcdef0123").id(), "abcdef0123");
    }

    #[test]
    fn test_digest_serializes_transparently() {
        let digest: Digest = serde_json::from_str("\"sha256:ff\"").unwrap();
        assert_eq!(digest, Digest::new("sha256:ff"));
        assert_eq!(serde_json::to_string(&digest).unwrap(), "\"sha256:ff\"");
    }

    #[test]
    fn test_digest_display() {
        assert_eq!(Digest::new("sha256:ff").to_string(), "sha256:ff");
    }

    // ========================================================================
    // Scope tests
    // ========================================================================

    #[test]
    fn test_token_scopes() {
        let scopes = token_scopes("apps");
        assert_eq!(
            scopes,
            vec![
                "repository:apps/*:pull,push,del".to_string(),
                "repository:library/*:pull".to_string(),
            ]
        );
    }

    // ========================================================================
    // Wire format tests
    // ========================================================================

    #[test]
    fn test_tag_deserialize() {
        let json = r#"{
            "name": "v1.4",
            "created": "2025-04-01T12:00:00Z",
            "detail": {
                "digest": "sha256:aa11",
                "config": {"Env": ["A=1"]},
                "container_config": {},
                "created": "2025-04-01T11:59:00Z",
                "size": 10485760
            }
        }"#;

        let tag: Tag = serde_json::from_str(json).unwrap();
        assert_eq!(tag.name, "v1.4");
        assert_eq!(tag.detail.digest.id(), "aa11");
        assert_eq!(tag.detail.size, 10_485_760);
    }

    #[test]
    fn test_image_config_missing_blobs_default_to_null() {
        let json = r#"{
            "digest": "sha256:aa11",
            "created": "2025-04-01T11:59:00Z",
            "size": 1
        }"#;

        let config: ImageConfig = serde_json::from_str(json).unwrap();
        assert!(config.config.is_null());
        assert!(config.container_config.is_null());
    }

    // ========================================================================
    // Client construction tests
    // ========================================================================

    #[test]
    fn test_registry_client_new() {
        let config = RegistryConfig::new("https://registry.gantry.example", "ak", "sk", "apps");
        let client = RegistryClient::new(config).unwrap();
        assert_eq!(client.config().root_app, "apps");
        assert_eq!(client.tokens.scopes().len(), 2);
    }

    #[test]
    fn test_registry_client_rejects_bad_endpoint() {
        let config = RegistryConfig {
            endpoint: "::not a url::".to_string(),
            ..RegistryConfig::new("registry.gantry.example", "ak", "sk", "apps")
        };
        assert!(RegistryClient::new(config).is_err());
    }
}
