// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bearer token caching with single-flight refresh.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::debug;

use crate::error::{Result, SdkError};

/// Seconds before nominal expiry at which a token is already treated as
/// expired, so requests in flight never ride a token about to lapse.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// How many times a caller re-waits for the refresh slot before giving up.
const SLOT_RETRY_LIMIT: u32 = 3;

const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// A bearer token as issued by the registry auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    /// Opaque bearer token value.
    pub token: String,
    /// Validity in seconds from `issued_at`.
    pub expires_in: i64,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
}

impl AuthToken {
    /// Check if the token needs a refresh, applying the safety margin.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.issued_at.timestamp() + self.expires_in - REFRESH_MARGIN_SECS
    }
}

/// Source of fresh auth tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Request a token covering the given scopes.
    async fn request_token(&self, scopes: &[String]) -> Result<AuthToken>;
}

/// Caches a bearer token and refreshes it when it expires.
///
/// Refreshes are single-flight: the caller that takes the refresh slot
/// fetches, while concurrent callers wait and then reuse the stored token.
/// A caller that cannot take the slot within a few wait intervals fails
/// with [`SdkError::RefreshContention`] instead of queueing indefinitely,
/// and a failed refresh keeps the slot for one wait interval before
/// surfacing its error.
#[derive(Debug)]
pub struct TokenCache {
    scopes: Vec<String>,
    token: RwLock<Option<AuthToken>>,
    slot: Mutex<()>,
    retry_wait: Duration,
}

impl TokenCache {
    /// Create an empty cache requesting the given scopes on refresh.
    pub fn new(scopes: Vec<String>) -> Self {
        Self {
            scopes,
            token: RwLock::new(None),
            slot: Mutex::new(()),
            retry_wait: DEFAULT_RETRY_WAIT,
        }
    }

    /// Set how long callers wait between attempts to take the refresh slot,
    /// which is also how long a failed refresh holds the slot.
    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    /// Scopes requested on refresh.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Get a bearer token value, refreshing through `issuer` if the cached
    /// one is missing or expired.
    pub async fn bearer(&self, issuer: &dyn TokenIssuer) -> Result<String> {
        if let Some(token) = self.fresh().await {
            return Ok(token.token);
        }

        let slot = self.acquire_slot().await?;

        // Another caller may have refreshed while this one waited.
        if let Some(token) = self.fresh().await {
            return Ok(token.token);
        }

        debug!(scopes = ?self.scopes, "refreshing auth token");
        match issuer.request_token(&self.scopes).await {
            Ok(token) => {
                let value = token.token.clone();
                *self.token.write().await = Some(token);
                Ok(value)
            }
            Err(e) => {
                tokio::time::sleep(self.retry_wait).await;
                drop(slot);
                Err(e)
            }
        }
    }

    async fn acquire_slot(&self) -> Result<MutexGuard<'_, ()>> {
        let mut tried = 0;
        loop {
            match tokio::time::timeout(self.retry_wait, self.slot.lock()).await {
                Ok(slot) => return Ok(slot),
                Err(_) => {
                    tried += 1;
                    if tried > SLOT_RETRY_LIMIT {
                        return Err(SdkError::RefreshContention);
                    }
                }
            }
        }
    }

    async fn fresh(&self) -> Option<AuthToken> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| !t.is_expired())
            .cloned()
    }
}
