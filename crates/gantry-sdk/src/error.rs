// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gantry-sdk.

use thiserror::Error;

/// Result type using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur when using the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection to the platform API failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A convergence wait ran out of time.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The request hit its deadline before completing.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The API answered with a non-success status.
    #[error("api error [{status}]: {message}")]
    Api { status: u16, message: String },

    /// Too many callers competed for the token refresh slot.
    #[error("token refresh contention exceeded")]
    RefreshContention,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Connection upgrade failed.
    #[error("upgrade error: {0}")]
    Upgrade(String),

    /// An interactive session ended with an error.
    #[error("session error: {0}")]
    Session(String),
}

impl SdkError {
    /// True when the underlying request ran out of time rather than
    /// failing outright. Convergence polling treats this case specially.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, SdkError::DeadlineExceeded)
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SdkError::DeadlineExceeded
        } else if err.is_decode() {
            SdkError::Serialization(err.to_string())
        } else {
            SdkError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<gantry_protocol::UpgradeError> for SdkError {
    fn from(err: gantry_protocol::UpgradeError) -> Self {
        SdkError::Upgrade(err.to_string())
    }
}

impl From<crate::session::SessionError> for SdkError {
    fn from(err: crate::session::SessionError) -> Self {
        SdkError::Session(err.to_string())
    }
}
