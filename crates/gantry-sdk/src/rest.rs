// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Signed JSON transport shared by the platform and registry clients.

use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::auth::Credentials;
use crate::error::{Result, SdkError};

/// Error body returned by the platform on failed requests.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// HTTP client bound to one API endpoint.
///
/// Requests are signed with the configured credentials unless a bearer token
/// is supplied for the individual call.
#[derive(Debug)]
pub(crate) struct RestClient {
    http: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl RestClient {
    pub(crate) fn new(
        endpoint: &str,
        credentials: Option<Credentials>,
        user_agent: &str,
        connect_timeout: Option<Duration>,
        request_timeout: Duration,
        skip_cert_verification: bool,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| SdkError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;

        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout);
        if let Some(connect_timeout) = connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if skip_cert_verification {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| SdkError::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            credentials,
        })
    }

    /// The endpoint this client is bound to.
    pub(crate) fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self.send(Method::GET, path, query, None, None).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn get_json_bearer<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<T> {
        let resp = self
            .send(Method::GET, path, query, None, Some(token))
            .await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn post<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<()> {
        let body = body.map(serde_json::to_vec).transpose()?;
        self.send(Method::POST, path, &[], body, None).await?;
        Ok(())
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_vec(body)?;
        let resp = self
            .send(Method::POST, path, &[], Some(body), None)
            .await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn post_json_bearer<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<T> {
        let resp = self
            .send(Method::POST, path, query, None, Some(token))
            .await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, &[], None, None).await?;
        Ok(())
    }

    pub(crate) async fn delete_bearer(&self, path: &str, token: &str) -> Result<()> {
        self.send(Method::DELETE, path, &[], None, Some(token))
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Vec<u8>>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = self.request_url(path, query)?;

        let mut req = self.http.request(method.clone(), url.clone());
        let content_type = body.is_some().then_some("application/json");
        if let Some(token) = bearer {
            req = req.header("Authorization", format!("Bearer {token}"));
        } else if let Some(creds) = &self.credentials {
            let auth = creds.authorization(
                url.path(),
                url.query(),
                content_type,
                body.as_deref().unwrap_or_default(),
            );
            req = req.header("Authorization", auth);
        }
        if let Some(body) = body {
            req = req.header("Content-Type", "application/json").body(body);
        }

        trace!(%method, %url, "sending API request");
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, resp).await);
        }
        Ok(resp)
    }

    fn request_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| SdkError::Config(format!("invalid request path {path:?}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

async fn api_error(status: StatusCode, resp: reqwest::Response) -> SdkError {
    let body = resp.text().await.unwrap_or_default();
    SdkError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    }
}

/// Extract the platform's error message from a failure body, falling back to
/// the raw body when it is not the usual `{"error": ...}` shape.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Percent-encode a user-supplied value for use as a single path segment.
pub(crate) fn encode_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(
            "http://127.0.0.1:8700",
            None,
            "gantry-sdk/test",
            None,
            Duration::from_secs(5),
            false,
        )
        .unwrap()
    }

    // ========================================================================
    // Construction tests
    // ========================================================================

    #[test]
    fn test_new_rejects_invalid_endpoint() {
        let err = RestClient::new(
            "not a url",
            None,
            "gantry-sdk/test",
            None,
            Duration::from_secs(5),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn test_base_is_parsed_endpoint() {
        assert_eq!(client().base().as_str(), "http://127.0.0.1:8700/");
    }

    // ========================================================================
    // URL building tests
    // ========================================================================

    #[test]
    fn test_request_url_joins_absolute_path() {
        let url = client().request_url("/v3/stacks", &[]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8700/v3/stacks");
    }

    #[test]
    fn test_request_url_appends_query() {
        let url = client()
            .request_url("/v3/containers", &[("stack", "web"), ("service", "api")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8700/v3/containers?stack=web&service=api"
        );
    }

    #[test]
    fn test_request_url_encodes_query_values() {
        let url = client()
            .request_url("/token", &[("scope", "repository:apps/*:pull,push,del")])
            .unwrap();
        assert_eq!(
            url.query(),
            Some("scope=repository%3Aapps%2F*%3Apull%2Cpush%2Cdel")
        );
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("web"), "web");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_eq!(encode_segment("odd name"), "odd%20name");
    }

    // ========================================================================
    // Error body tests
    // ========================================================================

    #[test]
    fn test_error_message_parses_error_field() {
        assert_eq!(
            error_message(r#"{"error": "stack not found"}"#),
            "stack not found"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("502 Bad Gateway\n"), "502 Bad Gateway");
        assert_eq!(error_message(""), "");
    }
}
