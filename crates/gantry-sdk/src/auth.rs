// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request signing with an access/secret key pair.
//!
//! Signed requests carry `Authorization: Gantry <access_key>:<signature>`
//! where the signature is an HMAC-SHA256 over the request path, query, and
//! (for JSON requests) the body, base64-encoded with the URL-safe alphabet.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use gantry_protocol::{RequestSigner, UpgradeRequest};

type HmacSha256 = Hmac<Sha256>;

/// Access/secret key pair identifying an API principal.
#[derive(Debug, Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create credentials from an access/secret key pair.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// The access key.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Compute the `Authorization` header value for a request.
    ///
    /// The signed data is `<path>[?<query>]\n`, followed by the body when
    /// the request carries a JSON content type. Requests with other body
    /// encodings are signed over path and query alone.
    pub fn authorization(
        &self,
        path: &str,
        query: Option<&str>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");

        mac.update(path.as_bytes());
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            mac.update(b"?");
            mac.update(query.as_bytes());
        }
        mac.update(b"\n");
        if signs_body(content_type) {
            mac.update(body);
        }

        let signature = URL_SAFE.encode(mac.finalize().into_bytes());
        format!("Gantry {}:{}", self.access_key, signature)
    }
}

impl RequestSigner for Credentials {
    fn sign(&self, req: &mut UpgradeRequest) {
        let auth = self.authorization(
            req.path(),
            req.query(),
            req.header_value("Content-Type"),
            req.body_bytes(),
        );
        req.header("Authorization", &auth);
    }
}

fn signs_body(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("test-ak", "test-sk")
    }

    fn expected(data: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(b"test-sk").unwrap();
        mac.update(data.as_bytes());
        format!("Gantry test-ak:{}", URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    // ========================================================================
    // Signature data tests
    // ========================================================================

    #[test]
    fn test_signs_path_only() {
        let auth = creds().authorization("/v3/stacks", None, None, b"");
        assert_eq!(auth, expected("/v3/stacks\n"));
    }

    #[test]
    fn test_signs_path_and_query() {
        let auth = creds().authorization("/v3/containers", Some("stack=web"), None, b"");
        assert_eq!(auth, expected("/v3/containers?stack=web\n"));
    }

    #[test]
    fn test_empty_query_is_ignored() {
        let auth = creds().authorization("/v3/stacks", Some(""), None, b"");
        assert_eq!(auth, expected("/v3/stacks\n"));
    }

    #[test]
    fn test_json_body_is_signed() {
        let auth = creds().authorization(
            "/v3/stacks",
            None,
            Some("application/json"),
            br#"{"name":"web"}"#,
        );
        assert_eq!(auth, expected("/v3/stacks\n{\"name\":\"web\"}"));
    }

    #[test]
    fn test_json_with_charset_is_signed() {
        let auth = creds().authorization(
            "/v3/stacks",
            None,
            Some("application/json; charset=utf-8"),
            b"{}",
        );
        assert_eq!(auth, expected("/v3/stacks\n{}"));
    }

    #[test]
    fn test_non_json_body_is_not_signed() {
        let auth = creds().authorization(
            "/v3/upload",
            None,
            Some("application/octet-stream"),
            b"\x00\x01\x02",
        );
        assert_eq!(auth, expected("/v3/upload\n"));
    }

    #[test]
    fn test_header_format() {
        let auth = creds().authorization("/", None, None, b"");
        let rest = auth.strip_prefix("Gantry test-ak:").unwrap();
        assert!(!rest.is_empty());
        // URL-safe alphabet only.
        assert!(
            rest.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=')
        );
    }

    // ========================================================================
    // RequestSigner tests
    // ========================================================================

    #[test]
    fn test_signer_adds_authorization_header() {
        let mut req =
            UpgradeRequest::new("POST", "http://10.0.0.1:8700/v3/containers/10.0.0.3/exec/e1/start")
                .unwrap();
        req.body(br#"{"mode":"attach"}"#.to_vec());

        creds().sign(&mut req);

        let auth = req.header_value("Authorization").unwrap();
        assert_eq!(
            auth,
            expected("/v3/containers/10.0.0.3/exec/e1/start\n{\"mode\":\"attach\"}")
        );
    }

    #[test]
    fn test_signer_includes_query() {
        let mut req =
            UpgradeRequest::new("GET", "http://10.0.0.1:8700/v3/logs/containers/10.0.0.3/realtime?since=0&tail=50")
                .unwrap();

        creds().sign(&mut req);

        let auth = req.header_value("Authorization").unwrap();
        assert_eq!(
            auth,
            expected("/v3/logs/containers/10.0.0.3/realtime?since=0&tail=50\n")
        );
    }
}
