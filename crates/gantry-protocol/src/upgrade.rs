// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP connection upgrade transport.
//!
//! Interactive endpoints (container exec, realtime logs) start as a
//! signed HTTP request and switch to a raw duplex byte stream on
//! `101 Switching Protocols`. [`UpgradeTransport`] dials the target
//! (plain TCP or TLS depending on the URL scheme), writes the request,
//! checks exactly one response, and hands the live socket back as an
//! [`UpgradedConn`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;

use crate::handshake::{self, ResponseHead};

/// Timeout covering TCP connect plus TLS handshake
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while establishing an upgraded connection
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("invalid upgrade target: {0}")]
    InvalidTarget(String),

    #[error("dial failed: {0}")]
    Dial(#[source] std::io::Error),

    #[error("dial timed out after {0}ms")]
    DialTimeout(u64),

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed upgrade response: {0}")]
    MalformedResponse(String),

    #[error("connection upgrade rejected: status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("server did not acknowledge the upgrade: status {status}: {body}")]
    MissingUpgradeHeaders { status: u16, body: String },
}

/// Adds authentication to an upgrade request before it is sent.
///
/// Implemented by the SDK's credential types. Deployments that reach the
/// API over a trusted network pass no signer at all.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, req: &mut UpgradeRequest);
}

/// An HTTP request asking the server to hand over the connection
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    method: String,
    url: Url,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl UpgradeRequest {
    /// Build an upgrade request for `method` against an absolute URL.
    ///
    /// The fixed upgrade headers (`Connection: Upgrade`, `Upgrade: tcp`,
    /// `Content-Type: application/json`) are set here; callers add
    /// anything else with [`UpgradeRequest::header`].
    pub fn new(method: &str, target: &str) -> Result<Self, UpgradeError> {
        let url = Url::parse(target)
            .map_err(|e| UpgradeError::InvalidTarget(format!("{target}: {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(UpgradeError::InvalidTarget(format!(
                    "unsupported scheme: {other}"
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(UpgradeError::InvalidTarget(format!("{target}: missing host")));
        }

        Ok(Self {
            method: method.to_string(),
            url,
            headers: vec![
                ("Connection".to_string(), "Upgrade".to_string()),
                ("Upgrade".to_string(), "tcp".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Vec::new(),
        })
    }

    /// Add a header
    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Attach a request body, sent with a `Content-Length` header
    pub fn body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Request method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// URL path component
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// URL query string, without the leading `?`
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// First value of the named header, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request body bytes
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    fn port(&self) -> u16 {
        // The url crate strips scheme-default ports on parse, so this is
        // the explicit port or 443/80.
        self.url
            .port()
            .unwrap_or(if self.is_tls() { 443 } else { 80 })
    }

    fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }

    /// Serialize into HTTP/1.1 wire bytes
    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(
            format!("{} {} HTTP/1.1\r\n", self.method, self.path_and_query()).as_bytes(),
        );
        let host = match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        };
        out.extend_from_slice(format!("Host: {host}\r\n").as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !self.body.is_empty() {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Establishes upgraded raw-duplex connections
#[derive(Debug, Clone)]
pub struct UpgradeTransport {
    dial_timeout: Duration,
    skip_cert_verification: bool,
}

impl Default for UpgradeTransport {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            skip_cert_verification: false,
        }
    }
}

impl UpgradeTransport {
    /// Create a transport with the default dial timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the dial timeout
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Skip TLS certificate verification (for development only!)
    pub fn with_dangerous_skip_cert_verification(mut self, skip: bool) -> Self {
        self.skip_cert_verification = skip;
        self
    }

    /// Send `req`, expect `101 Switching Protocols`, and return the raw
    /// connection.
    ///
    /// On any failure the socket is dropped; there is no retry. A non-101
    /// status yields [`UpgradeError::Rejected`] carrying the response body;
    /// a 101 without the upgrade acknowledgement headers yields
    /// [`UpgradeError::MissingUpgradeHeaders`].
    pub async fn upgrade(
        &self,
        mut req: UpgradeRequest,
        signer: Option<&dyn RequestSigner>,
    ) -> Result<UpgradedConn, UpgradeError> {
        if let Some(signer) = signer {
            signer.sign(&mut req);
        }

        let timeout_ms = self.dial_timeout.as_millis() as u64;
        let mut stream = tokio::time::timeout(self.dial_timeout, self.dial(&req))
            .await
            .map_err(|_| UpgradeError::DialTimeout(timeout_ms))??;

        stream.write_all(&req.serialize()).await?;
        stream.flush().await?;

        let (head, leftover) = handshake::read_response_head(&mut stream).await?;
        if head.status != 101 || !is_upgrade_acknowledged(&head) {
            let body = handshake::read_failure_body(&mut stream, &head, leftover).await;
            if head.status != 101 {
                return Err(UpgradeError::Rejected {
                    status: head.status,
                    body,
                });
            }
            return Err(UpgradeError::MissingUpgradeHeaders {
                status: head.status,
                body,
            });
        }

        debug!(
            method = %req.method,
            path = %req.url.path(),
            "connection upgraded"
        );
        Ok(UpgradedConn { leftover, stream })
    }

    async fn dial(&self, req: &UpgradeRequest) -> Result<TransportStream, UpgradeError> {
        let host = req.host().to_string();
        let addr = format!("{}:{}", host, req.port());

        let tcp = TcpStream::connect(&addr).await.map_err(UpgradeError::Dial)?;
        if !req.is_tls() {
            debug!(%addr, "dialed plain");
            return Ok(TransportStream::Plain(tcp));
        }

        let connector = TlsConnector::from(Arc::new(self.tls_config()));
        let server_name = rustls::pki_types::ServerName::try_from(host.clone())
            .map_err(|_| UpgradeError::InvalidTarget(format!("invalid server name: {host}")))?;
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(UpgradeError::Tls)?;
        debug!(%addr, "dialed TLS");
        Ok(TransportStream::Tls(Box::new(tls)))
    }

    fn tls_config(&self) -> rustls::ClientConfig {
        if self.skip_cert_verification {
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
                .with_no_client_auth()
        } else {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        }
    }
}

/// Server acknowledged the switch: `Connection` contains "upgrade"
/// (case-insensitive) and `Upgrade` is non-empty.
fn is_upgrade_acknowledged(head: &ResponseHead) -> bool {
    let connection_ok = head
        .header("Connection")
        .map(|v| v.to_lowercase().contains("upgrade"))
        .unwrap_or(false);
    let upgrade_ok = head
        .header("Upgrade")
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    connection_ok && upgrade_ok
}

enum TransportStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl std::fmt::Debug for TransportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportStream::Plain(_) => f.write_str("TransportStream::Plain"),
            TransportStream::Tls(_) => f.write_str("TransportStream::Tls"),
        }
    }
}

impl AsyncRead for TransportStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TransportStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TransportStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            TransportStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TransportStream::Plain(s) => Pin::new(s).poll_flush(cx),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TransportStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            TransportStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A connection that completed the 101 handshake.
///
/// Reads replay any bytes the handshake over-read past the response head
/// before touching the socket again, so the caller sees the raw stream
/// exactly from where the server's output begins.
#[derive(Debug)]
pub struct UpgradedConn {
    leftover: BytesMut,
    stream: TransportStream,
}

impl AsyncRead for UpgradedConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if !this.leftover.is_empty() {
            let n = this.leftover.len().min(buf.remaining());
            buf.put_slice(&this.leftover[..n]);
            this.leftover.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for UpgradedConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// Certificate verifier that skips all verification (for development only!)
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Round-trips raw bytes through the handshake parser for realistic
    // input.
    async fn head(raw: &[u8]) -> ResponseHead {
        let mut src = raw;
        let (head, _) = handshake::read_response_head(&mut src).await.unwrap();
        head
    }

    // ========== UpgradeRequest Tests ==========

    #[test]
    fn test_request_sets_upgrade_headers() {
        let req = UpgradeRequest::new("POST", "http://example.com/v3/x").unwrap();
        assert_eq!(req.header_value("Connection"), Some("Upgrade"));
        assert_eq!(req.header_value("Upgrade"), Some("tcp"));
        assert_eq!(req.header_value("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_request_rejects_bad_targets() {
        assert!(matches!(
            UpgradeRequest::new("GET", "not a url"),
            Err(UpgradeError::InvalidTarget(_))
        ));
        assert!(matches!(
            UpgradeRequest::new("GET", "ftp://example.com/x"),
            Err(UpgradeError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_request_default_ports() {
        let req = UpgradeRequest::new("GET", "https://example.com/logs").unwrap();
        assert_eq!(req.port(), 443);
        let req = UpgradeRequest::new("GET", "http://example.com/logs").unwrap();
        assert_eq!(req.port(), 80);
        let req = UpgradeRequest::new("GET", "http://example.com:9000/logs").unwrap();
        assert_eq!(req.port(), 9000);
    }

    #[test]
    fn test_request_path_and_query() {
        let req =
            UpgradeRequest::new("GET", "http://h/v3/logs/containers/10.0.0.1/realtime?tail=10")
                .unwrap();
        assert_eq!(req.path(), "/v3/logs/containers/10.0.0.1/realtime");
        assert_eq!(req.query(), Some("tail=10"));
        assert_eq!(
            req.path_and_query(),
            "/v3/logs/containers/10.0.0.1/realtime?tail=10"
        );
    }

    #[test]
    fn test_request_serialize_layout() {
        let mut req = UpgradeRequest::new("POST", "http://example.com:8888/v3/exec").unwrap();
        req.header("Authorization", "Gantry ak:sig");
        req.body(&b"{\"mode\":\"attach\"}"[..]);

        let wire = String::from_utf8(req.serialize()).unwrap();
        let mut lines = wire.split("\r\n");

        assert_eq!(lines.next(), Some("POST /v3/exec HTTP/1.1"));
        assert_eq!(lines.next(), Some("Host: example.com:8888"));
        assert!(wire.contains("\r\nConnection: Upgrade\r\n"));
        assert!(wire.contains("\r\nUpgrade: tcp\r\n"));
        assert!(wire.contains("\r\nAuthorization: Gantry ak:sig\r\n"));
        assert!(wire.contains("\r\nContent-Length: 17\r\n"));
        assert!(wire.ends_with("\r\n\r\n{\"mode\":\"attach\"}"));
    }

    #[test]
    fn test_request_serialize_no_body_no_content_length() {
        let req = UpgradeRequest::new("GET", "http://example.com/v3/logs").unwrap();
        let wire = String::from_utf8(req.serialize()).unwrap();
        assert!(!wire.contains("Content-Length"));
        assert!(wire.ends_with("\r\n\r\n"));
        assert!(wire.contains("\r\nHost: example.com\r\n"));
    }

    #[test]
    fn test_request_signer_applied() {
        struct StaticSigner;
        impl RequestSigner for StaticSigner {
            fn sign(&self, req: &mut UpgradeRequest) {
                let tag = format!("signed:{}", req.method());
                req.header("Authorization", &tag);
            }
        }

        let mut req = UpgradeRequest::new("POST", "http://h/v3/x").unwrap();
        StaticSigner.sign(&mut req);
        assert_eq!(req.header_value("Authorization"), Some("signed:POST"));
    }

    // ========== Upgrade Acknowledgement Tests ==========

    #[tokio::test]
    async fn test_upgrade_acknowledged() {
        let h = head(
            b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: tcp\r\n\r\n",
        )
        .await;
        assert!(is_upgrade_acknowledged(&h));
    }

    #[tokio::test]
    async fn test_upgrade_acknowledged_mixed_case_and_token_list() {
        let h =
            head(b"HTTP/1.1 101 X\r\nConnection: keep-alive, UPGRADE\r\nUpgrade: TCP\r\n\r\n")
                .await;
        assert!(is_upgrade_acknowledged(&h));
    }

    #[tokio::test]
    async fn test_upgrade_not_acknowledged_without_connection_header() {
        let h = head(b"HTTP/1.1 101 X\r\nUpgrade: tcp\r\n\r\n").await;
        assert!(!is_upgrade_acknowledged(&h));
    }

    #[tokio::test]
    async fn test_upgrade_not_acknowledged_with_empty_upgrade_header() {
        let h = head(b"HTTP/1.1 101 X\r\nConnection: Upgrade\r\nUpgrade:\r\n\r\n").await;
        assert!(!is_upgrade_acknowledged(&h));
    }

    // ========== Error Display Tests ==========

    #[test]
    fn test_upgrade_error_display() {
        let err = UpgradeError::DialTimeout(10000);
        assert_eq!(format!("{}", err), "dial timed out after 10000ms");

        let err = UpgradeError::Rejected {
            status: 200,
            body: "{\"error\":\"nope\"}".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "connection upgrade rejected: status 200: {\"error\":\"nope\"}"
        );

        let err = UpgradeError::MissingUpgradeHeaders {
            status: 101,
            body: String::new(),
        };
        assert!(format!("{}", err).contains("did not acknowledge"));

        let err = UpgradeError::InvalidTarget("bad".to_string());
        assert_eq!(format!("{}", err), "invalid upgrade target: bad");
    }

    // ========== Transport Config Tests ==========

    #[test]
    fn test_transport_defaults() {
        let transport = UpgradeTransport::new();
        assert_eq!(transport.dial_timeout, DEFAULT_DIAL_TIMEOUT);
        assert!(!transport.skip_cert_verification);
    }

    #[test]
    fn test_transport_builders() {
        let transport = UpgradeTransport::new()
            .with_dial_timeout(Duration::from_millis(250))
            .with_dangerous_skip_cert_verification(true);
        assert_eq!(transport.dial_timeout, Duration::from_millis(250));
        assert!(transport.skip_cert_verification);
    }

    #[test]
    fn test_tls_config_builds_with_webpki_roots() {
        let transport = UpgradeTransport::new();
        let config = transport.tls_config();
        assert!(!config.crypto_provider().cipher_suites.is_empty());
    }

    #[test]
    fn test_skip_server_verification_schemes() {
        use rustls::client::danger::ServerCertVerifier;
        let verifier = SkipServerVerification;
        let schemes = verifier.supported_verify_schemes();
        assert!(!schemes.is_empty());
        assert!(schemes.contains(&rustls::SignatureScheme::RSA_PKCS1_SHA256));
        assert!(schemes.contains(&rustls::SignatureScheme::ED25519));
    }
}
