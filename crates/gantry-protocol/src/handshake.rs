// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP/1.1 handshake primitives for connection upgrades.
//!
//! The upgrade path cannot go through a pooled HTTP client: after the
//! `101 Switching Protocols` response the same socket is handed back to
//! the caller as a raw duplex stream. The request is therefore written
//! directly on the socket and exactly one response head is read back
//! here.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::upgrade::UpgradeError;

/// Cap on the size of a buffered response head (status line + headers).
pub(crate) const MAX_RESPONSE_HEAD: usize = 16 * 1024;

/// Cap on the diagnostic body captured from a failed upgrade.
pub(crate) const MAX_FAILURE_BODY: usize = 64 * 1024;

/// A parsed HTTP/1.1 response head
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Numeric status code from the status line
    pub status: u16,
    /// Reason phrase from the status line (may be empty)
    pub reason: String,
    headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// First value of the named header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parsed `Content-Length`, if present and numeric
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Read one response head from `src`.
///
/// Returns the parsed head and any bytes over-read past the CRLFCRLF
/// terminator; those belong to the upgraded stream (or the body on a
/// failed upgrade) and must not be dropped.
pub(crate) async fn read_response_head<R>(
    src: &mut R,
) -> Result<(ResponseHead, BytesMut), UpgradeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        if let Some(end) = find_head_end(&buf) {
            let head_bytes = buf.split_to(end);
            let head = parse_response_head(&head_bytes)?;
            return Ok((head, buf));
        }
        if buf.len() > MAX_RESPONSE_HEAD {
            return Err(UpgradeError::MalformedResponse(
                "response head too large".to_string(),
            ));
        }
        if src.read_buf(&mut buf).await? == 0 {
            return Err(UpgradeError::MalformedResponse(
                "connection closed before end of response head".to_string(),
            ));
        }
    }
}

/// Capture the response body of a failed upgrade for diagnostics.
///
/// Reads exactly `Content-Length` bytes when the server sent one,
/// otherwise until the server closes the connection. Bounded either way;
/// read errors end the capture with whatever arrived.
pub(crate) async fn read_failure_body<R>(
    src: &mut R,
    head: &ResponseHead,
    mut buf: BytesMut,
) -> String
where
    R: AsyncRead + Unpin,
{
    let limit = head
        .content_length()
        .map(|len| len.min(MAX_FAILURE_BODY))
        .unwrap_or(MAX_FAILURE_BODY);

    while buf.len() < limit {
        match src.read_buf(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
    buf.truncate(limit);
    String::from_utf8_lossy(&buf).trim().to_string()
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_response_head(raw: &[u8]) -> Result<ResponseHead, UpgradeError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| UpgradeError::MalformedResponse("response head is not UTF-8".to_string()))?;

    let mut lines = text.split("\r\n");
    let status_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| UpgradeError::MalformedResponse("empty response head".to_string()))?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(UpgradeError::MalformedResponse(format!(
            "bad status line: {status_line}"
        )));
    }
    let status: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            UpgradeError::MalformedResponse(format!("bad status code in: {status_line}"))
        })?;
    let reason = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            UpgradeError::MalformedResponse(format!("bad header line: {line}"))
        })?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(ResponseHead {
        status,
        reason,
        headers,
    })
}
