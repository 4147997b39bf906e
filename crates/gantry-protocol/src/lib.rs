// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gantry Protocol - wire plumbing for interactive platform connections
//!
//! This crate provides the low-level protocol pieces shared by the gantry
//! client SDK:
//! - Two-channel stream framing ([`frame`]): demultiplexes interleaved
//!   primary/error output from container exec and realtime log endpoints
//! - Connection upgrade ([`upgrade`]): turns a signed HTTP request into a
//!   raw duplex connection via `101 Switching Protocols`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     gantry-protocol                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  Framing: two-channel demux (frame)                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  Handshake: HTTP/1.1 request write / response read       │
//! ├──────────────────────────────────────────────────────────┤
//! │  Transport: TCP or TLS via rustls (upgrade)              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use gantry_protocol::{UpgradeRequest, UpgradeTransport, demux};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = UpgradeTransport::new();
//! let request = UpgradeRequest::new(
//!     "POST",
//!     "https://api.example.com/v3/containers/10.0.1.2/exec/42/start",
//! )?;
//!
//! // No signer: unauthenticated (intranet) mode.
//! let mut conn = transport.upgrade(request, None).await?;
//!
//! let (mut out, mut err) = (Vec::new(), Vec::new());
//! let copied = demux(&mut conn, &mut out, &mut err).await?;
//! println!("session produced {copied} bytes");
//! # Ok(())
//! # }
//! ```

pub mod frame;
pub mod handshake;
pub mod upgrade;

// Re-export main types
pub use frame::{Frame, FrameError, StreamChannel, demux, write_frame};
pub use handshake::ResponseHead;
pub use upgrade::{
    DEFAULT_DIAL_TIMEOUT, RequestSigner, UpgradeError, UpgradeRequest, UpgradeTransport,
    UpgradedConn,
};
