// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gantry SDK - High-level client for the Gantry container platform.
//!
//! This crate provides a strongly-typed client for the platform's container
//! orchestration API (stacks, services, containers) and its image registry.
//! Plain CRUD operations go over HTTPS; interactive operations (exec
//! sessions, realtime log tailing) upgrade the HTTP connection to a raw
//! duplex byte stream via `gantry-protocol`.
//!
//! # Features
//!
//! - **Stacks**: Create, update, start, stop and delete groups of services
//! - **Services**: Full lifecycle including staged updates, deploy
//!   operations and scaling
//! - **Convergence**: `sync_*` variants and `wait_*` helpers that block
//!   until a workload actually reaches its target state
//! - **Containers**: Inspect, restart, interactive exec and realtime logs
//! - **Registry**: Repository and tag management with token-based auth
//! - **Signing**: Transparent HMAC request signing when credentials are
//!   configured
//!
//! # Quick Start
//!
//! ```no_run
//! use gantry_sdk::{GantryClient, ListContainersArgs};
//!
//! # async fn example() -> gantry_sdk::Result<()> {
//! // Endpoint and credentials from GANTRY_* environment variables
//! let client = GantryClient::from_env()?;
//!
//! // Start a service and wait until its containers are running
//! client.sync_start_service("shop", "api").await?;
//!
//! // Inspect the service's containers
//! let args = ListContainersArgs::new().with_stack("shop").with_service("api");
//! for ip in client.list_containers(&args).await? {
//!     let info = client.get_container_inspect(&ip).await?;
//!     println!("{ip}: {:?}", info.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Interactive Exec
//!
//! Exec runs in three steps: create the exec, optionally size its terminal,
//! then start it and pump the caller's streams over the upgraded connection:
//!
//! ```ignore
//! let exec = client
//!     .exec_container(&ip, &ExecContainerArgs::new(vec!["sh".into()]))
//!     .await?;
//! client
//!     .resize_exec_term(&ip, &exec.exec_id, &ResizeExecTermArgs::new(80, 24))
//!     .await?;
//!
//! let opts = ExecSessionOpts::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr());
//! client
//!     .start_exec(&ip, &exec.exec_id, &StartExecArgs::attach(), opts)
//!     .await?;
//! ```
//!
//! # Realtime Logs
//!
//! `tail_logs` returns an [`AsyncRead`](tokio::io::AsyncRead) stream of raw
//! log bytes; fire the exit channel to detach without error:
//!
//! ```ignore
//! let (exit_tx, exit_rx) = tokio::sync::oneshot::channel();
//! let mut logs = client.tail_logs(&ip, "", "100", exit_rx, None).await?;
//! tokio::io::copy(&mut logs, &mut tokio::io::stdout()).await?;
//! ```
//!
//! # Configuration
//!
//! The client can be configured via environment variables or
//! programmatically:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GANTRY_ENDPOINT` | No | `http://127.0.0.1:8700` | Platform API endpoint |
//! | `GANTRY_ACCESS_KEY` | No | - | Access key for request signing |
//! | `GANTRY_SECRET_KEY` | No | - | Secret key for request signing |
//! | `GANTRY_SKIP_CERT_VERIFICATION` | No | `false` | Skip TLS verification |
//! | `GANTRY_CONNECT_TIMEOUT_MS` | No | `10000` | Connection timeout |
//! | `GANTRY_REQUEST_TIMEOUT_MS` | No | `30000` | Request timeout |
//!
//! Access and secret key must be set together. Without credentials the
//! client sends unsigned requests, which intranet deployments accept.

mod auth;
mod client;
mod config;
mod convergence;
mod error;
mod registry;
mod rest;
mod session;
mod token;
mod types;

// Main types
pub use client::GantryClient;
pub use config::{RegistryConfig, SdkConfig, default_user_agent};
pub use error::{Result, SdkError};
pub use types::{
    ContainerInfo, CpuStats, CreateServiceArgs, CreateStackArgs, DEFAULT_STACK, DeployServiceArgs,
    DiskStats, ExecContainerArgs, ExecContainerResult, ListContainersArgs, LogCollectorSpec,
    MemoryStats, NetworkStats, ResizeExecTermArgs, ScaleServiceArgs, ServiceInfo, ServiceSpec,
    StackInfo, StartExecArgs, State, Status, UpdateServiceArgs, UpdateStackArgs, VolumeSpec,
};

// Request signing
pub use auth::Credentials;

// Workload convergence
pub use convergence::{
    DEFAULT_WAIT_TIMEOUT, POLL_INTERVAL, StatusSource, wait_service_running, wait_service_stopped,
    wait_stack_running,
};

// Interactive sessions
pub use session::{
    ExecSessionOpts, LogStream, ReadyHandshake, ReadyWaiter, SessionError, ready_handshake,
    run_exec_session, spawn_log_tail,
};

// Image registry
pub use registry::{Digest, ImageConfig, ImageSpec, RegistryClient, Repo, Tag, TokenService};
pub use token::{AuthToken, REFRESH_MARGIN_SECS, TokenCache, TokenIssuer};

// Re-export the upgrade transport for advanced usage
pub use gantry_protocol::{UpgradeRequest, UpgradeTransport, UpgradedConn};
