// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Waiting for stacks and services to converge.
//!
//! The platform applies lifecycle operations asynchronously; these waiters
//! poll inspect endpoints once a second until the workload reaches the
//! wanted state or the timeout elapses. Transient fetch errors are logged
//! and retried on the next tick. A fetch that fails because the request
//! deadline was exhausted stops polling and lets the overall timeout fire,
//! so callers always see [`SdkError::Timeout`] with the full wait duration.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Result, SdkError};
use crate::types::{ContainerInfo, ServiceInfo, StackInfo, State, Status, stack_or_default};

/// How long the sync operation variants wait for convergence.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Wait between inspect polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Inspect access needed by the waiters.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch a stack by name.
    async fn stack(&self, name: &str) -> Result<StackInfo>;

    /// Fetch a service's inspect record.
    async fn service_inspect(&self, stack: &str, service: &str) -> Result<ServiceInfo>;

    /// Fetch a container's inspect record.
    async fn container_inspect(&self, ip: &str) -> Result<ContainerInfo>;
}

/// Wait until the stack is deployed, running, and every one of its services
/// is running with all containers up.
pub async fn wait_stack_running<S>(source: &S, stack: &str, timeout: Duration) -> Result<()>
where
    S: StatusSource + ?Sized,
{
    let stack = stack_or_default(stack);
    tokio::time::timeout(timeout, poll_stack_running(source, stack, timeout))
        .await
        .map_err(|_| SdkError::Timeout(timeout.as_secs()))?
}

/// Wait until the service's current revision is fully deployed and all of
/// its containers report `RUNNING`.
pub async fn wait_service_running<S>(
    source: &S,
    stack: &str,
    service: &str,
    timeout: Duration,
) -> Result<()>
where
    S: StatusSource + ?Sized,
{
    let stack = stack_or_default(stack);
    tokio::time::timeout(
        timeout,
        poll_service(
            source,
            stack,
            service,
            State::Deployed,
            Status::Running,
            Status::Running,
        ),
    )
    .await
    .map_err(|_| SdkError::Timeout(timeout.as_secs()))?
}

/// Wait until the service is stopped and all of its containers have exited.
pub async fn wait_service_stopped<S>(
    source: &S,
    stack: &str,
    service: &str,
    timeout: Duration,
) -> Result<()>
where
    S: StatusSource + ?Sized,
{
    let stack = stack_or_default(stack);
    tokio::time::timeout(
        timeout,
        poll_service(
            source,
            stack,
            service,
            State::Stopped,
            Status::NotRunning,
            Status::Exited,
        ),
    )
    .await
    .map_err(|_| SdkError::Timeout(timeout.as_secs()))?
}

async fn poll_stack_running<S>(source: &S, stack: &str, timeout: Duration) -> Result<()>
where
    S: StatusSource + ?Sized,
{
    loop {
        match source.stack(stack).await {
            Ok(info) if info.is_deployed && info.status == Status::Running => {
                let mut running = 0;
                for service in &info.services {
                    if wait_service_running(source, stack, service, timeout)
                        .await
                        .is_err()
                    {
                        break;
                    }
                    running += 1;
                }
                if running == info.services.len() {
                    return Ok(());
                }
            }
            Ok(_) => {}
            Err(e) if e.is_deadline_exceeded() => std::future::pending().await,
            Err(e) => warn!(stack, error = %e, "stack status fetch failed, retrying"),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn poll_service<S>(
    source: &S,
    stack: &str,
    service: &str,
    want_state: State,
    want_status: Status,
    want_container: Status,
) -> Result<()>
where
    S: StatusSource + ?Sized,
{
    loop {
        match source.service_inspect(stack, service).await {
            Ok(info) if info.state == want_state && info.status == want_status => {
                if all_containers(source, &info.container_ips, want_container).await {
                    return Ok(());
                }
            }
            Ok(_) => {}
            Err(e) if e.is_deadline_exceeded() => std::future::pending().await,
            Err(e) => {
                warn!(stack, service, error = %e, "service status fetch failed, retrying")
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Check that every listed container reports the wanted status. Any fetch
/// error fails the scan; the next poll re-checks from scratch.
async fn all_containers<S>(source: &S, ips: &[String], want: Status) -> bool
where
    S: StatusSource + ?Sized,
{
    for ip in ips {
        match source.container_inspect(ip).await {
            Ok(info) if info.status == want => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_is_one_second() {
        assert_eq!(POLL_INTERVAL, Duration::from_secs(1));
    }

    #[test]
    fn test_default_wait_timeout() {
        assert_eq!(DEFAULT_WAIT_TIMEOUT, Duration::from_secs(120));
    }
}
