// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GantryClient for driving the container platform API.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument};

use gantry_protocol::{RequestSigner, UpgradeRequest, UpgradeTransport};

use crate::auth::Credentials;
use crate::config::SdkConfig;
use crate::convergence::{self, DEFAULT_WAIT_TIMEOUT, StatusSource};
use crate::error::Result;
use crate::rest::{RestClient, encode_segment};
use crate::session::{ExecSessionOpts, LogStream, SessionError, run_exec_session, spawn_log_tail};
use crate::types::{
    ContainerInfo, CreateServiceArgs, CreateStackArgs, DeployServiceArgs, ExecContainerArgs,
    ExecContainerResult, ListContainersArgs, ResizeExecTermArgs, ScaleServiceArgs, ServiceInfo,
    StackInfo, StartExecArgs, UpdateServiceArgs, UpdateStackArgs, stack_or_default,
};

/// High-level client for the container platform.
///
/// Plain CRUD goes over REST; interactive endpoints (exec, realtime logs)
/// upgrade a signed HTTP request to a raw duplex connection. `sync_*`
/// variants of the lifecycle operations block until the affected workload
/// converges, up to [`DEFAULT_WAIT_TIMEOUT`].
///
/// An empty stack name always refers to the platform's `default` stack.
#[derive(Debug)]
pub struct GantryClient {
    rest: RestClient,
    transport: UpgradeTransport,
    credentials: Option<Credentials>,
    config: SdkConfig,
}

impl GantryClient {
    /// Create a client with the given configuration.
    pub fn new(config: SdkConfig) -> Result<Self> {
        let rest = RestClient::new(
            &config.endpoint,
            config.credentials(),
            &config.user_agent,
            Some(config.connect_timeout),
            config.request_timeout,
            config.skip_cert_verification,
        )?;
        let transport = UpgradeTransport::new()
            .with_dial_timeout(config.connect_timeout)
            .with_dangerous_skip_cert_verification(config.skip_cert_verification);
        let credentials = config.credentials();

        Ok(Self {
            rest,
            transport,
            credentials,
            config,
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SdkConfig::from_env()?)
    }

    /// Create a client for localhost development.
    pub fn localhost() -> Result<Self> {
        Self::new(SdkConfig::localhost())
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn signer(&self) -> Option<&dyn RequestSigner> {
        self.credentials.as_ref().map(|c| c as &dyn RequestSigner)
    }

    /// Build an upgrade request against the configured endpoint.
    fn upgrade_request(&self, method: &str, path_and_query: &str) -> Result<UpgradeRequest> {
        let target = format!("{}{}", self.config.endpoint, path_and_query);
        let mut request = UpgradeRequest::new(method, &target)?;
        request.header("User-Agent", &self.config.user_agent);
        Ok(request)
    }

    // =========================================================================
    // Stacks
    // =========================================================================

    /// List all stacks.
    #[instrument(skip(self))]
    pub async fn list_stacks(&self) -> Result<Vec<StackInfo>> {
        self.rest.get_json("/v3/stacks", &[]).await
    }

    /// Create a stack, optionally with services.
    #[instrument(skip(self, args), fields(stack = %args.name))]
    pub async fn create_stack(&self, args: &CreateStackArgs) -> Result<()> {
        debug!("creating stack");
        self.rest.post("/v3/stacks", Some(args)).await
    }

    /// Create a stack and wait until it is running.
    #[instrument(skip(self, args), fields(stack = %args.name))]
    pub async fn sync_create_stack(&self, args: &CreateStackArgs) -> Result<()> {
        self.create_stack(args).await?;
        convergence::wait_stack_running(self, &args.name, DEFAULT_WAIT_TIMEOUT).await?;
        info!("stack running");
        Ok(())
    }

    /// Get a stack by name.
    #[instrument(skip(self))]
    pub async fn get_stack(&self, stack: &str) -> Result<StackInfo> {
        let stack = encode_segment(stack_or_default(stack));
        self.rest.get_json(&format!("/v3/stacks/{stack}"), &[]).await
    }

    /// Replace a stack's metadata.
    #[instrument(skip(self, args))]
    pub async fn update_stack(&self, stack: &str, args: &UpdateStackArgs) -> Result<()> {
        let stack = encode_segment(stack_or_default(stack));
        self.rest
            .post(&format!("/v3/stacks/{stack}"), Some(args))
            .await
    }

    /// Replace a stack's metadata and wait until it is running.
    #[instrument(skip(self, args))]
    pub async fn sync_update_stack(&self, stack: &str, args: &UpdateStackArgs) -> Result<()> {
        self.update_stack(stack, args).await?;
        convergence::wait_stack_running(self, stack, DEFAULT_WAIT_TIMEOUT).await?;
        info!("stack running");
        Ok(())
    }

    /// Delete a stack.
    #[instrument(skip(self))]
    pub async fn delete_stack(&self, stack: &str) -> Result<()> {
        debug!("deleting stack");
        let stack = encode_segment(stack_or_default(stack));
        self.rest.delete(&format!("/v3/stacks/{stack}")).await
    }

    /// Start all services of a stack.
    #[instrument(skip(self))]
    pub async fn start_stack(&self, stack: &str) -> Result<()> {
        let stack = encode_segment(stack_or_default(stack));
        self.rest
            .post::<()>(&format!("/v3/stacks/{stack}/start"), None)
            .await
    }

    /// Stop all services of a stack.
    #[instrument(skip(self))]
    pub async fn stop_stack(&self, stack: &str) -> Result<()> {
        let stack = encode_segment(stack_or_default(stack));
        self.rest
            .post::<()>(&format!("/v3/stacks/{stack}/stop"), None)
            .await
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// List the services of a stack.
    #[instrument(skip(self))]
    pub async fn list_services(&self, stack: &str) -> Result<Vec<ServiceInfo>> {
        let stack = encode_segment(stack_or_default(stack));
        self.rest
            .get_json(&format!("/v3/stacks/{stack}/services"), &[])
            .await
    }

    /// Create a service in a stack.
    #[instrument(skip(self, args), fields(service = %args.name))]
    pub async fn create_service(&self, stack: &str, args: &CreateServiceArgs) -> Result<()> {
        debug!("creating service");
        let stack = encode_segment(stack_or_default(stack));
        self.rest
            .post(&format!("/v3/stacks/{stack}/services"), Some(args))
            .await
    }

    /// Create a service and wait until it is running.
    #[instrument(skip(self, args), fields(service = %args.name))]
    pub async fn sync_create_service(&self, stack: &str, args: &CreateServiceArgs) -> Result<()> {
        self.create_service(stack, args).await?;
        convergence::wait_service_running(self, stack, &args.name, DEFAULT_WAIT_TIMEOUT).await?;
        info!("service running");
        Ok(())
    }

    /// Get a service's inspect record.
    #[instrument(skip(self))]
    pub async fn get_service_inspect(&self, stack: &str, service: &str) -> Result<ServiceInfo> {
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .get_json(
                &format!("/v3/stacks/{stack}/services/{service}/inspect"),
                &[],
            )
            .await
    }

    /// Roll a service to a new revision.
    #[instrument(skip(self, args))]
    pub async fn update_service(
        &self,
        stack: &str,
        service: &str,
        args: &UpdateServiceArgs,
    ) -> Result<()> {
        debug!("updating service");
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .post(&format!("/v3/stacks/{stack}/services/{service}"), Some(args))
            .await
    }

    /// Roll a service to a new revision and wait until it is running.
    ///
    /// A manual update only stages the revision; deploy operations drive it
    /// from there, so there is nothing to wait for.
    #[instrument(skip(self, args))]
    pub async fn sync_update_service(
        &self,
        stack: &str,
        service: &str,
        args: &UpdateServiceArgs,
    ) -> Result<()> {
        self.update_service(stack, service, args).await?;
        if !args.manual_update {
            convergence::wait_service_running(self, stack, service, DEFAULT_WAIT_TIMEOUT).await?;
            info!("service running");
        }
        Ok(())
    }

    /// Apply a deploy operation to a service's staged update.
    #[instrument(skip(self, args), fields(operation = %args.operation))]
    pub async fn deploy_service(
        &self,
        stack: &str,
        service: &str,
        args: &DeployServiceArgs,
    ) -> Result<()> {
        debug!("deploying service");
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .post(
                &format!("/v3/stacks/{stack}/services/{service}/deploy"),
                Some(args),
            )
            .await
    }

    /// Apply a deploy operation; for a settling operation (`COMPLETE` or
    /// `ROLLBACK`), wait until the service is running again. Other
    /// operations return as soon as the platform accepts them.
    #[instrument(skip(self, args), fields(operation = %args.operation))]
    pub async fn sync_deploy_service(
        &self,
        stack: &str,
        service: &str,
        args: &DeployServiceArgs,
    ) -> Result<()> {
        self.deploy_service(stack, service, args).await?;
        if args.is_settling() {
            convergence::wait_service_running(self, stack, service, DEFAULT_WAIT_TIMEOUT).await?;
            info!("service running");
        }
        Ok(())
    }

    /// Change a service's instance count.
    #[instrument(skip(self, args), fields(instance_num = args.instance_num))]
    pub async fn scale_service(
        &self,
        stack: &str,
        service: &str,
        args: &ScaleServiceArgs,
    ) -> Result<()> {
        debug!("scaling service");
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .post(
                &format!("/v3/stacks/{stack}/services/{service}/scale"),
                Some(args),
            )
            .await
    }

    /// Change a service's instance count and wait until it is running.
    #[instrument(skip(self, args), fields(instance_num = args.instance_num))]
    pub async fn sync_scale_service(
        &self,
        stack: &str,
        service: &str,
        args: &ScaleServiceArgs,
    ) -> Result<()> {
        self.scale_service(stack, service, args).await?;
        convergence::wait_service_running(self, stack, service, DEFAULT_WAIT_TIMEOUT).await?;
        info!("service running");
        Ok(())
    }

    /// Start a stopped service.
    #[instrument(skip(self))]
    pub async fn start_service(&self, stack: &str, service: &str) -> Result<()> {
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .post::<()>(&format!("/v3/stacks/{stack}/services/{service}/start"), None)
            .await
    }

    /// Start a service and wait until it is running.
    #[instrument(skip(self))]
    pub async fn sync_start_service(&self, stack: &str, service: &str) -> Result<()> {
        self.start_service(stack, service).await?;
        convergence::wait_service_running(self, stack, service, DEFAULT_WAIT_TIMEOUT).await?;
        info!("service running");
        Ok(())
    }

    /// Stop a running service.
    #[instrument(skip(self))]
    pub async fn stop_service(&self, stack: &str, service: &str) -> Result<()> {
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .post::<()>(&format!("/v3/stacks/{stack}/services/{service}/stop"), None)
            .await
    }

    /// Stop a service and wait until every container has exited.
    #[instrument(skip(self))]
    pub async fn sync_stop_service(&self, stack: &str, service: &str) -> Result<()> {
        self.stop_service(stack, service).await?;
        convergence::wait_service_stopped(self, stack, service, DEFAULT_WAIT_TIMEOUT).await?;
        info!("service stopped");
        Ok(())
    }

    /// Delete a service.
    #[instrument(skip(self))]
    pub async fn delete_service(&self, stack: &str, service: &str) -> Result<()> {
        debug!("deleting service");
        let stack = encode_segment(stack_or_default(stack));
        let service = encode_segment(service);
        self.rest
            .delete(&format!("/v3/stacks/{stack}/services/{service}"))
            .await
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// List container IPs, optionally filtered by stack and service.
    ///
    /// Unlike the stack operations, an empty filter here means "no filter",
    /// not the default stack.
    #[instrument(skip(self, args))]
    pub async fn list_containers(&self, args: &ListContainersArgs) -> Result<Vec<String>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if !args.stack_name.is_empty() {
            query.push(("stack", args.stack_name.as_str()));
        }
        if !args.service_name.is_empty() {
            query.push(("service", args.service_name.as_str()));
        }
        self.rest.get_json("/v3/containers", &query).await
    }

    /// Get a container's inspect record.
    #[instrument(skip(self))]
    pub async fn get_container_inspect(&self, ip: &str) -> Result<ContainerInfo> {
        let ip = encode_segment(ip);
        self.rest
            .get_json(&format!("/v3/containers/{ip}/inspect"), &[])
            .await
    }

    /// Start a container.
    #[instrument(skip(self))]
    pub async fn start_container(&self, ip: &str) -> Result<()> {
        let ip = encode_segment(ip);
        self.rest
            .post::<()>(&format!("/v3/containers/{ip}/start"), None)
            .await
    }

    /// Stop a container.
    #[instrument(skip(self))]
    pub async fn stop_container(&self, ip: &str) -> Result<()> {
        let ip = encode_segment(ip);
        self.rest
            .post::<()>(&format!("/v3/containers/{ip}/stop"), None)
            .await
    }

    /// Restart a container.
    #[instrument(skip(self))]
    pub async fn restart_container(&self, ip: &str) -> Result<()> {
        let ip = encode_segment(ip);
        self.rest
            .post::<()>(&format!("/v3/containers/{ip}/restart"), None)
            .await
    }

    // =========================================================================
    // Exec & logs
    // =========================================================================

    /// Create an exec instance in a container. The returned id is consumed
    /// by [`GantryClient::resize_exec_term`] and [`GantryClient::start_exec`].
    #[instrument(skip(self, args))]
    pub async fn exec_container(
        &self,
        ip: &str,
        args: &ExecContainerArgs,
    ) -> Result<ExecContainerResult> {
        debug!("creating exec");
        let ip = encode_segment(ip);
        self.rest
            .post_json(&format!("/v3/containers/{ip}/exec"), args)
            .await
    }

    /// Resize the pseudo-terminal of an exec instance.
    #[instrument(skip(self, args))]
    pub async fn resize_exec_term(
        &self,
        ip: &str,
        exec_id: &str,
        args: &ResizeExecTermArgs,
    ) -> Result<()> {
        let ip = encode_segment(ip);
        let exec_id = encode_segment(exec_id);
        self.rest
            .post(
                &format!("/v3/containers/{ip}/exec/{exec_id}/resize"),
                Some(args),
            )
            .await
    }

    /// Start an exec instance and run the interactive session over the
    /// upgraded connection. Returns when the session ends.
    #[instrument(skip(self, args, opts))]
    pub async fn start_exec<I, O, E>(
        &self,
        ip: &str,
        exec_id: &str,
        args: &StartExecArgs,
        opts: ExecSessionOpts<I, O, E>,
    ) -> Result<()>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let path = format!(
            "/v3/containers/{}/exec/{}/start",
            encode_segment(ip),
            encode_segment(exec_id)
        );
        let mut request = self.upgrade_request("POST", &path)?;
        request.body(serde_json::to_vec(args)?);

        let conn = self.transport.upgrade(request, self.signer()).await?;
        debug!("exec session started");
        run_exec_session(conn, opts).await?;
        debug!("exec session ended");
        Ok(())
    }

    /// Follow a container's log output as a live stream.
    ///
    /// `since` and `tail` are passed to the platform verbatim; empty
    /// strings mean "from now" and "no backlog limit". The stream ends when
    /// the platform closes the connection or the caller fires `exit`; the
    /// session outcome is delivered on `done` when provided.
    #[instrument(skip(self, exit, done))]
    pub async fn tail_logs(
        &self,
        ip: &str,
        since: &str,
        tail: &str,
        exit: oneshot::Receiver<()>,
        done: Option<oneshot::Sender<std::result::Result<(), SessionError>>>,
    ) -> Result<LogStream> {
        let path = format!(
            "/v3/logs/containers/{}/realtime?since={}&tail={}",
            encode_segment(ip),
            encode_segment(since),
            encode_segment(tail)
        );
        let request = self.upgrade_request("GET", &path)?;

        let conn = self.transport.upgrade(request, self.signer()).await?;
        debug!("log tail started");
        Ok(spawn_log_tail(conn, exit, done))
    }

    // =========================================================================
    // Convergence waits
    // =========================================================================

    /// Wait until a stack and all of its services are running.
    pub async fn wait_stack_running(&self, stack: &str) -> Result<()> {
        convergence::wait_stack_running(self, stack, DEFAULT_WAIT_TIMEOUT).await
    }

    /// [`GantryClient::wait_stack_running`] with a custom timeout.
    pub async fn wait_stack_running_with_timeout(
        &self,
        stack: &str,
        timeout: Duration,
    ) -> Result<()> {
        convergence::wait_stack_running(self, stack, timeout).await
    }

    /// Wait until a service and all of its containers are running.
    pub async fn wait_service_running(&self, stack: &str, service: &str) -> Result<()> {
        convergence::wait_service_running(self, stack, service, DEFAULT_WAIT_TIMEOUT).await
    }

    /// [`GantryClient::wait_service_running`] with a custom timeout.
    pub async fn wait_service_running_with_timeout(
        &self,
        stack: &str,
        service: &str,
        timeout: Duration,
    ) -> Result<()> {
        convergence::wait_service_running(self, stack, service, timeout).await
    }

    /// Wait until a service is stopped and all of its containers exited.
    pub async fn wait_service_stopped(&self, stack: &str, service: &str) -> Result<()> {
        convergence::wait_service_stopped(self, stack, service, DEFAULT_WAIT_TIMEOUT).await
    }

    /// [`GantryClient::wait_service_stopped`] with a custom timeout.
    pub async fn wait_service_stopped_with_timeout(
        &self,
        stack: &str,
        service: &str,
        timeout: Duration,
    ) -> Result<()> {
        convergence::wait_service_stopped(self, stack, service, timeout).await
    }
}

#[async_trait]
impl StatusSource for GantryClient {
    async fn stack(&self, name: &str) -> Result<StackInfo> {
        self.get_stack(name).await
    }

    async fn service_inspect(&self, stack: &str, service: &str) -> Result<ServiceInfo> {
        self.get_service_inspect(stack, service).await
    }

    async fn container_inspect(&self, ip: &str) -> Result<ContainerInfo> {
        self.get_container_inspect(ip).await
    }
}
