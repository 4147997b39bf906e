// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire types for the container platform API.
//!
//! Field names follow the platform's JSON conventions (camelCase); optional
//! spec fields are omitted from request bodies when unset so the platform
//! falls back to its defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stack used when an operation does not name one.
pub const DEFAULT_STACK: &str = "default";

/// Substitute [`DEFAULT_STACK`] for an empty stack name.
pub(crate) fn stack_or_default(name: &str) -> &str {
    if name.is_empty() { DEFAULT_STACK } else { name }
}

/// Aggregate health of a stack, service, or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// All instances are up.
    #[serde(rename = "RUNNING")]
    Running,
    /// Some instances are up, some are not.
    #[serde(rename = "PARTIALLY-RUNNING")]
    PartlyRunning,
    /// No instance is up.
    #[serde(rename = "NOT-RUNNING")]
    NotRunning,
    /// The platform cannot reconcile the workload.
    #[serde(rename = "FAULT")]
    Fault,
    /// The container process has exited (containers only).
    #[serde(rename = "EXITED")]
    Exited,
}

impl Status {
    /// String form as reported by the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Running => "RUNNING",
            Status::PartlyRunning => "PARTIALLY-RUNNING",
            Status::NotRunning => "NOT-RUNNING",
            Status::Fault => "FAULT",
            Status::Exited => "EXITED",
        }
    }
}

/// Lifecycle state of a service revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Instances are being created.
    #[serde(rename = "CREATING")]
    Creating,
    /// Instance count is being adjusted.
    #[serde(rename = "SCALING")]
    Scaling,
    /// A rolling update is progressing automatically.
    #[serde(rename = "AUTO-UPDATING")]
    AutoUpdating,
    /// A rolling update is waiting for manual deploy operations.
    #[serde(rename = "MANUAL-UPDATING")]
    ManualUpdating,
    /// Instances are starting.
    #[serde(rename = "STARTING")]
    Starting,
    /// Instances are stopping.
    #[serde(rename = "STOPPING")]
    Stopping,
    /// All instances are stopped.
    #[serde(rename = "STOPPED")]
    Stopped,
    /// The current revision is fully rolled out.
    #[serde(rename = "DEPLOYED")]
    Deployed,
}

impl State {
    /// Check if the platform is still moving the service between revisions
    /// or instance counts.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            State::Creating
                | State::Scaling
                | State::AutoUpdating
                | State::ManualUpdating
                | State::Starting
                | State::Stopping
        )
    }

    /// String form as reported by the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Creating => "CREATING",
            State::Scaling => "SCALING",
            State::AutoUpdating => "AUTO-UPDATING",
            State::ManualUpdating => "MANUAL-UPDATING",
            State::Starting => "STARTING",
            State::Stopping => "STOPPING",
            State::Stopped => "STOPPED",
            State::Deployed => "DEPLOYED",
        }
    }
}

// ============================================================================
// Stack Types
// ============================================================================

/// A stack as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackInfo {
    /// Whether every service in the stack has a fully deployed revision.
    pub is_deployed: bool,
    /// Free-form `key=value` labels.
    #[serde(default)]
    pub metadata: Vec<String>,
    /// Stack name.
    pub name: String,
    /// Names of the services in this stack.
    #[serde(default)]
    pub services: Vec<String>,
    /// Aggregate status across all services.
    pub status: Status,
}

/// Arguments for creating a stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStackArgs {
    /// Free-form `key=value` labels.
    pub metadata: Vec<String>,
    /// Stack name.
    pub name: String,
    /// Services created together with the stack.
    pub services: Vec<CreateServiceArgs>,
}

impl CreateStackArgs {
    /// Create arguments for a stack with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the metadata labels.
    pub fn with_metadata(mut self, metadata: Vec<String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a service to create together with the stack.
    pub fn with_service(mut self, service: CreateServiceArgs) -> Self {
        self.services.push(service);
        self
    }
}

/// Arguments for updating a stack's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStackArgs {
    /// Replacement metadata labels.
    pub metadata: Vec<String>,
}

impl UpdateStackArgs {
    /// Create arguments replacing the stack metadata.
    pub fn new(metadata: Vec<String>) -> Self {
        Self { metadata }
    }
}

// ============================================================================
// Service Types
// ============================================================================

/// A service as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// IPs of the service's containers.
    #[serde(default)]
    pub container_ips: Vec<String>,
    /// Desired instance count.
    pub instance_num: u32,
    /// How many instances a rolling update replaces at once.
    pub update_parallelism: u32,
    /// Free-form `key=value` labels.
    #[serde(default)]
    pub metadata: Vec<String>,
    /// Service name.
    pub name: String,
    /// Current revision number.
    pub revision: u32,
    /// Spec of the running revision.
    pub spec: ServiceSpec,
    /// Stack this service belongs to.
    pub stack: String,
    /// Lifecycle state.
    pub state: State,
    /// Whether instances keep stable identity and storage.
    pub stateful: bool,
    /// Aggregate status across the service's containers.
    pub status: Status,
    /// Spec of the pending revision during a manual update.
    #[serde(default)]
    pub update_spec: Option<ServiceSpec>,
    /// Volumes attached to the service.
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    /// When the service was created.
    pub created_at: DateTime<Utc>,
    /// When the service was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Runtime spec of a service.
///
/// Unset fields are omitted from request bodies; the platform keeps its
/// defaults (or the previous revision's values) for them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Restart policy (e.g. "always", "on-failure").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auto_restart: String,
    /// Command run inside the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Entry point overriding the image's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_point: Vec<String>,
    /// Environment variables as `KEY=VALUE` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,
    /// Extra `/etc/hosts` entries as `hostname ip` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Image reference.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Log files to collect beyond stdout/stderr.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_collectors: Vec<LogCollectorSpec>,
    /// Seconds to wait for graceful shutdown before killing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_grace_sec: Option<u32>,
    /// Working directory inside the container.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub work_dir: String,
    /// Resource unit type allocated per instance.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit_type: String,
    /// GPUs pinned to the service.
    #[serde(
        rename = "gpuUUIDs",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub gpu_uuids: Vec<String>,
}

impl ServiceSpec {
    /// Create a spec running the given image.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Set the restart policy.
    pub fn with_auto_restart(mut self, policy: impl Into<String>) -> Self {
        self.auto_restart = policy.into();
        self
    }

    /// Set the command.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Set the entry point.
    pub fn with_entry_point(mut self, entry_point: Vec<String>) -> Self {
        self.entry_point = entry_point;
        self
    }

    /// Set the environment variables (`KEY=VALUE` pairs).
    pub fn with_envs(mut self, envs: Vec<String>) -> Self {
        self.envs = envs;
        self
    }

    /// Add a single environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Set extra hosts entries.
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    /// Add a log collector.
    pub fn with_log_collector(mut self, collector: LogCollectorSpec) -> Self {
        self.log_collectors.push(collector);
        self
    }

    /// Set the graceful shutdown window.
    pub fn with_stop_grace_sec(mut self, seconds: u32) -> Self {
        self.stop_grace_sec = Some(seconds);
        self
    }

    /// Set the working directory.
    pub fn with_work_dir(mut self, dir: impl Into<String>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Set the resource unit type.
    pub fn with_unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = unit_type.into();
        self
    }
}

/// A log file pattern collected from inside the container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCollectorSpec {
    /// Directory to watch.
    pub directory: String,
    /// Glob patterns of files to collect.
    pub patterns: Vec<String>,
}

/// A volume attached to a stateful service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Filesystem type (e.g. "ext4").
    pub fs_type: String,
    /// Mount path inside the container.
    pub mount_path: String,
    /// Volume name.
    pub name: String,
    /// Storage unit type allocated for the volume.
    pub unit_type: String,
}

/// Arguments for creating a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceArgs {
    /// Desired instance count.
    pub instance_num: u32,
    /// How many instances a rolling update replaces at once.
    pub update_parallelism: u32,
    /// Free-form `key=value` labels.
    pub metadata: Vec<String>,
    /// Service name.
    pub name: String,
    /// Runtime spec.
    pub spec: ServiceSpec,
    /// Whether instances keep stable identity and storage.
    pub stateful: bool,
    /// Volumes to create with the service.
    pub volumes: Vec<VolumeSpec>,
}

impl CreateServiceArgs {
    /// Create arguments for a single-instance service with the given spec.
    pub fn new(name: impl Into<String>, spec: ServiceSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            instance_num: 1,
            update_parallelism: 1,
            ..Default::default()
        }
    }

    /// Set the instance count.
    pub fn with_instance_num(mut self, count: u32) -> Self {
        self.instance_num = count;
        self
    }

    /// Set the update parallelism.
    pub fn with_update_parallelism(mut self, parallelism: u32) -> Self {
        self.update_parallelism = parallelism;
        self
    }

    /// Set the metadata labels.
    pub fn with_metadata(mut self, metadata: Vec<String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Mark the service stateful.
    pub fn with_stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    /// Add a volume.
    pub fn with_volume(mut self, volume: VolumeSpec) -> Self {
        self.volumes.push(volume);
        self
    }
}

/// Arguments for updating a service to a new revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceArgs {
    /// When true, the rollout pauses until deploy operations drive it.
    pub manual_update: bool,
    /// Replacement metadata labels.
    pub metadata: Vec<String>,
    /// Spec of the new revision.
    pub spec: ServiceSpec,
    /// How many instances the rolling update replaces at once.
    pub update_parallelism: u32,
}

impl UpdateServiceArgs {
    /// Create arguments rolling the service to the given spec.
    pub fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            update_parallelism: 1,
            ..Default::default()
        }
    }

    /// Pause the rollout until deploy operations drive it.
    pub fn with_manual_update(mut self, manual: bool) -> Self {
        self.manual_update = manual;
        self
    }

    /// Set the metadata labels.
    pub fn with_metadata(mut self, metadata: Vec<String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the update parallelism.
    pub fn with_update_parallelism(mut self, parallelism: u32) -> Self {
        self.update_parallelism = parallelism;
        self
    }
}

/// Arguments for driving a manual rolling update forward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployServiceArgs {
    /// Deploy operation, e.g. `"COMPLETE"`, `"ROLLBACK"`, or a staged form
    /// such as `"COMPLETE 2"`.
    pub operation: String,
}

impl DeployServiceArgs {
    /// Create arguments for the given deploy operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Finish the pending update across all remaining instances.
    pub fn complete() -> Self {
        Self::new("COMPLETE")
    }

    /// Revert the pending update across all updated instances.
    pub fn rollback() -> Self {
        Self::new("ROLLBACK")
    }

    /// Check if this operation drives the service back toward a fully
    /// deployed revision. Staged forms such as `"COMPLETE 2"` count; other
    /// operations leave the rollout paused mid-way.
    pub fn is_settling(&self) -> bool {
        matches!(
            self.operation.split_whitespace().next(),
            Some("COMPLETE" | "ROLLBACK")
        )
    }
}

/// Arguments for changing a service's instance count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleServiceArgs {
    /// New desired instance count.
    pub instance_num: u32,
}

impl ScaleServiceArgs {
    /// Create arguments scaling to the given instance count.
    pub fn new(instance_num: u32) -> Self {
        Self { instance_num }
    }
}

// ============================================================================
// Container Types
// ============================================================================

/// Filters for listing containers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContainersArgs {
    /// Restrict to containers of this stack.
    pub stack_name: String,
    /// Restrict to containers of this service.
    pub service_name: String,
}

impl ListContainersArgs {
    /// Create an unfiltered listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to containers of this stack.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack_name = stack.into();
        self
    }

    /// Restrict to containers of this service.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service_name = service.into();
        self
    }
}

/// CPU usage of a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    /// Cores in use.
    pub core_usage: f64,
    /// Usage as a fraction of the allocation.
    pub total_usage: f64,
}

/// Disk usage of a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStats {
    /// Bytes used.
    pub usage: u64,
}

/// Memory usage of a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Page cache bytes.
    pub cache: u64,
    /// Resident bytes.
    pub usage: u64,
}

/// Network throughput of a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    /// Receive rate in bytes per second.
    pub rx_bs: f64,
    /// Total bytes received.
    pub rx_bytes: u64,
    /// Transmit rate in bytes per second.
    pub tx_bs: f64,
    /// Total bytes transmitted.
    pub tx_bytes: u64,
}

/// A container as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    /// CPU usage.
    #[serde(default)]
    pub cpu: CpuStats,
    /// Disk usage.
    #[serde(default)]
    pub disk: DiskStats,
    /// Exit code of the last run (0 while running).
    pub exit_code: i32,
    /// Human-readable exit reason, if any.
    #[serde(default)]
    pub exit_msg: String,
    /// Container IP, the platform's container identifier.
    pub ip: String,
    /// Memory usage.
    #[serde(default)]
    pub memory: MemoryStats,
    /// Network throughput.
    #[serde(default)]
    pub network: NetworkStats,
    /// Revision of the service spec this container runs.
    pub revision: u32,
    /// Service this container belongs to.
    pub service: String,
    /// Stack this container belongs to.
    pub stack: String,
    /// Container status.
    pub status: Status,
    /// When the container was created.
    pub created_at: DateTime<Utc>,
    /// When the container process started, if it has.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the container process exited, if it has.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Exec Types
// ============================================================================

/// Arguments for creating an exec in a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecContainerArgs {
    /// Command and arguments to run.
    pub command: Vec<String>,
}

impl ExecContainerArgs {
    /// Create arguments running the given command.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

/// Result of creating an exec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecContainerResult {
    /// Identifier for resize and start calls.
    pub exec_id: String,
}

/// Arguments for resizing an exec's terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeExecTermArgs {
    /// Terminal height in rows.
    pub height: u32,
    /// Terminal width in columns.
    pub width: u32,
}

impl ResizeExecTermArgs {
    /// Create arguments for the given terminal size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { height, width }
    }
}

/// Arguments for starting an exec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExecArgs {
    /// Start mode.
    pub mode: String,
}

impl StartExecArgs {
    /// Create arguments with the given mode.
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }

    /// Start the exec attached to the caller's streams.
    pub fn attach() -> Self {
        Self::new("attach")
    }
}
