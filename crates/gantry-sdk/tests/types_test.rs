// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire type serialization tests for gantry-sdk.

use gantry_sdk::{
    ContainerInfo, CreateServiceArgs, CreateStackArgs, DeployServiceArgs, ExecContainerArgs,
    ExecContainerResult, ListContainersArgs, ResizeExecTermArgs, ServiceInfo, ServiceSpec,
    StackInfo, StartExecArgs, State, Status, UpdateServiceArgs, VolumeSpec,
};

#[test]
fn test_status_wire_strings() {
    assert_eq!(
        serde_json::to_string(&Status::Running).unwrap(),
        "\"RUNNING\""
    );
    assert_eq!(
        serde_json::to_string(&Status::PartlyRunning).unwrap(),
        "\"PARTIALLY-RUNNING\""
    );

    let status: Status = serde_json::from_str("\"FAULT\"").unwrap();
    assert_eq!(status, Status::Fault);
}

#[test]
fn test_state_wire_strings() {
    assert_eq!(
        serde_json::to_string(&State::ManualUpdating).unwrap(),
        "\"MANUAL-UPDATING\""
    );

    let state: State = serde_json::from_str("\"DEPLOYED\"").unwrap();
    assert_eq!(state, State::Deployed);
}

#[test]
fn test_state_is_transitional() {
    assert!(State::Creating.is_transitional());
    assert!(State::AutoUpdating.is_transitional());
    assert!(State::ManualUpdating.is_transitional());
    assert!(!State::Deployed.is_transitional());
    assert!(!State::Stopped.is_transitional());
}

#[test]
fn test_stack_info_deserialize() {
    let json = r#"{
        "isDeployed": true,
        "metadata": ["team=checkout"],
        "name": "shop",
        "services": ["api", "worker"],
        "status": "RUNNING"
    }"#;

    let stack: StackInfo = serde_json::from_str(json).unwrap();
    assert!(stack.is_deployed);
    assert_eq!(stack.name, "shop");
    assert_eq!(stack.services, vec!["api", "worker"]);
    assert_eq!(stack.status, Status::Running);
}

#[test]
fn test_stack_info_deserialize_minimal() {
    // Lists may be omitted entirely by the platform
    let json = r#"{"isDeployed": false, "name": "shop", "status": "NOT-RUNNING"}"#;

    let stack: StackInfo = serde_json::from_str(json).unwrap();
    assert!(stack.metadata.is_empty());
    assert!(stack.services.is_empty());
    assert_eq!(stack.status, Status::NotRunning);
}

#[test]
fn test_service_info_deserialize() {
    let json = r#"{
        "containerIps": ["10.244.1.7", "10.244.2.3"],
        "instanceNum": 2,
        "updateParallelism": 1,
        "metadata": [],
        "name": "api",
        "revision": 4,
        "spec": {
            "image": "registry.internal/shop/api:1.9",
            "envs": ["PORT=8080"],
            "autoRestart": "always"
        },
        "stack": "shop",
        "state": "DEPLOYED",
        "stateful": false,
        "status": "RUNNING",
        "updateSpec": null,
        "volumes": [],
        "createdAt": "2025-03-01T10:00:00Z",
        "updatedAt": "2025-03-02T08:30:00Z"
    }"#;

    let service: ServiceInfo = serde_json::from_str(json).unwrap();
    assert_eq!(service.container_ips.len(), 2);
    assert_eq!(service.instance_num, 2);
    assert_eq!(service.revision, 4);
    assert_eq!(service.spec.image, "registry.internal/shop/api:1.9");
    assert_eq!(service.spec.envs, vec!["PORT=8080"]);
    assert_eq!(service.state, State::Deployed);
    assert!(service.update_spec.is_none());
    assert_eq!(service.created_at.to_rfc3339(), "2025-03-01T10:00:00+00:00");
}

#[test]
fn test_service_info_with_pending_update() {
    let json = r#"{
        "containerIps": ["10.244.1.7"],
        "instanceNum": 1,
        "updateParallelism": 1,
        "name": "api",
        "revision": 4,
        "spec": {"image": "shop/api:1.9"},
        "stack": "shop",
        "state": "MANUAL-UPDATING",
        "stateful": false,
        "status": "PARTIALLY-RUNNING",
        "updateSpec": {"image": "shop/api:2.0"},
        "createdAt": "2025-03-01T10:00:00Z",
        "updatedAt": "2025-03-02T08:30:00Z"
    }"#;

    let service: ServiceInfo = serde_json::from_str(json).unwrap();
    assert!(service.state.is_transitional());
    assert_eq!(service.update_spec.unwrap().image, "shop/api:2.0");
}

#[test]
fn test_container_info_deserialize() {
    let json = r#"{
        "cpu": {"coreUsage": 0.25, "totalUsage": 0.5},
        "disk": {"usage": 1048576},
        "exitCode": 0,
        "ip": "10.244.1.7",
        "memory": {"cache": 4096, "usage": 8192},
        "network": {"rxBs": 100.5, "rxBytes": 123456, "txBs": 50.0, "txBytes": 654321},
        "revision": 4,
        "service": "api",
        "stack": "shop",
        "status": "RUNNING",
        "createdAt": "2025-03-01T10:00:00Z",
        "startedAt": "2025-03-01T10:00:05Z",
        "finishedAt": null
    }"#;

    let container: ContainerInfo = serde_json::from_str(json).unwrap();
    assert_eq!(container.ip, "10.244.1.7");
    assert_eq!(container.cpu.core_usage, 0.25);
    assert_eq!(container.memory.usage, 8192);
    assert_eq!(container.network.rx_bytes, 123456);
    assert_eq!(container.status, Status::Running);
    assert!(container.started_at.is_some());
    assert!(container.finished_at.is_none());
    assert_eq!(container.exit_msg, "");
}

#[test]
fn test_container_info_exited() {
    let json = r#"{
        "exitCode": 137,
        "exitMsg": "OOM killed",
        "ip": "10.244.1.7",
        "revision": 4,
        "service": "api",
        "stack": "shop",
        "status": "EXITED",
        "createdAt": "2025-03-01T10:00:00Z"
    }"#;

    let container: ContainerInfo = serde_json::from_str(json).unwrap();
    assert_eq!(container.exit_code, 137);
    assert_eq!(container.exit_msg, "OOM killed");
    assert_eq!(container.status, Status::Exited);
    // Omitted stats blocks default to zero
    assert_eq!(container.cpu.core_usage, 0.0);
    assert_eq!(container.disk.usage, 0);
}

// Serialization tests

#[test]
fn test_service_spec_omits_unset_fields() {
    let spec = ServiceSpec::new("nginx:1.27");
    let value = serde_json::to_value(&spec).unwrap();
    let obj = value.as_object().unwrap();

    assert_eq!(obj.len(), 1);
    assert_eq!(obj["image"], "nginx:1.27");
}

#[test]
fn test_service_spec_serializes_set_fields() {
    let spec = ServiceSpec::new("nginx:1.27")
        .with_auto_restart("always")
        .with_env("PORT", "8080")
        .with_stop_grace_sec(30)
        .with_work_dir("/srv");

    let value = serde_json::to_value(&spec).unwrap();
    let obj = value.as_object().unwrap();

    assert_eq!(obj["autoRestart"], "always");
    assert_eq!(obj["envs"][0], "PORT=8080");
    assert_eq!(obj["stopGraceSec"], 30);
    assert_eq!(obj["workDir"], "/srv");
}

#[test]
fn test_service_spec_gpu_key() {
    let mut spec = ServiceSpec::new("cuda-job:1.0");
    spec.gpu_uuids = vec!["GPU-6f1b2a".to_string()];

    let value = serde_json::to_value(&spec).unwrap();
    assert_eq!(value["gpuUUIDs"][0], "GPU-6f1b2a");
}

#[test]
fn test_create_stack_args_serialize() {
    let spec = ServiceSpec::new("shop/api:1.9");
    let args = CreateStackArgs::new("shop")
        .with_metadata(vec!["team=checkout".to_string()])
        .with_service(CreateServiceArgs::new("api", spec));

    let value = serde_json::to_value(&args).unwrap();
    assert_eq!(value["name"], "shop");
    assert_eq!(value["metadata"][0], "team=checkout");
    assert_eq!(value["services"][0]["name"], "api");
    assert_eq!(value["services"][0]["instanceNum"], 1);
}

#[test]
fn test_create_service_args_defaults() {
    let args = CreateServiceArgs::new("api", ServiceSpec::new("shop/api:1.9"));

    assert_eq!(args.instance_num, 1);
    assert_eq!(args.update_parallelism, 1);
    assert!(!args.stateful);
    assert!(args.volumes.is_empty());
}

#[test]
fn test_create_service_args_serialize() {
    let args = CreateServiceArgs::new("db", ServiceSpec::new("postgres:16"))
        .with_instance_num(3)
        .with_stateful(true)
        .with_volume(VolumeSpec {
            fs_type: "ext4".to_string(),
            mount_path: "/var/lib/postgresql".to_string(),
            name: "data".to_string(),
            unit_type: "ssd-small".to_string(),
        });

    let value = serde_json::to_value(&args).unwrap();
    assert_eq!(value["instanceNum"], 3);
    assert_eq!(value["stateful"], true);
    assert_eq!(value["volumes"][0]["fsType"], "ext4");
    assert_eq!(value["volumes"][0]["mountPath"], "/var/lib/postgresql");
}

#[test]
fn test_update_service_args_serialize() {
    let args = UpdateServiceArgs::new(ServiceSpec::new("shop/api:2.0"))
        .with_manual_update(true)
        .with_update_parallelism(2);

    let value = serde_json::to_value(&args).unwrap();
    assert_eq!(value["manualUpdate"], true);
    assert_eq!(value["updateParallelism"], 2);
    assert_eq!(value["spec"]["image"], "shop/api:2.0");
}

#[test]
fn test_deploy_args_settling() {
    assert!(DeployServiceArgs::complete().is_settling());
    assert!(DeployServiceArgs::rollback().is_settling());
    assert!(DeployServiceArgs::new("COMPLETE 2").is_settling());
    assert!(!DeployServiceArgs::new("PAUSE").is_settling());
}

#[test]
fn test_list_containers_args_builder() {
    let args = ListContainersArgs::new().with_stack("shop").with_service("api");
    assert_eq!(args.stack_name, "shop");
    assert_eq!(args.service_name, "api");

    let unfiltered = ListContainersArgs::new();
    assert!(unfiltered.stack_name.is_empty());
    assert!(unfiltered.service_name.is_empty());
}

#[test]
fn test_exec_args_serialize() {
    let args = ExecContainerArgs::new(vec!["ls".to_string(), "-la".to_string()]);
    let value = serde_json::to_value(&args).unwrap();
    assert_eq!(value["command"][0], "ls");
    assert_eq!(value["command"][1], "-la");
}

#[test]
fn test_exec_result_deserialize() {
    let result: ExecContainerResult = serde_json::from_str(r#"{"execId": "e-7f3a"}"#).unwrap();
    assert_eq!(result.exec_id, "e-7f3a");
}

#[test]
fn test_resize_args_serialize() {
    let args = ResizeExecTermArgs::new(120, 40);
    let value = serde_json::to_value(&args).unwrap();
    assert_eq!(value["width"], 120);
    assert_eq!(value["height"], 40);
}

#[test]
fn test_start_exec_args_attach() {
    let args = StartExecArgs::attach();
    assert_eq!(args.mode, "attach");

    let value = serde_json::to_value(&args).unwrap();
    assert_eq!(value["mode"], "attach");
}
