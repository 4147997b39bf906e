// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gantry Control CLI
//!
//! CLI tool for operating stacks, services and containers on the Gantry
//! platform.
//!
//! Usage:
//!   gantry-ctl <command> [options]
//!
//! Commands:
//!   stacks                        List stacks
//!   stack [name]                  Get a stack
//!   start-stack [name]            Start all services of a stack
//!   stop-stack [name]             Stop all services of a stack
//!   services [--stack <name>]     List services
//!   service <name>                Inspect a service
//!   start-service <name> [--wait]
//!   stop-service <name> [--wait]
//!   scale <service> <count> [--wait]
//!   deploy <service> <operation> [--wait]
//!   containers [--stack <name>] [--service <name>]
//!   container <ip>                Inspect a container
//!   exec <ip> <command>...        Run a command in a container
//!   logs <ip>                     Follow a container's logs
//!   wait-running                  Wait for a stack or service to run
//!   wait-stopped <service>        Wait for a service to stop

use std::process::ExitCode;
use std::time::Duration;

use tokio::sync::oneshot;

use gantry_sdk::{
    DEFAULT_STACK, DeployServiceArgs, ExecContainerArgs, ExecSessionOpts, GantryClient,
    ListContainersArgs, ScaleServiceArgs, StartExecArgs,
};

fn print_usage() {
    eprintln!(
        r#"Usage: gantry-ctl <command> [options]

Operate stacks, services and containers on the Gantry platform.

COMMANDS:
    stacks                          List stacks
    stack [name]                    Get a stack (default stack if omitted)
    start-stack [name]              Start all services of a stack
    stop-stack [name]               Stop all services of a stack
    services                        List services of a stack
    service <name>                  Inspect a service
    start-service <name>            Start a service
    stop-service <name>             Stop a service
    scale <service> <count>         Change a service's instance count
    deploy <service> <operation>    Apply a deploy operation (COMPLETE, ROLLBACK, ...)
    containers                      List container IPs
    container <ip>                  Inspect a container
    exec <ip> <command>...          Run a command in a container
    logs <ip>                       Follow a container's logs (Ctrl-C to detach)
    wait-running                    Wait for a stack or service to run
    wait-stopped <service>          Wait for a service to stop

COMMON OPTIONS:
    --stack <name>                  Stack to operate on (default: default)
    --wait                          Wait for the operation to converge

CONTAINERS OPTIONS:
    --service <name>                Filter by service

LOGS OPTIONS:
    --since <time>                  Start of the log window
    --tail <n>                      Number of backlog lines

WAIT OPTIONS:
    --service <name>                Wait on a service instead of the whole stack
    --timeout <seconds>             Give up after this long (default: 120)

ENVIRONMENT:
    GANTRY_ENDPOINT                 API endpoint (default: http://127.0.0.1:8700)
    GANTRY_ACCESS_KEY               Access key for request signing
    GANTRY_SECRET_KEY               Secret key for request signing
    GANTRY_SKIP_CERT_VERIFICATION   Skip TLS verification (default: false)

EXAMPLES:
    # List services of the default stack
    gantry-ctl services

    # Roll a staged update forward and wait for it to settle
    gantry-ctl deploy api COMPLETE --wait --stack shop

    # Open a shell in a container
    gantry-ctl exec 10.244.1.7 sh

    # Follow logs with a 100-line backlog
    gantry-ctl logs 10.244.1.7 --tail 100
"#
    );
}

#[derive(Debug)]
enum Command {
    Stacks,
    Stack {
        name: String,
    },
    StartStack {
        name: String,
    },
    StopStack {
        name: String,
    },
    Services {
        stack: String,
    },
    Service {
        name: String,
        stack: String,
    },
    StartService {
        name: String,
        stack: String,
        wait: bool,
    },
    StopService {
        name: String,
        stack: String,
        wait: bool,
    },
    Scale {
        service: String,
        instances: u32,
        stack: String,
        wait: bool,
    },
    Deploy {
        service: String,
        operation: String,
        stack: String,
        wait: bool,
    },
    Containers {
        stack: String,
        service: String,
    },
    Container {
        ip: String,
    },
    Exec {
        ip: String,
        command: Vec<String>,
    },
    Logs {
        ip: String,
        since: String,
        tail: String,
    },
    WaitRunning {
        stack: String,
        service: Option<String>,
        timeout: Option<u64>,
    },
    WaitStopped {
        service: String,
        stack: String,
        timeout: Option<u64>,
    },
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from_vec(&args)
}

/// Parse a lone `--stack <name>` option starting at `args[from]`.
fn parse_stack_opt(args: &[String], from: usize) -> Result<String, String> {
    let mut stack = String::new();

    let mut i = from;
    while i < args.len() {
        match args[i].as_str() {
            "--stack" => {
                i += 1;
                stack = args.get(i).ok_or("--stack requires a name")?.clone();
            }
            arg => return Err(format!("Unknown argument: {}", arg)),
        }
        i += 1;
    }

    Ok(stack)
}

/// Parse `--stack <name>` and `--wait` options starting at `args[from]`.
fn parse_stack_wait_opts(args: &[String], from: usize) -> Result<(String, bool), String> {
    let mut stack = String::new();
    let mut wait = false;

    let mut i = from;
    while i < args.len() {
        match args[i].as_str() {
            "--stack" => {
                i += 1;
                stack = args.get(i).ok_or("--stack requires a name")?.clone();
            }
            "--wait" => {
                wait = true;
            }
            arg => return Err(format!("Unknown argument: {}", arg)),
        }
        i += 1;
    }

    Ok((stack, wait))
}

fn parse_args_from_vec(args: &[String]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    match args[1].as_str() {
        "help" | "--help" | "-h" => {
            print_usage();
            std::process::exit(0);
        }
        "stacks" => Ok(Command::Stacks),
        "stack" => {
            let name = args.get(2).cloned().unwrap_or_default();
            Ok(Command::Stack { name })
        }
        "start-stack" => {
            let name = args.get(2).cloned().unwrap_or_default();
            Ok(Command::StartStack { name })
        }
        "stop-stack" => {
            let name = args.get(2).cloned().unwrap_or_default();
            Ok(Command::StopStack { name })
        }
        "services" => {
            let stack = parse_stack_opt(args, 2)?;
            Ok(Command::Services { stack })
        }
        "service" => {
            let name = args.get(2).ok_or("Service name required")?.clone();
            let stack = parse_stack_opt(args, 3)?;
            Ok(Command::Service { name, stack })
        }
        "start-service" => {
            let name = args.get(2).ok_or("Service name required")?.clone();
            let (stack, wait) = parse_stack_wait_opts(args, 3)?;
            Ok(Command::StartService { name, stack, wait })
        }
        "stop-service" => {
            let name = args.get(2).ok_or("Service name required")?.clone();
            let (stack, wait) = parse_stack_wait_opts(args, 3)?;
            Ok(Command::StopService { name, stack, wait })
        }
        "scale" => {
            let service = args.get(2).ok_or("Service name required")?.clone();
            let instances = args
                .get(3)
                .ok_or("Instance count required")?
                .parse()
                .map_err(|_| "Invalid instance count")?;
            let (stack, wait) = parse_stack_wait_opts(args, 4)?;
            Ok(Command::Scale {
                service,
                instances,
                stack,
                wait,
            })
        }
        "deploy" => {
            let service = args.get(2).ok_or("Service name required")?.clone();
            let operation = args.get(3).ok_or("Deploy operation required")?.clone();
            let (stack, wait) = parse_stack_wait_opts(args, 4)?;
            Ok(Command::Deploy {
                service,
                operation,
                stack,
                wait,
            })
        }
        "containers" => {
            let mut stack = String::new();
            let mut service = String::new();

            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--stack" => {
                        i += 1;
                        stack = args.get(i).ok_or("--stack requires a name")?.clone();
                    }
                    "--service" => {
                        i += 1;
                        service = args.get(i).ok_or("--service requires a name")?.clone();
                    }
                    arg => return Err(format!("Unknown argument: {}", arg)),
                }
                i += 1;
            }

            Ok(Command::Containers { stack, service })
        }
        "container" => {
            let ip = args.get(2).ok_or("Container IP required")?.clone();
            Ok(Command::Container { ip })
        }
        "exec" => {
            let ip = args.get(2).ok_or("Container IP required")?.clone();
            let mut rest = &args[3..];
            if rest.first().map(String::as_str) == Some("--") {
                rest = &rest[1..];
            }
            if rest.is_empty() {
                return Err("Command required".to_string());
            }
            Ok(Command::Exec {
                ip,
                command: rest.to_vec(),
            })
        }
        "logs" => {
            let ip = args.get(2).ok_or("Container IP required")?.clone();
            let mut since = String::new();
            let mut tail = String::new();

            let mut i = 3;
            while i < args.len() {
                match args[i].as_str() {
                    "--since" => {
                        i += 1;
                        since = args.get(i).ok_or("--since requires a value")?.clone();
                    }
                    "--tail" => {
                        i += 1;
                        tail = args.get(i).ok_or("--tail requires a number")?.clone();
                    }
                    arg => return Err(format!("Unknown argument: {}", arg)),
                }
                i += 1;
            }

            Ok(Command::Logs { ip, since, tail })
        }
        "wait-running" => {
            let mut stack = String::new();
            let mut service: Option<String> = None;
            let mut timeout: Option<u64> = None;

            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--stack" => {
                        i += 1;
                        stack = args.get(i).ok_or("--stack requires a name")?.clone();
                    }
                    "--service" => {
                        i += 1;
                        service = Some(args.get(i).ok_or("--service requires a name")?.clone());
                    }
                    "--timeout" => {
                        i += 1;
                        timeout = Some(
                            args.get(i)
                                .ok_or("--timeout requires a number")?
                                .parse()
                                .map_err(|_| "Invalid timeout")?,
                        );
                    }
                    arg => return Err(format!("Unknown argument: {}", arg)),
                }
                i += 1;
            }

            Ok(Command::WaitRunning {
                stack,
                service,
                timeout,
            })
        }
        "wait-stopped" => {
            let service = args.get(2).ok_or("Service name required")?.clone();
            let mut stack = String::new();
            let mut timeout: Option<u64> = None;

            let mut i = 3;
            while i < args.len() {
                match args[i].as_str() {
                    "--stack" => {
                        i += 1;
                        stack = args.get(i).ok_or("--stack requires a name")?.clone();
                    }
                    "--timeout" => {
                        i += 1;
                        timeout = Some(
                            args.get(i)
                                .ok_or("--timeout requires a number")?
                                .parse()
                                .map_err(|_| "Invalid timeout")?,
                        );
                    }
                    arg => return Err(format!("Unknown argument: {}", arg)),
                }
                i += 1;
            }

            Ok(Command::WaitStopped {
                service,
                stack,
                timeout,
            })
        }
        cmd => Err(format!("Unknown command: {}", cmd)),
    }
}

/// Display name for a stack, resolving the empty string to the platform's
/// default stack.
fn stack_label(name: &str) -> &str {
    if name.is_empty() { DEFAULT_STACK } else { name }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    // Create the client from environment
    let client = match GantryClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match execute_command(&client, cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute_command(client: &GantryClient, cmd: Command) -> Result<(), String> {
    match cmd {
        Command::Stacks => {
            let stacks = client.list_stacks().await.map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&stacks).map_err(|e| e.to_string())?
            );
        }

        Command::Stack { name } => {
            let stack = client.get_stack(&name).await.map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&stack).map_err(|e| e.to_string())?
            );
        }

        Command::StartStack { name } => {
            client.start_stack(&name).await.map_err(|e| e.to_string())?;
            println!("Started: {}", stack_label(&name));
        }

        Command::StopStack { name } => {
            client.stop_stack(&name).await.map_err(|e| e.to_string())?;
            println!("Stopped: {}", stack_label(&name));
        }

        Command::Services { stack } => {
            let services = client
                .list_services(&stack)
                .await
                .map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&services).map_err(|e| e.to_string())?
            );
        }

        Command::Service { name, stack } => {
            let service = client
                .get_service_inspect(&stack, &name)
                .await
                .map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&service).map_err(|e| e.to_string())?
            );
        }

        Command::StartService { name, stack, wait } => {
            if wait {
                client
                    .sync_start_service(&stack, &name)
                    .await
                    .map_err(|e| e.to_string())?;
            } else {
                client
                    .start_service(&stack, &name)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            println!("Started: {}/{}", stack_label(&stack), name);
        }

        Command::StopService { name, stack, wait } => {
            if wait {
                client
                    .sync_stop_service(&stack, &name)
                    .await
                    .map_err(|e| e.to_string())?;
            } else {
                client
                    .stop_service(&stack, &name)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            println!("Stopped: {}/{}", stack_label(&stack), name);
        }

        Command::Scale {
            service,
            instances,
            stack,
            wait,
        } => {
            let args = ScaleServiceArgs::new(instances);
            if wait {
                client
                    .sync_scale_service(&stack, &service, &args)
                    .await
                    .map_err(|e| e.to_string())?;
            } else {
                client
                    .scale_service(&stack, &service, &args)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            println!("Scaled: {}/{}", stack_label(&stack), service);
        }

        Command::Deploy {
            service,
            operation,
            stack,
            wait,
        } => {
            let args = DeployServiceArgs::new(&operation);
            if wait {
                client
                    .sync_deploy_service(&stack, &service, &args)
                    .await
                    .map_err(|e| e.to_string())?;
            } else {
                client
                    .deploy_service(&stack, &service, &args)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            println!("Deployed: {}/{}", stack_label(&stack), service);
        }

        Command::Containers { stack, service } => {
            let args = ListContainersArgs::new()
                .with_stack(stack)
                .with_service(service);
            let ips = client
                .list_containers(&args)
                .await
                .map_err(|e| e.to_string())?;
            for ip in ips {
                println!("{}", ip);
            }
        }

        Command::Container { ip } => {
            let container = client
                .get_container_inspect(&ip)
                .await
                .map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&container).map_err(|e| e.to_string())?
            );
        }

        Command::Exec { ip, command } => {
            let exec = client
                .exec_container(&ip, &ExecContainerArgs::new(command))
                .await
                .map_err(|e| e.to_string())?;

            let opts = ExecSessionOpts::new(
                tokio::io::stdin(),
                tokio::io::stdout(),
                tokio::io::stderr(),
            );
            client
                .start_exec(&ip, &exec.exec_id, &StartExecArgs::attach(), opts)
                .await
                .map_err(|e| e.to_string())?;
        }

        Command::Logs { ip, since, tail } => {
            let (exit_tx, exit_rx) = oneshot::channel();
            let (done_tx, done_rx) = oneshot::channel();

            let mut stream = client
                .tail_logs(&ip, &since, &tail, exit_rx, Some(done_tx))
                .await
                .map_err(|e| e.to_string())?;

            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                let _ = exit_tx.send(());
            });

            tokio::io::copy(&mut stream, &mut tokio::io::stdout())
                .await
                .map_err(|e| e.to_string())?;

            // Ctrl-C drops the session silently; a dropped sender is not
            // an error.
            if let Ok(Err(e)) = done_rx.await {
                return Err(e.to_string());
            }
        }

        Command::WaitRunning {
            stack,
            service,
            timeout,
        } => {
            let timeout = timeout.map(Duration::from_secs);
            match (&service, timeout) {
                (Some(svc), Some(t)) => client
                    .wait_service_running_with_timeout(&stack, svc, t)
                    .await
                    .map_err(|e| e.to_string())?,
                (Some(svc), None) => client
                    .wait_service_running(&stack, svc)
                    .await
                    .map_err(|e| e.to_string())?,
                (None, Some(t)) => client
                    .wait_stack_running_with_timeout(&stack, t)
                    .await
                    .map_err(|e| e.to_string())?,
                (None, None) => client
                    .wait_stack_running(&stack)
                    .await
                    .map_err(|e| e.to_string())?,
            }
            match service {
                Some(svc) => println!("Running: {}/{}", stack_label(&stack), svc),
                None => println!("Running: {}", stack_label(&stack)),
            }
        }

        Command::WaitStopped {
            service,
            stack,
            timeout,
        } => {
            match timeout.map(Duration::from_secs) {
                Some(t) => client
                    .wait_service_stopped_with_timeout(&stack, &service, t)
                    .await
                    .map_err(|e| e.to_string())?,
                None => client
                    .wait_service_stopped(&stack, &service)
                    .await
                    .map_err(|e| e.to_string())?,
            }
            println!("Stopped: {}/{}", stack_label(&stack), service);
        }
    }

    Ok(())
}
