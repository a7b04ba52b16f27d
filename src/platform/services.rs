//! OS service manager access.
//!
//! Linux talks to systemd through `systemctl`, Windows to the service control
//! manager through `sc.exe`. Every invocation is bounded by [`COMMAND_TIMEOUT`].

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{HostwatchError, Result};

/// Upper bound for a single service manager invocation
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// State of an OS service as reported by the service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub fn verb(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        }
    }
}

/// Reject names the service manager would read as an option
fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("service name is empty".to_string());
    }
    if name.starts_with('-') {
        return Err(format!("invalid service name '{}'", name));
    }
    Ok(())
}

#[cfg_attr(not(any(target_os = "linux", windows)), allow(dead_code))]
async fn run_command(program: &str, args: &[&str]) -> std::result::Result<Output, String> {
    let child = Command::new(program).args(args).kill_on_drop(true).output();

    match timeout(COMMAND_TIMEOUT, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(format!("failed to execute {}: {}", program, e)),
        Err(_) => Err(format!(
            "{} {} timed out after {}s",
            program,
            args.join(" "),
            COMMAND_TIMEOUT.as_secs()
        )),
    }
}

/// Query the current state of a service
pub async fn query_status(name: &str) -> Result<ServiceState> {
    validate_name(name).map_err(HostwatchError::probe)?;
    imp::query_status(name).await.map_err(HostwatchError::probe)
}

/// Names of all services known to the service manager
pub async fn list_services() -> Result<Vec<String>> {
    imp::list_services().await.map_err(HostwatchError::probe)
}

/// Run a control action against a service
pub async fn control(name: &str, action: ServiceAction) -> Result<()> {
    validate_name(name).map_err(HostwatchError::service_control)?;
    imp::control(name, action)
        .await
        .map_err(|e| HostwatchError::service_control(format!("failed to {} '{}': {}", action.verb(), name, e)))
}

/// Parse `systemctl show -p LoadState -p ActiveState <unit>` output
pub fn parse_systemctl_show(output: &str) -> ServiceState {
    let mut load_state = "";
    let mut active_state = "";

    for line in output.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "LoadState" => load_state = value.trim(),
                "ActiveState" => active_state = value.trim(),
                _ => {}
            }
        }
    }

    if load_state == "not-found" || load_state.is_empty() {
        return ServiceState::NotFound;
    }

    match active_state {
        "active" | "reloading" => ServiceState::Running,
        _ => ServiceState::Stopped,
    }
}

/// Parse `systemctl list-units --type=service --all --no-legend --plain`
pub fn parse_systemctl_units(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|unit| unit.strip_suffix(".service"))
        .map(str::to_string)
        .collect()
}

/// Parse `sc query <name>` output
pub fn parse_sc_query(output: &str) -> ServiceState {
    if output.contains("1060") {
        return ServiceState::NotFound;
    }

    let state_line = output
        .lines()
        .find(|line| line.trim_start().starts_with("STATE"));

    match state_line {
        Some(line) if line.contains("RUNNING") => ServiceState::Running,
        Some(_) => ServiceState::Stopped,
        None => ServiceState::NotFound,
    }
}

/// Parse `sc query type= service state= all`
pub fn parse_sc_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("SERVICE_NAME:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(target_os = "linux")]
mod imp {
    use super::*;

    pub async fn query_status(name: &str) -> std::result::Result<ServiceState, String> {
        let output = run_command(
            "systemctl",
            &["show", "-p", "LoadState", "-p", "ActiveState", name],
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("systemctl show failed: {}", stderr.trim()));
        }

        Ok(parse_systemctl_show(&String::from_utf8_lossy(&output.stdout)))
    }

    pub async fn list_services() -> std::result::Result<Vec<String>, String> {
        let output = run_command(
            "systemctl",
            &["list-units", "--type=service", "--all", "--no-legend", "--plain"],
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("systemctl list-units failed: {}", stderr.trim()));
        }

        Ok(parse_systemctl_units(&String::from_utf8_lossy(&output.stdout)))
    }

    pub async fn control(name: &str, action: ServiceAction) -> std::result::Result<(), String> {
        let output = run_command("systemctl", &[action.verb(), name]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(stderr.trim().to_string());
        }

        log::info!("systemctl {} {} succeeded", action.verb(), name);
        Ok(())
    }
}

#[cfg(windows)]
mod imp {
    use super::*;

    const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub async fn query_status(name: &str) -> std::result::Result<ServiceState, String> {
        let output = run_command("sc", &["query", name]).await?;
        // sc exits non-zero for unknown services but still prints the 1060 code
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_sc_query(&stdout))
    }

    pub async fn list_services() -> std::result::Result<Vec<String>, String> {
        let output = run_command("sc", &["query", "type=", "service", "state=", "all"]).await?;

        if !output.status.success() {
            return Err(format!("sc query failed with {}", output.status));
        }

        Ok(parse_sc_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn sc(verb: &str, name: &str) -> std::result::Result<(), String> {
        let output = run_command("sc", &[verb, name]).await?;
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(stdout.trim().to_string());
        }
        Ok(())
    }

    /// `sc stop` returns before the service has stopped
    async fn wait_until_stopped(name: &str) -> std::result::Result<(), String> {
        let deadline = tokio::time::Instant::now() + COMMAND_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if query_status(name).await? != ServiceState::Running {
                return Ok(());
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
        Err(format!("service '{}' did not stop in time", name))
    }

    pub async fn control(name: &str, action: ServiceAction) -> std::result::Result<(), String> {
        match action {
            ServiceAction::Start => sc("start", name).await?,
            ServiceAction::Stop => sc("stop", name).await?,
            ServiceAction::Restart => {
                if query_status(name).await? == ServiceState::Running {
                    sc("stop", name).await?;
                    wait_until_stopped(name).await?;
                }
                sc("start", name).await?;
            }
        }

        log::info!("sc {} {} succeeded", action.verb(), name);
        Ok(())
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
mod imp {
    use super::{ServiceAction, ServiceState};

    const UNSUPPORTED: &str = "service management is not supported on this platform";

    pub async fn query_status(_name: &str) -> std::result::Result<ServiceState, String> {
        Err(UNSUPPORTED.to_string())
    }

    pub async fn list_services() -> std::result::Result<Vec<String>, String> {
        Err(UNSUPPORTED.to_string())
    }

    pub async fn control(_name: &str, _action: ServiceAction) -> std::result::Result<(), String> {
        Err(UNSUPPORTED.to_string())
    }
}
