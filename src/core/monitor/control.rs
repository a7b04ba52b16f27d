//! Service start/stop/restart.

use async_trait::async_trait;

use crate::error::{HostwatchError, Result};
use crate::platform::services::{self, ServiceAction, ServiceState};

/// Controls OS services; each call fails with a `ServiceControl` error when
/// the service is unknown or the OS refuses
#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn restart(&self, name: &str) -> Result<()>;
}

/// [`ServiceController`] backed by `systemctl` or `sc.exe`
#[derive(Debug, Default)]
pub struct SystemServiceController;

impl SystemServiceController {
    async fn current_state(name: &str) -> Result<ServiceState> {
        let state = services::query_status(name).await?;
        if state == ServiceState::NotFound {
            return Err(HostwatchError::service_control(format!(
                "service '{}' not found",
                name
            )));
        }
        Ok(state)
    }
}

#[async_trait]
impl ServiceController for SystemServiceController {
    async fn start(&self, name: &str) -> Result<()> {
        if Self::current_state(name).await? == ServiceState::Running {
            log::info!("Service '{}' is already running", name);
            return Ok(());
        }
        services::control(name, ServiceAction::Start).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        if Self::current_state(name).await? != ServiceState::Running {
            log::info!("Service '{}' is not running", name);
            return Ok(());
        }
        services::control(name, ServiceAction::Stop).await
    }

    async fn restart(&self, name: &str) -> Result<()> {
        services::control(name, ServiceAction::Restart).await
    }
}
