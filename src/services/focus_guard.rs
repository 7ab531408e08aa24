//! Focus protection (distraction blocking) during focus phases

use async_trait::async_trait;
use tracing::info;

use super::system::systemctl;

/// Switch for whatever blocks distractions while a focus phase runs
#[async_trait]
pub trait FocusGuard: Send + Sync {
    async fn engage(&self) -> Result<(), String>;
    async fn release(&self) -> Result<(), String>;
}

/// Guard that does nothing; used when no blocker is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFocusGuard;

#[async_trait]
impl FocusGuard for NoopFocusGuard {
    async fn engage(&self) -> Result<(), String> {
        Ok(())
    }

    async fn release(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Starts and stops a systemd unit that performs the actual blocking
#[derive(Debug, Clone)]
pub struct SystemdFocusGuard {
    unit: String,
}

impl SystemdFocusGuard {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

#[async_trait]
impl FocusGuard for SystemdFocusGuard {
    async fn engage(&self) -> Result<(), String> {
        systemctl("start", &self.unit).await?;
        info!("Focus protection enabled ({})", self.unit);
        Ok(())
    }

    async fn release(&self) -> Result<(), String> {
        systemctl("stop", &self.unit).await?;
        info!("Focus protection disabled ({})", self.unit);
        Ok(())
    }
}
