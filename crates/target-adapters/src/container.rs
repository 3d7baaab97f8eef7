//! Container adapter: drives the host's container runtime CLI.
//!
//! Commands run through `tokio::process::Command` under a bounded timeout;
//! a non-zero exit status surfaces as an `AdapterError` carrying the
//! captured stderr, mirroring how the fault modules expect every external
//! call to behave (§4.5, §7 of the control-plane design).

use async_trait::async_trait;
use shared::{Error, Result};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Observed status of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Unknown(String),
}

/// Container lifecycle adapter.
#[async_trait]
pub trait ContainerAdapter: Send + Sync {
    async fn stop(&self, name: &str) -> Result<()>;
    async fn start(&self, name: &str) -> Result<()>;
    async fn restart(&self, name: &str) -> Result<()>;
    async fn status(&self, name: &str) -> Result<ContainerStatus>;
}

/// Drives `docker` (or a compatible CLI, e.g. `podman`) as a subprocess.
pub struct DockerCliContainerAdapter {
    binary: String,
    timeout: Duration,
}

impl DockerCliContainerAdapter {
    pub fn new() -> Self {
        Self {
            binary: std::env::var("CONTAINER_RUNTIME_BIN").unwrap_or_else(|_| "docker".to_string()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let fut = Command::new(&self.binary).args(args).output();

        let output = match timeout(self.timeout, fut).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::adapter(
                    "container",
                    format!("failed to spawn '{}': {e}", self.binary),
                ))
            }
            Err(_) => return Err(Error::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::adapter(
                "container",
                format!("'{} {}' exited with {}: {stderr}", self.binary, args.join(" "), output.status),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for DockerCliContainerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerAdapter for DockerCliContainerAdapter {
    async fn stop(&self, name: &str) -> Result<()> {
        tracing::info!(container = name, "stopping container");
        self.run(&["stop", name]).await?;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        tracing::info!(container = name, "starting container");
        self.run(&["start", name]).await?;
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<()> {
        tracing::info!(container = name, "restarting container");
        self.run(&["restart", name]).await?;
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<ContainerStatus> {
        let out = self
            .run(&["inspect", "-f", "{{.State.Status}}", name])
            .await?;
        Ok(match out.as_str() {
            "running" => ContainerStatus::Running,
            "exited" | "stopped" | "created" => ContainerStatus::Stopped,
            other => ContainerStatus::Unknown(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_variants_distinct() {
        assert_ne!(ContainerStatus::Running, ContainerStatus::Stopped);
        assert_eq!(
            ContainerStatus::Unknown("paused".into()),
            ContainerStatus::Unknown("paused".into())
        );
    }
}
