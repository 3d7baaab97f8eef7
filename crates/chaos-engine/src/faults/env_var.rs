//! Environment variable corruption (§4.2.c): rewrite the target's env file
//! and restart its container so the change takes effect.

use crate::module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
use crate::types::{AttackKind, EnvFailureType, EnvVarParams, FaultParams};
use async_trait::async_trait;
use serde_json::json;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SENTINEL_VALUE: &str = "__CHAOS_CORRUPTED__";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct EnvVarModule {
    ctx: Arc<TargetContext>,
}

impl EnvVarModule {
    pub fn new(ctx: Arc<TargetContext>) -> Self {
        Self { ctx }
    }
}

pub struct Owned {
    pub original_contents: String,
}

fn rewrite(contents: &str, var: &str, failure: EnvFailureType) -> String {
    let mut found = false;
    let mut lines: Vec<String> = contents
        .lines()
        .filter_map(|line| {
            let key = line.split('=').next().unwrap_or("").trim();
            if key == var {
                found = true;
                match failure {
                    EnvFailureType::Missing => None,
                    EnvFailureType::Wrong => Some(format!("{var}={SENTINEL_VALUE}")),
                }
            } else {
                Some(line.to_string())
            }
        })
        .collect();

    if !found && failure == EnvFailureType::Wrong {
        lines.push(format!("{var}={SENTINEL_VALUE}"));
    }

    let mut out = lines.join("\n");
    if contents.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[async_trait]
impl FaultModule for EnvVarModule {
    fn kind(&self) -> AttackKind {
        AttackKind::EnvVar
    }

    async fn inject(
        &self,
        params: &FaultParams,
        _cancel: CancellationToken,
    ) -> Result<(OwnedResources, serde_json::Value)> {
        let p: &EnvVarParams = match params {
            FaultParams::EnvVar(p) => p,
            _ => return Err(Error::internal("env_var module received mismatched params")),
        };

        let original_contents = self.ctx.file.read(&self.ctx.env_file_path).await?;
        let corrupted = rewrite(&original_contents, &p.env_var_name, p.failure_type);

        self.ctx.file.atomic_write(&self.ctx.env_file_path, &corrupted).await?;

        if let Err(e) = self.ctx.container.restart(&self.ctx.api_container).await {
            let _ = self
                .ctx
                .file
                .atomic_write(&self.ctx.env_file_path, &original_contents)
                .await;
            return Err(e);
        }

        let mut probe_result = None;
        if let Some(probe_path) = &p.probe_path {
            let url = format!("{}{}", self.ctx.base_url, probe_path);
            probe_result = self.ctx.http.get(&url, PROBE_TIMEOUT).await.ok();
        }

        let result = json!({
            "env_var_name": p.env_var_name,
            "failure_type": p.failure_type,
            "probe_path": p.probe_path,
            "probe_response": probe_result.map(|c| format!("{c:?}")),
        });

        Ok((OwnedResources::EnvVar(Owned { original_contents }), result))
    }

    async fn observe(&self, owned: &OwnedResources) -> Result<serde_json::Value> {
        let _owned = match owned {
            OwnedResources::EnvVar(o) => o,
            _ => return Err(Error::internal("env_var observe received mismatched resources")),
        };
        let status = self.ctx.container.status(&self.ctx.api_container).await?;
        Ok(json!({ "container_status": format!("{status:?}") }))
    }

    async fn rollback(
        &self,
        owned: OwnedResources,
        _force: bool,
    ) -> std::result::Result<(), RollbackFailure> {
        let owned = match owned {
            OwnedResources::EnvVar(o) => o,
            _ => return Err(RollbackFailure::new("mismatched resources", vec![])),
        };

        let mut stranded = Vec::new();
        if let Err(e) = self
            .ctx
            .file
            .atomic_write(&self.ctx.env_file_path, &owned.original_contents)
            .await
        {
            tracing::error!(error = %e, "failed to restore env file");
            stranded.push(format!("file:{}", self.ctx.env_file_path));
        }

        if let Err(e) = self.ctx.container.restart(&self.ctx.api_container).await {
            tracing::error!(error = %e, "failed to restart container after env_var rollback");
            stranded.push(format!("container:{}", self.ctx.api_container));
        }

        if stranded.is_empty() {
            Ok(())
        } else {
            Err(RollbackFailure::new("failed to fully restore env_var fault", stranded))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_missing_removes_line() {
        let contents = "A=1\nB=2\n";
        let out = rewrite(contents, "B", EnvFailureType::Missing);
        assert_eq!(out, "A=1\n");
    }

    #[test]
    fn test_rewrite_wrong_replaces_value() {
        let contents = "A=1\nB=2\n";
        let out = rewrite(contents, "B", EnvFailureType::Wrong);
        assert_eq!(out, format!("A=1\nB={SENTINEL_VALUE}\n"));
    }

    #[test]
    fn test_rewrite_wrong_appends_when_absent() {
        let contents = "A=1\n";
        let out = rewrite(contents, "MISSING", EnvFailureType::Wrong);
        assert_eq!(out, format!("A=1\nMISSING={SENTINEL_VALUE}\n"));
    }
}
