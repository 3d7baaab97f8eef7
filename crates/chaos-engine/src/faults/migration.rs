//! Migration version corruption (§4.2.f): overwrite the target's recorded
//! migration version token.

use crate::module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
use crate::types::{AttackKind, FaultParams, MigrationCorruption, MigrationParams};
use async_trait::async_trait;
use serde_json::json;
use shared::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const INVALID_TOKEN: &str = "__CHAOS_INVALID_MIGRATION__";
const FUTURE_TOKEN: &str = "99999999999999";
const OLDER_TOKEN: &str = "20000101000000";

pub struct MigrationModule {
    ctx: Arc<TargetContext>,
}

impl MigrationModule {
    pub fn new(ctx: Arc<TargetContext>) -> Self {
        Self { ctx }
    }
}

pub struct Owned {
    pub original_version: Option<String>,
}

fn corrupted_value(corruption: MigrationCorruption) -> Option<&'static str> {
    match corruption {
        MigrationCorruption::InvalidToken => Some(INVALID_TOKEN),
        MigrationCorruption::NoRow => None,
        MigrationCorruption::FutureToken => Some(FUTURE_TOKEN),
        MigrationCorruption::OlderToken => Some(OLDER_TOKEN),
    }
}

#[async_trait]
impl FaultModule for MigrationModule {
    fn kind(&self) -> AttackKind {
        AttackKind::Migration
    }

    async fn inject(
        &self,
        params: &FaultParams,
        _cancel: CancellationToken,
    ) -> Result<(OwnedResources, serde_json::Value)> {
        let p: &MigrationParams = match params {
            FaultParams::Migration(p) => p,
            _ => return Err(Error::internal("migration module received mismatched params")),
        };

        let original_version = self.ctx.db.read_migration_version().await?;
        let new_value = corrupted_value(p.corruption);

        self.ctx.db.write_migration_version(new_value).await?;

        let result = json!({
            "corruption": p.corruption,
            "original_version": original_version,
            "written_version": new_value,
        });

        Ok((OwnedResources::Migration(Owned { original_version }), result))
    }

    async fn observe(&self, owned: &OwnedResources) -> Result<serde_json::Value> {
        let _owned = match owned {
            OwnedResources::Migration(o) => o,
            _ => return Err(Error::internal("migration observe received mismatched resources")),
        };
        let current = self.ctx.db.read_migration_version().await?;
        Ok(json!({ "current_version": current }))
    }

    async fn rollback(
        &self,
        owned: OwnedResources,
        _force: bool,
    ) -> std::result::Result<(), RollbackFailure> {
        let owned = match owned {
            OwnedResources::Migration(o) => o,
            _ => return Err(RollbackFailure::new("mismatched resources", vec![])),
        };

        match self
            .ctx
            .db
            .write_migration_version(owned.original_version.as_deref())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(RollbackFailure::new(e.to_string(), vec!["migration_version".to_string()])),
        }
    }
}
