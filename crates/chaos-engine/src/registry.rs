//! Attack Registry & Lifecycle Engine (§4.1): owns the `attack_id -> record`
//! table, drives state transitions, arms the rollback timer, and serializes
//! stop/status requests against the owning background task.

use crate::module::{FaultModule, OwnedResources, RollbackFailure};
use crate::safety::SafetyGate;
use crate::types::{AttackKind, AttackRecord, AttackState, DryRunPlan, FaultParams};
use dashmap::DashMap;
use futures_util::future::join_all;
use serde_json::json;
use shared::{AuditRecord, AuditSink, Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, RwLock as AsyncRwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const OBSERVE_INTERVAL: Duration = Duration::from_millis(500);

struct AttackControl {
    cancel: CancellationToken,
    force: Arc<AtomicBool>,
    done: Arc<Notify>,
}

/// Shared, no-hidden-global-state engine instance (§9 Design Notes). A
/// fresh `Registry` owns a clean world: its own records, claims, caps, and
/// kill switch.
pub struct Registry {
    records: DashMap<Uuid, Arc<AsyncRwLock<AttackRecord>>>,
    controls: DashMap<Uuid, AttackControl>,
    claims: Arc<Mutex<HashSet<String>>>,
    claims_by_id: DashMap<Uuid, String>,
    kind_counts: Arc<DashMap<AttackKind, AtomicUsize>>,
    global_count: Arc<AtomicUsize>,
    modules: HashMap<AttackKind, Arc<dyn FaultModule>>,
    safety: Arc<SafetyGate>,
    audit: Arc<dyn AuditSink>,
    grace_period: Duration,
}

impl Registry {
    pub fn new(
        safety: Arc<SafetyGate>,
        modules: HashMap<AttackKind, Arc<dyn FaultModule>>,
        audit: Arc<dyn AuditSink>,
        grace_period: Duration,
    ) -> Self {
        Self {
            records: DashMap::new(),
            controls: DashMap::new(),
            claims: Arc::new(Mutex::new(HashSet::new())),
            claims_by_id: DashMap::new(),
            kind_counts: Arc::new(DashMap::new()),
            global_count: Arc::new(AtomicUsize::new(0)),
            modules,
            safety,
            audit,
            grace_period,
        }
    }

    pub fn safety(&self) -> &SafetyGate {
        &self.safety
    }

    pub fn dry_run(&self, params: &FaultParams) -> Result<DryRunPlan> {
        self.safety.dry_run(params)
    }

    fn kind_count(&self, kind: AttackKind) -> usize {
        self.kind_counts
            .entry(kind)
            .or_insert_with(|| AtomicUsize::new(0))
            .load(Ordering::SeqCst)
    }

    fn get_record_arc(&self, id: Uuid) -> Result<Arc<AsyncRwLock<AttackRecord>>> {
        self.records
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::not_found("attack", id.to_string()))
    }

    /// Allocate a record after the safety gate approves it. No side effects
    /// occur if validation or policy rejects the request (§8 property 5).
    pub async fn create(&self, params: FaultParams) -> Result<Uuid> {
        if self.safety.kill_switch_tripped() {
            self.audit
                .record(AuditRecord::new(
                    "create",
                    params.kind().as_str(),
                    "-",
                    "rejected",
                    json!({"reason": "kill_switch_tripped"}),
                ))
                .await;
            return Err(Error::rejected("kill switch is tripped"));
        }

        self.safety.validate_params(&params)?;

        let kind = params.kind();
        self.safety
            .check_caps(self.global_count.load(Ordering::SeqCst), self.kind_count(kind))?;

        let claim = params.target_claim();
        {
            let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
            if claims.contains(&claim) {
                return Err(Error::rejected(format!(
                    "target primitive '{claim}' is already claimed by an in-flight attack"
                )));
            }
            claims.insert(claim.clone());
        }

        let id = Uuid::new_v4();
        let record = AttackRecord::new(id, params);
        self.records.insert(id, Arc::new(AsyncRwLock::new(record)));
        self.claims_by_id.insert(id, claim);
        self.kind_counts
            .entry(kind)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst);
        self.global_count.fetch_add(1, Ordering::SeqCst);

        self.audit
            .record(AuditRecord::new(
                "create",
                kind.as_str(),
                id.to_string(),
                "accepted",
                json!({}),
            ))
            .await;

        Ok(id)
    }

    /// `starting -> running`; launches the module's inject activity on a
    /// background task and arms the rollback timer if `duration_seconds` is set.
    pub async fn start(&self, id: Uuid) -> Result<()> {
        let record_arc = self.get_record_arc(id)?;
        let (kind, params) = {
            let r = record_arc.read().await;
            (r.kind, r.params.clone())
        };

        let module = self
            .modules
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::internal(format!("no fault module registered for {}", kind.as_str())))?;

        let claim = self
            .claims_by_id
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::internal("missing claim for attack"))?;

        let cancel = CancellationToken::new();
        let force = Arc::new(AtomicBool::new(false));
        let done = Arc::new(Notify::new());

        self.controls.insert(
            id,
            AttackControl {
                cancel: cancel.clone(),
                force: Arc::clone(&force),
                done: Arc::clone(&done),
            },
        );

        self.audit
            .record(AuditRecord::new("start", kind.as_str(), id.to_string(), "accepted", json!({})))
            .await;

        tokio::spawn(run_attack(RunAttackContext {
            id,
            kind,
            params,
            module,
            record: record_arc,
            cancel,
            force,
            done,
            audit: Arc::clone(&self.audit),
            grace_period: self.grace_period,
            claim,
            claims: Arc::clone(&self.claims),
            kind_counts: Arc::clone(&self.kind_counts),
            global_count: Arc::clone(&self.global_count),
        }));

        Ok(())
    }

    /// Snapshot read. Observation while `running` is kept fresh by the
    /// background task's own periodic probe rather than a probe triggered
    /// here — stale counters are explicitly permitted (§4.1).
    pub async fn status(&self, id: Uuid) -> Result<AttackRecord> {
        let arc = self.get_record_arc(id)?;
        Ok(arc.read().await.clone())
    }

    pub async fn list(&self) -> Vec<AttackRecord> {
        let mut out = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            out.push(entry.value().read().await.clone());
        }
        out
    }

    /// Request cancellation; await rollback up to the configured grace
    /// period. Idempotent: a second `stop` on an already-terminal attack is
    /// a no-op that returns the existing terminal state (§4.1, §8 property 4).
    pub async fn stop(&self, id: Uuid, force: bool) -> Result<AttackRecord> {
        let arc = self.get_record_arc(id)?;

        {
            let r = arc.read().await;
            if r.state.is_terminal() {
                return Ok(r.clone());
            }
        }

        if let Some(control) = self.controls.get(&id) {
            if force {
                control.force.store(true, Ordering::SeqCst);
            }
            control.cancel.cancel();
            let done = Arc::clone(&control.done);
            drop(control);
            let _ = tokio::time::timeout(self.grace_period, done.notified()).await;
        }

        self.audit
            .record(AuditRecord::new(
                "stop",
                "attack",
                id.to_string(),
                "requested",
                json!({"force": force}),
            ))
            .await;

        Ok(arc.read().await.clone())
    }

    /// Trip the global kill switch and stop every non-terminal attack
    /// concurrently; returns the ids that were in flight at the moment of
    /// the call.
    pub async fn kill(&self) -> Vec<Uuid> {
        self.safety.trip_kill_switch();

        let ids: Vec<Uuid> = self.records.iter().map(|e| *e.key()).collect();
        let mut in_flight = Vec::new();
        for id in &ids {
            if let Ok(arc) = self.get_record_arc(*id) {
                if !arc.read().await.state.is_terminal() {
                    in_flight.push(*id);
                }
            }
        }

        join_all(in_flight.iter().map(|id| self.stop(*id, false))).await;

        self.audit
            .record(AuditRecord::new(
                "kill",
                "engine",
                "-",
                "tripped",
                json!({"stopped_ids": in_flight.iter().map(Uuid::to_string).collect::<Vec<_>>()}),
            ))
            .await;

        in_flight
    }
}

struct RunAttackContext {
    id: Uuid,
    kind: AttackKind,
    params: FaultParams,
    module: Arc<dyn FaultModule>,
    record: Arc<AsyncRwLock<AttackRecord>>,
    cancel: CancellationToken,
    force: Arc<AtomicBool>,
    done: Arc<Notify>,
    audit: Arc<dyn AuditSink>,
    grace_period: Duration,
    claim: String,
    claims: Arc<Mutex<HashSet<String>>>,
    kind_counts: Arc<DashMap<AttackKind, AtomicUsize>>,
    global_count: Arc<AtomicUsize>,
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    if let serde_json::Value::Object(update_map) = update {
        if let serde_json::Value::Object(target_map) = target {
            for (k, v) in update_map {
                target_map.insert(k, v);
            }
            return;
        }
    }
    *target = update;
}

async fn finish(ctx: &RunAttackContext) {
    ctx.claims
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&ctx.claim);
    if let Some(counter) = ctx.kind_counts.get(&ctx.kind) {
        counter.fetch_sub(1, Ordering::SeqCst);
    }
    ctx.global_count.fetch_sub(1, Ordering::SeqCst);
    ctx.done.notify_waiters();
}

async fn run_attack(ctx: RunAttackContext) {
    {
        let mut r = ctx.record.write().await;
        r.state = AttackState::Running;
        r.started_at = Some(chrono::Utc::now());
    }

    let owned = match ctx.module.inject(&ctx.params, ctx.cancel.clone()).await {
        Ok((owned, initial_result)) => {
            let mut r = ctx.record.write().await;
            r.result = initial_result;
            owned
        }
        Err(e) => {
            tracing::warn!(attack_id = %ctx.id, error = %e, "inject failed");
            {
                let mut r = ctx.record.write().await;
                r.state = AttackState::Failed;
                r.error = Some(e.to_string());
                r.finished_at = Some(chrono::Utc::now());
            }
            ctx.audit
                .record(AuditRecord::new(
                    "inject",
                    ctx.kind.as_str(),
                    ctx.id.to_string(),
                    "failed",
                    json!({"error": e.to_string()}),
                ))
                .await;
            finish(&ctx).await;
            return;
        }
    };

    if ctx.kind.is_self_terminating() {
        finish_with_rollback(&ctx, owned, false, false).await;
        return;
    }

    let deadline = ctx
        .record
        .read()
        .await
        .duration_seconds
        .map(|d| tokio::time::Instant::now() + Duration::from_secs(d));

    loop {
        let timer = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = timer => break,
            _ = tokio::time::sleep(OBSERVE_INTERVAL) => {
                match ctx.module.observe(&owned).await {
                    Ok(update) => {
                        let mut r = ctx.record.write().await;
                        merge_json(&mut r.result, update);
                    }
                    Err(e) => {
                        let mut r = ctx.record.write().await;
                        merge_json(&mut r.result, json!({"observe_error": e.to_string()}));
                    }
                }
            }
        }
    }

    {
        let mut r = ctx.record.write().await;
        r.state = AttackState::Cancelling;
    }

    let force_now = ctx.force.load(Ordering::SeqCst);
    finish_with_rollback(&ctx, owned, force_now, true).await;
}

async fn finish_with_rollback(ctx: &RunAttackContext, owned: OwnedResources, force: bool, was_cancelling: bool) {
    let _ = was_cancelling;
    match ctx.module.rollback(owned, force).await {
        Ok(()) => {
            let mut r = ctx.record.write().await;
            r.state = if ctx.kind.is_self_terminating() {
                AttackState::Completed
            } else {
                AttackState::RolledBack
            };
            r.finished_at = Some(chrono::Utc::now());
            drop(r);
            ctx.audit
                .record(AuditRecord::new(
                    "rollback",
                    ctx.kind.as_str(),
                    ctx.id.to_string(),
                    "ok",
                    json!({}),
                ))
                .await;
        }
        Err(RollbackFailure { message, stranded }) => {
            tracing::error!(attack_id = %ctx.id, error = %message, "rollback failed");
            let mut r = ctx.record.write().await;
            r.state = AttackState::RollbackFailed;
            r.error = Some(message.clone());
            r.stranded_resources = stranded.clone();
            r.finished_at = Some(chrono::Utc::now());
            drop(r);
            ctx.audit
                .record(AuditRecord::new(
                    "rollback",
                    ctx.kind.as_str(),
                    ctx.id.to_string(),
                    "failed",
                    json!({"error": message, "stranded": stranded}),
                ))
                .await;
        }
    }

    finish(ctx).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::db_pool::DbPoolModule;
    use crate::module::TargetContext;
    use crate::types::DbPoolParams;
    use shared::config::{BoundsConfig, CapsConfig};
    use shared::InMemoryAuditSink;
    use std::collections::HashMap as StdHashMap;
    use target_adapters::fakes::{FakeContainerAdapter, FakeDbAdapter, FakeFileAdapter, FakeHttpAdapter};

    fn test_ctx() -> Arc<TargetContext> {
        Arc::new(TargetContext {
            container: Arc::new(FakeContainerAdapter::new()),
            db: Arc::new(FakeDbAdapter::new()),
            http: Arc::new(FakeHttpAdapter::new()),
            file: Arc::new(FakeFileAdapter::new()),
            api_container: "target-api".to_string(),
            db_container: "target-db".to_string(),
            base_url: "http://target".to_string(),
            env_file_path: "/env".to_string(),
        })
    }

    fn test_registry() -> Registry {
        let ctx = test_ctx();
        let mut modules: StdHashMap<AttackKind, Arc<dyn FaultModule>> = StdHashMap::new();
        modules.insert(AttackKind::DbPool, Arc::new(DbPoolModule::new(ctx)));
        let safety = Arc::new(SafetyGate::new(
            BoundsConfig::default(),
            CapsConfig::default(),
            false,
            vec![],
        ));
        Registry::new(safety, modules, Arc::new(InMemoryAuditSink::default()), Duration::from_secs(2))
    }

    fn db_pool_params() -> FaultParams {
        FaultParams::DbPool(DbPoolParams {
            connections: 2,
            hold_seconds: 1,
            use_hold_endpoint: false,
        })
    }

    #[tokio::test]
    async fn test_create_then_start_reaches_running_then_rolled_back() {
        let registry = test_registry();
        let id = registry.create(db_pool_params()).await.unwrap();
        assert_eq!(registry.status(id).await.unwrap().state, AttackState::Starting);

        registry.start(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let record = registry.status(id).await.unwrap();
        assert_eq!(record.state, AttackState::Running);

        let stopped = registry.stop(id, false).await.unwrap();
        assert_eq!(stopped.state, AttackState::RolledBack);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_kind_params_validation() {
        let registry = test_registry();
        let bad = FaultParams::DbPool(DbPoolParams {
            connections: 0,
            hold_seconds: 1,
            use_hold_endpoint: false,
        });
        assert!(registry.create(bad).await.is_err());
        assert_eq!(registry.list().await.len(), 0);
    }

    #[tokio::test]
    async fn test_double_stop_is_idempotent() {
        let registry = test_registry();
        let id = registry.create(db_pool_params()).await.unwrap();
        registry.start(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first = registry.stop(id, false).await.unwrap();
        let second = registry.stop(id, false).await.unwrap();
        assert_eq!(first.state, second.state);
        assert!(first.state.is_terminal());
    }

    #[tokio::test]
    async fn test_kill_switch_rejects_create() {
        let registry = test_registry();
        registry.safety().trip_kill_switch();
        assert!(registry.create(db_pool_params()).await.is_err());
    }

    #[tokio::test]
    async fn test_claims_reject_concurrent_same_primitive() {
        let registry = test_registry();
        let first = registry.create(db_pool_params()).await.unwrap();
        let second = registry.create(db_pool_params()).await;
        assert!(second.is_err());
        registry.stop(first, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_not_found_for_unknown_id() {
        let registry = test_registry();
        assert!(registry.status(Uuid::new_v4()).await.is_err());
    }
}
