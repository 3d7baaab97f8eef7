//! Handlers for `POST /break/<kind>`, `GET /break/<kind>/{id}`, and
//! `POST /break/<kind>/{id}/stop` (spec §6).

use actix_web::{web, HttpResponse};
use chaos_engine::{AttackKind, FaultParams, Registry};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error_response::ApiError;

/// Unknown fault kinds return `404` per spec §6 ("unknown fault kinds return 404").
fn resolve_kind(segment: &str) -> Result<AttackKind, ApiError> {
    AttackKind::from_path_segment(segment)
        .ok_or_else(|| shared::Error::not_found("fault_kind", segment.to_string()).into())
}

/// Query parameters and a JSON body are both accepted (spec §6); the body
/// wins a field present in both.
fn merged_params(kind: AttackKind, query: &HashMap<String, String>, body: &[u8]) -> Result<FaultParams, ApiError> {
    let mut merged = serde_json::Map::new();
    for (k, v) in query {
        merged.insert(k.clone(), query_value(v));
    }

    if !body.is_empty() {
        let parsed: Value = serde_json::from_slice(body)
            .map_err(|e| shared::Error::invalid_params(format!("invalid JSON body: {e}")))?;
        if let Value::Object(map) = parsed {
            for (k, v) in map {
                merged.insert(k, v);
            }
        }
    }

    let value = Value::Object(merged);
    let params = match kind {
        AttackKind::DbPool => FaultParams::DbPool(from_value(value)?),
        AttackKind::LongTransaction => FaultParams::LongTransaction(from_value(value)?),
        AttackKind::EnvVar => FaultParams::EnvVar(from_value(value)?),
        AttackKind::ApiCrash => FaultParams::ApiCrash(from_value(value)?),
        AttackKind::RateLimit => FaultParams::RateLimit(from_value(value)?),
        AttackKind::Migration => FaultParams::Migration(from_value(value)?),
    };
    Ok(params)
}

fn query_value(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else if let Ok(n) = raw.parse::<u64>() {
        Value::Number(n.into())
    } else if let Ok(n) = raw.parse::<i64>() {
        Value::Number(n.into())
    } else {
        Value::String(raw.to_string())
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| shared::Error::invalid_params(e.to_string()).into())
}

/// `POST /break/<kind>` — create then start in one call, returning `202`
/// with `{ attack_id, state }`. `dry_run=true` validates and returns the
/// planned side effects instead (spec §4.3): no record is allocated, no
/// adapter is touched.
pub async fn create_and_start(
    path: web::Path<String>,
    query: web::Query<HashMap<String, String>>,
    body: web::Bytes,
    registry: web::Data<Registry>,
) -> Result<HttpResponse, ApiError> {
    let kind = resolve_kind(&path)?;
    let dry_run = query
        .get("dry_run")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let params = merged_params(kind, &query, &body)?;

    if dry_run {
        let plan = registry.dry_run(&params)?;
        return Ok(HttpResponse::Ok().json(plan));
    }

    let id = registry.create(params).await?;
    registry.start(id).await?;
    let record = registry.status(id).await?;

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "attack_id": record.id,
        "state": record.state,
    })))
}

/// `GET /break/<kind>/{id}` — full attack record snapshot.
pub async fn status(path: web::Path<(String, uuid::Uuid)>, registry: web::Data<Registry>) -> Result<HttpResponse, ApiError> {
    let (kind_segment, id) = path.into_inner();
    resolve_kind(&kind_segment)?;

    let record = registry.status(id).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[derive(Debug, Deserialize)]
pub struct StopQuery {
    #[serde(default)]
    pub force: bool,
}

/// `POST /break/<kind>/{id}/stop?force=<bool>` — request stop; always
/// returns the updated record, never an error for an in-flight attack
/// (stop is always safe to call, spec §7).
pub async fn stop(
    path: web::Path<(String, uuid::Uuid)>,
    query: web::Query<StopQuery>,
    registry: web::Data<Registry>,
) -> Result<HttpResponse, ApiError> {
    let (kind_segment, id) = path.into_inner();
    resolve_kind(&kind_segment)?;

    let record = registry.stop(id, query.force).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_kind_rejects_unknown_segment() {
        assert!(resolve_kind("not_a_kind").is_err());
    }

    #[test]
    fn test_resolve_kind_accepts_known_segment() {
        assert_eq!(resolve_kind("db_pool").unwrap(), AttackKind::DbPool);
    }

    #[test]
    fn test_merged_params_body_overrides_query() {
        let mut query = HashMap::new();
        query.insert("connections".to_string(), "10".to_string());
        query.insert("hold_seconds".to_string(), "5".to_string());

        let body = br#"{"connections": 20}"#;
        let params = merged_params(AttackKind::DbPool, &query, body).unwrap();
        match params {
            FaultParams::DbPool(p) => {
                assert_eq!(p.connections, 20);
                assert_eq!(p.hold_seconds, 5);
            }
            _ => panic!("expected DbPool params"),
        }
    }

    #[test]
    fn test_merged_params_rejects_malformed_body() {
        let query = HashMap::new();
        let body = b"{not json";
        assert!(merged_params(AttackKind::DbPool, &query, body).is_err());
    }
}
