/// Health check endpoints for liveness and readiness probes
///
/// The detailed check reports database connectivity and the result of a
/// household consistency audit. Inconsistent households mark the service
/// degraded, never unhealthy.

use crate::{context::AppContext, error::RegistryResult, jobs};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub auth_mode: String,
    pub checks: Vec<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health status of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy(name: &str, started: Instant, details: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
            details: Some(details),
        }
    }

    fn failed(name: &str, status: &str, started: Instant, error: String) -> Self {
        Self {
            name: name.to_string(),
            status: status.to_string(),
            response_time_ms: Some(started.elapsed().as_millis() as u64),
            error: Some(error),
            details: None,
        }
    }
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health/detailed", get(health_detailed))
}

pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe. If we can respond, we're alive.
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 503 until the registry store answers
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = check_database(&ctx).await {
        tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Detailed health check with all component statuses
pub async fn health_detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let start = Instant::now();
    let checks = vec![
        check_database_detailed(&ctx).await,
        check_households_detailed(&ctx).await,
    ];

    let overall_status = determine_overall_status(&checks);

    let health = HealthStatus {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_mode: ctx.config.authentication.mode.as_str().to_string(),
        checks,
        message: if overall_status == "healthy" {
            None
        } else {
            Some("One or more components are unhealthy".to_string())
        },
    };

    let status_code = match overall_status.as_str() {
        "unhealthy" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    tracing::info!(
        status = %overall_status,
        duration_ms = start.elapsed().as_millis(),
        "health_check_completed"
    );

    (status_code, Json(health))
}

async fn check_database(ctx: &AppContext) -> RegistryResult<()> {
    jobs::tasks::health_check(ctx).await
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match check_database(ctx).await {
        Ok(()) => ComponentHealth::healthy(
            "database",
            start,
            serde_json::json!({
                "type": "sqlite",
                "pool_size": ctx.db.size(),
            }),
        ),
        Err(e) => ComponentHealth::failed("database", "unhealthy", start, e.to_string()),
    }
}

async fn check_households_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match jobs::tasks::audit_household_consistency(ctx).await {
        Ok(0) => ComponentHealth::healthy(
            "households",
            start,
            serde_json::json!({ "inconsistent": 0 }),
        ),
        Ok(count) => ComponentHealth {
            details: Some(serde_json::json!({ "inconsistent": count })),
            ..ComponentHealth::failed(
                "households",
                "degraded",
                start,
                format!("{} households have members out of sync with their head", count),
            )
        },
        Err(e) => ComponentHealth::failed("households", "degraded", start, e.to_string()),
    }
}

fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    let unhealthy_count = checks.iter().filter(|c| c.status == "unhealthy").count();
    let degraded_count = checks.iter().filter(|c| c.status == "degraded").count();

    if unhealthy_count > 0 {
        "unhealthy".to_string()
    } else if degraded_count > 0 {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
