use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::db::queries;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider_mode: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_jobs: Option<i64>,
}

/// GET /health: database probe plus the configured provider mode.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.db {
        Some(pool) => {
            let start = std::time::Instant::now();
            match sqlx::query("SELECT 1").execute(pool).await {
                Ok(_) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    let pending_jobs = queries::pending_job_count(pool).await.ok();
                    if let Some(depth) = pending_jobs {
                        metrics::gauge!("issuance_queue_depth").set(depth as f64);
                    }
                    ComponentHealth {
                        status: "ok".to_string(),
                        latency_ms: Some(latency_ms),
                        pending_jobs,
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Database health probe failed");
                    ComponentHealth {
                        status: "error".to_string(),
                        latency_ms: None,
                        pending_jobs: None,
                    }
                }
            }
        }
        None => ComponentHealth {
            status: "in_memory".to_string(),
            latency_ms: None,
            pending_jobs: None,
        },
    };

    let healthy = database.status != "error";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider_mode: state.provider.mode().to_string(),
        checks: HealthChecks { database },
    };

    (status_code, Json(response))
}
