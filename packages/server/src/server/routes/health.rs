use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kernel::ServerDeps;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: Probe,
    pool: PoolUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrichment: Option<PipelineSummary>,
}

#[derive(Serialize)]
pub struct Probe {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct PoolUsage {
    size: u32,
    idle: usize,
    max: u32,
}

/// Queue depth as seen by the pipeline.
#[derive(Serialize)]
pub struct PipelineSummary {
    pending: u64,
    in_progress: u64,
    failed: u64,
    last_enriched_at: Option<DateTime<Utc>>,
}

/// Health check endpoint
///
/// 200 when the database answers within five seconds, 503 otherwise. The
/// pipeline summary is best-effort and omitted if the stats query fails.
pub async fn health_handler(
    Extension(deps): Extension<ServerDeps>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match tokio::time::timeout(
        PROBE_TIMEOUT,
        sqlx::query("SELECT 1").execute(&deps.db_pool),
    )
    .await
    {
        Ok(Ok(_)) => Probe { ok: true, error: None },
        Ok(Err(e)) => Probe {
            ok: false,
            error: Some(format!("Query failed: {e}")),
        },
        Err(_) => Probe {
            ok: false,
            error: Some(format!("Query timeout (>{}s)", PROBE_TIMEOUT.as_secs())),
        },
    };

    let enrichment = if database.ok {
        match tokio::time::timeout(PROBE_TIMEOUT, deps.orchestrator.stats()).await {
            Ok(Ok(stats)) => Some(PipelineSummary {
                pending: stats.pending,
                in_progress: stats.in_progress,
                failed: stats.failed,
                last_enriched_at: stats.last_enriched_at,
            }),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Enrichment stats unavailable for health check");
                None
            }
            Err(_) => None,
        }
    } else {
        None
    };

    let pool = PoolUsage {
        size: deps.db_pool.size(),
        idle: deps.db_pool.num_idle(),
        max: deps.db_pool.options().get_max_connections(),
    };

    let (code, status) = if database.ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            pool,
            enrichment,
        }),
    )
}
