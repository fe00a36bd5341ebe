//! Trigger endpoint for enrichment runs.
//!
//! Mounted behind the HMAC middleware; the handler assumes the caller is
//! authenticated.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use site_enrichment::{EnrichmentMode, RunOptions, RunReport};

use crate::kernel::ServerDeps;

/// Upper bound on records per triggered run.
pub const MAX_RUN_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct EnrichQuery {
    pub limit: Option<usize>,
    pub mode: Option<String>,
    pub dry_run: Option<bool>,
}

impl EnrichQuery {
    pub fn into_options(self) -> Result<RunOptions, String> {
        let defaults = RunOptions::default();
        let mode = match self.mode.as_deref() {
            Some(raw) => raw.parse::<EnrichmentMode>()?,
            None => defaults.mode,
        };
        let limit = self.limit.unwrap_or(defaults.limit).clamp(1, MAX_RUN_LIMIT);
        Ok(RunOptions::new(limit, mode).dry_run(self.dry_run.unwrap_or(false)))
    }
}

#[derive(Debug, Serialize)]
pub struct EnrichResponse {
    pub success: bool,
    pub enriched: usize,
    pub failed: usize,
    pub total: usize,
    pub report: RunReport,
}

/// Run one enrichment batch and report the outcome.
pub async fn enrich_sites_handler(
    Extension(deps): Extension<ServerDeps>,
    Query(query): Query<EnrichQuery>,
) -> Response {
    let options = match query.into_options() {
        Ok(options) => options,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))).into_response(),
    };

    tracing::info!(limit = options.limit, mode = %options.mode, dry_run = options.dry_run, "Enrichment triggered");

    match deps.orchestrator.run(options, deps.shutdown.child_token()).await {
        Ok(report) => Json(EnrichResponse {
            success: true,
            enriched: report.succeeded,
            failed: report.failed,
            total: report.attempted,
            report,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Enrichment run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Enrichment failed", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}
