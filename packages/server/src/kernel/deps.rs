//! Server dependencies shared by routes, the scheduler and the CLI.
//!
//! Everything external is wired here once from [`Config`]; handlers only
//! ever see the orchestrator and the signer.

use std::sync::Arc;

use anyhow::{Context, Result};
use site_enrichment::{
    BrowserRenderingProvider, CancellationToken, EnrichmentStore, LocalObjectStore, ObjectStore, Orchestrator,
    PostgresStore, R2ObjectStore, RequestSigner, ScreenshotStorage, SimilarWebProvider,
};
use sqlx::PgPool;

use crate::config::{Config, ScreenshotBackend};

#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub orchestrator: Arc<Orchestrator>,
    /// Verifies signed cron requests.
    pub signer: Arc<RequestSigner>,
    /// Cancelled on shutdown; runs stop dispatching new records.
    pub shutdown: CancellationToken,
}

impl ServerDeps {
    pub fn new(db_pool: PgPool, orchestrator: Arc<Orchestrator>, signer: RequestSigner) -> Self {
        Self {
            db_pool,
            orchestrator,
            signer: Arc::new(signer),
            shutdown: CancellationToken::new(),
        }
    }

    /// Production wiring for the HTTP server.
    pub fn from_config(db_pool: PgPool, config: &Config) -> Result<Self> {
        let secret = config
            .cron_secret
            .clone()
            .context("CRON_SECRET must be set to serve signed endpoints")?;
        let orchestrator = build_orchestrator(db_pool.clone(), config)?;
        Ok(Self::new(db_pool, Arc::new(orchestrator), RequestSigner::new(secret)))
    }
}

/// Postgres store, SimilarWeb metrics, Cloudflare rendering and the
/// configured screenshot backend.
pub fn build_orchestrator(db_pool: PgPool, config: &Config) -> Result<Orchestrator> {
    let store: Arc<dyn EnrichmentStore> = Arc::new(PostgresStore::from_pool(db_pool));

    tracing::info!(
        similarweb_url = %config.similarweb_api_url,
        similarweb_key = %config.similarweb_api_key.hint(),
        cloudflare_account = %config.cloudflare.account_id,
        cloudflare_token = %config.cloudflare.api_token.hint(),
        "Wiring enrichment providers"
    );

    let metrics = SimilarWebProvider::new(
        &config.similarweb_api_url,
        &config.similarweb_api_key,
        config.enrichment.metrics_timeout,
    )
    .context("Failed to create SimilarWeb provider")?;

    let renderer = BrowserRenderingProvider::new(&config.cloudflare, config.enrichment.render_timeout)
        .context("Failed to create browser rendering provider")?
        .with_viewport(config.viewport_width, config.viewport_height);

    let objects: Arc<dyn ObjectStore> = match &config.screenshots {
        ScreenshotBackend::Local {
            public_dir,
            public_base_url,
        } => Arc::new(LocalObjectStore::new(public_dir, public_base_url)),
        ScreenshotBackend::R2 { bucket, public_url } => Arc::new(
            R2ObjectStore::new(config.cloudflare.clone(), bucket, public_url)
                .context("Failed to create R2 object store")?,
        ),
    };
    let storage = ScreenshotStorage::new(objects, config.enrichment.thumbnail);

    Orchestrator::new(
        store,
        Arc::new(metrics),
        Arc::new(renderer),
        storage,
        config.enrichment.clone(),
    )
    .context("Failed to create enrichment orchestrator")
}
