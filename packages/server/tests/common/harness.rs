//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared by every test in the binary. Each test
//! gets its own freshly migrated database on it, because eligibility scans
//! cover the whole table and tests must not see each other's rows.

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::kernel::ServerDeps;
use site_enrichment::testing::{MockMetricsProvider, MockObjectStore, MockRenderer};
use site_enrichment::{
    EnrichmentConfig, Orchestrator, PostgresStore, RequestSigner, ScreenshotStorage, SecretString,
    ThumbnailSpec,
};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

pub const TEST_CRON_SECRET: &str = "test-cron-secret";

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    /// Server URL without a database name.
    server_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;

        Ok(Self {
            server_url: format!("postgresql://postgres:postgres@{}:{}", pg_host, pg_port),
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test database plus helpers for wiring the pipeline against it.
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &mut TestHarness) {
///     let store = ctx.store();
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    /// Database pool - use this for test fixtures.
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    /// Create and migrate a fresh database on the shared container.
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let admin = PgPool::connect(&format!("{}/postgres", infra.server_url))
            .await
            .context("Failed to connect to Postgres")?;
        let database = format!("enrichment_test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!(r#"CREATE DATABASE "{database}""#))
            .execute(&admin)
            .await
            .context("Failed to create test database")?;
        admin.close().await;

        let db_pool = PgPool::connect(&format!("{}/{}", infra.server_url, database))
            .await
            .context("Failed to connect to test database")?;

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self { db_pool })
    }

    pub fn store(&self) -> PostgresStore {
        PostgresStore::from_pool(self.db_pool.clone())
    }

    /// Orchestrator over this database with mock providers and storage.
    pub fn orchestrator(
        &self,
        metrics: Arc<MockMetricsProvider>,
        renderer: Arc<MockRenderer>,
        objects: Arc<MockObjectStore>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.store()),
            metrics,
            renderer,
            ScreenshotStorage::new(objects, ThumbnailSpec::default()),
            EnrichmentConfig::default()
                .with_request_interval(std::time::Duration::ZERO)
                .with_max_run_duration(None),
        )
        .expect("test orchestrator config is valid")
    }

    /// Server dependencies backed by mocks, signed with [`TEST_CRON_SECRET`].
    pub fn server_deps(&self) -> ServerDeps {
        let orchestrator = self.orchestrator(
            Arc::new(MockMetricsProvider::new()),
            Arc::new(MockRenderer::new()),
            Arc::new(MockObjectStore::new()),
        );
        ServerDeps::new(
            self.db_pool.clone(),
            Arc::new(orchestrator),
            RequestSigner::new(SecretString::new(TEST_CRON_SECRET)),
        )
    }
}
