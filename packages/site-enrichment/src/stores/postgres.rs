//! PostgreSQL status store.
//!
//! Records live in `product_enrichments`, one row per row of `products`
//! (created by the `products_admit_enrichment` trigger, removed by
//! `ON DELETE CASCADE`). The schema itself is owned by the application's
//! migrations; this store only issues single-row conditional statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::EnrichmentStore;
use crate::types::{
    metrics::MetricsSnapshot,
    record::{ArtifactPair, EnrichmentRecord, EnrichmentStatus, RecordOutcome},
    report::EnrichmentStats,
    seo::SeoMetadata,
};

const RECORD_COLUMNS: &str = r#"
    e.product_id, p.url, p.monthly_visits AS priority, e.status, e.enriched_at,
    e.captured_at, e.error, e.next_attempt_at, e.full_url, e.thumbnail_url,
    e.seo_metadata, e.metrics, e.failure_count, e.claimed_at,
    e.last_attempted_at, e.updated_at
"#;

#[derive(FromRow)]
struct EnrichmentRow {
    product_id: Uuid,
    url: String,
    priority: Option<i64>,
    status: String,
    enriched_at: Option<DateTime<Utc>>,
    captured_at: Option<DateTime<Utc>>,
    error: Option<String>,
    next_attempt_at: Option<DateTime<Utc>>,
    full_url: Option<String>,
    thumbnail_url: Option<String>,
    seo_metadata: Option<Json<SeoMetadata>>,
    metrics: Option<Json<MetricsSnapshot>>,
    failure_count: i32,
    claimed_at: Option<DateTime<Utc>>,
    last_attempted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EnrichmentRow> for EnrichmentRecord {
    type Error = StoreError;

    fn try_from(row: EnrichmentRow) -> StoreResult<Self> {
        let status = row
            .status
            .parse::<EnrichmentStatus>()
            .map_err(|e| StoreError::Database(e.into()))?;

        Ok(EnrichmentRecord {
            product_id: row.product_id,
            url: row.url,
            priority: row.priority,
            status,
            enriched_at: row.enriched_at,
            captured_at: row.captured_at,
            error: row.error,
            next_attempt_at: row.next_attempt_at,
            artifacts: ArtifactPair::from_parts(row.full_url, row.thumbnail_url),
            seo_metadata: row.seo_metadata.map(|j| j.0),
            metrics: row.metrics.map(|j| j.0),
            failure_count: row.failure_count,
            claimed_at: row.claimed_at,
            last_attempted_at: row.last_attempted_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed enrichment status store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a fresh pool.
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Reuse an application pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn conflict_or_missing(&self, product_id: Uuid) -> StoreError {
        match self.find_by_id(product_id).await {
            Ok(Some(_)) => StoreError::Conflict { id: product_id },
            Ok(None) => StoreError::NotFound { id: product_id },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl EnrichmentStore for PostgresStore {
    #[instrument(skip(self))]
    async fn find_eligible(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<EnrichmentRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM product_enrichments e
            JOIN products p ON p.id = e.product_id
            WHERE e.status = 'pending'
               OR (e.status IN ('enriched', 'failed') AND e.next_attempt_at <= $1)
            ORDER BY p.monthly_visits DESC NULLS LAST, e.product_id ASC
            LIMIT $2
            "#
        );

        let rows: Vec<EnrichmentRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Found eligible enrichment records");
        rows.into_iter().map(EnrichmentRecord::try_from).collect()
    }

    async fn find_by_id(&self, product_id: Uuid) -> StoreResult<Option<EnrichmentRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM product_enrichments e
            JOIN products p ON p.id = e.product_id
            WHERE e.product_id = $1
            "#
        );

        let row: Option<EnrichmentRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(EnrichmentRecord::try_from).transpose()
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn claim(
        &self,
        product_id: Uuid,
        expected: EnrichmentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<EnrichmentRecord> {
        let sql = format!(
            r#"
            WITH e AS (
                UPDATE product_enrichments
                SET status = 'in_progress',
                    claimed_at = $3,
                    last_attempted_at = $3,
                    updated_at = $3
                WHERE product_id = $1
                  AND status = $2
                  AND status <> 'in_progress'
                RETURNING *
            )
            SELECT {RECORD_COLUMNS}
            FROM e
            JOIN products p ON p.id = e.product_id
            "#
        );

        let row: Option<EnrichmentRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .bind(expected.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => EnrichmentRecord::try_from(row),
            None => Err(self.conflict_or_missing(product_id).await),
        }
    }

    #[instrument(skip(self, outcome), fields(product_id = %product_id, status = %outcome.status()))]
    async fn apply_result(&self, product_id: Uuid, outcome: &RecordOutcome) -> StoreResult<()> {
        let result = match outcome {
            RecordOutcome::Success {
                completed_at,
                metrics,
                capture,
                next_attempt_at,
            } => {
                let (full_url, thumbnail_url, seo, captured_at) = match capture {
                    Some(c) => (
                        Some(c.artifacts.full_url.as_str()),
                        Some(c.artifacts.thumbnail_url.as_str()),
                        Some(Json(&c.seo_metadata)),
                        Some(c.captured_at),
                    ),
                    None => (None, None, None, None),
                };

                // Steps that did not run keep their previous columns.
                sqlx::query(
                    r#"
                    UPDATE product_enrichments
                    SET status = 'enriched',
                        error = NULL,
                        failure_count = 0,
                        enriched_at = $2,
                        next_attempt_at = $3,
                        metrics = COALESCE($4, metrics),
                        captured_at = COALESCE($5, captured_at),
                        full_url = COALESCE($6, full_url),
                        thumbnail_url = COALESCE($7, thumbnail_url),
                        seo_metadata = COALESCE($8, seo_metadata),
                        claimed_at = NULL,
                        updated_at = $2
                    WHERE product_id = $1 AND status = 'in_progress'
                    "#,
                )
                .bind(product_id)
                .bind(completed_at)
                .bind(next_attempt_at)
                .bind(metrics.as_ref().map(Json))
                .bind(captured_at)
                .bind(full_url)
                .bind(thumbnail_url)
                .bind(seo)
                .execute(&self.pool)
                .await?
            }
            RecordOutcome::Failure {
                failed_at,
                error,
                next_attempt_at,
            } => {
                sqlx::query(
                    r#"
                    UPDATE product_enrichments
                    SET status = 'failed',
                        error = $2,
                        failure_count = failure_count + 1,
                        next_attempt_at = $3,
                        claimed_at = NULL,
                        updated_at = $4
                    WHERE product_id = $1 AND status = 'in_progress'
                    "#,
                )
                .bind(product_id)
                .bind(error)
                .bind(next_attempt_at)
                .bind(failed_at)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(product_id).await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE product_enrichments
            SET status = 'pending',
                claimed_at = NULL,
                updated_at = NOW()
            WHERE status = 'in_progress'
              AND (claimed_at IS NULL OR claimed_at < $1)
            "#,
        )
        .bind(claimed_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, product_ids))]
    async fn reset(
        &self,
        product_ids: Option<&[Uuid]>,
        from: EnrichmentStatus,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE product_enrichments
            SET status = 'pending',
                error = NULL,
                failure_count = 0,
                next_attempt_at = NULL,
                updated_at = NOW()
            WHERE status = $1
              AND ($2::uuid[] IS NULL OR product_id = ANY($2))
            "#,
        )
        .bind(from.as_str())
        .bind(product_ids.map(|ids| ids.to_vec()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn stats(&self) -> StoreResult<EnrichmentStats> {
        let (pending, in_progress, enriched, failed, last_enriched_at): (
            i64,
            i64,
            i64,
            i64,
            Option<DateTime<Utc>>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status = 'in_progress'),
                COUNT(*) FILTER (WHERE status = 'enriched'),
                COUNT(*) FILTER (WHERE status = 'failed'),
                MAX(enriched_at)
            FROM product_enrichments
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(EnrichmentStats::from_counts(
            pending as u64,
            in_progress as u64,
            enriched as u64,
            failed as u64,
            last_enriched_at,
        ))
    }
}
