//! Persistence of per-product enrichment state.
//!
//! Every mutation is a single-record conditional write, so overlapping runs
//! never double-process a record and no cross-record transaction is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{
    record::{EnrichmentRecord, EnrichmentStatus, RecordOutcome},
    report::EnrichmentStats,
};

#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// Records the orchestrator may pick up at `now`, highest priority first.
    ///
    /// Returns `Pending` records and `Enriched`/`Failed` records whose
    /// `next_attempt_at <= now`, ordered by priority descending (nulls last)
    /// then product id ascending.
    async fn find_eligible(&self, limit: usize, now: DateTime<Utc>)
        -> StoreResult<Vec<EnrichmentRecord>>;

    async fn find_by_id(&self, product_id: Uuid) -> StoreResult<Option<EnrichmentRecord>>;

    /// Move a record to `InProgress` if it is still in `expected`.
    ///
    /// Returns the claimed record, or `StoreError::Conflict` when another
    /// worker got there first.
    async fn claim(
        &self,
        product_id: Uuid,
        expected: EnrichmentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<EnrichmentRecord>;

    /// Close an attempt. Only applies to records still `InProgress`; writes
    /// every field of the outcome or nothing.
    async fn apply_result(&self, product_id: Uuid, outcome: &RecordOutcome) -> StoreResult<()>;

    /// Return claims taken before `claimed_before` to `Pending`.
    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> StoreResult<u64>;

    /// Move records in `from` back to `Pending` and clear their error.
    ///
    /// `None` resets every record in `from`.
    async fn reset(&self, product_ids: Option<&[Uuid]>, from: EnrichmentStatus) -> StoreResult<u64>;

    async fn stats(&self) -> StoreResult<EnrichmentStats>;
}
