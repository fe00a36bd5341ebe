//! In-memory status store for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::EnrichmentStore;
use crate::types::{
    record::{EnrichmentRecord, EnrichmentStatus, RecordOutcome},
    report::EnrichmentStats,
};

/// In-memory enrichment records keyed by product id.
///
/// Not suitable for production as data is lost on restart. Every
/// mutation holds the write lock for the whole check-and-set, which gives
/// the same conditional-update semantics as the Postgres store.
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, EnrichmentRecord>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Admit a catalog product as a `Pending` record.
    pub fn admit(&self, product_id: Uuid, url: impl Into<String>, priority: Option<i64>) {
        self.records
            .write()
            .unwrap()
            .insert(product_id, EnrichmentRecord::pending(product_id, url, priority));
    }

    /// Insert or replace a record as-is.
    pub fn insert(&self, record: EnrichmentRecord) {
        self.records
            .write()
            .unwrap()
            .insert(record.product_id, record);
    }

    /// Cascade from catalog deletion.
    pub fn remove(&self, product_id: Uuid) {
        self.records.write().unwrap().remove(&product_id);
    }

    pub fn get(&self, product_id: Uuid) -> Option<EnrichmentRecord> {
        self.records.read().unwrap().get(&product_id).cloned()
    }

    pub fn all(&self) -> Vec<EnrichmentRecord> {
        self.records.read().unwrap().values().cloned().collect()
    }

    pub fn count_with_status(&self, status: EnrichmentStatus) -> usize {
        self.records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .count()
    }
}

#[async_trait]
impl EnrichmentStore for MemoryStore {
    async fn find_eligible(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<EnrichmentRecord>> {
        let records = self.records.read().unwrap();
        let mut eligible: Vec<EnrichmentRecord> = records
            .values()
            .filter(|r| r.is_eligible(now))
            .cloned()
            .collect();

        // priority DESC NULLS LAST, product_id ASC
        eligible.sort_by(|a, b| {
            b.priority
                .is_some()
                .cmp(&a.priority.is_some())
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn find_by_id(&self, product_id: Uuid) -> StoreResult<Option<EnrichmentRecord>> {
        Ok(self.get(product_id))
    }

    async fn claim(
        &self,
        product_id: Uuid,
        expected: EnrichmentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<EnrichmentRecord> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound { id: product_id })?;

        if record.status != expected || record.status == EnrichmentStatus::InProgress {
            return Err(StoreError::Conflict { id: product_id });
        }

        record.status = EnrichmentStatus::InProgress;
        record.claimed_at = Some(now);
        record.last_attempted_at = Some(now);
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn apply_result(&self, product_id: Uuid, outcome: &RecordOutcome) -> StoreResult<()> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound { id: product_id })?;

        if record.status != EnrichmentStatus::InProgress {
            return Err(StoreError::Conflict { id: product_id });
        }

        outcome.apply_to(record);
        Ok(())
    }

    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> StoreResult<u64> {
        let mut records = self.records.write().unwrap();
        let mut released = 0;
        for record in records.values_mut() {
            let stale = record.status == EnrichmentStatus::InProgress
                && record.claimed_at.is_none_or(|at| at < claimed_before);
            if stale {
                record.status = EnrichmentStatus::Pending;
                record.claimed_at = None;
                record.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn reset(
        &self,
        product_ids: Option<&[Uuid]>,
        from: EnrichmentStatus,
    ) -> StoreResult<u64> {
        let mut records = self.records.write().unwrap();
        let mut reset = 0;
        for record in records.values_mut() {
            let selected = product_ids.is_none_or(|ids| ids.contains(&record.product_id));
            if selected && record.status == from {
                record.status = EnrichmentStatus::Pending;
                record.error = None;
                record.failure_count = 0;
                record.next_attempt_at = None;
                record.updated_at = Utc::now();
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn stats(&self) -> StoreResult<EnrichmentStats> {
        let records = self.records.read().unwrap();
        let count = |status: EnrichmentStatus| records.values().filter(|r| r.status == status).count() as u64;
        let last_enriched_at = records.values().filter_map(|r| r.enriched_at).max();

        Ok(EnrichmentStats::from_counts(
            count(EnrichmentStatus::Pending),
            count(EnrichmentStatus::InProgress),
            count(EnrichmentStatus::Enriched),
            count(EnrichmentStatus::Failed),
            last_enriched_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn eligible_ordered_by_priority_then_id() {
        let store = MemoryStore::new();
        store.admit(id(1), "https://a.com", Some(500));
        store.admit(id(2), "https://b.com", Some(10));
        store.admit(id(3), "https://c.com", Some(100));

        let picked = store.find_eligible(2, Utc::now()).await.unwrap();
        let priorities: Vec<_> = picked.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![Some(500), Some(100)]);
    }

    #[tokio::test]
    async fn null_priority_sorts_last_and_ties_break_on_id() {
        let store = MemoryStore::new();
        store.admit(id(9), "https://a.com", None);
        store.admit(id(5), "https://b.com", Some(7));
        store.admit(id(4), "https://c.com", Some(7));

        let picked = store.find_eligible(10, Utc::now()).await.unwrap();
        let ids: Vec<_> = picked.iter().map(|r| r.product_id).collect();
        assert_eq!(ids, vec![id(4), id(5), id(9)]);
    }

    #[tokio::test]
    async fn terminal_records_wait_for_next_attempt() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut enriched = EnrichmentRecord::pending(id(1), "https://a.com", None);
        enriched.status = EnrichmentStatus::Enriched;
        store.insert(enriched);

        let mut failed = EnrichmentRecord::pending(id(2), "https://b.com", None);
        failed.status = EnrichmentStatus::Failed;
        failed.next_attempt_at = Some(now + Duration::seconds(30));
        store.insert(failed);

        assert!(store.find_eligible(10, now).await.unwrap().is_empty());

        let later = store
            .find_eligible(10, now + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].product_id, id(2));
    }

    #[tokio::test]
    async fn racing_claims_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.admit(id(1), "https://a.com", None);
        let now = Utc::now();

        let (a, b) = tokio::join!(
            store.claim(id(1), EnrichmentStatus::Pending, now),
            store.claim(id(1), EnrichmentStatus::Pending, now),
        );

        let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        let loser = if a.is_err() { a } else { b };
        assert!(matches!(loser, Err(StoreError::Conflict { .. })));
        assert_eq!(store.get(id(1)).unwrap().status, EnrichmentStatus::InProgress);
    }

    #[tokio::test]
    async fn apply_result_requires_claim() {
        let store = MemoryStore::new();
        store.admit(id(1), "https://a.com", None);
        let now = Utc::now();

        let outcome = RecordOutcome::Failure {
            failed_at: now,
            error: "boom".into(),
            next_attempt_at: now,
        };
        let err = store.apply_result(id(1), &outcome).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.get(id(1)).unwrap().status, EnrichmentStatus::Pending);
    }

    #[tokio::test]
    async fn stale_claims_are_released() {
        let store = MemoryStore::new();
        store.admit(id(1), "https://a.com", None);
        store.admit(id(2), "https://b.com", None);
        let now = Utc::now();

        store
            .claim(id(1), EnrichmentStatus::Pending, now - Duration::hours(1))
            .await
            .unwrap();
        store.claim(id(2), EnrichmentStatus::Pending, now).await.unwrap();

        let released = store
            .release_stale_claims(now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(released, 1);
        assert_eq!(store.get(id(1)).unwrap().status, EnrichmentStatus::Pending);
        assert_eq!(store.get(id(2)).unwrap().status, EnrichmentStatus::InProgress);
    }

    #[tokio::test]
    async fn reset_failed_only_touches_selected_failures() {
        let store = MemoryStore::new();
        for n in 1..=3 {
            let mut record = EnrichmentRecord::pending(id(n), "https://a.com", None);
            record.status = EnrichmentStatus::Failed;
            record.error = Some("timed out".into());
            record.failure_count = 2;
            store.insert(record);
        }

        let reset = store
            .reset(Some(&[id(1), id(2)]), EnrichmentStatus::Failed)
            .await
            .unwrap();
        assert_eq!(reset, 2);

        let first = store.get(id(1)).unwrap();
        assert_eq!(first.status, EnrichmentStatus::Pending);
        assert_eq!(first.error, None);
        assert_eq!(first.failure_count, 0);
        assert_eq!(store.get(id(3)).unwrap().status, EnrichmentStatus::Failed);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.failed, 1);
    }
}
