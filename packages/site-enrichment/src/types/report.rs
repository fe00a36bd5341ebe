use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record that failed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub product_id: Uuid,
    pub domain: Option<String>,
    pub error: String,
}

/// Aggregate result of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Records processed through to a status write. Lost claims are not
    /// counted here.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Claims lost to another worker.
    pub skipped_conflict: usize,
    /// Eligible records left untouched because the run was stopped.
    pub not_dispatched: usize,
    pub failures: Vec<RecordFailure>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl RunReport {
    pub fn success_rate(&self) -> f64 {
        percent(self.succeeded as u64, self.attempted as u64)
    }

    /// Drop per-record error detail (operator did not ask for it).
    pub fn without_failures(mut self) -> Self {
        self.failures.clear();
        self
    }
}

/// Status counts across all records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub enriched: u64,
    pub failed: u64,
    pub enriched_percent: f64,
    pub failed_percent: f64,
    pub last_enriched_at: Option<DateTime<Utc>>,
}

impl EnrichmentStats {
    pub fn from_counts(
        pending: u64,
        in_progress: u64,
        enriched: u64,
        failed: u64,
        last_enriched_at: Option<DateTime<Utc>>,
    ) -> Self {
        let total = pending + in_progress + enriched + failed;
        Self {
            total,
            pending,
            in_progress,
            enriched,
            failed,
            enriched_percent: percent(enriched, total),
            failed_percent: percent(failed, total),
            last_enriched_at,
        }
    }
}

/// Percentage rounded to one decimal place.
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
