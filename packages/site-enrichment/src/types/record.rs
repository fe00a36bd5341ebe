//! The persisted per-product enrichment record and the outcomes written to it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metrics::MetricsSnapshot;
use super::seo::SeoMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    InProgress,
    /// Last attempt captured everything requested. Parsed from "captured" too.
    #[serde(alias = "captured")]
    Enriched,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::InProgress => "in_progress",
            EnrichmentStatus::Enriched => "enriched",
            EnrichmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrichmentStatus::Pending),
            "in_progress" => Ok(EnrichmentStatus::InProgress),
            "enriched" | "captured" => Ok(EnrichmentStatus::Enriched),
            "failed" => Ok(EnrichmentStatus::Failed),
            other => Err(format!("unknown enrichment status: {other}")),
        }
    }
}

/// Full-size and thumbnail screenshot URLs. Only ever stored together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPair {
    pub full_url: String,
    pub thumbnail_url: String,
}

impl ArtifactPair {
    /// Rebuild a pair from nullable columns; a half-set pair is treated as absent.
    pub fn from_parts(full_url: Option<String>, thumbnail_url: Option<String>) -> Option<Self> {
        match (full_url, thumbnail_url) {
            (Some(full_url), Some(thumbnail_url)) => Some(Self {
                full_url,
                thumbnail_url,
            }),
            _ => None,
        }
    }
}

/// Enrichment state for one catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub product_id: Uuid,

    /// Projected from the catalog product.
    pub url: String,
    /// Business-value ranking (monthly visits); higher is processed first.
    pub priority: Option<i64>,

    pub status: EnrichmentStatus,
    pub enriched_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub artifacts: Option<ArtifactPair>,
    pub seo_metadata: Option<SeoMetadata>,
    pub metrics: Option<MetricsSnapshot>,

    /// Consecutive failures, reset on success.
    pub failure_count: i32,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl EnrichmentRecord {
    /// A freshly admitted record.
    pub fn pending(product_id: Uuid, url: impl Into<String>, priority: Option<i64>) -> Self {
        Self {
            product_id,
            url: url.into(),
            priority,
            status: EnrichmentStatus::Pending,
            enriched_at: None,
            captured_at: None,
            error: None,
            next_attempt_at: None,
            artifacts: None,
            seo_metadata: None,
            metrics: None,
            failure_count: 0,
            claimed_at: None,
            last_attempted_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether the orchestrator may pick this record up at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            EnrichmentStatus::Pending => true,
            EnrichmentStatus::Enriched | EnrichmentStatus::Failed => {
                self.next_attempt_at.is_some_and(|at| at <= now)
            }
            EnrichmentStatus::InProgress => false,
        }
    }
}

/// Screenshot half of a successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    pub artifacts: ArtifactPair,
    pub seo_metadata: SeoMetadata,
    pub captured_at: DateTime<Utc>,
}

/// The single write that closes an attempt.
///
/// A success only carries the parts that were requested; fields for
/// steps that did not run are left untouched by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Success {
        completed_at: DateTime<Utc>,
        metrics: Option<MetricsSnapshot>,
        capture: Option<CaptureOutcome>,
        next_attempt_at: Option<DateTime<Utc>>,
    },
    Failure {
        failed_at: DateTime<Utc>,
        error: String,
        next_attempt_at: DateTime<Utc>,
    },
}

impl RecordOutcome {
    pub fn status(&self) -> EnrichmentStatus {
        match self {
            RecordOutcome::Success { .. } => EnrichmentStatus::Enriched,
            RecordOutcome::Failure { .. } => EnrichmentStatus::Failed,
        }
    }

    /// Apply the outcome to an in-memory record.
    pub fn apply_to(&self, record: &mut EnrichmentRecord) {
        record.status = self.status();
        record.claimed_at = None;

        match self {
            RecordOutcome::Success {
                completed_at,
                metrics,
                capture,
                next_attempt_at,
            } => {
                record.enriched_at = Some(*completed_at);
                record.error = None;
                record.failure_count = 0;
                record.next_attempt_at = *next_attempt_at;
                if let Some(metrics) = metrics {
                    record.metrics = Some(metrics.clone());
                }
                if let Some(capture) = capture {
                    record.artifacts = Some(capture.artifacts.clone());
                    record.seo_metadata = Some(capture.seo_metadata.clone());
                    record.captured_at = Some(capture.captured_at);
                }
                record.updated_at = *completed_at;
            }
            RecordOutcome::Failure {
                failed_at,
                error,
                next_attempt_at,
            } => {
                record.error = Some(error.clone());
                record.failure_count += 1;
                record.next_attempt_at = Some(*next_attempt_at);
                record.updated_at = *failed_at;
            }
        }
    }
}
