//! Batch enrichment of catalog products.
//!
//! A run releases abandoned claims, selects eligible records in priority
//! order and processes them on a bounded worker pool. Each record is
//! claimed, enriched under hard timeouts and closed with exactly one status
//! write. Failures never escape the record that produced them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{future, stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{EnrichmentError, FetchError, Result, StoreError};
use crate::storage::ScreenshotStorage;
use crate::traits::{
    metrics::MetricsProvider, renderer::PageRenderer, store::EnrichmentStore,
};
use crate::types::{
    config::{EnrichmentConfig, EnrichmentMode, RunOptions, MAX_SCHEDULE_HORIZON},
    domain::{normalize_domain, page_url},
    metrics::MetricsSnapshot,
    record::{CaptureOutcome, EnrichmentRecord, EnrichmentStatus, RecordOutcome},
    report::{EnrichmentStats, RecordFailure, RunReport},
};

use super::pacer::Pacer;

/// What happened to one dispatched record.
enum Processed {
    Succeeded,
    Failed {
        failure: RecordFailure,
        /// Set when the metrics provider had no data for the domain.
        unknown_domain: Option<String>,
    },
    Conflict,
}

/// Data gathered by one attempt, before it is written.
struct Attempt {
    metrics: Option<MetricsSnapshot>,
    capture: Option<CaptureOutcome>,
}

pub struct Orchestrator {
    store: Arc<dyn EnrichmentStore>,
    metrics: Arc<dyn MetricsProvider>,
    renderer: Arc<dyn PageRenderer>,
    storage: ScreenshotStorage,
    config: EnrichmentConfig,
    pacer: Pacer,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn EnrichmentStore>,
        metrics: Arc<dyn MetricsProvider>,
        renderer: Arc<dyn PageRenderer>,
        storage: ScreenshotStorage,
        config: EnrichmentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let pacer = Pacer::new(config.request_interval);
        Ok(Self {
            store,
            metrics,
            renderer,
            storage,
            config,
            pacer,
        })
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Process up to `options.limit` eligible records.
    ///
    /// Cancelling `cancel` (or hitting `max_run_duration`) stops dispatch;
    /// records already handed to a worker run to completion.
    #[instrument(skip(self, options, cancel), fields(limit = options.limit, mode = %options.mode, dry_run = options.dry_run))]
    pub async fn run(&self, options: RunOptions, cancel: CancellationToken) -> Result<RunReport> {
        let started = Instant::now();
        let deadline = self.config.max_run_duration.map(|max| started + max);

        if !options.dry_run {
            let cutoff = Utc::now() - chrono_duration(self.config.stale_claim_after);
            let released = self.store.release_stale_claims(cutoff).await?;
            if released > 0 {
                warn!(released, "Released stale in-progress claims");
            }
        }

        let records = self.store.find_eligible(options.limit, Utc::now()).await?;
        let selected = records.len();
        info!(selected, "Starting enrichment run");

        let results: Vec<Processed> = stream::iter(records)
            .take_while(|_| {
                let expired = deadline.is_some_and(|d| Instant::now() >= d);
                future::ready(!cancel.is_cancelled() && !expired)
            })
            .map(|record| self.process_record(record, options.mode, options.dry_run))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut report = RunReport {
            not_dispatched: selected - results.len(),
            dry_run: options.dry_run,
            ..Default::default()
        };
        let mut unknown_domains = Vec::new();
        for result in results {
            match result {
                Processed::Succeeded => {
                    report.attempted += 1;
                    report.succeeded += 1;
                }
                Processed::Failed {
                    failure,
                    unknown_domain,
                } => {
                    report.attempted += 1;
                    report.failed += 1;
                    report.failures.push(failure);
                    unknown_domains.extend(unknown_domain);
                }
                Processed::Conflict => report.skipped_conflict += 1,
            }
        }
        report.cancelled = report.not_dispatched > 0 || cancel.is_cancelled();

        if !options.dry_run && !unknown_domains.is_empty() {
            unknown_domains.sort();
            unknown_domains.dedup();
            match self.metrics.queue_collection(&unknown_domains).await {
                Ok(()) => debug!(count = unknown_domains.len(), "Queued unknown domains for collection"),
                Err(e) => warn!(error = %e, "Failed to queue unknown domains for collection"),
            }
        }

        report.duration = started.elapsed();
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped_conflict = report.skipped_conflict,
            not_dispatched = report.not_dispatched,
            duration_ms = report.duration.as_millis() as u64,
            "Enrichment run finished"
        );
        Ok(report)
    }

    /// Enrich a single product now, whatever its schedule.
    ///
    /// Returns the record as written. A failed attempt is still `Ok`; the
    /// record comes back `Failed` with its error. Errors are reserved for a
    /// missing product or a record that is already being processed.
    #[instrument(skip(self), fields(product_id = %product_id, mode = %mode))]
    pub async fn enrich_one(&self, product_id: Uuid, mode: EnrichmentMode) -> Result<EnrichmentRecord> {
        let record = self
            .store
            .find_by_id(product_id)
            .await?
            .ok_or(StoreError::NotFound { id: product_id })?;

        let claimed = self.store.claim(product_id, record.status, Utc::now()).await?;
        let domain = normalize_domain(&claimed.url);
        let attempt = self.attempt(&claimed, domain.as_deref(), mode, false).await;
        let outcome = self.outcome_for(&claimed, attempt.as_ref());
        self.store.apply_result(product_id, &outcome).await?;

        if let Err(e) = &attempt {
            if e.is_not_found() {
                if let Some(domain) = domain {
                    if let Err(qe) = self.metrics.queue_collection(&[domain]).await {
                        warn!(error = %qe, "Failed to queue unknown domain for collection");
                    }
                }
            }
        }

        let written = self
            .store
            .find_by_id(product_id)
            .await?
            .ok_or(StoreError::NotFound { id: product_id })?;
        Ok(written)
    }

    /// Move failed records back to pending. `None` resets all of them.
    #[instrument(skip(self))]
    pub async fn reset_failed(&self, product_ids: Option<&[Uuid]>) -> Result<u64> {
        let reset = self.store.reset(product_ids, EnrichmentStatus::Failed).await?;
        info!(reset, "Reset failed records to pending");
        Ok(reset)
    }

    pub async fn stats(&self) -> Result<EnrichmentStats> {
        Ok(self.store.stats().await?)
    }

    async fn process_record(&self, record: EnrichmentRecord, mode: EnrichmentMode, dry_run: bool) -> Processed {
        let product_id = record.product_id;
        let domain = normalize_domain(&record.url);

        let record = if dry_run {
            record
        } else {
            match self.store.claim(product_id, record.status, Utc::now()).await {
                Ok(claimed) => claimed,
                Err(StoreError::Conflict { .. }) => {
                    debug!(product_id = %product_id, "Record claimed elsewhere, skipping");
                    return Processed::Conflict;
                }
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "Failed to claim record");
                    return Processed::Failed {
                        failure: RecordFailure {
                            product_id,
                            domain,
                            error: EnrichmentError::from(e).to_string(),
                        },
                        unknown_domain: None,
                    };
                }
            }
        };

        let attempt = self.attempt(&record, domain.as_deref(), mode, dry_run).await;
        let outcome = self.outcome_for(&record, attempt.as_ref());

        if !dry_run {
            if let Err(e) = self.store.apply_result(product_id, &outcome).await {
                warn!(product_id = %product_id, error = %e, "Failed to write enrichment result");
                return Processed::Failed {
                    failure: RecordFailure {
                        product_id,
                        domain,
                        error: EnrichmentError::from(e).to_string(),
                    },
                    unknown_domain: None,
                };
            }
        }

        match attempt {
            Ok(_) => {
                debug!(product_id = %product_id, domain = domain.as_deref().unwrap_or("-"), "Record enriched");
                Processed::Succeeded
            }
            Err(e) => {
                warn!(product_id = %product_id, domain = domain.as_deref().unwrap_or("-"), error = %e, "Record enrichment failed");
                let unknown_domain = if e.is_not_found() { domain.clone() } else { None };
                Processed::Failed {
                    failure: RecordFailure {
                        product_id,
                        domain,
                        error: e.to_string(),
                    },
                    unknown_domain,
                }
            }
        }
    }

    /// Run the requested steps for one record. Nothing is written here.
    async fn attempt(
        &self,
        record: &EnrichmentRecord,
        domain: Option<&str>,
        mode: EnrichmentMode,
        dry_run: bool,
    ) -> Result<Attempt> {
        let domain = domain.ok_or_else(|| EnrichmentError::InvalidUrl(record.url.clone()))?;

        let metrics = if mode.wants_metrics() {
            self.pacer.ready().await;
            let budget = self.config.metrics_timeout;
            let fetched = tokio::time::timeout(budget, self.metrics.fetch_metrics(domain))
                .await
                .unwrap_or(Err(FetchError::Timeout { budget }))
                .map_err(EnrichmentError::Metrics)?;
            Some(fetched)
        } else {
            None
        };

        let capture = if mode.wants_screenshot() {
            let url = page_url(&record.url);
            self.pacer.ready().await;
            let budget = self.config.render_timeout;
            let page = tokio::time::timeout(budget, self.renderer.capture_full_data(&url))
                .await
                .unwrap_or(Err(FetchError::Timeout { budget }))
                .map_err(EnrichmentError::Render)?;

            if dry_run {
                None
            } else {
                let captured_at = Utc::now();
                let artifacts = self
                    .storage
                    .save_screenshot(page.screenshot, domain, captured_at)
                    .await?;
                Some(CaptureOutcome {
                    artifacts,
                    seo_metadata: page.seo,
                    captured_at,
                })
            }
        } else {
            None
        };

        Ok(Attempt { metrics, capture })
    }

    /// The status write that closes an attempt on `record`.
    fn outcome_for(&self, record: &EnrichmentRecord, attempt: std::result::Result<&Attempt, &EnrichmentError>) -> RecordOutcome {
        let now = Utc::now();
        match attempt {
            Ok(attempt) => RecordOutcome::Success {
                completed_at: now,
                metrics: attempt.metrics.clone(),
                capture: attempt.capture.clone(),
                next_attempt_at: self.config.refresh_after.map(|d| now + chrono_duration(d)),
            },
            Err(e) => {
                let failures = u32::try_from(record.failure_count.max(0)).unwrap_or(u32::MAX);
                let delay = self
                    .config
                    .backoff
                    .delay_with_retry_after(failures.saturating_add(1), e.retry_after());
                RecordOutcome::Failure {
                    failed_at: now,
                    error: e.to_string(),
                    next_attempt_at: now + chrono_duration(delay),
                }
            }
        }
    }
}

/// Validated configs never exceed the horizon; the clamp keeps date
/// arithmetic from overflowing regardless.
fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d.min(MAX_SCHEDULE_HORIZON))
        .unwrap_or_else(|_| chrono::Duration::days(3650))
}
