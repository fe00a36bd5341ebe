//! Integration tests for the Postgres-backed enrichment store.
//!
//! Run with: cargo test --test postgres_store_tests

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{create_test_product, delete_test_product, TestHarness};
use site_enrichment::testing::{MockMetricsProvider, MockObjectStore, MockRenderer};
use site_enrichment::{
    ArtifactPair, CancellationToken, CaptureOutcome, EnrichmentMode, EnrichmentStatus,
    EnrichmentStore, MetricsSnapshot, RecordOutcome, RunOptions, SeoMetadata, StoreError,
};
use test_context::test_context;
use uuid::Uuid;

fn capture(domain: &str) -> CaptureOutcome {
    CaptureOutcome {
        artifacts: ArtifactPair {
            full_url: format!("https://cdn.test/screenshots/{domain}.png"),
            thumbnail_url: format!("https://cdn.test/screenshots/{domain}-thumb.png"),
        },
        seo_metadata: SeoMetadata {
            title: Some(format!("{domain} home")),
            ..Default::default()
        },
        captured_at: Utc::now(),
    }
}

fn success(metrics: Option<MetricsSnapshot>, capture: Option<CaptureOutcome>) -> RecordOutcome {
    RecordOutcome::Success {
        completed_at: Utc::now(),
        metrics,
        capture,
        next_attempt_at: None,
    }
}

fn failure(error: &str) -> RecordOutcome {
    RecordOutcome::Failure {
        failed_at: Utc::now(),
        error: error.to_string(),
        next_attempt_at: Utc::now() + Duration::seconds(30),
    }
}

// =============================================================================
// Admission
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn inserting_a_product_admits_a_pending_record(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://example.com", Some(1_000))
        .await
        .unwrap();

    let record = store.find_by_id(id).await.unwrap().expect("record admitted");
    assert_eq!(record.status, EnrichmentStatus::Pending);
    assert_eq!(record.url, "https://example.com");
    assert_eq!(record.priority, Some(1_000));
    assert_eq!(record.failure_count, 0);
    assert!(record.artifacts.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn deleting_a_product_removes_its_record(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://gone.example", None)
        .await
        .unwrap();

    delete_test_product(&ctx.db_pool, id).await.unwrap();

    assert!(store.find_by_id(id).await.unwrap().is_none());
}

// =============================================================================
// Eligibility
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn find_eligible_orders_by_priority(ctx: &TestHarness) {
    let store = ctx.store();
    let low = create_test_product(&ctx.db_pool, "https://low.example", Some(10))
        .await
        .unwrap();
    let high = create_test_product(&ctx.db_pool, "https://high.example", Some(500))
        .await
        .unwrap();
    let mid = create_test_product(&ctx.db_pool, "https://mid.example", Some(100))
        .await
        .unwrap();
    let unranked = create_test_product(&ctx.db_pool, "https://unranked.example", None)
        .await
        .unwrap();

    let top_two: Vec<Uuid> = store
        .find_eligible(2, Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.product_id)
        .collect();
    assert_eq!(top_two, vec![high, mid]);

    let all: Vec<Uuid> = store
        .find_eligible(10, Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.product_id)
        .collect();
    assert_eq!(all, vec![high, mid, low, unranked]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn find_eligible_accepts_unbounded_limit(ctx: &TestHarness) {
    let store = ctx.store();
    for n in 0..3 {
        create_test_product(&ctx.db_pool, &format!("https://unbounded{n}.example"), Some(n))
            .await
            .unwrap();
    }

    let all = store.find_eligible(usize::MAX, Utc::now()).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn find_eligible_waits_for_next_attempt(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://retry.example", Some(1))
        .await
        .unwrap();

    store
        .claim(id, EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    assert!(store.find_eligible(10, Utc::now()).await.unwrap().is_empty());

    store.apply_result(id, &failure("metrics: boom")).await.unwrap();

    assert!(store.find_eligible(10, Utc::now()).await.unwrap().is_empty());
    let later = store
        .find_eligible(10, Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].status, EnrichmentStatus::Failed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn enriched_records_without_refresh_are_never_eligible(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://done.example", Some(1))
        .await
        .unwrap();

    store
        .claim(id, EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    store
        .apply_result(id, &success(None, Some(capture("done.example"))))
        .await
        .unwrap();

    let far_future = Utc::now() + Duration::days(3650);
    assert!(store.find_eligible(10, far_future).await.unwrap().is_empty());
}

// =============================================================================
// Claims
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn racing_claims_have_one_winner(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://race.example", Some(1))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        store.claim(id, EnrichmentStatus::Pending, Utc::now()),
        store.claim(id, EnrichmentStatus::Pending, Utc::now()),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|won| **won).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(StoreError::Conflict { id: lost }) if lost == id));

    let record = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.status, EnrichmentStatus::InProgress);
    assert!(record.claimed_at.is_some());
    assert!(record.last_attempted_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn claim_with_stale_expected_status_conflicts(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://stale.example", Some(1))
        .await
        .unwrap();

    let result = store.claim(id, EnrichmentStatus::Failed, Utc::now()).await;
    assert!(matches!(result, Err(StoreError::Conflict { .. })));

    let missing = store
        .claim(Uuid::new_v4(), EnrichmentStatus::Pending, Utc::now())
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn apply_result_requires_a_claim(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://unclaimed.example", Some(1))
        .await
        .unwrap();

    let result = store.apply_result(id, &success(None, None)).await;
    assert!(matches!(result, Err(StoreError::Conflict { .. })));

    let record = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.status, EnrichmentStatus::Pending);
}

// =============================================================================
// Outcomes
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn success_writes_metrics_and_capture(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://full.example", Some(1))
        .await
        .unwrap();
    let metrics = MetricsSnapshot::new(Utc::now()).with_monthly_visits(42_000);

    store
        .claim(id, EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    store
        .apply_result(id, &success(Some(metrics), Some(capture("full.example"))))
        .await
        .unwrap();

    let record = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.status, EnrichmentStatus::Enriched);
    assert!(record.enriched_at.is_some());
    assert!(record.captured_at.is_some());
    assert!(record.claimed_at.is_none());
    assert_eq!(record.metrics.and_then(|m| m.monthly_visits), Some(42_000));
    assert_eq!(
        record.artifacts.map(|a| a.full_url),
        Some("https://cdn.test/screenshots/full.example.png".to_string())
    );
    assert_eq!(
        record.seo_metadata.and_then(|s| s.title),
        Some("full.example home".to_string())
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn metrics_only_success_keeps_previous_capture(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://keep.example", Some(1))
        .await
        .unwrap();

    store
        .claim(id, EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    store
        .apply_result(id, &success(None, Some(capture("keep.example"))))
        .await
        .unwrap();

    store
        .claim(id, EnrichmentStatus::Enriched, Utc::now())
        .await
        .unwrap();
    let metrics = MetricsSnapshot::new(Utc::now()).with_monthly_visits(7);
    store
        .apply_result(id, &success(Some(metrics), None))
        .await
        .unwrap();

    let record = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.status, EnrichmentStatus::Enriched);
    assert!(record.artifacts.is_some());
    assert!(record.seo_metadata.is_some());
    assert_eq!(record.metrics.and_then(|m| m.monthly_visits), Some(7));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failure_keeps_artifacts_and_counts_up(ctx: &TestHarness) {
    let store = ctx.store();
    let id = create_test_product(&ctx.db_pool, "https://flaky.example", Some(1))
        .await
        .unwrap();

    store
        .claim(id, EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    store
        .apply_result(id, &success(None, Some(capture("flaky.example"))))
        .await
        .unwrap();

    for expected_count in 1..=2 {
        let current = store.find_by_id(id).await.unwrap().unwrap().status;
        store.claim(id, current, Utc::now()).await.unwrap();
        store
            .apply_result(id, &failure("render: timed out after 45s"))
            .await
            .unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.status, EnrichmentStatus::Failed);
        assert_eq!(record.failure_count, expected_count);
        assert_eq!(record.error.as_deref(), Some("render: timed out after 45s"));
        assert!(record.artifacts.is_some());
        assert!(record.next_attempt_at.is_some());
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn half_written_artifact_pair_is_rejected(ctx: &TestHarness) {
    let id = create_test_product(&ctx.db_pool, "https://half.example", Some(1))
        .await
        .unwrap();

    let result = sqlx::query(
        "UPDATE product_enrichments SET full_url = 'https://cdn.test/a.png' WHERE product_id = $1",
    )
    .bind(id)
    .execute(&ctx.db_pool)
    .await;

    let err = result.expect_err("check constraint should reject a lone full_url");
    assert!(err.to_string().contains("product_enrichments_artifact_pair"));
}

// =============================================================================
// Maintenance
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_claims_are_released(ctx: &TestHarness) {
    let store = ctx.store();
    let stale = create_test_product(&ctx.db_pool, "https://stale-claim.example", Some(2))
        .await
        .unwrap();
    let fresh = create_test_product(&ctx.db_pool, "https://fresh-claim.example", Some(1))
        .await
        .unwrap();

    store
        .claim(stale, EnrichmentStatus::Pending, Utc::now() - Duration::hours(2))
        .await
        .unwrap();
    store
        .claim(fresh, EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();

    let released = store
        .release_stale_claims(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let stale = store.find_by_id(stale).await.unwrap().unwrap();
    assert_eq!(stale.status, EnrichmentStatus::Pending);
    assert!(stale.claimed_at.is_none());
    let fresh = store.find_by_id(fresh).await.unwrap().unwrap();
    assert_eq!(fresh.status, EnrichmentStatus::InProgress);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reset_moves_selected_failures_back_to_pending(ctx: &TestHarness) {
    let store = ctx.store();
    let mut ids = Vec::new();
    for n in 0..3 {
        let id = create_test_product(&ctx.db_pool, &format!("https://fail{n}.example"), Some(n))
            .await
            .unwrap();
        store
            .claim(id, EnrichmentStatus::Pending, Utc::now())
            .await
            .unwrap();
        store.apply_result(id, &failure("metrics: boom")).await.unwrap();
        ids.push(id);
    }

    let reset = store
        .reset(Some(&ids[..1]), EnrichmentStatus::Failed)
        .await
        .unwrap();
    assert_eq!(reset, 1);

    let record = store.find_by_id(ids[0]).await.unwrap().unwrap();
    assert_eq!(record.status, EnrichmentStatus::Pending);
    assert_eq!(record.failure_count, 0);
    assert!(record.error.is_none());
    assert!(record.next_attempt_at.is_none());

    let rest = store.reset(None, EnrichmentStatus::Failed).await.unwrap();
    assert_eq!(rest, 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stats_count_every_status(ctx: &TestHarness) {
    let store = ctx.store();
    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(
            create_test_product(&ctx.db_pool, &format!("https://s{n}.example"), Some(n))
                .await
                .unwrap(),
        );
    }

    store
        .claim(ids[0], EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    store
        .apply_result(ids[0], &success(None, Some(capture("s0.example"))))
        .await
        .unwrap();
    store
        .claim(ids[1], EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();
    store.apply_result(ids[1], &failure("metrics: boom")).await.unwrap();
    store
        .claim(ids[2], EnrichmentStatus::Pending, Utc::now())
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.enriched, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.enriched_percent, 25.0);
    assert!(stats.last_enriched_at.is_some());
}

// =============================================================================
// Orchestrator over Postgres
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn run_leaves_no_claims_behind(ctx: &TestHarness) {
    let store = ctx.store();
    for (n, visits) in [500, 10, 100].into_iter().enumerate() {
        create_test_product(&ctx.db_pool, &format!("https://site{n}.example"), Some(visits))
            .await
            .unwrap();
    }

    let renderer = Arc::new(MockRenderer::new());
    let objects = Arc::new(MockObjectStore::new());
    let orchestrator = ctx.orchestrator(
        Arc::new(MockMetricsProvider::new()),
        renderer.clone(),
        objects.clone(),
    );

    let report = orchestrator
        .run(RunOptions::new(2, EnrichmentMode::Both), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(
        renderer.calls().len(),
        2,
        "only the two highest-priority products are rendered"
    );
    assert_eq!(objects.len(), 4);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.in_progress, 0);
    assert_eq!(stats.enriched, 2);
    assert_eq!(stats.pending, 1);

    let second = orchestrator
        .run(RunOptions::new(2, EnrichmentMode::Both), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.attempted, 1);
    assert_eq!(store.stats().await.unwrap().enriched, 3);
}
