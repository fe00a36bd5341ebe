//! Site Enrichment Library
//!
//! Enriches catalog products (guest-post publishers, directories, shops)
//! with third-party traffic metrics, a screenshot plus thumbnail, and SEO
//! metadata scraped from the rendered page.
//!
//! Each product has one enrichment record moving through
//! `pending -> in_progress -> enriched | failed`. Failed records are retried
//! after an exponential backoff; enriched records stay put until they are
//! refreshed or reset.
//!
//! # Usage
//!
//! ```rust,ignore
//! use site_enrichment::{EnrichmentConfig, EnrichmentMode, MemoryStore, Orchestrator, RunOptions};
//! use site_enrichment::testing::{MockMetricsProvider, MockObjectStore, MockRenderer};
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockMetricsProvider::new()),
//!     Arc::new(MockRenderer::new()),
//!     ScreenshotStorage::new(Arc::new(MockObjectStore::new()), ThumbnailSpec::default()),
//!     EnrichmentConfig::default(),
//! )?;
//!
//! let report = orchestrator
//!     .run(RunOptions::new(8, EnrichmentMode::Both), CancellationToken::new())
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams for providers, renderer, object storage and status store
//! - [`types`] - Records, outcomes, configuration and reports
//! - [`pipeline`] - The orchestrator, backoff policy and request pacing
//! - [`providers`] - SimilarWeb metrics and Cloudflare Browser Rendering adapters
//! - [`storage`] - Screenshot + thumbnail upload to local disk or R2
//! - [`stores`] - Status store implementations (MemoryStore, PostgresStore)
//! - [`security`] - Secret handling and HMAC request signing
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod providers;
pub mod security;
pub mod storage;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

pub use error::{
    EnrichmentError, FetchError, FetchResult, Result, StorageError, StorageResult, StoreError,
    StoreResult,
};
pub use pipeline::{BackoffPolicy, Orchestrator, Pacer};
pub use providers::{BrowserRenderingProvider, SimilarWebProvider};
pub use security::{CloudflareCredentials, RequestSigner, SecretString, SignatureError};
pub use storage::{LocalObjectStore, R2ObjectStore, ScreenshotStorage};
pub use traits::{
    metrics::MetricsProvider,
    object_store::ObjectStore,
    renderer::{PageCapture, PageRenderer},
    store::EnrichmentStore,
};
pub use types::{
    config::{EnrichmentConfig, EnrichmentMode, RunOptions, ThumbnailSpec, MAX_SCHEDULE_HORIZON},
    domain::{normalize_domain, page_url, sanitize_key},
    metrics::{MetricsSnapshot, TrafficSources},
    record::{ArtifactPair, CaptureOutcome, EnrichmentRecord, EnrichmentStatus, RecordOutcome},
    report::{EnrichmentStats, RecordFailure, RunReport},
    seo::SeoMetadata,
};

pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

// Callers need the token type to cancel a run.
pub use tokio_util::sync::CancellationToken;
