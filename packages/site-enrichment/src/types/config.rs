//! Configuration for the enrichment pipeline and a single run.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EnrichmentError, Result};
use crate::pipeline::backoff::BackoffPolicy;

/// Which sub-steps a run performs per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    MetricsOnly,
    ScreenshotOnly,
    #[default]
    Both,
}

impl EnrichmentMode {
    pub fn wants_metrics(&self) -> bool {
        matches!(self, EnrichmentMode::MetricsOnly | EnrichmentMode::Both)
    }

    pub fn wants_screenshot(&self) -> bool {
        matches!(self, EnrichmentMode::ScreenshotOnly | EnrichmentMode::Both)
    }
}

impl fmt::Display for EnrichmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnrichmentMode::MetricsOnly => "metrics_only",
            EnrichmentMode::ScreenshotOnly => "screenshot_only",
            EnrichmentMode::Both => "both",
        })
    }
}

impl FromStr for EnrichmentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "metrics" | "metrics_only" => Ok(EnrichmentMode::MetricsOnly),
            "screenshot" | "screenshots" | "screenshot_only" => Ok(EnrichmentMode::ScreenshotOnly),
            "both" | "full" => Ok(EnrichmentMode::Both),
            other => Err(format!(
                "unknown mode '{other}' (expected metrics, screenshot or both)"
            )),
        }
    }
}

/// Parameters of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub limit: usize,
    pub mode: EnrichmentMode,
    /// Compute everything but claim nothing, upload nothing, write nothing.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: 8,
            mode: EnrichmentMode::Both,
            dry_run: false,
        }
    }
}

impl RunOptions {
    pub fn new(limit: usize, mode: EnrichmentMode) -> Self {
        Self {
            limit,
            mode,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Thumbnail geometry and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            quality: 70,
        }
    }
}

/// Upper bound for any delay the orchestrator adds to a timestamp.
pub const MAX_SCHEDULE_HORIZON: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Orchestrator configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Worker pool size.
    pub concurrency: usize,

    /// Minimum spacing between consecutive external calls, shared by all
    /// workers. Zero disables pacing.
    pub request_interval: Duration,

    /// Hard wall-clock budget for one metrics fetch.
    pub metrics_timeout: Duration,

    /// Hard wall-clock budget for one render. Must exceed `metrics_timeout`.
    pub render_timeout: Duration,

    /// Stop dispatching new records after this long.
    pub max_run_duration: Option<Duration>,

    /// In-progress claims older than this are considered abandoned.
    pub stale_claim_after: Duration,

    /// Re-enrich successful records after this long. `None` keeps them
    /// stable until an operator resets them.
    pub refresh_after: Option<Duration>,

    pub backoff: BackoffPolicy,

    pub thumbnail: ThumbnailSpec,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            request_interval: Duration::from_millis(800),
            metrics_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(45),
            max_run_duration: Some(Duration::from_secs(55)),
            stale_claim_after: Duration::from_secs(15 * 60),
            refresh_after: None,
            backoff: BackoffPolicy::default(),
            thumbnail: ThumbnailSpec::default(),
        }
    }
}

impl EnrichmentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    pub fn with_timeouts(mut self, metrics: Duration, render: Duration) -> Self {
        self.metrics_timeout = metrics;
        self.render_timeout = render;
        self
    }

    pub fn with_max_run_duration(mut self, max: Option<Duration>) -> Self {
        self.max_run_duration = max;
        self
    }

    pub fn with_refresh_after(mut self, refresh_after: Option<Duration>) -> Self {
        self.refresh_after = refresh_after;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: ThumbnailSpec) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(EnrichmentError::Config("concurrency must be at least 1".into()));
        }
        if self.metrics_timeout.is_zero() {
            return Err(EnrichmentError::Config("metrics timeout must be positive".into()));
        }
        if self.render_timeout <= self.metrics_timeout {
            return Err(EnrichmentError::Config(format!(
                "render timeout ({:?}) must exceed metrics timeout ({:?})",
                self.render_timeout, self.metrics_timeout
            )));
        }
        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            return Err(EnrichmentError::Config("thumbnail dimensions must be positive".into()));
        }
        if !(1..=100).contains(&self.thumbnail.quality) {
            return Err(EnrichmentError::Config("thumbnail quality must be 1-100".into()));
        }
        let horizons = [
            ("refresh_after", self.refresh_after),
            ("stale_claim_after", Some(self.stale_claim_after)),
            ("backoff cap", Some(self.backoff.cap)),
        ];
        for (name, value) in horizons {
            if value.is_some_and(|d| d > MAX_SCHEDULE_HORIZON) {
                return Err(EnrichmentError::Config(format!(
                    "{name} must not exceed {} days",
                    MAX_SCHEDULE_HORIZON.as_secs() / 86_400
                )));
            }
        }
        self.backoff.validate()
    }
}
