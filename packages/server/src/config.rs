use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use site_enrichment::{CloudflareCredentials, EnrichmentConfig, SecretString, ThumbnailSpec};

/// Where screenshots are written.
#[derive(Debug, Clone)]
pub enum ScreenshotBackend {
    /// Files under a public directory served by the app or a CDN.
    Local {
        public_dir: String,
        public_base_url: String,
    },
    /// Cloudflare R2 bucket.
    R2 { bucket: String, public_url: String },
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared secret for signed cron requests. Only the HTTP server needs it.
    pub cron_secret: Option<SecretString>,
    pub similarweb_api_url: String,
    pub similarweb_api_key: SecretString,
    pub cloudflare: CloudflareCredentials,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub screenshots: ScreenshotBackend,
    pub enrichment: EnrichmentConfig,
    /// Cron expression for in-process runs. Unset disables the scheduler.
    pub enrichment_schedule: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = EnrichmentConfig::default();
        let default_thumb = ThumbnailSpec::default();

        let thumbnail = ThumbnailSpec {
            width: parse_or("SCREENSHOT_THUMBNAIL_WIDTH", default_thumb.width)?,
            height: parse_or("SCREENSHOT_THUMBNAIL_HEIGHT", default_thumb.height)?,
            ..default_thumb
        };

        let enrichment = EnrichmentConfig::default()
            .with_concurrency(parse_or("ENRICHMENT_CONCURRENCY", defaults.concurrency)?)
            .with_request_interval(Duration::from_millis(parse_or(
                "ENRICHMENT_REQUEST_INTERVAL_MS",
                defaults.request_interval.as_millis() as u64,
            )?))
            .with_timeouts(
                Duration::from_secs(parse_or(
                    "ENRICHMENT_METRICS_TIMEOUT_SECS",
                    defaults.metrics_timeout.as_secs(),
                )?),
                Duration::from_secs(parse_or(
                    "ENRICHMENT_RENDER_TIMEOUT_SECS",
                    defaults.render_timeout.as_secs(),
                )?),
            )
            .with_max_run_duration(
                parse_opt::<u64>("ENRICHMENT_MAX_RUN_SECS")?
                    .map(Duration::from_secs)
                    .or(defaults.max_run_duration),
            )
            .with_refresh_after(refresh_after_days(parse_opt("ENRICHMENT_REFRESH_AFTER_DAYS")?)?)
            .with_thumbnail(thumbnail);

        enrichment
            .validate()
            .context("Invalid enrichment configuration")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            cron_secret: non_empty_var("CRON_SECRET").map(SecretString::from),
            similarweb_api_url: required("SIMILARWEB_API_URL")?,
            similarweb_api_key: required("SIMILARWEB_API_KEY")?.into(),
            cloudflare: CloudflareCredentials::new(
                required("CLOUDFLARE_ACCOUNT_ID")?,
                required("CLOUDFLARE_API_TOKEN")?,
            ),
            viewport_width: parse_or("SCREENSHOT_VIEWPORT_WIDTH", 1280)?,
            viewport_height: parse_or("SCREENSHOT_VIEWPORT_HEIGHT", 720)?,
            screenshots: screenshot_backend()?,
            enrichment,
            enrichment_schedule: non_empty_var("ENRICHMENT_SCHEDULE"),
        })
    }
}

fn screenshot_backend() -> Result<ScreenshotBackend> {
    let kind = env::var("SCREENSHOT_STORAGE").unwrap_or_else(|_| "local".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "local" => Ok(ScreenshotBackend::Local {
            public_dir: env::var("SCREENSHOT_PUBLIC_DIR").unwrap_or_else(|_| "public".to_string()),
            public_base_url: env::var("SCREENSHOT_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "/".to_string()),
        }),
        "r2" => Ok(ScreenshotBackend::R2 {
            bucket: required("R2_BUCKET_NAME")?,
            public_url: required("R2_PUBLIC_URL")?,
        }),
        other => bail!("SCREENSHOT_STORAGE must be 'local' or 'r2', got '{other}'"),
    }
}

fn refresh_after_days(days: Option<u64>) -> Result<Option<Duration>> {
    days.map(|days| {
        days.checked_mul(24 * 60 * 60)
            .map(Duration::from_secs)
            .context("ENRICHMENT_REFRESH_AFTER_DAYS is out of range")
    })
    .transpose()
}

fn required(name: &str) -> Result<String> {
    non_empty_var(name).with_context(|| format!("{name} must be set"))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_opt<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("{name} must be a valid number"))
        })
        .transpose()
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(name)?.unwrap_or(default))
}
