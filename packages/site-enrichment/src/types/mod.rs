//! Domain types for the enrichment pipeline.

pub mod config;
pub mod domain;
pub mod metrics;
pub mod record;
pub mod report;
pub mod seo;
