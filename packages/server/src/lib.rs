// Site enrichment service - API core
//
// Hosts the enrichment pipeline behind a signed cron endpoint, an optional
// in-process schedule and the `enrich_cli` operator tool. The pipeline
// itself lives in the `site-enrichment` crate.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
