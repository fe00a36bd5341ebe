//! Run orchestration: worker pool, pacing and retry scheduling.

pub mod backoff;
pub mod orchestrator;
pub mod pacer;

pub use backoff::BackoffPolicy;
pub use orchestrator::Orchestrator;
pub use pacer::Pacer;
