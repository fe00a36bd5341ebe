//! Adapters from the raw REST clients to the pipeline traits.

pub mod browser_rendering;
pub mod similarweb;

pub use browser_rendering::BrowserRenderingProvider;
pub use similarweb::SimilarWebProvider;
