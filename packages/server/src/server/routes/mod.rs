// HTTP routes
pub mod enrichment;
pub mod health;

pub use enrichment::*;
pub use health::*;
