//! Trait seams between the orchestrator and the outside world.
//!
//! Applications plug in providers, a renderer, an object store and a
//! status store; the orchestrator only talks to these traits.

pub mod metrics;
pub mod object_store;
pub mod renderer;
pub mod store;
