//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (avops-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod agent;
pub mod recipe;
pub mod workflow;
