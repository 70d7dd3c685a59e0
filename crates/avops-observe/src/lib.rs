//! Observability setup for avops.

pub mod tracing_setup;
