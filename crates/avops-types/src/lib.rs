//! Shared domain types for avops.
//!
//! Agents, recipes, workflow definitions, runs and their ledger records,
//! bundle records and merge reports, configuration, and the error enums
//! shared by every other crate.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod agent;
pub mod bundle;
pub mod config;
pub mod error;
pub mod id;
pub mod name;
pub mod recipe;
pub mod run;
pub mod workflow;
