//! Business logic and repository trait definitions for avops.
//!
//! This crate defines the "ports" (repository, ledger and filesystem traits)
//! that the infrastructure layer implements, plus everything that runs on
//! top of them: the workflow store, the recipe engine, the trigger
//! scheduler and the bundle layer. It depends only on `avops-types` --
//! never on `avops-infra` or any database/IO crate.

pub mod bundle;
pub mod ledger;
pub mod recipe;
pub mod repository;
pub mod service;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
