//! Workflows: the definition store, derived health, the recipe engine and
//! the trigger scheduler.
//!
//! - `service` -- CRUD with naming, trigger and referential rules
//! - `health` -- green/yellow/red from the last successful run
//! - `engine` -- visits the four recipe phases
//! - `scheduler` -- `run_now` and `tick`, with ledger bookkeeping

pub mod engine;
pub mod health;
pub mod scheduler;
pub mod service;
