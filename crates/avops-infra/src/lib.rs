//! Infrastructure layer for avops.
//!
//! Contains implementations of the ports defined in `avops-core`: SQLite
//! repositories and run ledger, the local filesystem adapter, the
//! `config.toml` loader, and the zip codec for bundles.

pub mod bundle;
pub mod config;
pub mod filesystem;
pub mod sqlite;
