//! # gatehouse_core
//!
//! Authentication and authorization engine for Gatehouse: credentials,
//! signed tokens, per-app permission gates and the account workflow.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
