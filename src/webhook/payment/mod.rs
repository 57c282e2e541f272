//! Payment gateway webhook integration
//!
//! ## Submodules
//!
//! - [`security`] - Signature and replay verification
//! - [`schemas`] - Event parsing and correlation id extraction
//! - [`classifier`] - Event type and status to payment outcome
//! - [`handler`] - Controller running every check and the reconciliation
//! - [`errors`] - HTTP error responses
//! - [`routes`] - HTTP endpoint handlers

pub mod classifier;
pub mod errors;
pub mod handler;
pub mod routes;
pub mod schemas;
pub mod security;

pub use routes::{receive, status};
