//! # API Module
//!
//! Business logic behind the payment webhook. Nothing here knows about HTTP.
//!
//! ## Modules
//!
//! - [`reconciliation`] - Order and hall booking state transitions
//! - [`notification`] - Order confirmation dispatch after a successful payment

pub mod notification;
pub mod reconciliation;
