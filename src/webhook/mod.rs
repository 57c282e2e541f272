//! Webhook handlers for external integrations
//!
//! ## Modules
//!
//! - [`payment`] - Payment gateway notifications (orders and hall bookings)

pub mod payment;
pub mod routes;
