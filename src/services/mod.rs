pub mod notification;
pub mod rate_limit;

use crate::models;
use async_trait::async_trait;

pub use rate_limit::{RateLimitDecision, RateLimitPreset};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends the order confirmation email. `Ok(false)` means the provider
    /// refused the message.
    async fn send_order_confirmation(
        &self,
        confirmation: &models::order::OrderConfirmation,
    ) -> anyhow::Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitService: Send + Sync {
    async fn check(&self, identifier: &str, preset: RateLimitPreset) -> RateLimitDecision;
}

pub type ImplNotificationService = Box<dyn NotificationService>;
pub type ImplRateLimitService = Box<dyn RateLimitService>;
