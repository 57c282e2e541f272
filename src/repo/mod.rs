pub mod postgres;
pub mod postgres_queries;

use crate::models;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppRepo: Send + Sync {
    async fn get_order(&self, order_id: Uuid) -> anyhow::Result<Option<models::order::Order>>;

    /// Applies the transition if the guard allows it. Returns `false` when
    /// the row was left untouched.
    async fn update_order_payment(
        &self,
        order_id: Uuid,
        transition: &models::order::OrderTransition,
    ) -> anyhow::Result<bool>;

    async fn get_order_items(&self, order_id: Uuid)
    -> anyhow::Result<Vec<models::order::OrderItem>>;

    async fn get_hall_booking(
        &self,
        booking_id: Uuid,
    ) -> anyhow::Result<Option<models::hall_booking::HallBooking>>;

    /// Applies the transition if the guard allows it. Returns `false` when
    /// the row was left untouched.
    async fn update_hall_booking_status(
        &self,
        booking_id: Uuid,
        transition: &models::hall_booking::BookingTransition,
    ) -> anyhow::Result<bool>;

    async fn get_profile(&self, user_id: Uuid)
    -> anyhow::Result<Option<models::profile::Profile>>;

    async fn is_webhook_event_processed(
        &self,
        event_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    /// Records a reconciled gateway event and prunes records older than
    /// `prune_before`.
    async fn mark_webhook_event_processed(
        &self,
        event_id: &str,
        event_type: &str,
        processed_at: DateTime<Utc>,
        prune_before: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

pub type ImplAppRepo = Box<dyn AppRepo>;
