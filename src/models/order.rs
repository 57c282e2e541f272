use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

/// Order statuses this service writes. Other values are owned by the
/// kitchen workflow and are carried around as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OrderStatus {
    #[display("confirmed")]
    Confirmed,
    #[display("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    // Checkout created, waiting for the gateway
    #[display("pending")]
    Pending,
    #[display("paid")]
    Paid,
    #[display("failed")]
    Failed,
    // Cancelled by the customer on the gateway page
    #[display("cancelled")]
    Cancelled,
    // Checkout session timed out before payment
    #[display("expired")]
    Expired,
}

impl FromStr for PaymentStatus {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub order_number: Option<String>,
    pub status: String,
    pub payment_status: Option<String>,
    pub total_amount: Decimal,
    pub user_id: Option<Uuid>,
}

impl Order {
    /// Parsed payment status, `None` when the column is empty or holds a
    /// legacy value.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment_status.as_deref()?.parse().ok()
    }

    /// Human facing reference used in emails
    pub fn reference(&self) -> String {
        self.order_number
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A conditional write against `orders`.
///
/// The update only lands when the stored payment status is not one of
/// `blocked_payment_statuses`, so replays and late events never overwrite a
/// settled order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTransition {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub blocked_payment_statuses: Vec<PaymentStatus>,
    pub notify: bool,
}

impl OrderTransition {
    pub fn is_blocked_from(&self, current: Option<PaymentStatus>) -> bool {
        current.is_some_and(|status| self.blocked_payment_statuses.contains(&status))
    }
}

/// Everything the notification service needs to send a confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub order_reference: String,
    pub total: Decimal,
    pub email: String,
    pub name: Option<String>,
    pub items: Vec<OrderItem>,
}

impl OrderConfirmation {
    pub fn subject(&self) -> String {
        format!(
            "Order Confirmation #{} - Little Latte Lane",
            self.order_reference
        )
    }

    pub fn greeting_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Valued Customer")
    }
}
