use chrono::NaiveDate;
use derive_more::Display;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum HallBookingStatus {
    #[display("draft")]
    Draft,
    #[display("pending_payment")]
    PendingPayment,
    // Checkout created, customer is on the gateway page
    #[display("payment_processing")]
    PaymentProcessing,
    // Paid, waiting for an admin to approve
    #[display("pending_approval")]
    PendingApproval,
    #[display("confirmed")]
    Confirmed,
    #[display("completed")]
    Completed,
    #[display("deposit_refunded")]
    DepositRefunded,
    #[display("cancelled")]
    Cancelled,
    #[display("rejected")]
    Rejected,
}

impl HallBookingStatus {
    /// States in which the booking is still waiting on the gateway
    pub const AWAITING_PAYMENT: [HallBookingStatus; 3] = [
        HallBookingStatus::Draft,
        HallBookingStatus::PendingPayment,
        HallBookingStatus::PaymentProcessing,
    ];
}

impl FromStr for HallBookingStatus {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct HallBooking {
    pub id: Uuid,
    pub status: HallBookingStatus,
    pub applicant_email: Option<String>,
    pub event_date: Option<NaiveDate>,
}

/// A conditional status write against `hall_bookings`; it only lands when
/// the stored status is one of `allowed_from`.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingTransition {
    pub status: HallBookingStatus,
    pub allowed_from: Vec<HallBookingStatus>,
}

impl BookingTransition {
    pub fn applies_to(&self, current: HallBookingStatus) -> bool {
        self.allowed_from.contains(&current)
    }
}
