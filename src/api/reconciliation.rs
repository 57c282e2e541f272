//! Applies payment outcomes to orders and hall bookings.
//!
//! Planning is pure: a [`Classification`] is turned into a conditional
//! transition. Applying a transition reads the aggregate, skips the write when
//! the stored state already rules it out, and otherwise issues a guarded
//! update so concurrent deliveries cannot overwrite a settled payment.

use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{
        hall_booking::{BookingTransition, HallBookingStatus},
        order::{OrderStatus, OrderTransition, PaymentStatus},
    },
    repo,
    webhook::payment::classifier::{Classification, FailureKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[display("order")]
    Order,
    #[display("hall_booking")]
    HallBooking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationOutcome {
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub previous_status: String,
    pub new_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_payment_status: Option<String>,
    /// `false` when the stored state already made the transition a no-op
    pub applied: bool,
    pub should_notify: bool,
}

#[derive(Debug, Display, Error, PartialEq)]
pub enum ReconcileError {
    #[display("{_0} not found")]
    NotFound(#[error(not(source))] TargetType),
    #[display("{_0} could not be read or updated")]
    Persistence(#[error(not(source))] TargetType),
}

/// Transition for an order, `None` when the classification does not touch
/// orders.
pub fn plan_order_transition(
    classification: Classification,
    payment_reference: Option<&str>,
    gateway: &str,
    now: DateTime<Utc>,
) -> Option<OrderTransition> {
    let failed = |payment_status: PaymentStatus| OrderTransition {
        status: OrderStatus::Cancelled,
        payment_status,
        payment_reference: None,
        payment_method: None,
        paid_at: None,
        blocked_payment_statuses: vec![PaymentStatus::Paid, payment_status],
        notify: false,
    };

    match classification {
        Classification::Success => Some(OrderTransition {
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            payment_reference: payment_reference.map(String::from),
            payment_method: Some(gateway.to_string()),
            paid_at: Some(now),
            blocked_payment_statuses: vec![PaymentStatus::Paid],
            notify: true,
        }),
        Classification::Failure(FailureKind::Failed) => Some(failed(PaymentStatus::Failed)),
        Classification::Failure(FailureKind::Cancelled) => Some(failed(PaymentStatus::Cancelled)),
        Classification::Expired => Some(failed(PaymentStatus::Expired)),
        Classification::Unhandled => None,
    }
}

/// Transition for a hall booking. Bookings have no expired state, so only
/// success and failure move them.
pub fn plan_booking_transition(classification: Classification) -> Option<BookingTransition> {
    let status = match classification {
        Classification::Success => HallBookingStatus::PendingApproval,
        Classification::Failure(_) => HallBookingStatus::Cancelled,
        Classification::Expired | Classification::Unhandled => return None,
    };

    Some(BookingTransition {
        status,
        allowed_from: HallBookingStatus::AWAITING_PAYMENT.to_vec(),
    })
}

pub async fn reconcile_order(
    repo: &repo::ImplAppRepo,
    order_id: Uuid,
    transition: &OrderTransition,
) -> Result<ReconciliationOutcome, ReconcileError> {
    let order = repo
        .get_order(order_id)
        .await
        .map_err(|e| {
            logfire::error!(
                "failed to load order {order_id}: {error}",
                order_id = order_id.to_string(),
                error = e.to_string()
            );
            ReconcileError::Persistence(TargetType::Order)
        })?
        .ok_or(ReconcileError::NotFound(TargetType::Order))?;

    let applied = if transition.is_blocked_from(order.payment_status()) {
        logfire::info!(
            "order {order_id} already settled as {payment_status}, skipping update",
            order_id = order_id.to_string(),
            payment_status = order.payment_status.clone().unwrap_or_default()
        );
        false
    } else {
        repo.update_order_payment(order_id, transition)
            .await
            .map_err(|e| {
                logfire::error!(
                    "failed to update order {order_id}: {error}",
                    order_id = order_id.to_string(),
                    error = e.to_string()
                );
                ReconcileError::Persistence(TargetType::Order)
            })?
    };

    let (new_status, new_payment_status) = if applied {
        (
            transition.status.to_string(),
            Some(transition.payment_status.to_string()),
        )
    } else {
        (order.status.clone(), order.payment_status.clone())
    };

    Ok(ReconciliationOutcome {
        target_type: TargetType::Order,
        target_id: order_id,
        previous_status: order.status,
        new_status,
        new_payment_status,
        applied,
        should_notify: applied && transition.notify,
    })
}

pub async fn reconcile_hall_booking(
    repo: &repo::ImplAppRepo,
    booking_id: Uuid,
    transition: &BookingTransition,
) -> Result<ReconciliationOutcome, ReconcileError> {
    let booking = repo
        .get_hall_booking(booking_id)
        .await
        .map_err(|e| {
            logfire::error!(
                "failed to load hall booking {booking_id}: {error}",
                booking_id = booking_id.to_string(),
                error = e.to_string()
            );
            ReconcileError::Persistence(TargetType::HallBooking)
        })?
        .ok_or(ReconcileError::NotFound(TargetType::HallBooking))?;

    let applied = if !transition.applies_to(booking.status) {
        logfire::info!(
            "hall booking {booking_id} is {status}, skipping update",
            booking_id = booking_id.to_string(),
            status = booking.status.to_string()
        );
        false
    } else {
        repo.update_hall_booking_status(booking_id, transition)
            .await
            .map_err(|e| {
                logfire::error!(
                    "failed to update hall booking {booking_id}: {error}",
                    booking_id = booking_id.to_string(),
                    error = e.to_string()
                );
                ReconcileError::Persistence(TargetType::HallBooking)
            })?
    };

    let new_status = if applied {
        transition.status
    } else {
        booking.status
    };

    Ok(ReconciliationOutcome {
        target_type: TargetType::HallBooking,
        target_id: booking_id,
        previous_status: booking.status.to_string(),
        new_status: new_status.to_string(),
        new_payment_status: None,
        applied,
        should_notify: false,
    })
}
