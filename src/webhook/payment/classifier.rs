//! Maps a gateway event to the payment outcome it represents.
//!
//! Documented event types are looked up exactly. Anything else goes through
//! case-sensitive substring rules on the event type and payload status, so
//! new gateway events still land somewhere sensible; those are logged as
//! warnings.
//!
//! Only an event type naming `failed` is a [`FailureKind::Failed`]; a failed
//! status on any other type counts as a cancellation.

use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FailureKind {
    #[display("failed")]
    Failed,
    #[display("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Classification {
    #[display("success")]
    Success,
    #[display("failure ({_0})")]
    Failure(FailureKind),
    #[display("expired")]
    Expired,
    #[display("unhandled")]
    Unhandled,
}

enum KnownEvent {
    Classified(Classification),
    // Outcome depends on the payload status
    ByStatus,
}

fn known_event(event_type: &str) -> Option<KnownEvent> {
    let classification = match event_type {
        "payment.succeeded"
        | "checkout.succeeded"
        | "checkout.completed"
        | "checkout.session.completed" => Classification::Success,
        "payment.failed" | "checkout.failed" => Classification::Failure(FailureKind::Failed),
        "payment.cancelled" | "checkout.cancelled" => {
            Classification::Failure(FailureKind::Cancelled)
        }
        "checkout.expired" | "checkout.session.expired" => Classification::Expired,
        "checkout.payment_received" => return Some(KnownEvent::ByStatus),
        _ => return None,
    };

    Some(KnownEvent::Classified(classification))
}

fn classify_status(status: Option<&str>) -> Classification {
    match status {
        Some("succeeded" | "completed") => Classification::Success,
        Some("failed" | "cancelled") => Classification::Failure(FailureKind::Cancelled),
        Some("expired") => Classification::Expired,
        _ => Classification::Unhandled,
    }
}

/// Substring rules, checked in order: success, failure, expired
fn classify_by_substring(event_type: &str, status: Option<&str>) -> Classification {
    let is_status = |expected: &str| status == Some(expected);

    if (event_type.contains("payment") && is_status("succeeded"))
        || (event_type.contains("checkout") && is_status("completed"))
        || event_type.contains("succeeded")
        || event_type.contains("completed")
    {
        return Classification::Success;
    }

    if event_type.contains("failed") {
        return Classification::Failure(FailureKind::Failed);
    }

    if event_type.contains("cancelled") || is_status("cancelled") || is_status("failed") {
        return Classification::Failure(FailureKind::Cancelled);
    }

    if event_type.contains("expired") || is_status("expired") {
        return Classification::Expired;
    }

    Classification::Unhandled
}

pub fn classify(event_type: &str, status: Option<&str>) -> Classification {
    match known_event(event_type) {
        Some(KnownEvent::Classified(classification)) => classification,
        Some(KnownEvent::ByStatus) => classify_status(status),
        None => {
            let classification = classify_by_substring(event_type, status);
            logfire::warn!(
                "Unknown event type {event_type} with status {status} classified as {classification}",
                event_type = event_type.to_string(),
                status = status.unwrap_or("none").to_string(),
                classification = classification.to_string()
            );
            classification
        }
    }
}
