//! Payment webhook controller.
//!
//! Order of checks: rate limit, secret, headers, timestamp, signature, event
//! parsing, de-duplication, correlation, classification, reconciliation.
//! Everything from the secret check through persistence runs under the
//! request deadline. The confirmation email is sent afterwards with its own
//! deadline and never changes the response.

use chrono::Utc;
use derive_more::Display;
use serde::Serialize;
use uuid::Uuid;

use super::{
    classifier,
    errors::WebhookError,
    schemas::{self, CorrelationTarget, EventParseError},
    security,
};
use crate::{
    api::{self, reconciliation::ReconciliationOutcome, reconciliation::TargetType},
    metric,
    state::AppState,
};

/// Inbound delivery, headers already pulled out of the HTTP request
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    pub client_identifier: &'a str,
    pub signature: Option<&'a str>,
    pub webhook_id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub body: &'a [u8],
}

/// Why an authenticated event was acknowledged without changing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum AckReason {
    #[display("no_correlation_id")]
    NoCorrelationId,
    #[display("unhandled_event_type")]
    UnhandledEventType,
    #[display("duplicate")]
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<AckReason>,
    #[serde(flatten)]
    pub outcome: Option<ReconciliationOutcome>,
}

impl WebhookAck {
    fn ignored(reason: AckReason) -> Self {
        Self {
            received: true,
            processed: false,
            reason: Some(reason),
            outcome: None,
        }
    }

    fn processed(outcome: ReconciliationOutcome) -> Self {
        Self {
            received: true,
            processed: true,
            reason: None,
            outcome: Some(outcome),
        }
    }

    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self.reason {
            _ if self.processed => "processed",
            Some(AckReason::Duplicate) => "duplicate",
            _ => "acknowledged",
        }
    }
}

#[tracing::instrument(name = "payment_webhook", skip_all)]
pub async fn handle_webhook(
    app_state: &AppState,
    request: WebhookRequest<'_>,
) -> Result<WebhookAck, WebhookError> {
    let decision = app_state
        .rate_limiter
        .check(request.client_identifier, app_state.settings.rate_limit_preset)
        .await;
    if !decision.allowed {
        logfire::warn!(
            "Webhook rate limit exceeded for {client}",
            client = request.client_identifier.to_string()
        );
        return Err(WebhookError::RateLimited(decision));
    }

    let (ack, order_to_notify) = tokio::time::timeout(
        app_state.settings.request_timeout,
        authenticate_and_reconcile(app_state, &request),
    )
    .await
    .map_err(|_| {
        logfire::error!(
            "Webhook processing exceeded {secs}s",
            secs = app_state.settings.request_timeout.as_secs().to_string()
        );
        WebhookError::Timeout
    })??;

    if let Some(order_id) = order_to_notify {
        notify_order_confirmation(app_state, order_id).await;
    }

    Ok(ack)
}

fn present(header: Option<&str>) -> Option<&str> {
    header.map(str::trim).filter(|value| !value.is_empty())
}

fn authenticate(app_state: &AppState, request: &WebhookRequest<'_>) -> Result<(), WebhookError> {
    let Some(secret) = app_state.settings.secret.as_deref() else {
        logfire::error!("Webhook secret is not configured, refusing delivery");
        return Err(WebhookError::SecretNotConfigured);
    };

    let (Some(signature), Some(webhook_id), Some(timestamp)) = (
        present(request.signature),
        present(request.webhook_id),
        present(request.timestamp),
    ) else {
        logfire::warn!("Webhook delivery without signature headers");
        return Err(WebhookError::MissingHeaders);
    };

    let headers = security::WebhookHeaders {
        webhook_id,
        timestamp,
        signature,
    };

    if !security::verify_timestamp(timestamp, app_state.settings.timestamp_tolerance, Utc::now())
    {
        logfire::warn!(
            "Webhook {webhook_id} outside the timestamp tolerance",
            webhook_id = webhook_id.to_string()
        );
        return Err(WebhookError::InvalidTimestamp);
    }

    if !security::verify_signature(&headers, request.body, secret) {
        return Err(WebhookError::InvalidSignature);
    }

    Ok(())
}

fn parse_target_id(raw_id: &str, target_type: TargetType) -> Result<Uuid, WebhookError> {
    Uuid::parse_str(raw_id).map_err(|_| {
        logfire::warn!(
            "Webhook references {target_type} {raw_id} which is not a valid id",
            target_type = target_type.to_string(),
            raw_id = raw_id.to_string()
        );
        WebhookError::TargetNotFound(target_type)
    })
}

async fn authenticate_and_reconcile(
    app_state: &AppState,
    request: &WebhookRequest<'_>,
) -> Result<(WebhookAck, Option<Uuid>), WebhookError> {
    authenticate(app_state, request)?;

    let event = schemas::parse_event(request.body).map_err(|e| match e {
        EventParseError::Malformed(details) => WebhookError::MalformedPayload(details),
        EventParseError::MissingField(field) => {
            WebhookError::InvalidEvent(format!("missing required field: {field}"))
        }
    })?;

    logfire::info!(
        "Webhook event {event_id} of type {event_type} received ({bytes} bytes): checkout {checkout_id}, status {status}, amount {amount} {currency}",
        event_id = &event.id,
        event_type = &event.event_type,
        bytes = request.body.len().to_string(),
        checkout_id = event.checkout_id().unwrap_or("-").to_string(),
        status = event.status().unwrap_or("-").to_string(),
        amount = event.amount().map(|a| a.to_string()).unwrap_or_default(),
        currency = event.currency().unwrap_or_default().to_string()
    );

    let now = Utc::now();
    let dedup_since = now - app_state.settings.dedup_ttl;
    let repo = &app_state.repo;

    match repo.is_webhook_event_processed(&event.id, dedup_since).await {
        Ok(true) => {
            logfire::info!(
                "Webhook event {event_id} already processed",
                event_id = &event.id
            );
            return Ok((WebhookAck::ignored(AckReason::Duplicate), None));
        }
        Ok(false) => {}
        Err(e) => {
            logfire::warn!(
                "Couldnt check if webhook event {event_id} was processed: {error}",
                event_id = &event.id,
                error = e.to_string()
            );
        }
    }

    let Some(target) = event.correlation_ids().and_then(|ids| ids.target()) else {
        logfire::info!(
            "Webhook event {event_id} has no order or booking reference",
            event_id = &event.id
        );
        return Ok((WebhookAck::ignored(AckReason::NoCorrelationId), None));
    };

    let classification = classifier::classify(&event.event_type, event.status());

    let outcome = match target {
        CorrelationTarget::Order(raw_id) => {
            let Some(transition) = api::reconciliation::plan_order_transition(
                classification,
                event.payment_reference(),
                &app_state.settings.gateway_name,
                now,
            ) else {
                return Ok((WebhookAck::ignored(AckReason::UnhandledEventType), None));
            };

            let order_id = parse_target_id(&raw_id, TargetType::Order)?;
            api::reconciliation::reconcile_order(repo, order_id, &transition).await?
        }
        CorrelationTarget::HallBooking(raw_id) => {
            let Some(transition) = api::reconciliation::plan_booking_transition(classification)
            else {
                return Ok((WebhookAck::ignored(AckReason::UnhandledEventType), None));
            };

            let booking_id = parse_target_id(&raw_id, TargetType::HallBooking)?;
            api::reconciliation::reconcile_hall_booking(repo, booking_id, &transition).await?
        }
    };

    logfire::info!(
        "Webhook event {event_id} reconciled {target_type} {target_id}: {previous} -> {new} (applied: {applied})",
        event_id = &event.id,
        target_type = outcome.target_type.to_string(),
        target_id = outcome.target_id.to_string(),
        previous = &outcome.previous_status,
        new = &outcome.new_status,
        applied = outcome.applied.to_string()
    );

    if let Err(e) = repo
        .mark_webhook_event_processed(&event.id, &event.event_type, now, dedup_since)
        .await
    {
        logfire::warn!(
            "Couldnt record webhook event {event_id} as processed: {error}",
            event_id = &event.id,
            error = e.to_string()
        );
    }

    let order_to_notify = outcome.should_notify.then_some(outcome.target_id);

    Ok((WebhookAck::processed(outcome), order_to_notify))
}

#[tracing::instrument(name = "order_confirmation", skip(app_state))]
async fn notify_order_confirmation(app_state: &AppState, order_id: Uuid) {
    let dispatch = tokio::time::timeout(
        app_state.settings.notification_timeout,
        api::notification::dispatch_order_confirmation(
            &app_state.repo,
            &app_state.notification_service,
            order_id,
        ),
    )
    .await;

    let label = match dispatch {
        Ok(Ok(dispatch)) => {
            logfire::info!(
                "Order {order_id} confirmation: {dispatch}",
                order_id = order_id.to_string(),
                dispatch = dispatch.to_string()
            );
            dispatch.to_string()
        }
        Ok(Err(e)) => {
            logfire::error!(
                "Failed to send order {order_id} confirmation: {error}",
                order_id = order_id.to_string(),
                error = e.to_string()
            );
            "failed".to_string()
        }
        Err(_) => {
            logfire::error!(
                "Order {order_id} confirmation timed out",
                order_id = order_id.to_string()
            );
            "timeout".to_string()
        }
    };

    metric::incr_notification_statds(&label);
}
