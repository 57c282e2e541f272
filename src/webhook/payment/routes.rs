//! Payment gateway webhook endpoints
//!
//! `POST /webhook` receives signed deliveries, `GET /webhook` is an
//! unauthenticated status probe that never exposes the secret.

use chrono::Utc;
use ntex::{util::Bytes, web};
use serde_json::json;

use super::handler;
use crate::{consts, metric, state::AppState};

fn header_value<'a>(req: &'a web::HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// Rate limit key for the caller.
///
/// Proxy headers are only honoured behind a trusted proxy, otherwise any
/// caller could pick a fresh key per request. The socket peer address is used
/// in every other case.
pub fn client_identifier(req: &web::HttpRequest, trust_proxy_headers: bool) -> String {
    let forwarded = || {
        consts::CLIENT_IP_HEADERS.iter().find_map(|name| {
            header_value(req, name)?
                .split(',')
                .next()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(String::from)
        })
    };

    let ip = trust_proxy_headers
        .then(forwarded)
        .flatten()
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    format!("ip:{ip}")
}

/// Webhook receiver endpoint (POST)
///
/// # Returns
/// - 200 with `{received, processed, ...}` once the event is handled or ignored
/// - 400 for malformed events, 401 for unauthenticated deliveries
/// - 404 when the referenced order or booking doesn't exist
/// - 429 when the caller exceeded the webhook quota
/// - 500 when the secret is missing or the update couldnt be persisted
#[web::post("")]
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<web::HttpResponse, web::Error> {
    let client_identifier = client_identifier(&req, app_state.settings.trust_proxy_headers);
    let request = handler::WebhookRequest {
        client_identifier: &client_identifier,
        signature: header_value(&req, consts::WEBHOOK_SIGNATURE_HEADER),
        webhook_id: header_value(&req, consts::WEBHOOK_ID_HEADER),
        timestamp: header_value(&req, consts::WEBHOOK_TIMESTAMP_HEADER),
        body: &body,
    };

    match handler::handle_webhook(&app_state, request).await {
        Ok(ack) => {
            metric::incr_webhook_outcome_statds(ack.label());
            Ok(web::HttpResponse::Ok().json(&ack))
        }
        Err(e) => {
            metric::incr_webhook_outcome_statds(if e.is_pre_authentication() {
                "rejected"
            } else {
                "failed"
            });
            Err(e.into())
        }
    }
}

/// Webhook status endpoint (GET)
#[web::get("")]
pub async fn status(app_state: web::types::State<AppState>) -> web::HttpResponse {
    let webhook_secret = if app_state.settings.secret.is_some() {
        "Configured"
    } else {
        "Not configured"
    };

    web::HttpResponse::Ok().json(&json!({
        "message": "Payment webhook endpoint is active",
        "timestamp": Utc::now().to_rfc3339(),
        "webhookSecret": webhook_secret,
    }))
}
