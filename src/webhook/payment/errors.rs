use chrono::Utc;
use derive_more::{Display, Error};
use ntex::{http, web};
use serde_json::json;

use crate::{
    api::reconciliation::{ReconcileError, TargetType},
    services::RateLimitDecision,
};

#[derive(Debug, Display, Error)]
pub enum WebhookError {
    #[display("Webhook secret not configured")]
    SecretNotConfigured,
    #[display("Missing webhook headers")]
    MissingHeaders,
    #[display("Invalid timestamp")]
    InvalidTimestamp,
    #[display("Invalid signature")]
    InvalidSignature,
    #[display("Too many requests")]
    RateLimited(#[error(not(source))] RateLimitDecision),
    #[display("Invalid JSON payload")]
    MalformedPayload(#[error(not(source))] String),
    #[display("Invalid event: {_0}")]
    InvalidEvent(#[error(not(source))] String),
    #[display("{_0} not found")]
    TargetNotFound(#[error(not(source))] TargetType),
    #[display("Failed to update {_0}")]
    Persistence(#[error(not(source))] TargetType),
    #[display("Webhook processing timed out")]
    Timeout,
}

impl WebhookError {
    /// Rejections issued before the request was authenticated carry no
    /// `received` field
    pub fn is_pre_authentication(&self) -> bool {
        matches!(
            self,
            WebhookError::SecretNotConfigured
                | WebhookError::MissingHeaders
                | WebhookError::InvalidTimestamp
                | WebhookError::InvalidSignature
                | WebhookError::RateLimited(_)
        )
    }

    pub fn body(&self) -> serde_json::Value {
        if self.is_pre_authentication() {
            return json!({ "error": self.to_string() });
        }

        json!({
            "received": true,
            "processed": false,
            "error": self.to_string(),
        })
    }
}

impl From<ReconcileError> for WebhookError {
    fn from(error: ReconcileError) -> Self {
        match error {
            ReconcileError::NotFound(target_type) => WebhookError::TargetNotFound(target_type),
            ReconcileError::Persistence(target_type) => WebhookError::Persistence(target_type),
        }
    }
}

impl web::error::WebResponseError for WebhookError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        if let WebhookError::MalformedPayload(details) = self {
            logfire::warn!("Webhook payload rejected: {details}", details = details);
        }

        let mut response = web::HttpResponse::build(self.status_code());

        if let WebhookError::RateLimited(decision) = self {
            let limit = decision.limit.to_string();
            let remaining = decision.remaining.to_string();
            let reset = decision.reset_at.timestamp().to_string();
            let retry_after = decision.retry_after_secs(Utc::now()).to_string();

            response
                .set_header("X-RateLimit-Limit", limit.as_str())
                .set_header("X-RateLimit-Remaining", remaining.as_str())
                .set_header("X-RateLimit-Reset", reset.as_str())
                .set_header("Retry-After", retry_after.as_str());
        }

        response.json(&self.body())
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            WebhookError::MissingHeaders
            | WebhookError::InvalidTimestamp
            | WebhookError::InvalidSignature => http::StatusCode::UNAUTHORIZED,
            WebhookError::RateLimited(_) => http::StatusCode::TOO_MANY_REQUESTS,
            WebhookError::MalformedPayload(_) | WebhookError::InvalidEvent(_) => {
                http::StatusCode::BAD_REQUEST
            }
            WebhookError::TargetNotFound(_) => http::StatusCode::NOT_FOUND,
            WebhookError::SecretNotConfigured
            | WebhookError::Persistence(_)
            | WebhookError::Timeout => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
