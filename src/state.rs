use anyhow::Context;
use chrono::TimeDelta;
use std::time::Duration;

use crate::{
    config, consts, repo,
    services::{self, RateLimitPreset},
};

/// Immutable knobs for the payment webhook, resolved once at startup
#[derive(Clone)]
pub struct WebhookSettings {
    /// 🔒 SENSITIVE
    pub secret: Option<String>,
    pub timestamp_tolerance: TimeDelta,
    pub request_timeout: Duration,
    pub notification_timeout: Duration,
    pub dedup_ttl: TimeDelta,
    pub rate_limit_preset: RateLimitPreset,
    pub gateway_name: String,
    pub trust_proxy_headers: bool,
}

fn positive(delta: Option<TimeDelta>) -> Option<TimeDelta> {
    delta.filter(|delta| *delta > TimeDelta::zero())
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl WebhookSettings {
    /// Fails on zero, negative or out of range durations
    pub fn from_config(app_config: &config::AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            secret: app_config.webhook_secret().map(String::from),
            timestamp_tolerance: positive(TimeDelta::try_seconds(
                app_config.webhook_timestamp_tolerance_secs,
            ))
            .context("WEBHOOK_TIMESTAMP_TOLERANCE_SECS must be a positive number of seconds")?,
            request_timeout: non_zero_secs(app_config.webhook_request_timeout_secs)
                .context("WEBHOOK_REQUEST_TIMEOUT_SECS must be greater than zero")?,
            notification_timeout: non_zero_secs(app_config.notification_timeout_secs)
                .context("NOTIFICATION_TIMEOUT_SECS must be greater than zero")?,
            dedup_ttl: positive(TimeDelta::try_hours(app_config.webhook_dedup_ttl_hours))
                .context("WEBHOOK_DEDUP_TTL_HOURS must be a positive number of hours")?,
            rate_limit_preset: RateLimitPreset::Webhook,
            gateway_name: consts::PAYMENT_GATEWAY_NAME.to_string(),
            trust_proxy_headers: app_config.trust_proxy_headers,
        })
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: None,
            timestamp_tolerance: TimeDelta::seconds(180),
            request_timeout: Duration::from_secs(10),
            notification_timeout: Duration::from_secs(5),
            dedup_ttl: TimeDelta::hours(24),
            rate_limit_preset: RateLimitPreset::Webhook,
            gateway_name: consts::PAYMENT_GATEWAY_NAME.to_string(),
            trust_proxy_headers: false,
        }
    }
}

pub struct AppState {
    pub repo: repo::ImplAppRepo,
    pub notification_service: services::ImplNotificationService,
    pub rate_limiter: services::ImplRateLimitService,
    pub settings: WebhookSettings,
}
