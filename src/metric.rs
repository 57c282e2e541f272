use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("payment_webhook_statds")
        .with_description("Payment webhook statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

/// `processed`, `acknowledged`, `duplicate`, `rejected` or `failed`
pub fn incr_webhook_outcome_statds(outcome: &str) {
    incr_statds("webhook_outcome".to_string(), outcome.into())
}

pub fn incr_notification_statds(result: &str) {
    incr_statds("order_confirmation".to_string(), result.into())
}
