use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use crate::{consts, models, utils};

const ORDER_CONFIRMATION_TEMPLATE: &str = include_str!("templates/order_confirmation.html");

/// Sends transactional email through the Resend HTTP API.
///
/// Without an API key the service runs in development mode: the rendered
/// summary is logged and the send is reported as successful.
#[derive(Clone)]
pub struct EmailNotificationHandler {
    /// 🔒 SENSITIVE
    api_key: Option<String>,
    from_email: String,
}

impl EmailNotificationHandler {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            from_email,
        }
    }
}

fn format_rands(amount: Decimal) -> String {
    format!("R{:.2}", amount)
}

/// Renders the HTML body of the order confirmation email
pub fn render_order_confirmation(
    confirmation: &models::order::OrderConfirmation,
) -> anyhow::Result<String> {
    let items: Vec<_> = confirmation
        .items
        .iter()
        .map(|item| {
            json!({
                "name": item.name,
                "quantity": item.quantity,
                "line_total": format_rands(item.line_total()),
            })
        })
        .collect();

    let context = tera::Context::from_value(json!({
        "subject": confirmation.subject(),
        "customer_name": confirmation.greeting_name(),
        "order_reference": confirmation.order_reference,
        "items": items,
        "total": format_rands(confirmation.total),
        "orders_url": consts::ORDERS_PAGE_URL,
    }))?;

    tera::Tera::one_off(ORDER_CONFIRMATION_TEMPLATE, &context, true)
        .context("order confirmation template couldnt be rendered")
}

/// Plain text version of the confirmation, used in development mode logs
pub fn order_confirmation_summary(confirmation: &models::order::OrderConfirmation) -> String {
    let items = confirmation
        .items
        .iter()
        .map(|item| {
            format!(
                "  {}x {} - {}",
                item.quantity,
                item.name,
                format_rands(item.line_total())
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Dear {name},\n\nThank you for your order at Little Latte Lane!\n\n\
         Order Number: #{reference}\nTotal Amount: {total}\n\nItems Ordered:\n{items}\n\n\
         You can track your order status at: {url}",
        name = confirmation.greeting_name(),
        reference = confirmation.order_reference,
        total = format_rands(confirmation.total),
        url = consts::ORDERS_PAGE_URL,
    )
}

#[async_trait]
impl crate::services::NotificationService for EmailNotificationHandler {
    async fn send_order_confirmation(
        &self,
        confirmation: &models::order::OrderConfirmation,
    ) -> anyhow::Result<bool> {
        let Some(api_key) = &self.api_key else {
            logfire::info!(
                "order confirmation email (development mode) to {to}: {subject}\n{content}",
                to = &confirmation.email,
                subject = confirmation.subject(),
                content = order_confirmation_summary(confirmation)
            );
            return Ok(true);
        };

        let html = render_order_confirmation(confirmation)?;

        let response = utils::REQUEST_CLIENT
            .post(consts::RESEND_EMAILS_ENDPOINT)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from_email,
                "to": confirmation.email,
                "subject": confirmation.subject(),
                "html": html,
            }))
            .send()
            .await
            .context("failed to reach the email provider")?;

        if !response.status().is_success() {
            logfire::warn!(
                "email provider rejected confirmation of order {order_id}: {status}",
                order_id = confirmation.order_id.to_string(),
                status = response.status().to_string()
            );
            return Ok(false);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::NotificationService;
    use uuid::Uuid;

    fn sample_confirmation() -> models::order::OrderConfirmation {
        models::order::OrderConfirmation {
            order_id: Uuid::new_v4(),
            order_reference: "LL-1042".into(),
            total: Decimal::new(11500, 2),
            email: "thandi@example.com".into(),
            name: Some("Thandi <Mokoena>".into()),
            items: vec![
                models::order::OrderItem {
                    name: "Cappuccino".into(),
                    quantity: 2,
                    unit_price: Decimal::new(3500, 2),
                },
                models::order::OrderItem {
                    name: "Chicken Wrap".into(),
                    quantity: 1,
                    unit_price: Decimal::new(4500, 2),
                },
            ],
        }
    }

    #[test]
    fn test_render_order_confirmation() {
        let html = render_order_confirmation(&sample_confirmation()).unwrap();

        assert!(html.contains("#LL-1042"));
        assert!(html.contains("Cappuccino"));
        assert!(html.contains("R70.00"));
        assert!(html.contains("Total: R115.00"));
        assert!(html.contains(consts::ORDERS_PAGE_URL));
        // customer supplied values are escaped
        assert!(html.contains("Thandi &lt;Mokoena&gt;"));
    }

    #[test]
    fn test_summary_falls_back_to_generic_greeting() {
        let confirmation = models::order::OrderConfirmation {
            name: None,
            ..sample_confirmation()
        };
        let summary = order_confirmation_summary(&confirmation);

        assert!(summary.starts_with("Dear Valued Customer,"));
        assert!(summary.contains("  1x Chicken Wrap - R45.00"));
        assert!(summary.contains("Total Amount: R115.00"));
    }

    #[test]
    fn test_blank_api_key_means_development_mode() {
        let handler = EmailNotificationHandler::new(Some("  ".into()), "orders@test".into());
        assert!(handler.api_key.is_none());
    }

    #[ntex::test]
    async fn test_development_mode_reports_success() {
        let handler = EmailNotificationHandler::new(None, "orders@test".into());

        let sent = handler
            .send_order_confirmation(&sample_confirmation())
            .await
            .unwrap();

        assert!(sent);
    }
}
