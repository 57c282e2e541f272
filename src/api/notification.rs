use anyhow::Context;
use derive_more::Display;
use uuid::Uuid;

use crate::{models, repo, services};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NotificationDispatch {
    #[display("sent")]
    Sent,
    #[display("rejected")]
    Rejected,
    #[display("skipped_guest_order")]
    SkippedGuestOrder,
    #[display("skipped_no_email")]
    SkippedNoEmail,
}

/// Collects the order, its owner and line items, then sends the confirmation.
/// Guest orders and owners without an email are skipped.
pub async fn dispatch_order_confirmation(
    repo: &repo::ImplAppRepo,
    notification_service: &services::ImplNotificationService,
    order_id: Uuid,
) -> anyhow::Result<NotificationDispatch> {
    let order = repo
        .get_order(order_id)
        .await?
        .context("order to notify no longer exists")?;

    let Some(user_id) = order.user_id else {
        return Ok(NotificationDispatch::SkippedGuestOrder);
    };

    let Some(profile) = repo.get_profile(user_id).await? else {
        return Ok(NotificationDispatch::SkippedNoEmail);
    };
    let Some(email) = profile.contact_email() else {
        return Ok(NotificationDispatch::SkippedNoEmail);
    };

    let confirmation = models::order::OrderConfirmation {
        order_id,
        order_reference: order.reference(),
        total: order.total_amount,
        email: email.to_string(),
        name: profile.full_name.clone(),
        items: repo.get_order_items(order_id).await?,
    };

    if notification_service
        .send_order_confirmation(&confirmation)
        .await?
    {
        Ok(NotificationDispatch::Sent)
    } else {
        Ok(NotificationDispatch::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{repo::MockAppRepo, services::MockNotificationService};
    use mockall::predicate::*;
    use rust_decimal::Decimal;

    fn order(id: Uuid, user_id: Option<Uuid>) -> models::order::Order {
        models::order::Order {
            id,
            order_number: Some("LL-2001".into()),
            status: "confirmed".into(),
            payment_status: Some("paid".into()),
            total_amount: Decimal::new(6400, 2),
            user_id,
        }
    }

    #[ntex::test]
    async fn test_dispatch_sends_confirmation_to_owner() {
        let order_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_order()
            .with(eq(order_id))
            .returning(move |id| Ok(Some(order(id, Some(user_id)))));
        mock_repo
            .expect_get_profile()
            .with(eq(user_id))
            .returning(|id| {
                Ok(Some(models::profile::Profile {
                    id,
                    email: Some(" lerato@example.com ".into()),
                    full_name: Some("Lerato".into()),
                }))
            });
        mock_repo.expect_get_order_items().returning(|_| {
            Ok(vec![models::order::OrderItem {
                name: "Flat White".into(),
                quantity: 2,
                unit_price: Decimal::new(3200, 2),
            }])
        });
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let mut mock_notifier = MockNotificationService::new();
        mock_notifier
            .expect_send_order_confirmation()
            .withf(move |confirmation| {
                confirmation.order_id == order_id
                    && confirmation.email == "lerato@example.com"
                    && confirmation.order_reference == "LL-2001"
                    && confirmation.total == Decimal::new(6400, 2)
                    && confirmation.items.len() == 1
            })
            .times(1)
            .returning(|_| Ok(true));
        let mock_notifier: services::ImplNotificationService = Box::new(mock_notifier);

        let dispatch = dispatch_order_confirmation(&mock_repo, &mock_notifier, order_id)
            .await
            .unwrap();

        assert_eq!(dispatch, NotificationDispatch::Sent);
    }

    #[ntex::test]
    async fn test_dispatch_skips_guest_orders() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_order()
            .returning(|id| Ok(Some(order(id, None))));
        mock_repo.expect_get_profile().never();
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let mut mock_notifier = MockNotificationService::new();
        mock_notifier.expect_send_order_confirmation().never();
        let mock_notifier: services::ImplNotificationService = Box::new(mock_notifier);

        let dispatch = dispatch_order_confirmation(&mock_repo, &mock_notifier, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(dispatch, NotificationDispatch::SkippedGuestOrder);
    }

    #[ntex::test]
    async fn test_dispatch_skips_owner_without_email() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_order()
            .returning(|id| Ok(Some(order(id, Some(Uuid::new_v4())))));
        mock_repo.expect_get_profile().returning(|id| {
            Ok(Some(models::profile::Profile {
                id,
                email: Some("   ".into()),
                full_name: None,
            }))
        });
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let mut mock_notifier = MockNotificationService::new();
        mock_notifier.expect_send_order_confirmation().never();
        let mock_notifier: services::ImplNotificationService = Box::new(mock_notifier);

        let dispatch = dispatch_order_confirmation(&mock_repo, &mock_notifier, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(dispatch, NotificationDispatch::SkippedNoEmail);
    }

    #[ntex::test]
    async fn test_dispatch_reports_provider_rejection() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_order()
            .returning(|id| Ok(Some(order(id, Some(Uuid::new_v4())))));
        mock_repo.expect_get_profile().returning(|id| {
            Ok(Some(models::profile::Profile {
                id,
                email: Some("sipho@example.com".into()),
                full_name: None,
            }))
        });
        mock_repo.expect_get_order_items().returning(|_| Ok(vec![]));
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let mut mock_notifier = MockNotificationService::new();
        mock_notifier
            .expect_send_order_confirmation()
            .returning(|_| Ok(false));
        let mock_notifier: services::ImplNotificationService = Box::new(mock_notifier);

        let dispatch = dispatch_order_confirmation(&mock_repo, &mock_notifier, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(dispatch, NotificationDispatch::Rejected);
    }

    #[ntex::test]
    async fn test_dispatch_fails_for_missing_order() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo.expect_get_order().returning(|_| Ok(None));
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let mock_notifier: services::ImplNotificationService =
            Box::new(MockNotificationService::new());

        assert!(
            dispatch_order_confirmation(&mock_repo, &mock_notifier, Uuid::new_v4())
                .await
                .is_err()
        );
    }
}
