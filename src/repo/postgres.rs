use crate::models;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{AppRepo, postgres_queries};

#[derive(Clone)]
pub struct SqlxPostgresRepo {
    pub db_pool: PgPool,
}

impl FromRow<'_, PgRow> for models::order::Order {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            status: row.try_get("status")?,
            payment_status: row.try_get("payment_status")?,
            total_amount: row.try_get("total_amount")?,
            user_id: row.try_get("user_id")?,
        })
    }
}

impl FromRow<'_, PgRow> for models::order::OrderItem {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        })
    }
}

impl FromRow<'_, PgRow> for models::hall_booking::HallBooking {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            status: status.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".into(),
                source: Box::new(e),
            })?,
            applicant_email: row.try_get("applicant_email")?,
            event_date: row.try_get("event_date")?,
        })
    }
}

impl FromRow<'_, PgRow> for models::profile::Profile {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
        })
    }
}

#[async_trait]
impl AppRepo for SqlxPostgresRepo {
    async fn get_order(&self, order_id: Uuid) -> anyhow::Result<Option<models::order::Order>> {
        Ok(
            sqlx::query_as::<_, models::order::Order>(postgres_queries::QUERY_GET_ORDER)
                .bind(order_id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn update_order_payment(
        &self,
        order_id: Uuid,
        transition: &models::order::OrderTransition,
    ) -> anyhow::Result<bool> {
        let blocked_statuses: Vec<String> = transition
            .blocked_payment_statuses
            .iter()
            .map(ToString::to_string)
            .collect();

        let result = sqlx::query(postgres_queries::QUERY_UPDATE_ORDER_PAYMENT)
            .bind(order_id)
            .bind(transition.status.to_string())
            .bind(transition.payment_status.to_string())
            .bind(transition.payment_reference.as_deref())
            .bind(transition.payment_method.as_deref())
            .bind(transition.paid_at)
            .bind(Utc::now())
            .bind(blocked_statuses)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> anyhow::Result<Vec<models::order::OrderItem>> {
        Ok(
            sqlx::query_as::<_, models::order::OrderItem>(postgres_queries::QUERY_GET_ORDER_ITEMS)
                .bind(order_id)
                .fetch_all(&self.db_pool)
                .await?,
        )
    }

    async fn get_hall_booking(
        &self,
        booking_id: Uuid,
    ) -> anyhow::Result<Option<models::hall_booking::HallBooking>> {
        Ok(sqlx::query_as::<_, models::hall_booking::HallBooking>(
            postgres_queries::QUERY_GET_HALL_BOOKING,
        )
        .bind(booking_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn update_hall_booking_status(
        &self,
        booking_id: Uuid,
        transition: &models::hall_booking::BookingTransition,
    ) -> anyhow::Result<bool> {
        let allowed_from: Vec<String> = transition
            .allowed_from
            .iter()
            .map(ToString::to_string)
            .collect();

        let result = sqlx::query(postgres_queries::QUERY_UPDATE_HALL_BOOKING_STATUS)
            .bind(booking_id)
            .bind(transition.status.to_string())
            .bind(Utc::now())
            .bind(allowed_from)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_profile(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Option<models::profile::Profile>> {
        Ok(
            sqlx::query_as::<_, models::profile::Profile>(postgres_queries::QUERY_GET_PROFILE)
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn is_webhook_event_processed(
        &self,
        event_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        Ok(
            sqlx::query_scalar(postgres_queries::QUERY_IS_WEBHOOK_EVENT_PROCESSED)
                .bind(event_id)
                .bind(since)
                .fetch_one(&self.db_pool)
                .await?,
        )
    }

    async fn mark_webhook_event_processed(
        &self,
        event_id: &str,
        event_type: &str,
        processed_at: DateTime<Utc>,
        prune_before: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(postgres_queries::QUERY_PRUNE_WEBHOOK_EVENTS)
            .bind(prune_before)
            .execute(&mut *transaction)
            .await?;

        sqlx::query(postgres_queries::QUERY_INSERT_WEBHOOK_EVENT)
            .bind(event_id)
            .bind(event_type)
            .bind(processed_at)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(())
    }
}
