// db/discountdb.rs
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{db::DBClient, shipmentdb::SHIPMENT_COLUMNS};
use crate::models::{
    discountmodel::{DiscountRequest, DiscountStatus},
    shipmentmodel::Shipment,
};

const DISCOUNT_COLUMNS: &str = r#"
    id, shipment_id, customer_id, request_amount, status,
    decided_by, decided_at, created_at, updated_at
"#;

#[async_trait]
pub trait DiscountExt {
    async fn create_discount_request(
        &self,
        shipment_id: i64,
        customer_id: i64,
        request_amount: f64,
    ) -> Result<DiscountRequest, sqlx::Error>;

    async fn get_discount_request_for_shipment(
        &self,
        shipment_id: i64,
    ) -> Result<Option<DiscountRequest>, sqlx::Error>;

    async fn get_discount_requests(
        &self,
        status: Option<DiscountStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<DiscountRequest>, sqlx::Error>;

    /// Row-locks the request for the rest of the transaction.
    async fn lock_discount_request_tx(
        &self,
        discount_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<DiscountRequest>, sqlx::Error>;

    async fn get_shipment_tx(
        &self,
        shipment_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    /// Writes `total_amount` and nothing else on the shipment row.
    async fn set_shipment_total_amount_tx(
        &self,
        shipment_id: i64,
        total_amount: f64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<u64, sqlx::Error>;

    async fn mark_discount_decided_tx(
        &self,
        discount_id: i64,
        status: DiscountStatus,
        decided_by: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<DiscountRequest, sqlx::Error>;
}

#[async_trait]
impl DiscountExt for DBClient {
    async fn create_discount_request(
        &self,
        shipment_id: i64,
        customer_id: i64,
        request_amount: f64,
    ) -> Result<DiscountRequest, sqlx::Error> {
        sqlx::query_as::<_, DiscountRequest>(&format!(
            r#"
            INSERT INTO discount_requests (shipment_id, customer_id, request_amount)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            DISCOUNT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(customer_id)
        .bind(request_amount)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_discount_request_for_shipment(
        &self,
        shipment_id: i64,
    ) -> Result<Option<DiscountRequest>, sqlx::Error> {
        sqlx::query_as::<_, DiscountRequest>(&format!(
            "SELECT {} FROM discount_requests WHERE shipment_id = $1",
            DISCOUNT_COLUMNS
        ))
        .bind(shipment_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_discount_requests(
        &self,
        status: Option<DiscountStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<DiscountRequest>, sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        sqlx::query_as::<_, DiscountRequest>(&format!(
            r#"
            SELECT {} FROM discount_requests
            WHERE ($1::discount_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            DISCOUNT_COLUMNS
        ))
        .bind(status)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn lock_discount_request_tx(
        &self,
        discount_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<DiscountRequest>, sqlx::Error> {
        sqlx::query_as::<_, DiscountRequest>(&format!(
            "SELECT {} FROM discount_requests WHERE id = $1 FOR UPDATE",
            DISCOUNT_COLUMNS
        ))
        .bind(discount_id)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn get_shipment_tx(
        &self,
        shipment_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        sqlx::query_as::<_, Shipment>(&format!(
            "SELECT {} FROM shipments WHERE id = $1",
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn set_shipment_total_amount_tx(
        &self,
        shipment_id: i64,
        total_amount: f64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET total_amount = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(total_amount)
        .bind(shipment_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_discount_decided_tx(
        &self,
        discount_id: i64,
        status: DiscountStatus,
        decided_by: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<DiscountRequest, sqlx::Error> {
        sqlx::query_as::<_, DiscountRequest>(&format!(
            r#"
            UPDATE discount_requests
            SET status = $2, decided_by = $3, decided_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DISCOUNT_COLUMNS
        ))
        .bind(discount_id)
        .bind(status)
        .bind(decided_by)
        .fetch_one(&mut **tx)
        .await
    }
}
