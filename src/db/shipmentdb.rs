// db/shipmentdb.rs
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::db::DBClient;
use crate::{
    dtos::shipmentdtos::{AdminUpdateShipmentDto, CreateShipmentDto},
    models::{
        shipmentmodel::{Platform, Shipment, ShipmentLog, ShipmentStatus},
        usermodel::UserRole,
    },
};

pub(crate) const SHIPMENT_COLUMNS: &str = r#"
    id, customer_id, trucker_id, driver_id, vehicle_id,
    pickup_location, pickup_lat, pickup_lng,
    drop_location, drop_lat, drop_lng,
    cargo_type, cargo_weight, cargo_description, pickup_date,
    budget, total_amount, status, cancel_reason, cancelled_by, platform,
    created_at, updated_at
"#;

#[async_trait]
pub trait ShipmentExt {
    async fn create_shipment(
        &self,
        customer_id: i64,
        data: &CreateShipmentDto,
        platform: Platform,
    ) -> Result<Shipment, sqlx::Error>;

    async fn get_shipment(&self, shipment_id: i64) -> Result<Option<Shipment>, sqlx::Error>;

    async fn get_customer_shipments(
        &self,
        customer_id: i64,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error>;

    /// Shipments assigned to a trucker (as broker) or a driver.
    async fn get_carrier_shipments(
        &self,
        user_id: i64,
        role: UserRole,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error>;

    async fn get_available_shipments(
        &self,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error>;

    async fn get_all_shipments(
        &self,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error>;

    /// Claims a pending shipment for `trucker_id`. `None` means another
    /// trucker got there first or the shipment does not exist.
    async fn accept_shipment(
        &self,
        shipment_id: i64,
        trucker_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    /// Moves `from` to `to` only if the row is still in `from`.
    async fn transition_shipment(
        &self,
        shipment_id: i64,
        from: ShipmentStatus,
        to: ShipmentStatus,
        actor_id: i64,
        note: Option<String>,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    async fn cancel_shipment(
        &self,
        shipment_id: i64,
        from: ShipmentStatus,
        reason: Option<String>,
        cancelled_by: UserRole,
        actor_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    async fn admin_assign_shipment(
        &self,
        shipment_id: i64,
        trucker_id: i64,
        driver_id: Option<i64>,
        vehicle_id: Option<i64>,
        actor_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    async fn assign_driver(
        &self,
        shipment_id: i64,
        trucker_id: i64,
        driver_id: i64,
        vehicle_id: Option<i64>,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    async fn admin_update_shipment(
        &self,
        shipment_id: i64,
        data: &AdminUpdateShipmentDto,
        actor_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error>;

    async fn get_shipment_logs(&self, shipment_id: i64) -> Result<Vec<ShipmentLog>, sqlx::Error>;
}

async fn insert_log_tx(
    tx: &mut Transaction<'_, Postgres>,
    shipment_id: i64,
    actor_id: i64,
    from: Option<ShipmentStatus>,
    to: ShipmentStatus,
    note: Option<String>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO shipment_logs (shipment_id, actor_id, from_status, to_status, note)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(shipment_id)
    .bind(actor_id)
    .bind(from)
    .bind(to)
    .bind(note)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn offset(page: u32, limit: usize) -> i64 {
    (page.max(1) - 1) as i64 * limit as i64
}

#[async_trait]
impl ShipmentExt for DBClient {
    async fn create_shipment(
        &self,
        customer_id: i64,
        data: &CreateShipmentDto,
        platform: Platform,
    ) -> Result<Shipment, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let shipment = sqlx::query_as::<_, Shipment>(&format!(
            r#"
            INSERT INTO shipments (
                customer_id, pickup_location, pickup_lat, pickup_lng,
                drop_location, drop_lat, drop_lng,
                cargo_type, cargo_weight, cargo_description, pickup_date,
                budget, total_amount, platform
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12, $13)
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(customer_id)
        .bind(&data.pickup_location)
        .bind(data.pickup_lat)
        .bind(data.pickup_lng)
        .bind(&data.drop_location)
        .bind(data.drop_lat)
        .bind(data.drop_lng)
        .bind(&data.cargo_type)
        .bind(data.cargo_weight)
        .bind(&data.cargo_description)
        .bind(data.pickup_date)
        .bind(data.budget)
        .bind(platform)
        .fetch_one(&mut *tx)
        .await?;

        insert_log_tx(&mut tx, shipment.id, customer_id, None, ShipmentStatus::Pending, None).await?;

        tx.commit().await?;

        Ok(shipment)
    }

    async fn get_shipment(&self, shipment_id: i64) -> Result<Option<Shipment>, sqlx::Error> {
        sqlx::query_as::<_, Shipment>(&format!(
            "SELECT {} FROM shipments WHERE id = $1",
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_customer_shipments(
        &self,
        customer_id: i64,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error> {
        sqlx::query_as::<_, Shipment>(&format!(
            r#"
            SELECT {} FROM shipments
            WHERE customer_id = $1 AND ($2::shipment_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(customer_id)
        .bind(status)
        .bind(limit as i64)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn get_carrier_shipments(
        &self,
        user_id: i64,
        role: UserRole,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error> {
        let column = match role {
            UserRole::Driver => "driver_id",
            _ => "trucker_id",
        };

        sqlx::query_as::<_, Shipment>(&format!(
            r#"
            SELECT {} FROM shipments
            WHERE {} = $1 AND ($2::shipment_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            SHIPMENT_COLUMNS, column
        ))
        .bind(user_id)
        .bind(status)
        .bind(limit as i64)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn get_available_shipments(
        &self,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error> {
        sqlx::query_as::<_, Shipment>(&format!(
            r#"
            SELECT {} FROM shipments
            WHERE status = 'pending'
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn get_all_shipments(
        &self,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, sqlx::Error> {
        sqlx::query_as::<_, Shipment>(&format!(
            r#"
            SELECT {} FROM shipments
            WHERE ($1::shipment_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(status)
        .bind(limit as i64)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn accept_shipment(
        &self,
        shipment_id: i64,
        trucker_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // The status predicate and the write are one statement: concurrent
        // callers serialize on the row lock and only the first sees 'pending'.
        let accepted = sqlx::query_as::<_, Shipment>(&format!(
            r#"
            UPDATE shipments
            SET status = 'accepted', trucker_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(trucker_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(shipment) = accepted else {
            tx.rollback().await?;
            return Ok(None);
        };

        insert_log_tx(
            &mut tx,
            shipment.id,
            trucker_id,
            Some(ShipmentStatus::Pending),
            ShipmentStatus::Accepted,
            None,
        )
        .await?;

        tx.commit().await?;

        Ok(Some(shipment))
    }

    async fn transition_shipment(
        &self,
        shipment_id: i64,
        from: ShipmentStatus,
        to: ShipmentStatus,
        actor_id: i64,
        note: Option<String>,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Shipment>(&format!(
            r#"
            UPDATE shipments
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(shipment) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        insert_log_tx(&mut tx, shipment.id, actor_id, Some(from), to, note).await?;

        tx.commit().await?;

        Ok(Some(shipment))
    }

    async fn cancel_shipment(
        &self,
        shipment_id: i64,
        from: ShipmentStatus,
        reason: Option<String>,
        cancelled_by: UserRole,
        actor_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let cancelled = sqlx::query_as::<_, Shipment>(&format!(
            r#"
            UPDATE shipments
            SET status = 'cancelled', cancel_reason = $3, cancelled_by = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(from)
        .bind(&reason)
        .bind(cancelled_by)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(shipment) = cancelled else {
            tx.rollback().await?;
            return Ok(None);
        };

        insert_log_tx(
            &mut tx,
            shipment.id,
            actor_id,
            Some(from),
            ShipmentStatus::Cancelled,
            reason,
        )
        .await?;

        tx.commit().await?;

        Ok(Some(shipment))
    }

    async fn admin_assign_shipment(
        &self,
        shipment_id: i64,
        trucker_id: i64,
        driver_id: Option<i64>,
        vehicle_id: Option<i64>,
        actor_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<ShipmentStatus> =
            sqlx::query_scalar(r#"SELECT status FROM shipments WHERE id = $1 FOR UPDATE"#)
                .bind(shipment_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(previous) = previous else {
            tx.rollback().await?;
            return Ok(None);
        };

        let assigned = sqlx::query_as::<_, Shipment>(&format!(
            r#"
            UPDATE shipments
            SET trucker_id = $2,
                driver_id = COALESCE($3, driver_id),
                vehicle_id = COALESCE($4, vehicle_id),
                status = CASE WHEN status = 'pending' THEN 'accepted'::shipment_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(trucker_id)
        .bind(driver_id)
        .bind(vehicle_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_log_tx(
            &mut tx,
            assigned.id,
            actor_id,
            Some(previous),
            assigned.status,
            Some(format!("assigned to trucker {} by admin", trucker_id)),
        )
        .await?;

        tx.commit().await?;

        Ok(Some(assigned))
    }

    async fn assign_driver(
        &self,
        shipment_id: i64,
        trucker_id: i64,
        driver_id: i64,
        vehicle_id: Option<i64>,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        sqlx::query_as::<_, Shipment>(&format!(
            r#"
            UPDATE shipments
            SET driver_id = $3, vehicle_id = COALESCE($4, vehicle_id), updated_at = NOW()
            WHERE id = $1 AND trucker_id = $2 AND status NOT IN ('delivered', 'cancelled')
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(trucker_id)
        .bind(driver_id)
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn admin_update_shipment(
        &self,
        shipment_id: i64,
        data: &AdminUpdateShipmentDto,
        actor_id: i64,
    ) -> Result<Option<Shipment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<ShipmentStatus> =
            sqlx::query_scalar(r#"SELECT status FROM shipments WHERE id = $1 FOR UPDATE"#)
                .bind(shipment_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(previous) = previous else {
            tx.rollback().await?;
            return Ok(None);
        };

        let updated = sqlx::query_as::<_, Shipment>(&format!(
            r#"
            UPDATE shipments
            SET status = COALESCE($2, status),
                trucker_id = COALESCE($3, trucker_id),
                driver_id = COALESCE($4, driver_id),
                vehicle_id = COALESCE($5, vehicle_id),
                pickup_location = COALESCE($6, pickup_location),
                drop_location = COALESCE($7, drop_location),
                pickup_date = COALESCE($8, pickup_date),
                cargo_description = COALESCE($9, cargo_description),
                cancel_reason = COALESCE($10, cancel_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        ))
        .bind(shipment_id)
        .bind(data.status)
        .bind(data.trucker_id)
        .bind(data.driver_id)
        .bind(data.vehicle_id)
        .bind(&data.pickup_location)
        .bind(&data.drop_location)
        .bind(data.pickup_date)
        .bind(&data.cargo_description)
        .bind(&data.cancel_reason)
        .fetch_one(&mut *tx)
        .await?;

        if updated.status != previous {
            insert_log_tx(
                &mut tx,
                updated.id,
                actor_id,
                Some(previous),
                updated.status,
                Some("admin update".to_string()),
            )
            .await?;
        }

        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn get_shipment_logs(&self, shipment_id: i64) -> Result<Vec<ShipmentLog>, sqlx::Error> {
        sqlx::query_as::<_, ShipmentLog>(
            r#"
            SELECT id, shipment_id, actor_id, from_status, to_status, note, created_at
            FROM shipment_logs
            WHERE shipment_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(shipment_id)
        .fetch_all(&self.pool)
        .await
    }
}
