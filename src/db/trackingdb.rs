// db/trackingdb.rs
use async_trait::async_trait;

use super::db::DBClient;
use crate::{dtos::trackingdtos::TrackLocationDto, models::shipmentmodel::ShipmentLocation};

const LOCATION_COLUMNS: &str = r#"
    id, shipment_id, driver_id, latitude, longitude, accuracy, speed, heading, recorded_at, created_at
"#;

#[async_trait]
pub trait TrackingExt {
    async fn add_location(
        &self,
        shipment_id: i64,
        driver_id: i64,
        ping: &TrackLocationDto,
    ) -> Result<ShipmentLocation, sqlx::Error>;

    /// Newest first.
    async fn get_location_history(
        &self,
        shipment_id: i64,
        limit: i64,
    ) -> Result<Vec<ShipmentLocation>, sqlx::Error>;

    async fn get_current_location(
        &self,
        shipment_id: i64,
    ) -> Result<Option<ShipmentLocation>, sqlx::Error>;
}

#[async_trait]
impl TrackingExt for DBClient {
    async fn add_location(
        &self,
        shipment_id: i64,
        driver_id: i64,
        ping: &TrackLocationDto,
    ) -> Result<ShipmentLocation, sqlx::Error> {
        sqlx::query_as::<_, ShipmentLocation>(&format!(
            r#"
            INSERT INTO shipment_locations
                (shipment_id, driver_id, latitude, longitude, accuracy, speed, heading, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW()))
            RETURNING {}
            "#,
            LOCATION_COLUMNS
        ))
        .bind(shipment_id)
        .bind(driver_id)
        .bind(ping.latitude)
        .bind(ping.longitude)
        .bind(ping.accuracy)
        .bind(ping.speed)
        .bind(ping.heading)
        .bind(ping.timestamp)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_location_history(
        &self,
        shipment_id: i64,
        limit: i64,
    ) -> Result<Vec<ShipmentLocation>, sqlx::Error> {
        sqlx::query_as::<_, ShipmentLocation>(&format!(
            r#"
            SELECT {} FROM shipment_locations
            WHERE shipment_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT $2
            "#,
            LOCATION_COLUMNS
        ))
        .bind(shipment_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_current_location(
        &self,
        shipment_id: i64,
    ) -> Result<Option<ShipmentLocation>, sqlx::Error> {
        sqlx::query_as::<_, ShipmentLocation>(&format!(
            r#"
            SELECT {} FROM shipment_locations
            WHERE shipment_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#,
            LOCATION_COLUMNS
        ))
        .bind(shipment_id)
        .fetch_optional(&self.pool)
        .await
    }
}
