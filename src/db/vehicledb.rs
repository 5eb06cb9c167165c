// db/vehicledb.rs
use async_trait::async_trait;

use super::db::DBClient;
use crate::{
    dtos::vehicledtos::{CreateVehicleDto, UpdateVehicleDto},
    models::vehiclemodel::Vehicle,
};

const VEHICLE_COLUMNS: &str = r#"
    id, trucker_id, vehicle_type, registration_number, capacity_tons,
    make, model, year, is_active, created_at, updated_at
"#;

#[async_trait]
pub trait VehicleExt {
    async fn create_vehicle(
        &self,
        trucker_id: i64,
        data: &CreateVehicleDto,
    ) -> Result<Vehicle, sqlx::Error>;

    async fn get_vehicle(&self, vehicle_id: i64) -> Result<Option<Vehicle>, sqlx::Error>;

    async fn get_trucker_vehicles(&self, trucker_id: i64) -> Result<Vec<Vehicle>, sqlx::Error>;

    async fn update_vehicle(
        &self,
        vehicle_id: i64,
        trucker_id: i64,
        data: &UpdateVehicleDto,
    ) -> Result<Option<Vehicle>, sqlx::Error>;

    async fn delete_vehicle(&self, vehicle_id: i64, trucker_id: i64) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl VehicleExt for DBClient {
    async fn create_vehicle(
        &self,
        trucker_id: i64,
        data: &CreateVehicleDto,
    ) -> Result<Vehicle, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(&format!(
            r#"
            INSERT INTO vehicles (trucker_id, vehicle_type, registration_number, capacity_tons, make, model, year)
            VALUES ($1, $2, upper($3), $4, $5, $6, $7)
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        ))
        .bind(trucker_id)
        .bind(&data.vehicle_type)
        .bind(data.registration_number.trim())
        .bind(data.capacity_tons)
        .bind(&data.make)
        .bind(&data.model)
        .bind(data.year)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_vehicle(&self, vehicle_id: i64) -> Result<Option<Vehicle>, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles WHERE id = $1",
            VEHICLE_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_trucker_vehicles(&self, trucker_id: i64) -> Result<Vec<Vehicle>, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles WHERE trucker_id = $1 ORDER BY created_at DESC",
            VEHICLE_COLUMNS
        ))
        .bind(trucker_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_vehicle(
        &self,
        vehicle_id: i64,
        trucker_id: i64,
        data: &UpdateVehicleDto,
    ) -> Result<Option<Vehicle>, sqlx::Error> {
        sqlx::query_as::<_, Vehicle>(&format!(
            r#"
            UPDATE vehicles
            SET vehicle_type = COALESCE($3, vehicle_type),
                capacity_tons = COALESCE($4, capacity_tons),
                make = COALESCE($5, make),
                model = COALESCE($6, model),
                year = COALESCE($7, year),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1 AND trucker_id = $2
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        ))
        .bind(vehicle_id)
        .bind(trucker_id)
        .bind(&data.vehicle_type)
        .bind(data.capacity_tons)
        .bind(&data.make)
        .bind(&data.model)
        .bind(data.year)
        .bind(data.is_active)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_vehicle(&self, vehicle_id: i64, trucker_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM vehicles WHERE id = $1 AND trucker_id = $2"#)
            .bind(vehicle_id)
            .bind(trucker_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
