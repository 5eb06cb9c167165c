use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::vehiclemodel::Vehicle;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVehicleDto {
    #[validate(length(min = 1, max = 60, message = "Vehicle type is required"))]
    pub vehicle_type: String,

    #[validate(length(min = 2, max = 30, message = "Registration number is required"))]
    pub registration_number: String,

    #[validate(range(min = 0.1, max = 100.0, message = "Capacity must be between 0.1 and 100 tons"))]
    pub capacity_tons: f64,

    #[validate(length(max = 60))]
    pub make: Option<String>,

    #[validate(length(max = 60))]
    pub model: Option<String>,

    #[validate(range(min = 1950, max = 2100, message = "Year is out of range"))]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateVehicleDto {
    #[validate(length(min = 1, max = 60))]
    pub vehicle_type: Option<String>,

    #[validate(range(min = 0.1, max = 100.0, message = "Capacity must be between 0.1 and 100 tons"))]
    pub capacity_tons: Option<f64>,

    #[validate(length(max = 60))]
    pub make: Option<String>,

    #[validate(length(max = 60))]
    pub model: Option<String>,

    #[validate(range(min = 1950, max = 2100, message = "Year is out of range"))]
    pub year: Option<i32>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleResponseDto {
    pub status: String,
    pub data: Vehicle,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleListResponseDto {
    pub status: String,
    pub vehicles: Vec<Vehicle>,
    pub results: usize,
}
