use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::trackingdtos::{validate_latitude, validate_longitude};
use crate::models::{
    discountmodel::{DiscountDecision, DiscountRequest, DiscountStatus},
    shipmentmodel::{Platform, Shipment, ShipmentLog, ShipmentStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateShipmentDto {
    #[validate(length(min = 1, max = 255, message = "Pickup location is required"))]
    pub pickup_location: String,

    #[validate(custom = "validate_latitude")]
    pub pickup_lat: Option<f64>,

    #[validate(custom = "validate_longitude")]
    pub pickup_lng: Option<f64>,

    #[validate(length(min = 1, max = 255, message = "Drop location is required"))]
    pub drop_location: String,

    #[validate(custom = "validate_latitude")]
    pub drop_lat: Option<f64>,

    #[validate(custom = "validate_longitude")]
    pub drop_lng: Option<f64>,

    #[validate(length(min = 1, max = 80, message = "Cargo type is required"))]
    pub cargo_type: String,

    #[validate(range(min = 0.001, message = "Cargo weight must be positive"))]
    pub cargo_weight: f64,

    #[validate(length(max = 2000, message = "Cargo description is too long"))]
    pub cargo_description: Option<String>,

    pub pickup_date: Option<DateTime<Utc>>,

    #[validate(range(min = 0.0, message = "Budget cannot be negative"))]
    pub budget: f64,

    pub platform: Option<Platform>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ShipmentQueryDto {
    pub status: Option<ShipmentStatus>,
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateShipmentStatusDto {
    pub status: ShipmentStatus,

    #[validate(length(max = 500, message = "Note is too long"))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelShipmentDto {
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdminAssignShipmentDto {
    #[validate(range(min = 1, message = "Trucker id is required"))]
    pub trucker_id: i64,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignDriverDto {
    #[validate(range(min = 1, message = "Driver id is required"))]
    pub driver_id: i64,
    pub vehicle_id: Option<i64>,
}

/// Admin override; any subset of fields, no lifecycle checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AdminUpdateShipmentDto {
    pub status: Option<ShipmentStatus>,
    pub trucker_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,

    #[validate(length(min = 1, max = 255))]
    pub pickup_location: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub drop_location: Option<String>,

    pub pickup_date: Option<DateTime<Utc>>,

    #[validate(length(max = 2000))]
    pub cargo_description: Option<String>,

    #[validate(length(max = 500))]
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDiscountRequestDto {
    #[validate(range(min = 0.01, message = "Requested amount must be positive"))]
    #[serde(alias = "requestAmount")]
    pub request_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideDiscountDto {
    pub decision: DiscountDecision,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DiscountQueryDto {
    pub status: Option<DiscountStatus>,
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShipmentResponseDto {
    pub status: String,
    pub data: Shipment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShipmentListResponseDto {
    pub status: String,
    pub shipments: Vec<Shipment>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShipmentLogListDto {
    pub status: String,
    pub logs: Vec<ShipmentLog>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscountResponseDto {
    pub status: String,
    pub discount_request: DiscountRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment: Option<Shipment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscountListResponseDto {
    pub status: String,
    pub discount_requests: Vec<DiscountRequest>,
    pub results: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_dto() -> CreateShipmentDto {
        CreateShipmentDto {
            pickup_location: "Karachi Port".to_string(),
            pickup_lat: Some(24.84),
            pickup_lng: Some(66.98),
            drop_location: "Lahore Dry Port".to_string(),
            drop_lat: None,
            drop_lng: None,
            cargo_type: "containers".to_string(),
            cargo_weight: 20.0,
            cargo_description: None,
            pickup_date: None,
            budget: 10000.0,
            platform: None,
        }
    }

    #[test]
    fn valid_shipment_passes() {
        assert!(create_dto().validate().is_ok());
    }

    #[test]
    fn negative_budget_and_bad_coordinates_fail() {
        let mut dto = create_dto();
        dto.budget = -1.0;
        assert!(dto.validate().is_err());

        let mut dto = create_dto();
        dto.pickup_lat = Some(120.0);
        assert!(dto.validate().is_err());
    }

    #[test]
    fn discount_amount_must_be_positive() {
        assert!(CreateDiscountRequestDto { request_amount: 0.0 }.validate().is_err());
        assert!(CreateDiscountRequestDto { request_amount: 8000.0 }.validate().is_ok());
    }

    #[test]
    fn decision_parses_from_json() {
        let dto: DecideDiscountDto =
            serde_json::from_value(serde_json::json!({ "decision": "accept" })).unwrap();
        assert_eq!(dto.decision, DiscountDecision::Accept);
    }
}
