use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::shipmentmodel::ShipmentLocation;

pub const MAX_HISTORY_LIMIT: i64 = 500;
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

pub fn validate_latitude(value: f64) -> Result<(), validator::ValidationError> {
    if (-90.0..=90.0).contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("latitude_out_of_range"))
    }
}

pub fn validate_longitude(value: f64) -> Result<(), validator::ValidationError> {
    if (-180.0..=180.0).contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("longitude_out_of_range"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackLocationDto {
    #[validate(custom = "validate_latitude")]
    pub latitude: f64,

    #[validate(custom = "validate_longitude")]
    pub longitude: f64,

    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,

    #[validate(range(min = 0.0))]
    pub speed: Option<f64>,

    #[validate(range(min = 0.0, max = 360.0))]
    pub heading: Option<f64>,

    /// Device time of the fix; server time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct HistoryQueryDto {
    #[validate(range(min = 1, max = 500, message = "Limit must be between 1 and 500"))]
    pub limit: Option<i64>,
}

impl HistoryQueryDto {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationResponseDto {
    pub status: String,
    pub data: Option<ShipmentLocation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationHistoryResponseDto {
    pub status: String,
    pub locations: Vec<ShipmentLocation>,
    pub results: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_defaults_and_caps() {
        assert_eq!(HistoryQueryDto { limit: None }.effective_limit(), 100);
        assert_eq!(HistoryQueryDto { limit: Some(10_000) }.effective_limit(), 500);
        assert!(HistoryQueryDto { limit: Some(501) }.validate().is_err());
    }

    #[test]
    fn out_of_range_fix_is_rejected() {
        let dto = TrackLocationDto {
            latitude: 91.0,
            longitude: 67.0,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp: None,
        };
        assert!(dto.validate().is_err());
    }
}
