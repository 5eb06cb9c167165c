use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    pub trucker_id: i64,
    pub vehicle_type: String,
    pub registration_number: String,
    pub capacity_tons: f64,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
