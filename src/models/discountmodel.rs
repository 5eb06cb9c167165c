use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "discount_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountStatus {
    Pending,
    Accepted,
    Rejected,
}

impl DiscountStatus {
    pub fn to_str(&self) -> &str {
        match self {
            DiscountStatus::Pending => "pending",
            DiscountStatus::Accepted => "accepted",
            DiscountStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRequest {
    pub id: i64,
    pub shipment_id: i64,
    pub customer_id: i64,
    pub request_amount: f64,
    pub status: DiscountStatus,
    pub decided_by: Option<i64>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin verdict on a pending discount request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountDecision {
    Accept,
    Reject,
}

impl DiscountDecision {
    pub fn resulting_status(&self) -> DiscountStatus {
        match self {
            DiscountDecision::Accept => DiscountStatus::Accepted,
            DiscountDecision::Reject => DiscountStatus::Rejected,
        }
    }
}
