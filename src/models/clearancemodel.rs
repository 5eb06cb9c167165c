use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "clearance_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClearanceType {
    Import,
    Export,
    FreightForwarding,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "clearance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClearanceStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Completed,
}

impl ClearanceStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ClearanceStatus::Pending => "pending",
            ClearanceStatus::InReview => "in_review",
            ClearanceStatus::Approved => "approved",
            ClearanceStatus::Rejected => "rejected",
            ClearanceStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClearanceRequest {
    pub id: i64,
    pub user_id: i64,
    pub shipment_id: Option<i64>,
    pub request_type: ClearanceType,
    pub description: Option<String>,
    pub status: ClearanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata of an uploaded file; the bytes live with the storage provider.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub clearance_request_id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub file_url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}
