use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::clearancemodel::{ClearanceRequest, ClearanceStatus, ClearanceType, Document};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateClearanceRequestDto {
    pub shipment_id: Option<i64>,
    pub request_type: ClearanceType,

    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClearanceStatusDto {
    pub status: ClearanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDocumentDto {
    #[validate(range(min = 1, message = "Clearance request id is required"))]
    pub clearance_request_id: i64,

    #[validate(length(min = 1, max = 255, message = "File name is required"))]
    pub file_name: String,

    #[validate(url(message = "File URL is invalid"))]
    pub file_url: String,

    #[validate(length(max = 100))]
    pub mime_type: Option<String>,

    #[validate(range(min = 0, message = "Size cannot be negative"))]
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DocumentQueryDto {
    #[validate(range(min = 1))]
    pub clearance_request_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearanceResponseDto {
    pub status: String,
    pub data: ClearanceRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearanceListResponseDto {
    pub status: String,
    pub requests: Vec<ClearanceRequest>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponseDto {
    pub status: String,
    pub data: Document,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentListResponseDto {
    pub status: String,
    pub documents: Vec<Document>,
}
