// db/clearancedb.rs
use async_trait::async_trait;

use super::db::DBClient;
use crate::{
    dtos::clearancedtos::{CreateClearanceRequestDto, CreateDocumentDto},
    models::clearancemodel::{ClearanceRequest, ClearanceStatus, Document},
};

const CLEARANCE_COLUMNS: &str = r#"
    id, user_id, shipment_id, request_type, description, status, created_at, updated_at
"#;

const DOCUMENT_COLUMNS: &str = r#"
    id, clearance_request_id, user_id, file_name, file_url, mime_type, size_bytes, created_at
"#;

#[async_trait]
pub trait ClearanceExt {
    async fn create_clearance_request(
        &self,
        user_id: i64,
        data: &CreateClearanceRequestDto,
    ) -> Result<ClearanceRequest, sqlx::Error>;

    async fn get_clearance_request(
        &self,
        request_id: i64,
    ) -> Result<Option<ClearanceRequest>, sqlx::Error>;

    /// `None` lists every request (admin view).
    async fn get_clearance_requests(
        &self,
        user_id: Option<i64>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<ClearanceRequest>, sqlx::Error>;

    async fn update_clearance_status(
        &self,
        request_id: i64,
        status: ClearanceStatus,
    ) -> Result<Option<ClearanceRequest>, sqlx::Error>;

    async fn add_document(
        &self,
        user_id: i64,
        data: &CreateDocumentDto,
    ) -> Result<Document, sqlx::Error>;

    async fn get_documents(&self, request_id: i64) -> Result<Vec<Document>, sqlx::Error>;
}

#[async_trait]
impl ClearanceExt for DBClient {
    async fn create_clearance_request(
        &self,
        user_id: i64,
        data: &CreateClearanceRequestDto,
    ) -> Result<ClearanceRequest, sqlx::Error> {
        sqlx::query_as::<_, ClearanceRequest>(&format!(
            r#"
            INSERT INTO clearance_requests (user_id, shipment_id, request_type, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CLEARANCE_COLUMNS
        ))
        .bind(user_id)
        .bind(data.shipment_id)
        .bind(data.request_type)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_clearance_request(
        &self,
        request_id: i64,
    ) -> Result<Option<ClearanceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ClearanceRequest>(&format!(
            "SELECT {} FROM clearance_requests WHERE id = $1",
            CLEARANCE_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_clearance_requests(
        &self,
        user_id: Option<i64>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<ClearanceRequest>, sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        sqlx::query_as::<_, ClearanceRequest>(&format!(
            r#"
            SELECT {} FROM clearance_requests
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            CLEARANCE_COLUMNS
        ))
        .bind(user_id)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_clearance_status(
        &self,
        request_id: i64,
        status: ClearanceStatus,
    ) -> Result<Option<ClearanceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ClearanceRequest>(&format!(
            r#"
            UPDATE clearance_requests
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CLEARANCE_COLUMNS
        ))
        .bind(request_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }

    async fn add_document(
        &self,
        user_id: i64,
        data: &CreateDocumentDto,
    ) -> Result<Document, sqlx::Error> {
        sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (clearance_request_id, user_id, file_name, file_url, mime_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(data.clearance_request_id)
        .bind(user_id)
        .bind(&data.file_name)
        .bind(&data.file_url)
        .bind(&data.mime_type)
        .bind(data.size_bytes)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_documents(&self, request_id: i64) -> Result<Vec<Document>, sqlx::Error> {
        sqlx::query_as::<_, Document>(&format!(
            r#"
            SELECT {} FROM documents
            WHERE clearance_request_id = $1
            ORDER BY created_at
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
    }
}
