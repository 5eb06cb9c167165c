use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde_json::json;
use validator::Validate;

use crate::{
    db::notificationdb::NotificationExt,
    dtos::{
        notificationdtos::{NotificationListResponseDto, RegisterDeviceDto},
        userdtos::{RequestQueryDto, Response},
    },
    error::{ErrorCode, HttpError},
    handler::shipments::page_params,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn notifications_handler() -> Router {
    Router::new()
        .route("/", get(get_notifications))
        .route("/read-all", patch(mark_all_read))
        .route("/:id/read", patch(mark_read))
}

pub fn devices_handler() -> Router {
    Router::new()
        .route("/", post(register_device))
        .route("/:token", delete(remove_device))
}

pub async fn get_notifications(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;
    let (page, limit) = page_params(query_params.page, query_params.limit);

    let notifications = app_state
        .db_client
        .get_notifications(user.user.id, page, limit)
        .await?;
    let unread = app_state.db_client.get_unread_count(user.user.id).await?;

    Ok(Json(NotificationListResponseDto {
        status: "success".to_string(),
        notifications,
        unread,
    }))
}

pub async fn mark_read(
    Path(notification_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .db_client
        .mark_notification_read(notification_id, user.user.id)
        .await?;

    if updated == 0 {
        return Err(HttpError::not_found(format!(
            "Notification {} not found",
            notification_id
        ))
        .with_code(ErrorCode::NotFound));
    }

    Ok(Json(Response {
        status: "success",
        message: "Notification marked as read".to_string(),
    }))
}

pub async fn mark_all_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .db_client
        .mark_all_notifications_read(user.user.id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "updated": updated,
    })))
}

pub async fn register_device(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<RegisterDeviceDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let device = app_state
        .db_client
        .register_device_token(user.user.id, body.token.trim(), body.platform)
        .await?;

    tracing::debug!("device {} registered for user {}", device.id, user.user.id);

    Ok(Json(json!({
        "status": "success",
        "data": device,
    })))
}

pub async fn remove_device(
    Path(token): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    // removing an unknown token is not an error; logout calls this blindly
    app_state
        .db_client
        .remove_device_token(user.user.id, &token)
        .await?;

    Ok(Json(Response {
        status: "success",
        message: "Device removed".to_string(),
    }))
}
