use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::HeaderMap,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    dtos::shipmentdtos::{
        AdminAssignShipmentDto, AdminUpdateShipmentDto, AssignDriverDto, CancelShipmentDto,
        CreateDiscountRequestDto, CreateShipmentDto, DiscountResponseDto, ShipmentListResponseDto,
        ShipmentLogListDto, ShipmentQueryDto, ShipmentResponseDto, UpdateShipmentStatusDto,
    },
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::{
        notificationmodel::DevicePlatform,
        shipmentmodel::{Platform, Shipment},
        usermodel::Capability,
    },
    AppState,
};

pub const DEFAULT_PAGE_LIMIT: usize = 10;

pub fn shipments_handler() -> Router {
    Router::new()
        .route(
            "/",
            post(create_shipment).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::CreateShipment])
            })),
        )
        .route("/mine", get(get_my_shipments))
        .route(
            "/available",
            get(get_available_shipments).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::AcceptShipment])
            })),
        )
        .route("/:id", get(get_shipment))
        .route("/:id/logs", get(get_shipment_logs))
        .route(
            "/:id/accept",
            post(accept_shipment).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::AcceptShipment])
            })),
        )
        .route(
            "/:id/status",
            post(update_shipment_status).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::UpdateShipmentStatus])
            })),
        )
        .route("/:id/cancel", patch(cancel_shipment))
        .route(
            "/:id/assign-driver",
            patch(assign_driver).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::AssignDriver])
            })),
        )
        .route(
            "/:id/discount-request",
            post(request_discount).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::RequestDiscount])
            })),
        )
}

pub fn admin_shipments_handler() -> Router {
    Router::new()
        .route("/shipments", get(get_all_shipments))
        .route("/shipments/:id", patch(admin_update_shipment))
        .route("/shipments/:id/assign", patch(admin_assign_shipment))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::ManageShipments])
        }))
}

/// Mobile apps send `Platform: android|ios`; anything else is the web client.
pub fn request_platform(headers: &HeaderMap) -> Platform {
    let device = headers
        .get("platform")
        .and_then(|value| value.to_str().ok())
        .and_then(DevicePlatform::from_header);

    match device {
        Some(DevicePlatform::Android) | Some(DevicePlatform::Ios) => Platform::Mobile,
        _ => Platform::Web,
    }
}

pub fn page_params(page: Option<usize>, limit: Option<usize>) -> (u32, usize) {
    (
        page.unwrap_or(1) as u32,
        limit.unwrap_or(DEFAULT_PAGE_LIMIT),
    )
}

fn shipment_response(shipment: Shipment) -> Json<ShipmentResponseDto> {
    Json(ShipmentResponseDto {
        status: "success".to_string(),
        data: shipment,
    })
}

fn shipment_list(shipments: Vec<Shipment>) -> Json<ShipmentListResponseDto> {
    Json(ShipmentListResponseDto {
        status: "success".to_string(),
        results: shipments.len(),
        shipments,
    })
}

pub async fn create_shipment(
    headers: HeaderMap,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateShipmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .create(&user.user, &body, request_platform(&headers))
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn get_my_shipments(
    Query(query_params): Query<ShipmentQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;
    let (page, limit) = page_params(query_params.page, query_params.limit);

    let shipments = app_state
        .shipment_service
        .list(&user.user, query_params.status, page, limit)
        .await?;

    Ok(shipment_list(shipments))
}

pub async fn get_available_shipments(
    Query(query_params): Query<ShipmentQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;
    let (page, limit) = page_params(query_params.page, query_params.limit);

    let shipments = app_state
        .shipment_service
        .available(&user.user, page, limit)
        .await?;

    Ok(shipment_list(shipments))
}

pub async fn get_shipment(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let shipment = app_state
        .shipment_service
        .get(&user.user, shipment_id)
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn get_shipment_logs(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let logs = app_state
        .shipment_service
        .logs(&user.user, shipment_id)
        .await?;

    Ok(Json(ShipmentLogListDto {
        status: "success".to_string(),
        logs,
    }))
}

pub async fn accept_shipment(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let shipment = app_state
        .shipment_service
        .accept(&user.user, shipment_id)
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn update_shipment_status(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateShipmentStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .update_status(&user.user, shipment_id, body)
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn cancel_shipment(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    body: Option<Json<CancelShipmentDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .cancel(&user.user, shipment_id, body.reason)
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn assign_driver(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<AssignDriverDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .assign_driver(&user.user, shipment_id, &body)
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn request_discount(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateDiscountRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let discount_request = app_state
        .discount_service
        .request(&user.user, shipment_id, body.request_amount)
        .await?;

    Ok(Json(DiscountResponseDto {
        status: "success".to_string(),
        discount_request,
        shipment: None,
    }))
}

pub async fn get_all_shipments(
    Query(query_params): Query<ShipmentQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;
    let (page, limit) = page_params(query_params.page, query_params.limit);

    // staff listing goes through the same role switch as /mine
    let shipments = app_state
        .shipment_service
        .list(&user.user, query_params.status, page, limit)
        .await?;

    Ok(shipment_list(shipments))
}

pub async fn admin_assign_shipment(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<AdminAssignShipmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .admin_assign(&user.user, shipment_id, &body)
        .await?;

    Ok(shipment_response(shipment))
}

pub async fn admin_update_shipment(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<AdminUpdateShipmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .admin_update(&user.user, shipment_id, &body)
        .await?;

    Ok(shipment_response(shipment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn platform_header_marks_mobile_shipments() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_platform(&headers), Platform::Web);

        headers.insert("platform", HeaderValue::from_static("Android"));
        assert_eq!(request_platform(&headers), Platform::Mobile);

        headers.insert("platform", HeaderValue::from_static("ios"));
        assert_eq!(request_platform(&headers), Platform::Mobile);

        headers.insert("platform", HeaderValue::from_static("web"));
        assert_eq!(request_platform(&headers), Platform::Web);
    }

    #[test]
    fn paging_defaults() {
        assert_eq!(page_params(None, None), (1, DEFAULT_PAGE_LIMIT));
        assert_eq!(page_params(Some(3), Some(25)), (3, 25));
    }
}
