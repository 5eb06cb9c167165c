use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    dtos::shipmentdtos::{
        DecideDiscountDto, DiscountListResponseDto, DiscountQueryDto, DiscountResponseDto,
    },
    error::HttpError,
    handler::shipments::page_params,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::Capability,
    AppState,
};

pub fn discount_handler() -> Router {
    Router::new()
        .route("/:id", patch(decide_discount))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::DecideDiscounts])
        }))
}

pub fn admin_discount_handler() -> Router {
    Router::new()
        .route("/discount-requests", get(get_discount_requests))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::DecideDiscounts])
        }))
}

pub async fn decide_discount(
    Path(discount_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<DecideDiscountDto>,
) -> Result<impl IntoResponse, HttpError> {
    let (discount_request, shipment) = app_state
        .discount_service
        .decide(&user.user, discount_id, body.decision)
        .await?;

    Ok(Json(DiscountResponseDto {
        status: "success".to_string(),
        discount_request,
        shipment: Some(shipment),
    }))
}

pub async fn get_discount_requests(
    Query(query_params): Query<DiscountQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;
    let (page, limit) = page_params(query_params.page, query_params.limit);

    let discount_requests = app_state
        .discount_service
        .list(query_params.status, page, limit)
        .await?;

    Ok(Json(DiscountListResponseDto {
        status: "success".to_string(),
        results: discount_requests.len(),
        discount_requests,
    }))
}
