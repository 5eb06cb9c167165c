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
    db::{clearancedb::ClearanceExt, shipmentdb::ShipmentExt},
    dtos::{
        clearancedtos::{
            ClearanceListResponseDto, ClearanceResponseDto, CreateClearanceRequestDto,
            CreateDocumentDto, DocumentListResponseDto, DocumentQueryDto, DocumentResponseDto,
            UpdateClearanceStatusDto,
        },
        userdtos::RequestQueryDto,
    },
    error::{ErrorCode, HttpError},
    handler::shipments::page_params,
    middleware::{role_check, JWTAuthMiddeware},
    models::{
        clearancemodel::ClearanceRequest,
        shipmentmodel::Shipment,
        usermodel::{Capability, User, UserRole},
    },
    service::error::ServiceError,
    AppState,
};

pub fn clearance_handler() -> Router {
    Router::new()
        .route("/", get(get_clearance_requests).post(create_clearance_request))
        .route("/:id", get(get_clearance_request))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::RequestClearance])
        }))
}

pub fn documents_handler() -> Router {
    Router::new()
        .route("/", get(get_documents).post(add_document))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::RequestClearance])
        }))
}

pub fn admin_clearance_handler() -> Router {
    Router::new()
        .route("/clearance-requests/:id/status", patch(update_clearance_status))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::ManageClearance])
        }))
}

/// Customers may only attach their own shipments.
pub fn check_clearance_shipment(user: &User, shipment: &Shipment) -> Result<(), ServiceError> {
    if user.role == UserRole::Customer && shipment.customer_id != user.id {
        return Err(ServiceError::NotShipmentParty(shipment.id));
    }
    Ok(())
}

pub fn can_view_clearance(user: &User, request: &ClearanceRequest) -> bool {
    request.user_id == user.id || user.role.can(Capability::ManageClearance)
}

fn clearance_not_found(request_id: i64) -> HttpError {
    HttpError::not_found(format!("Clearance request {} not found", request_id))
        .with_code(ErrorCode::NotFound)
}

async fn load_visible(
    app_state: &AppState,
    user: &User,
    request_id: i64,
) -> Result<ClearanceRequest, HttpError> {
    let request = app_state
        .db_client
        .get_clearance_request(request_id)
        .await?
        .ok_or_else(|| clearance_not_found(request_id))?;

    if !can_view_clearance(user, &request) {
        return Err(ServiceError::Forbidden(
            "This clearance request belongs to another user".to_string(),
        )
        .into());
    }
    Ok(request)
}

pub async fn create_clearance_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateClearanceRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    if let Some(shipment_id) = body.shipment_id {
        let shipment = app_state
            .db_client
            .get_shipment(shipment_id)
            .await?
            .ok_or(ServiceError::ShipmentNotFound(shipment_id))?;
        check_clearance_shipment(&user.user, &shipment)?;
    }

    let request = app_state
        .db_client
        .create_clearance_request(user.user.id, &body)
        .await?;

    tracing::info!(
        "clearance request {} ({:?}) opened by user {}",
        request.id,
        request.request_type,
        user.user.id
    );

    Ok(Json(ClearanceResponseDto {
        status: "success".to_string(),
        data: request,
        documents: None,
    }))
}

pub async fn get_clearance_requests(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;
    let (page, limit) = page_params(query_params.page, query_params.limit);

    let owner = if user.user.role.can(Capability::ManageClearance) {
        None
    } else {
        Some(user.user.id)
    };

    let requests = app_state
        .db_client
        .get_clearance_requests(owner, page, limit)
        .await?;

    Ok(Json(ClearanceListResponseDto {
        status: "success".to_string(),
        results: requests.len(),
        requests,
    }))
}

pub async fn get_clearance_request(
    Path(request_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let request = load_visible(&app_state, &user.user, request_id).await?;
    let documents = app_state.db_client.get_documents(request.id).await?;

    Ok(Json(ClearanceResponseDto {
        status: "success".to_string(),
        data: request,
        documents: Some(documents),
    }))
}

pub async fn update_clearance_status(
    Path(request_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateClearanceStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .db_client
        .update_clearance_status(request_id, body.status)
        .await?
        .ok_or_else(|| clearance_not_found(request_id))?;

    tracing::info!(
        "clearance request {} set to {} by admin {}",
        request.id,
        request.status.to_str(),
        user.user.id
    );
    app_state.notifications.clearance_status_changed(&request);

    Ok(Json(ClearanceResponseDto {
        status: "success".to_string(),
        data: request,
        documents: None,
    }))
}

pub async fn add_document(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateDocumentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let request = app_state
        .db_client
        .get_clearance_request(body.clearance_request_id)
        .await?
        .ok_or_else(|| clearance_not_found(body.clearance_request_id))?;

    if request.user_id != user.user.id {
        return Err(ServiceError::Forbidden(
            "Only the owner can attach documents to this request".to_string(),
        )
        .into());
    }

    let document = app_state
        .db_client
        .add_document(user.user.id, &body)
        .await?;

    Ok(Json(DocumentResponseDto {
        status: "success".to_string(),
        data: document,
    }))
}

pub async fn get_documents(
    Query(query_params): Query<DocumentQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let request = load_visible(&app_state, &user.user, query_params.clearance_request_id).await?;
    let documents = app_state.db_client.get_documents(request.id).await?;

    Ok(Json(DocumentListResponseDto {
        status: "success".to_string(),
        documents,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            clearancemodel::{ClearanceStatus, ClearanceType},
            shipmentmodel::ShipmentStatus,
        },
        service::shipment_service::tests::{shipment, user},
    };
    use chrono::Utc;

    fn request(owner: i64) -> ClearanceRequest {
        ClearanceRequest {
            id: 5,
            user_id: owner,
            shipment_id: None,
            request_type: ClearanceType::Import,
            description: None,
            status: ClearanceStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn customers_attach_only_their_shipments() {
        let s = shipment(ShipmentStatus::Pending);
        assert!(check_clearance_shipment(&user(1, UserRole::Customer), &s).is_ok());
        assert!(check_clearance_shipment(&user(9, UserRole::Customer), &s).is_err());
        assert!(check_clearance_shipment(&user(2, UserRole::Trucker), &s).is_ok());
    }

    #[test]
    fn owner_and_staff_see_a_request() {
        let r = request(1);
        assert!(can_view_clearance(&user(1, UserRole::Customer), &r));
        assert!(can_view_clearance(&user(7, UserRole::Moderator), &r));
        assert!(!can_view_clearance(&user(2, UserRole::Trucker), &r));
    }
}
