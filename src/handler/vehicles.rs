use std::sync::Arc;

use axum::{
    extract::Path,
    middleware,
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::vehicledb::VehicleExt,
    dtos::{
        userdtos::Response,
        vehicledtos::{CreateVehicleDto, UpdateVehicleDto, VehicleListResponseDto, VehicleResponseDto},
    },
    error::{ErrorCode, HttpError},
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::Capability,
    AppState,
};

pub fn vehicles_handler() -> Router {
    Router::new()
        .route("/", get(get_vehicles).post(create_vehicle))
        .route("/:id", patch(update_vehicle).delete(delete_vehicle))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::ManageVehicles])
        }))
}

fn vehicle_not_found(vehicle_id: i64) -> HttpError {
    HttpError::not_found(format!("Vehicle {} not found", vehicle_id)).with_code(ErrorCode::NotFound)
}

pub async fn create_vehicle(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateVehicleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    // duplicate registrations surface as a unique violation
    let vehicle = app_state
        .db_client
        .create_vehicle(user.user.id, &body)
        .await?;

    tracing::info!("vehicle {} registered by trucker {}", vehicle.id, user.user.id);

    Ok(Json(VehicleResponseDto {
        status: "success".to_string(),
        data: vehicle,
    }))
}

pub async fn get_vehicles(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let vehicles = app_state
        .db_client
        .get_trucker_vehicles(user.user.id)
        .await?;

    Ok(Json(VehicleListResponseDto {
        status: "success".to_string(),
        results: vehicles.len(),
        vehicles,
    }))
}

pub async fn update_vehicle(
    Path(vehicle_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateVehicleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let vehicle = app_state
        .db_client
        .update_vehicle(vehicle_id, user.user.id, &body)
        .await?
        .ok_or_else(|| vehicle_not_found(vehicle_id))?;

    Ok(Json(VehicleResponseDto {
        status: "success".to_string(),
        data: vehicle,
    }))
}

pub async fn delete_vehicle(
    Path(vehicle_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let removed = app_state
        .db_client
        .delete_vehicle(vehicle_id, user.user.id)
        .await?;

    if removed == 0 {
        return Err(vehicle_not_found(vehicle_id));
    }

    Ok(Json(Response {
        status: "success",
        message: format!("Vehicle {} deleted", vehicle_id),
    }))
}
