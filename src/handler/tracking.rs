use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::trackingdb::TrackingExt,
    dtos::trackingdtos::{
        HistoryQueryDto, LocationHistoryResponseDto, LocationResponseDto, TrackLocationDto,
    },
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::{
        shipmentmodel::Shipment,
        usermodel::{Capability, User},
    },
    service::error::ServiceError,
    AppState,
};

/// Mounted under `/shipments` next to the shipment routes.
pub fn tracking_handler() -> Router {
    Router::new()
        .route(
            "/:id/track",
            post(track_location).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![Capability::TrackShipment])
            })),
        )
        .route("/:id/history", get(get_location_history))
        .route("/:id/current", get(get_current_location))
}

/// Only the assigned driver reports, and only while the load is live.
pub fn check_can_track(driver: &User, shipment: &Shipment) -> Result<(), ServiceError> {
    if shipment.driver_id != Some(driver.id) {
        return Err(ServiceError::Forbidden(
            "Only the assigned driver can report this shipment's location".to_string(),
        ));
    }
    if !shipment.status.is_trackable() {
        return Err(ServiceError::Validation(format!(
            "Shipment {} cannot be tracked while {}",
            shipment.id,
            shipment.status.to_str()
        )));
    }
    Ok(())
}

pub async fn track_location(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<TrackLocationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let shipment = app_state
        .shipment_service
        .get(&user.user, shipment_id)
        .await?;
    check_can_track(&user.user, &shipment)?;

    let location = app_state
        .db_client
        .add_location(shipment.id, user.user.id, &body)
        .await?;

    tracing::debug!(
        "shipment {} at ({}, {}) from driver {}",
        shipment.id,
        location.latitude,
        location.longitude,
        user.user.id
    );
    app_state.notifications.location_update(&shipment, &location);

    Ok(Json(LocationResponseDto {
        status: "success".to_string(),
        data: Some(location),
    }))
}

pub async fn get_location_history(
    Path(shipment_id): Path<i64>,
    Query(query_params): Query<HistoryQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let shipment = app_state
        .shipment_service
        .get(&user.user, shipment_id)
        .await?;

    let locations = app_state
        .db_client
        .get_location_history(shipment.id, query_params.effective_limit())
        .await?;

    Ok(Json(LocationHistoryResponseDto {
        status: "success".to_string(),
        results: locations.len(),
        locations,
    }))
}

pub async fn get_current_location(
    Path(shipment_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let shipment = app_state
        .shipment_service
        .get(&user.user, shipment_id)
        .await?;

    let location = app_state
        .db_client
        .get_current_location(shipment.id)
        .await?;

    Ok(Json(LocationResponseDto {
        status: "success".to_string(),
        data: location,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{shipmentmodel::ShipmentStatus, usermodel::UserRole},
        service::shipment_service::tests::{shipment, user},
    };

    #[test]
    fn assigned_driver_tracks_live_loads() {
        let driver = user(3, UserRole::Driver);
        assert!(check_can_track(&driver, &shipment(ShipmentStatus::InTransit)).is_ok());
        assert!(check_can_track(&driver, &shipment(ShipmentStatus::Accepted)).is_ok());
    }

    #[test]
    fn other_drivers_and_finished_loads_are_refused() {
        let stranger = user(4, UserRole::Driver);
        assert!(matches!(
            check_can_track(&stranger, &shipment(ShipmentStatus::InTransit)),
            Err(ServiceError::Forbidden(_))
        ));

        let driver = user(3, UserRole::Driver);
        assert!(matches!(
            check_can_track(&driver, &shipment(ShipmentStatus::Delivered)),
            Err(ServiceError::Validation(_))
        ));
        assert!(check_can_track(&driver, &shipment(ShipmentStatus::Pending)).is_err());
    }
}
