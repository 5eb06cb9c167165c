use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use serde_json::json;
use validator::Validate;

use crate::{
    db::userdb::{UserDeletion, UserExt},
    dtos::userdtos::{
        CreateDriverDto, DeleteAccountDto, FilterUserDto, Response, UpdateProfileDto, UserData,
        UserListResponseDto, UserPasswordUpdateDto, UserQueryDto, UserResponseDto,
    },
    error::{ErrorCode, ErrorMessage, HttpError},
    mail::mails::send_delete_account_email,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::{Capability, UserRole},
    service::error::ServiceError,
    utils::{
        password,
        token::{self, TokenKind},
    },
    AppState,
};

/// Deletion links stay valid for a quarter of an hour.
const DELETE_TOKEN_MINUTES: i64 = 15;

fn deletion_result(user_id: i64, outcome: UserDeletion) -> Result<(), HttpError> {
    match outcome {
        UserDeletion::Deleted => Ok(()),
        UserDeletion::NotFound => Err(ServiceError::UserNotFound(user_id).into()),
        UserDeletion::OpenShipments(open) => Err(ServiceError::OpenShipments(open).into()),
    }
}

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me).patch(update_profile).delete(delete_account))
        .route("/me/password", put(update_user_password))
        .route("/me/delete-request", post(request_account_deletion))
        .route(
            "/drivers",
            get(get_drivers)
                .post(create_driver)
                .layer(middleware::from_fn(|state, req, next| {
                    role_check(state, req, next, vec![Capability::ManageDrivers])
                })),
        )
}

pub fn admin_users_handler() -> Router {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/:id/approve", patch(approve_user))
        .route("/users/:id", delete(delete_user))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![Capability::ManageUsers])
        }))
}

fn user_response(user: &crate::models::usermodel::User) -> Json<UserResponseDto> {
    Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(user),
        },
    })
}

pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(user_response(&user.user))
}

pub async fn update_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let updated = app_state
        .db_client
        .update_user_profile(user.user.id, body.name, body.company)
        .await?;

    Ok(user_response(&updated))
}

pub async fn update_user_password(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UserPasswordUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let user = &user.user;

    // phone accounts change their PIN through the phone flow
    let current = user
        .password
        .as_deref()
        .filter(|_| user.email.is_some())
        .ok_or_else(|| HttpError::bad_request("This account has no password"))?;

    let password_match =
        password::compare(&body.old_password, current).map_err(ServiceError::Auth)?;

    if !password_match {
        return Err(HttpError::bad_request("Old password is incorrect"));
    }

    let hash_password = password::hash(&body.new_password).map_err(ServiceError::Auth)?;

    app_state
        .db_client
        .update_user_password(user.id, hash_password)
        .await?;

    Ok(Json(Response {
        message: "Password updated Successfully".to_string(),
        status: "success",
    }))
}

/// Mails a single-use deletion token. Phone-only accounts have no mailbox,
/// so the token comes back in the response instead.
pub async fn request_account_deletion(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let user = &user.user;

    let deletion_token = token::create_token(
        user.id,
        user.role,
        TokenKind::DeleteAccount,
        app_state.env.jwt_secret.as_bytes(),
        DELETE_TOKEN_MINUTES,
    )
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    tracing::info!("account deletion requested by user {}", user.id);

    match user.email.as_deref() {
        Some(email) => {
            // the emailed token is the only way to confirm, so delivery must not fail silently
            send_delete_account_email(&app_state.mail, email, &user.name, &deletion_token).await?;
            Ok(Json(json!({
                "status": "success",
                "message": "A confirmation token has been sent to your email",
            })))
        }
        None => Ok(Json(json!({
            "status": "success",
            "message": "Confirm the deletion with this token",
            "token": deletion_token,
        }))),
    }
}

pub async fn delete_account(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<DeleteAccountDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let claims = token::decode_token(
        body.token,
        app_state.env.jwt_secret.as_bytes(),
        TokenKind::DeleteAccount,
    )?;

    if claims.id != user.user.id {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    let jti = claims
        .jti
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    if !app_state.deletion_tokens.consume(&jti, claims.exp as i64).await {
        return Err(HttpError::unauthorized("This deletion token has already been used")
            .with_code(ErrorCode::TokenAlreadyUsed));
    }

    let deleted = match app_state.db_client.delete_user(user.user.id).await {
        Ok(outcome) => deletion_result(user.user.id, outcome),
        Err(e) => Err(HttpError::from(e)),
    };

    // a refused or failed delete leaves the token usable
    if let Err(e) = deleted {
        app_state.deletion_tokens.release(&jti).await;
        return Err(e);
    }

    tracing::info!("user {} deleted their account", user.user.id);

    Ok(Json(Response {
        status: "success",
        message: "Your account has been deleted".to_string(),
    }))
}

pub async fn create_driver(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateDriverDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let driver = app_state
        .phone_auth
        .signup(&body.phone, UserRole::Driver, &body.name, None, Some(user.user.id))
        .await?;

    tracing::info!("trucker {} registered driver {}", user.user.id, driver.id);

    Ok(user_response(&driver))
}

pub async fn get_drivers(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let drivers = app_state.db_client.get_broker_drivers(user.user.id).await?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        results: drivers.len() as i64,
        users: FilterUserDto::filter_users(&drivers),
    }))
}

pub async fn get_users(
    Query(query_params): Query<UserQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);

    let users = app_state
        .db_client
        .get_users(query_params.role, page as u32, limit)
        .await?;

    let user_count = app_state.db_client.get_user_count(query_params.role).await?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: user_count,
    }))
}

pub async fn approve_user(
    Path(user_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let approved = app_state
        .db_client
        .approve_user(user_id)
        .await?
        .ok_or(ServiceError::UserNotFound(user_id))?;

    tracing::info!("user {} approved by admin {}", user_id, admin.user.id);
    app_state.notifications.account_approved(approved.id);

    Ok(user_response(&approved))
}

pub async fn delete_user(
    Path(user_id): Path<i64>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(admin): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    if user_id == admin.user.id {
        return Err(HttpError::bad_request("Admins cannot delete their own account here"));
    }

    let outcome = app_state.db_client.delete_user(user_id).await?;
    deletion_result(user_id, outcome)?;

    tracing::warn!("user {} deleted by admin {}", user_id, admin.user.id);

    Ok(Json(Response {
        status: "success",
        message: format!("User {} deleted", user_id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn account_on_a_live_shipment_is_kept() {
        let err = deletion_result(4, UserDeletion::OpenShipments(1)).unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, ErrorCode::ShipmentStateConflict);
    }

    #[test]
    fn missing_account_is_a_404() {
        let err = deletion_result(4, UserDeletion::NotFound).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, ErrorCode::UserNotFound);
        assert!(deletion_result(4, UserDeletion::Deleted).is_ok());
    }
}
