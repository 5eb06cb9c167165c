use std::sync::Arc;

use axum::{
    extract::Query,
    http::header,
    response::{IntoResponse, Response as AxumResponse},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use chrono::{Duration, Utc};
use serde::Serialize;
use validator::Validate;

use crate::{
    db::userdb::UserExt,
    dtos::userdtos::{
        FilterUserDto, ForgotPasswordRequestDto, LoginUserDto, RefreshTokenDto,
        RegisterUserDto, ResetPasswordRequestDto, Response, UserData, UserLoginResponseDto,
        UserResponseDto, VerifyEmailQueryDto,
    },
    error::{ErrorCode, ErrorMessage, HttpError},
    mail::mails::{send_forgot_password_email, send_verification_email, send_welcome_email},
    models::usermodel::{User, UserRole},
    service::error::ServiceError,
    utils::{
        password,
        token::{self, TokenKind, TokenPair},
    },
    AppState,
};

const VERIFICATION_TOKEN_HOURS: i64 = 24;
const RESET_TOKEN_MINUTES: i64 = 30;

pub fn auth_handler() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/verify-email", get(verify_email).post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// JSON body plus the http-only `token` cookie the web client reads.
pub fn with_session_cookie<T: Serialize>(
    body: T,
    access_token: &str,
    maxage_minutes: i64,
) -> Result<AxumResponse, HttpError> {
    let cookie = Cookie::build(("token", access_token.to_owned()))
        .path("/")
        .max_age(time::Duration::minutes(maxage_minutes))
        .http_only(true)
        .build();

    let cookie_header = cookie
        .to_string()
        .parse()
        .map_err(|_| HttpError::server_error(ErrorMessage::ServerError.to_string()))?;

    let mut response = Json(body).into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie_header);
    Ok(response)
}

pub fn login_response(
    app_state: &AppState,
    user: &User,
    tokens: TokenPair,
) -> Result<AxumResponse, HttpError> {
    let access_token = tokens.access_token.clone();
    with_session_cookie(
        UserLoginResponseDto {
            status: "success".to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: FilterUserDto::filter_user(user),
        },
        &access_token,
        app_state.env.jwt_maxage,
    )
}

fn sign_tokens(app_state: &AppState, user_id: i64, role: UserRole) -> Result<TokenPair, HttpError> {
    token::issue_session(&app_state.env, user_id, role)
        .map_err(|e| HttpError::server_error(e.to_string()))
}

pub async fn signup(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let existing_user = app_state
        .db_client
        .get_user(None, Some(&body.email), None)
        .await?;

    if existing_user.is_some() {
        return Err(HttpError::conflict(
            ErrorMessage::EmailExist.to_string(),
            ErrorCode::EmailExists,
        ));
    }

    let hashed_password = password::hash(&body.password).map_err(ServiceError::Auth)?;

    let verification_token = uuid::Uuid::new_v4().to_string();
    let token_expires_at = Utc::now() + Duration::hours(VERIFICATION_TOKEN_HOURS);

    let user = app_state
        .db_client
        .save_user(
            body.name,
            body.company,
            body.email.trim().to_lowercase(),
            hashed_password,
            body.role,
            verification_token.clone(),
            token_expires_at,
        )
        .await?;

    tracing::info!("signup: {} {} registered", user.role.to_str(), user.id);

    if let Some(email) = user.email.as_deref() {
        send_verification_email(
            &app_state.mail,
            &app_state.env.app_url,
            email,
            &user.name,
            &verification_token,
        )
        .await;
    }

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.email), None)
        .await?
        .ok_or(ServiceError::Auth(ErrorMessage::WrongCredentials))?;

    // phone accounts have no email password
    let hashed = user
        .password
        .as_deref()
        .filter(|_| user.email.is_some())
        .ok_or(ServiceError::Auth(ErrorMessage::WrongCredentials))?;

    let password_matched = password::compare(&body.password, hashed)
        .map_err(|_| ServiceError::Auth(ErrorMessage::WrongCredentials))?;

    if !password_matched {
        return Err(ServiceError::Auth(ErrorMessage::WrongCredentials).into());
    }
    if !user.is_email_verified {
        return Err(ServiceError::Auth(ErrorMessage::EmailNotVerified).into());
    }
    if !user.is_cleared_to_work() {
        return Err(ServiceError::NotApproved.into());
    }

    let tokens = sign_tokens(&app_state, user.id, user.role)?;
    login_response(&app_state, &user, tokens)
}

pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    with_session_cookie(
        Response {
            status: "success",
            message: "Logged out".to_string(),
        },
        "",
        0,
    )
}

pub async fn refresh(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RefreshTokenDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let claims = token::decode_token(
        body.refresh_token,
        app_state.env.jwt_refresh_secret.as_bytes(),
        TokenKind::Refresh,
    )?;

    let user = app_state
        .db_client
        .get_user(Some(claims.id), None, None)
        .await?
        .ok_or_else(|| {
            HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string())
                .with_code(ErrorCode::UserNoLongerExists)
        })?;

    let tokens = sign_tokens(&app_state, user.id, user.role)?;
    login_response(&app_state, &user, tokens)
}

pub async fn verify_email(
    Query(query_params): Query<VerifyEmailQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()?;

    let user = app_state
        .db_client
        .get_user(None, None, Some(&query_params.token))
        .await?
        .ok_or_else(|| HttpError::bad_request("Invalid verification token"))?;

    match user.token_expires_at {
        Some(expires_at) if Utc::now() <= expires_at => {}
        Some(_) => return Err(HttpError::bad_request("Verification token has expired")),
        None => return Err(HttpError::bad_request("Invalid verification token")),
    }

    app_state
        .db_client
        .verify_email_token(&query_params.token)
        .await?;

    tracing::info!("email verified for user {}", user.id);

    if let Some(email) = user.email.as_deref() {
        send_welcome_email(&app_state.mail, email, &user.name).await;
    }

    Ok(Json(Response {
        status: "success",
        message: "Email verified successfully".to_string(),
    }))
}

pub async fn forgot_password(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let response = Json(Response {
        status: "success",
        message: "If the email is registered, a password reset link has been sent.".to_string(),
    });

    let Some(user) = app_state
        .db_client
        .get_user(None, Some(&body.email), None)
        .await?
    else {
        return Ok(response);
    };

    let reset_token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES);

    app_state
        .db_client
        .add_verification_token(user.id, &reset_token, expires_at)
        .await?;

    if let Some(email) = user.email.as_deref() {
        send_forgot_password_email(
            &app_state.mail,
            &app_state.env.app_url,
            email,
            &user.name,
            &reset_token,
        )
        .await;
    }

    Ok(response)
}

pub async fn reset_password(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let user = app_state
        .db_client
        .get_user(None, None, Some(&body.token))
        .await?
        .ok_or_else(|| HttpError::bad_request("Invalid or expired token"))?;

    match user.token_expires_at {
        Some(expires_at) if Utc::now() <= expires_at => {}
        _ => return Err(HttpError::bad_request("Invalid or expired token")),
    }

    let hash_password = password::hash(&body.new_password).map_err(ServiceError::Auth)?;

    app_state
        .db_client
        .update_user_password(user.id, hash_password)
        .await?;

    app_state
        .db_client
        .clear_verification_token(&body.token)
        .await?;

    tracing::info!("password reset for user {}", user.id);

    Ok(Json(Response {
        status: "success",
        message: "Password has been successfully reset.".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only() {
        let response = with_session_cookie(
            Response {
                status: "success",
                message: String::new(),
            },
            "abc",
            60,
        )
        .unwrap();

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
    }
}
