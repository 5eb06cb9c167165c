use std::sync::Arc;

use axum::{response::IntoResponse, routing::post, Extension, Json, Router};
use validator::Validate;

use crate::{
    dtos::phonedtos::{
        PhoneAuthResponseDto, PhoneAuthStep, PhoneCheckDto, PhoneLoginDto, PhoneSignupDto,
        SetPinDto, VerifyOtpDto,
    },
    error::HttpError,
    handler::auth::login_response,
    service::phone_auth_service::step_message,
    AppState,
};

pub fn phone_auth_handler() -> Router {
    Router::new()
        .route("/check", post(check_phone))
        .route("/signup", post(phone_signup))
        .route("/verify-otp", post(verify_otp))
        .route("/set-pin", post(set_pin))
        .route("/login", post(phone_login))
        .route("/resend-otp", post(resend_otp))
}

fn step_response(step: PhoneAuthStep) -> Json<PhoneAuthResponseDto> {
    Json(PhoneAuthResponseDto {
        status: "success".to_string(),
        next_step: step,
        message: step_message(step).to_string(),
    })
}

pub async fn check_phone(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<PhoneCheckDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let step = app_state.phone_auth.check(&body.phone, body.role).await?;
    Ok(step_response(step))
}

pub async fn phone_signup(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<PhoneSignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    app_state
        .phone_auth
        .signup(&body.phone, body.role, &body.name, body.company.as_deref(), None)
        .await?;

    Ok(step_response(PhoneAuthStep::VerifyOtp))
}

pub async fn verify_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<VerifyOtpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let step = app_state
        .phone_auth
        .verify_otp(&body.phone, body.role, &body.otp)
        .await?;
    Ok(step_response(step))
}

pub async fn set_pin(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<SetPinDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let (user, tokens) = app_state
        .phone_auth
        .set_pin(&body.phone, body.role, &body.pin)
        .await?;

    login_response(&app_state, &user, tokens)
}

pub async fn phone_login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<PhoneLoginDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let (user, tokens) = app_state
        .phone_auth
        .login(&body.phone, body.role, &body.pin)
        .await?;

    tracing::info!("phone login: {} {}", user.role.to_str(), user.id);
    login_response(&app_state, &user, tokens)
}

pub async fn resend_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<PhoneCheckDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()?;

    let step = app_state.phone_auth.resend_otp(&body.phone, body.role).await?;
    Ok(step_response(step))
}
