use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::mail::sendmail::MailError;

/// Wire envelope for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub status: u16,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(&self).unwrap_or_default())
    }
}

/// Numeric error taxonomy.
///
/// * 4000s validation
/// * 4100s authentication
/// * 4200s user management conflicts
/// * 4300s database constraint violations
/// * 4400s resource state
/// * 5000s system and delivery failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed = 4000,
    InvalidPhone = 4001,
    InvalidAmount = 4002,
    InvalidStatusTransition = 4003,
    MissingHeader = 4004,

    TokenNotProvided = 4100,
    InvalidToken = 4101,
    WrongCredentials = 4102,
    EmailNotVerified = 4103,
    PhoneNotVerified = 4104,
    InvalidOtp = 4105,
    OtpExpired = 4106,
    PinNotSet = 4107,
    PermissionDenied = 4108,
    AccountNotApproved = 4109,
    UserNoLongerExists = 4110,
    TokenAlreadyUsed = 4111,

    EmailExists = 4200,
    PhoneExists = 4201,
    PhoneUsedByDriver = 4202,
    PhoneUsedByTrucker = 4203,
    UserNotFound = 4204,
    PinAlreadySet = 4205,

    UniqueViolation = 4300,
    NotNullViolation = 4301,
    ForeignKeyViolation = 4302,
    InvalidEnumValue = 4303,
    CheckViolation = 4304,
    ExclusionViolation = 4305,

    NotFound = 4400,
    ShipmentAlreadyAccepted = 4401,
    ShipmentStateConflict = 4402,
    DiscountAlreadyDecided = 4403,
    DiscountExists = 4404,

    Internal = 5000,
    Database = 5001,
    EmailDelivery = 5002,
    SmsDelivery = 5003,
    ConsistencyViolation = 5004,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,
    InvalidToken,
    ServerError,
    WrongCredentials,
    WrongPin,
    EmailExist,
    UserNoLongerExist,
    TokenNotProvided,
    PermissionDenied,
    UserNotAuthenticated,
    EmailNotVerified,
    PhoneNotVerified,
    AccountNotApproved,
    InvalidPhone,
    InvalidOtp,
    OtpExpired,
    PinNotSet,
    PinAlreadySet,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl ErrorMessage {
    fn to_str(&self) -> String {
        match self {
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
            ErrorMessage::WrongCredentials => "Email or password is wrong".to_string(),
            ErrorMessage::WrongPin => "Phone number or PIN is wrong".to_string(),
            ErrorMessage::EmailExist => "A user with this email already exists".to_string(),
            ErrorMessage::UserNoLongerExist => "User belonging to this token no longer exists".to_string(),
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => format!("Password must not be more than {} characters", max_length),
            ErrorMessage::InvalidToken => "Authentication token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => "You are not logged in, please provide a token".to_string(),
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action".to_string(),
            ErrorMessage::UserNotAuthenticated => "Authentication required. Please log in.".to_string(),
            ErrorMessage::EmailNotVerified => "Please verify your email before logging in".to_string(),
            ErrorMessage::PhoneNotVerified => "Phone number is not verified".to_string(),
            ErrorMessage::AccountNotApproved => "Your account is awaiting admin approval".to_string(),
            ErrorMessage::InvalidPhone => "Phone number is not a valid Pakistani mobile number".to_string(),
            ErrorMessage::InvalidOtp => "Invalid OTP".to_string(),
            ErrorMessage::OtpExpired => "OTP has expired, please request a new one".to_string(),
            ErrorMessage::PinNotSet => "PIN has not been set for this account".to_string(),
            ErrorMessage::PinAlreadySet => "PIN is already set for this account".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
    pub code: ErrorCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        let code = match status {
            StatusCode::BAD_REQUEST => ErrorCode::ValidationFailed,
            StatusCode::UNAUTHORIZED => ErrorCode::InvalidToken,
            StatusCode::FORBIDDEN => ErrorCode::PermissionDenied,
            StatusCode::NOT_FOUND => ErrorCode::NotFound,
            StatusCode::CONFLICT => ErrorCode::UniqueViolation,
            _ => ErrorCode::Internal,
        };

        HttpError {
            message: message.into(),
            status,
            code,
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = code;
        self
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn conflict(message: impl Into<String>, code: ErrorCode) -> Self {
        HttpError::new(message, StatusCode::CONFLICT).with_code(code)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            error: self.message.clone(),
            code: self.code.as_u16(),
            status: self.status.as_u16(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}, code: {}",
            self.message,
            self.status,
            self.code.as_u16()
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

impl From<validator::ValidationErrors> for HttpError {
    fn from(errors: validator::ValidationErrors) -> Self {
        HttpError::bad_request(errors.to_string())
    }
}

/// Maps a unique/exclusion constraint name onto the user facing conflict.
fn constraint_conflict(constraint: &str) -> (String, ErrorCode) {
    match constraint {
        "users_email_lower_unique" => (ErrorMessage::EmailExist.to_string(), ErrorCode::EmailExists),
        "users_phone_role_unique" => (
            "Phone number is already registered for this role".to_string(),
            ErrorCode::PhoneExists,
        ),
        "users_driver_trucker_phone_excl" => (
            "Phone number is already used by a driver or trucker account".to_string(),
            ErrorCode::ExclusionViolation,
        ),
        "vehicles_registration_number_key" => (
            "A vehicle with this registration number already exists".to_string(),
            ErrorCode::UniqueViolation,
        ),
        "discount_requests_shipment_id_key" => (
            "A discount request already exists for this shipment".to_string(),
            ErrorCode::DiscountExists,
        ),
        "device_tokens_token_key" => (
            "Device token is already registered".to_string(),
            ErrorCode::UniqueViolation,
        ),
        _ => ("Duplicate value violates a unique constraint".to_string(), ErrorCode::UniqueViolation),
    }
}

impl From<MailError> for HttpError {
    fn from(error: MailError) -> Self {
        tracing::error!("email delivery failed: {}", error);
        HttpError::server_error("Could not send the email, please try again later")
            .with_code(ErrorCode::EmailDelivery)
    }
}

/// A dangling reference on insert, or a delete blocked by a RESTRICT key.
fn foreign_key_error(constraint: &str) -> HttpError {
    match constraint {
        "shipments_customer_id_fkey" | "discount_requests_customer_id_fkey" => HttpError::conflict(
            "Accounts that own shipments cannot be deleted",
            ErrorCode::ForeignKeyViolation,
        ),
        _ => HttpError::bad_request("Referenced record does not exist")
            .with_code(ErrorCode::ForeignKeyViolation),
    }
}

/// Translates Postgres constraint failures into domain errors; anything
/// unrecognised becomes a generic 500.
impl From<sqlx::Error> for HttpError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            let constraint = db_error.constraint().unwrap_or_default();
            let sqlstate = db_error.code().map(|c| c.into_owned()).unwrap_or_default();

            match sqlstate.as_str() {
                "23505" | "23P01" => {
                    let (message, code) = constraint_conflict(constraint);
                    let code = if sqlstate == "23P01" && code == ErrorCode::UniqueViolation {
                        ErrorCode::ExclusionViolation
                    } else {
                        code
                    };
                    return HttpError::conflict(message, code);
                }
                "23502" => {
                    return HttpError::bad_request(format!(
                        "Missing required value: {}",
                        db_error.message()
                    ))
                    .with_code(ErrorCode::NotNullViolation);
                }
                "23503" => return foreign_key_error(constraint),
                "22P02" => {
                    return HttpError::bad_request("Invalid value for an enumerated field")
                        .with_code(ErrorCode::InvalidEnumValue);
                }
                "23514" => {
                    return HttpError::bad_request(format!(
                        "Value violates constraint {}",
                        constraint
                    ))
                    .with_code(ErrorCode::CheckViolation);
                }
                _ => {}
            }
        }

        tracing::error!("database error: {}", error);
        HttpError::server_error(ErrorMessage::ServerError.to_string()).with_code(ErrorCode::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_picks_default_code() {
        assert_eq!(HttpError::bad_request("x").code, ErrorCode::ValidationFailed);
        assert_eq!(HttpError::unauthorized("x").code, ErrorCode::InvalidToken);
        assert_eq!(HttpError::forbidden("x").code, ErrorCode::PermissionDenied);
        assert_eq!(HttpError::server_error("x").code, ErrorCode::Internal);
    }

    #[test]
    fn known_constraints_map_to_domain_codes() {
        assert_eq!(constraint_conflict("users_email_lower_unique").1, ErrorCode::EmailExists);
        assert_eq!(constraint_conflict("users_phone_role_unique").1, ErrorCode::PhoneExists);
        assert_eq!(
            constraint_conflict("discount_requests_shipment_id_key").1,
            ErrorCode::DiscountExists
        );
        assert_eq!(constraint_conflict("something_else").1, ErrorCode::UniqueViolation);
    }

    #[test]
    fn restricted_customer_delete_is_a_conflict() {
        let err = foreign_key_error("shipments_customer_id_fkey");
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, ErrorCode::ForeignKeyViolation);

        let err = foreign_key_error("shipments_vehicle_id_fkey");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::ForeignKeyViolation);
    }

    #[test]
    fn undeliverable_mail_has_its_own_code() {
        let cause = serde_json::from_str::<u8>("not json").unwrap_err();
        let err: HttpError = MailError::from(cause).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, ErrorCode::EmailDelivery);
    }

    #[test]
    fn non_database_errors_are_500() {
        let err: HttpError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, ErrorCode::Database);
    }

    #[test]
    fn envelope_carries_code_and_status() {
        let response = HttpError::conflict("taken", ErrorCode::ShipmentAlreadyAccepted).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn codes_fall_in_their_ranges() {
        assert_eq!(ErrorCode::ValidationFailed.as_u16(), 4000);
        assert_eq!(ErrorCode::TokenAlreadyUsed.as_u16(), 4111);
        assert_eq!(ErrorCode::PhoneUsedByDriver.as_u16(), 4202);
        assert_eq!(ErrorCode::ExclusionViolation.as_u16(), 4305);
        assert_eq!(ErrorCode::ConsistencyViolation.as_u16(), 5004);
    }
}
