use thiserror::Error;

use crate::{
    error::{ErrorCode, ErrorMessage, HttpError},
    models::{discountmodel::DiscountStatus, shipmentmodel::ShipmentStatus},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Shipment {0} not found")]
    ShipmentNotFound(i64),

    #[error("Shipment already accepted or not found")]
    ShipmentAlreadyAccepted,

    #[error("Cannot move shipment from {} to {}", .from.to_str(), .to.to_str())]
    InvalidTransition { from: ShipmentStatus, to: ShipmentStatus },

    #[error("Shipment {0} was modified by another request, reload and retry")]
    ShipmentStateConflict(i64),

    #[error("You are not assigned to shipment {0}")]
    NotShipmentParty(i64),

    #[error("Discount request {0} not found")]
    DiscountNotFound(i64),

    #[error("Discount request {0} has already been {}", .1.to_str())]
    DiscountAlreadyDecided(i64, DiscountStatus),

    #[error("A discount request already exists for shipment {0}")]
    DiscountExists(i64),

    #[error("{0}")]
    InvalidAmount(String),

    #[error("Shipment budget changed during discount decision: before {before}, after {after}")]
    BudgetChanged { before: f64, after: f64 },

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Account is still on {0} open shipment(s); they must be delivered or cancelled first")]
    OpenShipments(i64),

    #[error("Driver {0} does not belong to this trucker")]
    DriverNotOwned(i64),

    #[error("Vehicle {0} does not belong to this trucker")]
    VehicleNotOwned(i64),

    #[error("{0}")]
    Forbidden(String),

    #[error("Your account is awaiting admin approval")]
    NotApproved,

    #[error("Phone number is already registered as a {0}")]
    PhoneExists(String),

    #[error("Phone number is already used by a {0}")]
    PhoneUsedByOtherRole(String),

    #[error("{0}")]
    Auth(ErrorMessage),

    #[error("SMS delivery failed: {0}")]
    Sms(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::ShipmentNotFound(_) | ServiceError::DiscountNotFound(_) => {
                HttpError::not_found(error.to_string())
            }
            ServiceError::UserNotFound(_) => {
                HttpError::not_found(error.to_string()).with_code(ErrorCode::UserNotFound)
            }

            ServiceError::ShipmentAlreadyAccepted => {
                HttpError::conflict(error.to_string(), ErrorCode::ShipmentAlreadyAccepted)
            }
            ServiceError::ShipmentStateConflict(_) | ServiceError::OpenShipments(_) => {
                HttpError::conflict(error.to_string(), ErrorCode::ShipmentStateConflict)
            }
            ServiceError::DiscountAlreadyDecided(_, _) => {
                HttpError::conflict(error.to_string(), ErrorCode::DiscountAlreadyDecided)
            }
            ServiceError::DiscountExists(_) => {
                HttpError::conflict(error.to_string(), ErrorCode::DiscountExists)
            }
            ServiceError::PhoneExists(_) => {
                HttpError::conflict(error.to_string(), ErrorCode::PhoneExists)
            }
            ServiceError::PhoneUsedByOtherRole(ref role) => {
                let code = if role == "driver" {
                    ErrorCode::PhoneUsedByDriver
                } else {
                    ErrorCode::PhoneUsedByTrucker
                };
                HttpError::conflict(error.to_string(), code)
            }

            ServiceError::InvalidTransition { .. } => {
                HttpError::bad_request(error.to_string()).with_code(ErrorCode::InvalidStatusTransition)
            }
            ServiceError::InvalidAmount(_) => {
                HttpError::bad_request(error.to_string()).with_code(ErrorCode::InvalidAmount)
            }
            ServiceError::Validation(_) => HttpError::bad_request(error.to_string()),

            ServiceError::NotShipmentParty(_)
            | ServiceError::DriverNotOwned(_)
            | ServiceError::VehicleNotOwned(_)
            | ServiceError::Forbidden(_) => HttpError::forbidden(error.to_string()),
            ServiceError::NotApproved => {
                HttpError::forbidden(error.to_string()).with_code(ErrorCode::AccountNotApproved)
            }

            ServiceError::Auth(message) => auth_error(message),

            ServiceError::BudgetChanged { .. } => {
                tracing::error!("{}", error);
                HttpError::server_error("Shipment budget consistency check failed")
                    .with_code(ErrorCode::ConsistencyViolation)
            }
            ServiceError::Sms(_) => {
                tracing::error!("{}", error);
                HttpError::server_error("Could not send the verification code, please retry")
                    .with_code(ErrorCode::SmsDelivery)
            }
            ServiceError::Database(db_error) => HttpError::from(db_error),
            ServiceError::Other(_) => {
                tracing::error!("{}", error);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}

fn auth_error(message: ErrorMessage) -> HttpError {
    let text = message.to_string();
    match message {
        ErrorMessage::WrongCredentials | ErrorMessage::WrongPin => {
            HttpError::unauthorized(text).with_code(ErrorCode::WrongCredentials)
        }
        ErrorMessage::InvalidOtp => HttpError::bad_request(text).with_code(ErrorCode::InvalidOtp),
        ErrorMessage::OtpExpired => HttpError::bad_request(text).with_code(ErrorCode::OtpExpired),
        ErrorMessage::InvalidPhone => {
            HttpError::bad_request(text).with_code(ErrorCode::InvalidPhone)
        }
        ErrorMessage::PhoneNotVerified => {
            HttpError::forbidden(text).with_code(ErrorCode::PhoneNotVerified)
        }
        ErrorMessage::EmailNotVerified => {
            HttpError::forbidden(text).with_code(ErrorCode::EmailNotVerified)
        }
        ErrorMessage::PinNotSet => HttpError::bad_request(text).with_code(ErrorCode::PinNotSet),
        ErrorMessage::PinAlreadySet => HttpError::conflict(text, ErrorCode::PinAlreadySet),
        ErrorMessage::AccountNotApproved => {
            HttpError::forbidden(text).with_code(ErrorCode::AccountNotApproved)
        }
        ErrorMessage::UserNoLongerExist => {
            HttpError::unauthorized(text).with_code(ErrorCode::UserNoLongerExists)
        }
        ErrorMessage::PermissionDenied => HttpError::forbidden(text),
        ErrorMessage::EmptyPassword | ErrorMessage::ExceededMaxPasswordLength(_) => {
            HttpError::bad_request(text)
        }
        _ => HttpError::server_error(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn accept_race_is_a_409_with_its_code() {
        let err: HttpError = ServiceError::ShipmentAlreadyAccepted.into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, ErrorCode::ShipmentAlreadyAccepted);
        assert_eq!(err.message, "Shipment already accepted or not found");
    }

    #[test]
    fn cross_role_phone_conflict_names_the_holder() {
        let err: HttpError = ServiceError::PhoneUsedByOtherRole("driver".to_string()).into();
        assert_eq!(err.code, ErrorCode::PhoneUsedByDriver);
        assert!(err.message.contains("used by a driver"));

        let err: HttpError = ServiceError::PhoneUsedByOtherRole("trucker".to_string()).into();
        assert_eq!(err.code, ErrorCode::PhoneUsedByTrucker);
    }

    #[test]
    fn live_shipments_block_account_removal() {
        let err: HttpError = ServiceError::OpenShipments(2).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, ErrorCode::ShipmentStateConflict);
        assert!(err.message.contains("2 open shipment"));
    }

    #[test]
    fn budget_drift_is_a_consistency_violation() {
        let err: HttpError = ServiceError::BudgetChanged { before: 10000.0, after: 8000.0 }.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, ErrorCode::ConsistencyViolation);
    }

    #[test]
    fn decided_discount_is_a_conflict() {
        let err: HttpError = ServiceError::DiscountAlreadyDecided(3, DiscountStatus::Accepted).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, ErrorCode::DiscountAlreadyDecided);
        assert!(err.message.contains("accepted"));
    }

    #[test]
    fn otp_failures_keep_their_codes() {
        let err: HttpError = ServiceError::Auth(ErrorMessage::OtpExpired).into();
        assert_eq!(err.code, ErrorCode::OtpExpired);
        let err: HttpError = ServiceError::Auth(ErrorMessage::PinAlreadySet).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
