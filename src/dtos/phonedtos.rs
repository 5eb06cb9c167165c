use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::usermodel::UserRole;

fn validate_phone_role(role: &UserRole) -> Result<(), validator::ValidationError> {
    if role.uses_phone_login() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("role_not_allowed_on_phone_login"))
    }
}

fn validate_digits(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("digits_only"))
    }
}

/// Shared by `check` and `resend-otp`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhoneCheckDto {
    #[validate(length(min = 10, max = 20, message = "Phone number is required"))]
    pub phone: String,

    #[validate(custom = "validate_phone_role")]
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhoneSignupDto {
    #[validate(length(min = 10, max = 20, message = "Phone number is required"))]
    pub phone: String,

    #[validate(custom = "validate_phone_role")]
    pub role: UserRole,

    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,

    #[validate(length(max = 160, message = "Company name is too long"))]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyOtpDto {
    #[validate(length(min = 10, max = 20, message = "Phone number is required"))]
    pub phone: String,

    #[validate(custom = "validate_phone_role")]
    pub role: UserRole,

    #[validate(
        length(equal = 6, message = "OTP must be 6 digits"),
        custom = "validate_digits"
    )]
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetPinDto {
    #[validate(length(min = 10, max = 20, message = "Phone number is required"))]
    pub phone: String,

    #[validate(custom = "validate_phone_role")]
    pub role: UserRole,

    #[validate(
        length(min = 4, max = 6, message = "PIN must be 4 to 6 digits"),
        custom = "validate_digits"
    )]
    pub pin: String,

    #[validate(must_match(other = "pin", message = "PINs do not match"))]
    #[serde(alias = "pinConfirm")]
    pub pin_confirm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhoneLoginDto {
    #[validate(length(min = 10, max = 20, message = "Phone number is required"))]
    pub phone: String,

    #[validate(custom = "validate_phone_role")]
    pub role: UserRole,

    #[validate(
        length(min = 4, max = 6, message = "PIN must be 4 to 6 digits"),
        custom = "validate_digits"
    )]
    pub pin: String,
}

/// What the app should show next for a phone/role pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhoneAuthStep {
    SignupRequired,
    VerifyOtp,
    SetPin,
    EnterPin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhoneAuthResponseDto {
    pub status: String,
    pub next_step: PhoneAuthStep,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_cannot_use_phone_flow() {
        let dto = PhoneCheckDto {
            phone: "03001234567".to_string(),
            role: UserRole::Customer,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn pin_must_be_numeric_and_short() {
        let mut dto = SetPinDto {
            phone: "03001234567".to_string(),
            role: UserRole::Driver,
            pin: "12ab".to_string(),
            pin_confirm: "12ab".to_string(),
        };
        assert!(dto.validate().is_err());

        dto.pin = "1234567".to_string();
        dto.pin_confirm = "1234567".to_string();
        assert!(dto.validate().is_err());

        dto.pin = "4321".to_string();
        dto.pin_confirm = "4321".to_string();
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn next_step_wire_names() {
        assert_eq!(
            serde_json::to_string(&PhoneAuthStep::SignupRequired).unwrap(),
            "\"signup_required\""
        );
        assert_eq!(serde_json::to_string(&PhoneAuthStep::EnterPin).unwrap(), "\"enter_pin\"");
    }
}
