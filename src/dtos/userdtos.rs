use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::usermodel::{User, UserRole};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,

    #[validate(length(max = 160, message = "Company name is too long"))]
    pub company: Option<String>,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(alias = "passwordConfirm")]
    pub password_confirm: String,

    #[validate(custom = "validate_signup_role")]
    #[serde(default = "default_signup_role")]
    pub role: UserRole,
}

fn default_signup_role() -> UserRole {
    UserRole::Customer
}

fn validate_signup_role(role: &UserRole) -> Result<(), validator::ValidationError> {
    match role {
        UserRole::Customer | UserRole::Trucker => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_role")),
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email is invalid"))]
    pub email: String,
    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenDto {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct RequestQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct UserQueryDto {
    pub role: Option<UserRole>,
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUserDto {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub is_approved: bool,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub broker_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id,
            name: user.name.to_owned(),
            company: user.company.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.to_str().to_string(),
            is_approved: user.is_approved,
            is_email_verified: user.is_email_verified,
            is_phone_verified: user.is_phone_verified,
            broker_id: user.broker_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    pub fn filter_users(user: &[User]) -> Vec<FilterUserDto> {
        user.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponseDto {
    pub status: String,
    pub users: Vec<FilterUserDto>,
    pub results: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: FilterUserDto,
}

#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 120, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(length(max = 160, message = "Company name is too long"))]
    pub company: Option<String>,
}

#[derive(Debug, Validate, Default, Clone, Serialize, Deserialize)]
pub struct UserPasswordUpdateDto {
    #[validate(
        length(min = 1, message = "New password is required."),
        length(min = 6, message = "new password must be at least 6 characters")
    )]
    pub new_password: String,

    #[validate(
        length(min = 1, message = "New password confirm is required."),
        must_match(other = "new_password", message = "new passwords do not match")
    )]
    pub new_password_confirm: String,

    #[validate(length(min = 1, message = "Old password is required."))]
    pub old_password: String,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct VerifyEmailQueryDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone)]
pub struct ForgotPasswordRequestDto {
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email is invalid"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ResetPasswordRequestDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,

    #[validate(
        length(min = 1, message = "New password is required."),
        length(min = 6, message = "new password must be at least 6 characters")
    )]
    pub new_password: String,

    #[validate(
        length(min = 1, message = "New password confirm is required."),
        must_match(other = "new_password", message = "new passwords do not match")
    )]
    pub new_password_confirm: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct DeleteAccountDto {
    #[validate(length(min = 1, message = "Deletion token is required."))]
    pub token: String,
}

/// A broker registering one of its drivers.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CreateDriverDto {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 10, max = 20, message = "Phone number is required"))]
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rejects_staff_roles() {
        let dto: RegisterUserDto = serde_json::from_value(serde_json::json!({
            "name": "Ali",
            "email": "ali@example.com",
            "password": "secret12",
            "password_confirm": "secret12",
            "role": "admin"
        }))
        .unwrap();

        assert!(dto.validate().is_err());
    }

    #[test]
    fn signup_defaults_to_customer() {
        let dto: RegisterUserDto = serde_json::from_value(serde_json::json!({
            "name": "Ali",
            "email": "ali@example.com",
            "password": "secret12",
            "passwordConfirm": "secret12"
        }))
        .unwrap();

        assert_eq!(dto.role, UserRole::Customer);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn mismatched_passwords_fail() {
        let dto = ResetPasswordRequestDto {
            token: "t".to_string(),
            new_password: "secret12".to_string(),
            new_password_confirm: "secret13".to_string(),
        };
        assert!(dto.validate().is_err());
    }
}
