use chrono::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Trucker,
    Admin,
    Driver,
    Moderator,
}

/// What a role is allowed to do. Routes ask for capabilities, never for role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateShipment,
    AcceptShipment,
    UpdateShipmentStatus,
    AssignDriver,
    ManageVehicles,
    ManageDrivers,
    TrackShipment,
    RequestDiscount,
    RequestClearance,
    ManageShipments,
    DecideDiscounts,
    ManageUsers,
    ManageClearance,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Trucker => "trucker",
            UserRole::Admin => "admin",
            UserRole::Driver => "driver",
            UserRole::Moderator => "moderator",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;

        match self {
            UserRole::Customer => &[CreateShipment, RequestDiscount, RequestClearance],
            UserRole::Trucker => &[
                AcceptShipment,
                UpdateShipmentStatus,
                AssignDriver,
                ManageVehicles,
                ManageDrivers,
                RequestClearance,
            ],
            UserRole::Driver => &[UpdateShipmentStatus, TrackShipment],
            // moderators act with the admin capability set
            UserRole::Admin | UserRole::Moderator => &[
                ManageShipments,
                DecideDiscounts,
                ManageUsers,
                ManageClearance,
                RequestClearance,
            ],
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn is_admin(&self) -> bool {
        self.can(Capability::ManageShipments)
    }

    /// Roles that onboard through the phone/OTP/PIN flow.
    pub fn uses_phone_login(&self) -> bool {
        matches!(self, UserRole::Trucker | UserRole::Driver)
    }

    /// The role that may never share a phone number with this one.
    pub fn conflicting_phone_role(&self) -> Option<UserRole> {
        match self {
            UserRole::Driver => Some(UserRole::Trucker),
            UserRole::Trucker => Some(UserRole::Driver),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    /// Password hash, or the PIN hash for phone accounts. Phone accounts have
    /// none until the PIN is set.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub role: UserRole,
    pub is_approved: bool,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,

    #[serde(skip_serializing)]
    pub otp_code: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub token_expires_at: Option<DateTime<Utc>>,

    /// Owning trucker for drivers.
    pub broker_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_pin(&self) -> bool {
        self.password.is_some()
    }

    /// Truckers need admin approval before they can log in or accept work.
    pub fn is_cleared_to_work(&self) -> bool {
        self.role != UserRole::Trucker || self.is_approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderator_shares_admin_capabilities() {
        assert_eq!(UserRole::Admin.capabilities(), UserRole::Moderator.capabilities());
        assert!(UserRole::Moderator.is_admin());
        assert!(!UserRole::Trucker.is_admin());
    }

    #[test]
    fn only_truckers_accept_shipments() {
        assert!(UserRole::Trucker.can(Capability::AcceptShipment));
        assert!(!UserRole::Driver.can(Capability::AcceptShipment));
        assert!(!UserRole::Customer.can(Capability::AcceptShipment));
        assert!(!UserRole::Admin.can(Capability::AcceptShipment));
    }

    #[test]
    fn driver_and_trucker_phones_conflict() {
        assert_eq!(UserRole::Driver.conflicting_phone_role(), Some(UserRole::Trucker));
        assert_eq!(UserRole::Trucker.conflicting_phone_role(), Some(UserRole::Driver));
        assert_eq!(UserRole::Customer.conflicting_phone_role(), None);
    }

    #[test]
    fn role_names_are_snake_case() {
        assert_eq!(UserRole::Moderator.to_str(), "moderator");
        assert_eq!(serde_json::to_string(&UserRole::Trucker).unwrap(), "\"trucker\"");
    }
}
