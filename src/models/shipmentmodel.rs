use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::usermodel::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "shipment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Accepted,
    Confirmed,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl ShipmentStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::Accepted => "accepted",
            ShipmentStatus::Confirmed => "confirmed",
            ShipmentStatus::PickedUp => "picked_up",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Cancelled)
    }

    /// Statuses reachable from `self` through the normal lifecycle.
    /// Admin force updates do not consult this table.
    pub fn next_states(&self) -> &'static [ShipmentStatus] {
        use ShipmentStatus::*;

        match self {
            Pending => &[Accepted, Cancelled],
            Accepted => &[Confirmed, PickedUp, Cancelled],
            Confirmed => &[PickedUp, Cancelled],
            PickedUp => &[InTransit, Cancelled],
            InTransit => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        self.next_states().contains(&next)
    }

    /// Statuses during which the assigned driver reports GPS pings.
    pub fn is_trackable(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Accepted
                | ShipmentStatus::Confirmed
                | ShipmentStatus::PickedUp
                | ShipmentStatus::InTransit
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "shipment_platform", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Web,
    Mobile,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: i64,
    pub customer_id: i64,
    pub trucker_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub pickup_location: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub drop_location: String,
    pub drop_lat: Option<f64>,
    pub drop_lng: Option<f64>,
    pub cargo_type: String,
    pub cargo_weight: f64,
    pub cargo_description: Option<String>,
    pub pickup_date: Option<DateTime<Utc>>,
    /// What the customer offered. Discounts never touch it.
    pub budget: f64,
    /// What the customer pays after any accepted discount.
    pub total_amount: f64,
    pub status: ShipmentStatus,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<UserRole>,
    pub platform: Platform,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Customer, assigned trucker, assigned driver.
    pub fn is_party(&self, user_id: i64) -> bool {
        self.customer_id == user_id
            || self.trucker_id == Some(user_id)
            || self.driver_id == Some(user_id)
    }

    pub fn is_carrier(&self, user_id: i64) -> bool {
        self.trucker_id == Some(user_id) || self.driver_id == Some(user_id)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentLog {
    pub id: i64,
    pub shipment_id: i64,
    pub actor_id: Option<i64>,
    pub from_status: Option<ShipmentStatus>,
    pub to_status: ShipmentStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentLocation {
    pub id: i64,
    pub shipment_id: i64,
    pub driver_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::ShipmentStatus::*;
    use super::*;

    const ALL: [ShipmentStatus; 7] = [
        Pending, Accepted, Confirmed, PickedUp, InTransit, Delivered, Cancelled,
    ];

    #[test]
    fn happy_path_is_allowed() {
        assert!(Pending.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(PickedUp));
        assert!(Accepted.can_transition_to(PickedUp));
        assert!(PickedUp.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for status in ALL {
            assert!(!Delivered.can_transition_to(status));
            assert!(!Cancelled.can_transition_to(status));
        }
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn every_live_state_can_be_cancelled() {
        for status in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(Cancelled), "{:?}", status);
        }
    }

    #[test]
    fn no_skipping_or_going_back() {
        assert!(!Pending.can_transition_to(PickedUp));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!InTransit.can_transition_to(PickedUp));
        assert!(!PickedUp.can_transition_to(Accepted));
        assert!(!Accepted.can_transition_to(Pending));
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&PickedUp).unwrap(), "\"picked_up\"");
        assert_eq!(InTransit.to_str(), "in_transit");
    }
}
