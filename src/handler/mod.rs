pub mod auth;
pub mod clearance;
pub mod discount;
pub mod mobile;
pub mod notifications;
pub mod phone_auth;
pub mod shipments;
pub mod socket;
pub mod tracking;
pub mod users;
pub mod vehicles;
