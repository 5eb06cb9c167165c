pub mod deletion_tokens;
pub mod discount_service;
pub mod error;
pub mod notification_service;
pub mod phone_auth_service;
pub mod push;
pub mod shipment_service;
pub mod sms;
pub mod socket_hub;
