use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::notificationmodel::{DevicePlatform, Notification};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterDeviceDto {
    #[validate(length(min = 10, max = 4096, message = "Device token is required"))]
    pub token: String,
    pub platform: DevicePlatform,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationListResponseDto {
    pub status: String,
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

#[derive(Debug, Deserialize)]
pub struct SocketQueryDto {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppVersionResponseDto {
    pub latest_version: String,
    pub min_supported_version: String,
    pub store_url: String,
    pub update_required: bool,
    pub update_available: bool,
}
