use std::{cmp::Ordering, sync::Arc};

use axum::{
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};

use crate::{
    db::notificationdb::NotificationExt,
    dtos::notificationdtos::AppVersionResponseDto,
    error::{ErrorCode, HttpError},
    models::notificationmodel::{DevicePlatform, MobileAppConfig},
    AppState,
};

pub fn mobile_handler() -> Router {
    Router::new().route("/app-version", get(get_app_version))
}

/// Compares dotted numeric versions; missing or non-numeric parts count as 0.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .trim_start_matches(['v', 'V'])
            .split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };

    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());

    (0..len)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            left.cmp(&right)
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

pub fn version_status(current: &str, config: &MobileAppConfig) -> AppVersionResponseDto {
    AppVersionResponseDto {
        update_required: compare_versions(current, &config.min_supported_version)
            == Ordering::Less,
        update_available: compare_versions(current, &config.latest_version) == Ordering::Less,
        latest_version: config.latest_version.clone(),
        min_supported_version: config.min_supported_version.clone(),
        store_url: config.store_url.clone(),
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, HttpError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            HttpError::bad_request(format!("Missing {} header", name))
                .with_code(ErrorCode::MissingHeader)
        })
}

pub async fn get_app_version(
    headers: HeaderMap,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let platform = required_header(&headers, "Platform")?;
    let app_version = required_header(&headers, "App-Version")?;

    let platform = DevicePlatform::from_header(platform).ok_or_else(|| {
        HttpError::bad_request("Platform must be android or ios").with_code(ErrorCode::MissingHeader)
    })?;

    let config = app_state
        .db_client
        .get_app_config(platform)
        .await?
        .ok_or_else(|| {
            HttpError::not_found("No release is configured for this platform")
                .with_code(ErrorCode::NotFound)
        })?;

    Ok(Json(version_status(app_version, &config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn config() -> MobileAppConfig {
        MobileAppConfig {
            platform: DevicePlatform::Android,
            latest_version: "2.4.0".to_string(),
            min_supported_version: "2.0".to_string(),
            store_url: "https://play.google.com/store/apps/details?id=app.haulway".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn dotted_versions_compare_numerically() {
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("v1.2", "1.3"), Ordering::Less);
    }

    #[test]
    fn old_builds_must_update() {
        let status = version_status("1.9.3", &config());
        assert!(status.update_required);
        assert!(status.update_available);

        let status = version_status("2.1.0", &config());
        assert!(!status.update_required);
        assert!(status.update_available);

        let status = version_status("2.4.0", &config());
        assert!(!status.update_required);
        assert!(!status.update_available);
    }

    #[test]
    fn missing_headers_are_rejected() {
        let mut headers = HeaderMap::new();
        let err = required_header(&headers, "App-Version").unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingHeader);

        headers.insert("app-version", HeaderValue::from_static(" 2.1.0 "));
        assert_eq!(required_header(&headers, "App-Version").unwrap(), "2.1.0");
    }
}
