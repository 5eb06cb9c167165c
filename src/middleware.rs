use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    db::userdb::UserExt,
    error::{ErrorCode, ErrorMessage, HttpError},
    models::usermodel::{Capability, User},
    utils::token::{self, TokenKind},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddeware {
    pub user: User,
}

/// `token` cookie first, then `Authorization: Bearer`.
pub fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
        .filter(|token| !token.is_empty())
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req).ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
            .with_code(ErrorCode::TokenNotProvided)
    })?;

    let claims = token::decode_token(
        token,
        app_state.env.jwt_secret.as_bytes(),
        TokenKind::Access,
    )?;

    let user = app_state
        .db_client
        .get_user(Some(claims.id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("auth: user lookup failed: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string())
                .with_code(ErrorCode::UserNoLongerExists)
        })?;

    req.extensions_mut().insert(JWTAuthMiddeware { user });

    Ok(next.run(req).await)
}

/// Passes when the caller's role grants any of `required`.
pub async fn role_check(
    Extension(_app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
    required: Vec<Capability>,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddeware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required.iter().any(|capability| user.user.role.can(*capability)) {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::HeaderValue};
    use axum_extra::extract::cookie::Cookie;

    fn request(authorization: Option<&str>) -> Request {
        let mut req = Request::new(Body::empty());
        if let Some(value) = authorization {
            req.headers_mut()
                .insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        req
    }

    #[test]
    fn bearer_header_is_read() {
        let jar = CookieJar::new();
        assert_eq!(
            extract_token(&jar, &request(Some("Bearer abc.def"))),
            Some("abc.def".to_string())
        );
        assert_eq!(extract_token(&jar, &request(Some("Basic abc"))), None);
        assert_eq!(extract_token(&jar, &request(Some("Bearer "))), None);
        assert_eq!(extract_token(&jar, &request(None)), None);
    }

    #[test]
    fn cookie_wins_over_header() {
        let jar = CookieJar::new().add(Cookie::new("token", "from-cookie"));
        assert_eq!(
            extract_token(&jar, &request(Some("Bearer from-header"))),
            Some("from-cookie".to_string())
        );
    }
}
