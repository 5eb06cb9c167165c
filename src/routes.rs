use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler,
        clearance::{admin_clearance_handler, clearance_handler, documents_handler},
        discount::{admin_discount_handler, discount_handler},
        mobile::mobile_handler,
        notifications::{devices_handler, notifications_handler},
        phone_auth::phone_auth_handler,
        shipments::{admin_shipments_handler, shipments_handler},
        socket::socket_handler,
        tracking::tracking_handler,
        users::{admin_users_handler, users_handler},
        vehicles::vehicles_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // everything here needs a signed-in user; capability checks sit on the routes
    let protected = Router::new()
        .nest("/users", users_handler())
        .nest("/shipments", shipments_handler().merge(tracking_handler()))
        .nest("/discount-requests", discount_handler())
        .nest("/vehicles", vehicles_handler())
        .nest("/clearance-requests", clearance_handler())
        .nest("/documents", documents_handler())
        .nest("/notifications", notifications_handler())
        .nest("/devices", devices_handler())
        .nest(
            "/admin",
            admin_users_handler()
                .merge(admin_shipments_handler())
                .merge(admin_discount_handler())
                .merge(admin_clearance_handler()),
        )
        .layer(middleware::from_fn(auth));

    let api_route = Router::new()
        .nest("/auth", auth_handler().nest("/phone", phone_auth_handler()))
        .nest("/mobile", mobile_handler())
        .merge(socket_handler())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, db::DBClient, mail::sendmail::Mailer};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // requests below are answered before any query reaches the lazy pool
    fn app() -> Router {
        let config = Config::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let mailer = Arc::new(Mailer::new(&config).unwrap());
        create_router(Arc::new(AppState::new(DBClient::new(pool), config, mailer)))
    }

    async fn call(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = call(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (status, body) =
            call(Request::get("/api/users/me").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 4100);
        assert_eq!(body["status"], 401);
    }

    #[tokio::test]
    async fn garbage_bearer_token_is_rejected() {
        let request = Request::post("/api/shipments/7/accept")
            .header("authorization", "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 4101);
    }

    #[tokio::test]
    async fn app_version_requires_headers() {
        let (status, body) =
            call(Request::get("/api/mobile/app-version").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 4004);
    }

    #[tokio::test]
    async fn phone_flow_rejects_bad_numbers_and_roles() {
        let request = Request::post("/api/auth/phone/check")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"phone":"12345678901","role":"trucker"}"#))
            .unwrap();
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 4001);

        let request = Request::post("/api/auth/phone/check")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"phone":"03001234567","role":"customer"}"#))
            .unwrap();
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 4000);
    }
}
