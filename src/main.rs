mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::DBClient,
    mail::{queue::MailQueue, sendmail::Mailer},
    service::{
        deletion_tokens::DeletionTokenStore, discount_service::DiscountService,
        notification_service::NotificationService, phone_auth_service::PhoneAuthService,
        push::PushClient, shipment_service::ShipmentService, sms::SmsClient,
        socket_hub::SocketHub,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: Arc<DBClient>,
    pub mail: MailQueue,
    // Services
    pub notifications: NotificationService,
    pub shipment_service: ShipmentService,
    pub discount_service: DiscountService,
    pub phone_auth: PhoneAuthService,
    pub deletion_tokens: DeletionTokenStore,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config, mailer: Arc<Mailer>) -> Self {
        let env = Arc::new(config);
        let db_client = Arc::new(db_client);

        let mail = MailQueue::new(mailer, db_client.redis());
        let notifications = NotificationService::new(
            db_client.clone(),
            PushClient::new(env.fcm_server_key.clone()),
            SocketHub::new(),
            mail.clone(),
            env.app_url.clone(),
        );

        let shipment_service = ShipmentService::new(db_client.clone(), notifications.clone());
        let discount_service = DiscountService::new(db_client.clone(), notifications.clone());
        let phone_auth = PhoneAuthService::new(db_client.clone(), SmsClient::new(&env), env.clone());
        let deletion_tokens = DeletionTokenStore::new(db_client.redis());

        Self {
            env,
            db_client,
            mail,
            notifications,
            shipment_service,
            discount_service,
            phone_auth,
            deletion_tokens,
        }
    }
}

fn log_level() -> LevelFilter {
    std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([
            AUTHORIZATION,
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("platform"),
            HeaderName::from_static("app-version"),
        ])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt().with_max_level(log_level()).init();

    let config = match Config::init() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!().run(&pool).await {
        tracing::error!("Failed to run migrations: {}", err);
        std::process::exit(1);
    }

    let db_client = match config.redis_url.as_deref() {
        Some(redis_url) => DBClient::with_redis(pool, redis_url).await,
        None => DBClient::new(pool),
    };

    if !db_client.is_redis_available() {
        tracing::info!("Redis unavailable, emails are sent inline (set REDIS_URL to enable the queue)");
    }

    let mailer = match Mailer::new(&config) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            tracing::error!("Failed to configure SMTP: {}", e);
            std::process::exit(1);
        }
    };

    let cors = cors_layer(&config);
    let port = config.port;
    let app_state = Arc::new(AppState::new(db_client, config, mailer));

    // Background jobs
    let mail_worker = app_state.mail.clone();
    tokio::spawn(async move {
        mail_worker.run_forever(shutdown_signal()).await;
    });
    app_state.deletion_tokens.spawn_sweeper();

    let app = create_router(app_state.clone()).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind port {}: {}", port, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {}", e);
    }
}
