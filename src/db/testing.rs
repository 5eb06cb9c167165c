// db/testing.rs
//
// Postgres fixtures for service tests. Tests that need them return early
// when DATABASE_URL is not set.
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sqlx::postgres::PgPoolOptions;

use super::{
    shipmentdb::ShipmentExt,
    userdb::{NewPhoneUser, UserExt},
    DBClient,
};
use crate::{
    config::Config,
    dtos::shipmentdtos::CreateShipmentDto,
    mail::{queue::MailQueue, sendmail::Mailer},
    models::{
        shipmentmodel::{Platform, Shipment},
        usermodel::{User, UserRole},
    },
    service::{notification_service::NotificationService, push::PushClient, socket_hub::SocketHub},
    utils::otp_generator::{generate_otp, otp_expiry_from},
};

pub async fn test_db() -> Option<Arc<DBClient>> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("connect to DATABASE_URL");

    sqlx::migrate!().run(&pool).await.expect("run migrations");

    Some(Arc::new(DBClient::new(pool)))
}

pub fn notifications(db: Arc<DBClient>) -> NotificationService {
    let config = Config::for_tests();
    let mailer = Arc::new(Mailer::new(&config).expect("smtp transport"));

    NotificationService::new(
        db,
        PushClient::new(None),
        SocketHub::new(),
        MailQueue::new(mailer, None),
        config.app_url,
    )
}

/// A local-format number nobody else in the database is likely to hold.
pub fn fresh_phone() -> String {
    format!("03{:09}", rand::rng().random_range(0..1_000_000_000u32))
}

pub async fn phone_user(db: &DBClient, role: UserRole, phone: &str) -> User {
    let otp = generate_otp();
    let user = db
        .save_phone_user(NewPhoneUser {
            name: "Test user",
            company: None,
            phone,
            role,
            broker_id: None,
            otp_code: &otp,
            otp_expires: otp_expiry_from(Utc::now()),
        })
        .await
        .expect("insert user");

    if user.is_approved {
        return user;
    }

    db.approve_user(user.id)
        .await
        .expect("approve user")
        .expect("user exists")
}

pub async fn posted_shipment(db: &DBClient, customer_id: i64, budget: f64) -> Shipment {
    let body = CreateShipmentDto {
        pickup_location: "Karachi Port".to_string(),
        pickup_lat: None,
        pickup_lng: None,
        drop_location: "Lahore Dry Port".to_string(),
        drop_lat: None,
        drop_lng: None,
        cargo_type: "textiles".to_string(),
        cargo_weight: 12.5,
        cargo_description: None,
        pickup_date: None,
        budget,
        platform: None,
    };

    db.create_shipment(customer_id, &body, Platform::Web)
        .await
        .expect("insert shipment")
}
