// service/shipment_service.rs
use std::sync::Arc;

use crate::{
    db::{shipmentdb::ShipmentExt, userdb::UserExt, vehicledb::VehicleExt, DBClient},
    dtos::shipmentdtos::{
        AdminAssignShipmentDto, AdminUpdateShipmentDto, AssignDriverDto, CreateShipmentDto,
        UpdateShipmentStatusDto,
    },
    models::{
        shipmentmodel::{Platform, Shipment, ShipmentLog, ShipmentStatus},
        usermodel::{User, UserRole},
    },
    service::{error::ServiceError, notification_service::NotificationService},
};

/// Lifecycle rule for carrier updates. Admin overrides never call this.
pub fn check_transition(from: ShipmentStatus, to: ShipmentStatus) -> Result<(), ServiceError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

/// Owner, assigned trucker or assigned driver, and staff.
pub fn can_view(user: &User, shipment: &Shipment) -> bool {
    user.role.is_admin() || shipment.is_party(user.id)
}

pub fn can_cancel(user: &User, shipment: &Shipment) -> bool {
    match user.role {
        UserRole::Customer => shipment.customer_id == user.id,
        UserRole::Trucker => shipment.trucker_id == Some(user.id),
        UserRole::Admin | UserRole::Moderator => true,
        UserRole::Driver => false,
    }
}

pub fn ensure_driver_owned(driver: &User, trucker_id: i64) -> Result<(), ServiceError> {
    if driver.role == UserRole::Driver && driver.broker_id == Some(trucker_id) {
        Ok(())
    } else {
        Err(ServiceError::DriverNotOwned(driver.id))
    }
}

#[derive(Clone)]
pub struct ShipmentService {
    db_client: Arc<DBClient>,
    notifications: NotificationService,
}

impl ShipmentService {
    pub fn new(db_client: Arc<DBClient>, notifications: NotificationService) -> Self {
        Self {
            db_client,
            notifications,
        }
    }

    async fn load(&self, shipment_id: i64) -> Result<Shipment, ServiceError> {
        self.db_client
            .get_shipment(shipment_id)
            .await?
            .ok_or(ServiceError::ShipmentNotFound(shipment_id))
    }

    pub async fn create(
        &self,
        customer: &User,
        body: &CreateShipmentDto,
        platform: Platform,
    ) -> Result<Shipment, ServiceError> {
        let shipment = self
            .db_client
            .create_shipment(customer.id, body, body.platform.unwrap_or(platform))
            .await?;

        tracing::info!(
            "shipment {} created by customer {} ({:?})",
            shipment.id,
            customer.id,
            shipment.platform
        );
        self.notifications.shipment_created(&shipment);

        Ok(shipment)
    }

    pub async fn get(&self, user: &User, shipment_id: i64) -> Result<Shipment, ServiceError> {
        let shipment = self.load(shipment_id).await?;
        if !can_view(user, &shipment) {
            return Err(ServiceError::NotShipmentParty(shipment_id));
        }
        Ok(shipment)
    }

    /// Customers see what they posted, carriers what they carry, staff everything.
    pub async fn list(
        &self,
        user: &User,
        status: Option<ShipmentStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, ServiceError> {
        let shipments = match user.role {
            UserRole::Customer => {
                self.db_client
                    .get_customer_shipments(user.id, status, page, limit)
                    .await?
            }
            UserRole::Trucker | UserRole::Driver => {
                self.db_client
                    .get_carrier_shipments(user.id, user.role, status, page, limit)
                    .await?
            }
            UserRole::Admin | UserRole::Moderator => {
                self.db_client.get_all_shipments(status, page, limit).await?
            }
        };
        Ok(shipments)
    }

    pub async fn available(
        &self,
        trucker: &User,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Shipment>, ServiceError> {
        if !trucker.is_cleared_to_work() {
            return Err(ServiceError::NotApproved);
        }
        Ok(self.db_client.get_available_shipments(page, limit).await?)
    }

    pub async fn logs(&self, user: &User, shipment_id: i64) -> Result<Vec<ShipmentLog>, ServiceError> {
        self.get(user, shipment_id).await?;
        Ok(self.db_client.get_shipment_logs(shipment_id).await?)
    }

    /// Exactly one concurrent caller wins; every other one gets a conflict.
    pub async fn accept(&self, trucker: &User, shipment_id: i64) -> Result<Shipment, ServiceError> {
        if !trucker.is_cleared_to_work() {
            return Err(ServiceError::NotApproved);
        }

        let shipment = self
            .db_client
            .accept_shipment(shipment_id, trucker.id)
            .await?
            .ok_or(ServiceError::ShipmentAlreadyAccepted)?;

        tracing::info!("shipment {} accepted by trucker {}", shipment.id, trucker.id);
        self.notifications.shipment_accepted(&shipment);

        Ok(shipment)
    }

    pub async fn update_status(
        &self,
        actor: &User,
        shipment_id: i64,
        body: UpdateShipmentStatusDto,
    ) -> Result<Shipment, ServiceError> {
        if body.status == ShipmentStatus::Cancelled {
            return self.cancel(actor, shipment_id, body.note).await;
        }

        let current = self.load(shipment_id).await?;
        if !current.is_carrier(actor.id) {
            return Err(ServiceError::NotShipmentParty(shipment_id));
        }
        check_transition(current.status, body.status)?;

        let updated = self
            .db_client
            .transition_shipment(shipment_id, current.status, body.status, actor.id, body.note)
            .await?
            .ok_or(ServiceError::ShipmentStateConflict(shipment_id))?;

        tracing::info!(
            "shipment {} moved {} -> {} by user {}",
            shipment_id,
            current.status.to_str(),
            updated.status.to_str(),
            actor.id
        );
        self.notifications.shipment_status_changed(&updated, actor.id);

        Ok(updated)
    }

    pub async fn cancel(
        &self,
        actor: &User,
        shipment_id: i64,
        reason: Option<String>,
    ) -> Result<Shipment, ServiceError> {
        let current = self.load(shipment_id).await?;
        if !can_cancel(actor, &current) {
            return Err(ServiceError::Forbidden(
                "You are not allowed to cancel this shipment".to_string(),
            ));
        }
        check_transition(current.status, ShipmentStatus::Cancelled)?;

        let cancelled = self
            .db_client
            .cancel_shipment(shipment_id, current.status, reason, actor.role, actor.id)
            .await?
            .ok_or(ServiceError::ShipmentStateConflict(shipment_id))?;

        tracing::info!(
            "shipment {} cancelled by {} {}",
            shipment_id,
            actor.role.to_str(),
            actor.id
        );
        self.notifications.shipment_status_changed(&cancelled, actor.id);

        Ok(cancelled)
    }

    async fn load_trucker(&self, trucker_id: i64) -> Result<User, ServiceError> {
        let trucker = self
            .db_client
            .get_user(Some(trucker_id), None, None)
            .await?
            .ok_or(ServiceError::UserNotFound(trucker_id))?;

        if trucker.role != UserRole::Trucker {
            return Err(ServiceError::Validation(format!(
                "User {} is not a trucker",
                trucker_id
            )));
        }
        if !trucker.is_approved {
            return Err(ServiceError::Validation(format!(
                "Trucker {} is awaiting approval",
                trucker_id
            )));
        }
        Ok(trucker)
    }

    async fn check_crew(
        &self,
        trucker_id: i64,
        driver_id: Option<i64>,
        vehicle_id: Option<i64>,
    ) -> Result<(), ServiceError> {
        if let Some(driver_id) = driver_id {
            let driver = self
                .db_client
                .get_user(Some(driver_id), None, None)
                .await?
                .ok_or(ServiceError::UserNotFound(driver_id))?;
            ensure_driver_owned(&driver, trucker_id)?;
        }

        if let Some(vehicle_id) = vehicle_id {
            let owned = self
                .db_client
                .get_vehicle(vehicle_id)
                .await?
                .is_some_and(|v| v.trucker_id == trucker_id);
            if !owned {
                return Err(ServiceError::VehicleNotOwned(vehicle_id));
            }
        }

        Ok(())
    }

    /// Places the shipment with a trucker regardless of its status.
    pub async fn admin_assign(
        &self,
        admin: &User,
        shipment_id: i64,
        body: &AdminAssignShipmentDto,
    ) -> Result<Shipment, ServiceError> {
        let trucker = self.load_trucker(body.trucker_id).await?;
        self.check_crew(trucker.id, body.driver_id, body.vehicle_id).await?;

        let shipment = self
            .db_client
            .admin_assign_shipment(shipment_id, trucker.id, body.driver_id, body.vehicle_id, admin.id)
            .await?
            .ok_or(ServiceError::ShipmentNotFound(shipment_id))?;

        tracing::info!(
            "shipment {} assigned to trucker {} by admin {}",
            shipment_id,
            trucker.id,
            admin.id
        );
        self.notifications.shipment_assigned(&shipment);

        Ok(shipment)
    }

    pub async fn assign_driver(
        &self,
        trucker: &User,
        shipment_id: i64,
        body: &AssignDriverDto,
    ) -> Result<Shipment, ServiceError> {
        let current = self.load(shipment_id).await?;
        if current.trucker_id != Some(trucker.id) {
            return Err(ServiceError::NotShipmentParty(shipment_id));
        }
        if current.status.is_terminal() {
            return Err(ServiceError::ShipmentStateConflict(shipment_id));
        }
        self.check_crew(trucker.id, Some(body.driver_id), body.vehicle_id).await?;

        let shipment = self
            .db_client
            .assign_driver(shipment_id, trucker.id, body.driver_id, body.vehicle_id)
            .await?
            .ok_or(ServiceError::ShipmentStateConflict(shipment_id))?;

        tracing::info!(
            "driver {} assigned to shipment {} by trucker {}",
            body.driver_id,
            shipment_id,
            trucker.id
        );
        self.notifications.driver_assigned(&shipment);

        Ok(shipment)
    }

    /// Admin override: no lifecycle checks.
    pub async fn admin_update(
        &self,
        admin: &User,
        shipment_id: i64,
        body: &AdminUpdateShipmentDto,
    ) -> Result<Shipment, ServiceError> {
        let before = self.load(shipment_id).await?;

        let updated = self
            .db_client
            .admin_update_shipment(shipment_id, body, admin.id)
            .await?
            .ok_or(ServiceError::ShipmentNotFound(shipment_id))?;

        tracing::warn!(
            "shipment {} force-updated by admin {} ({} -> {})",
            shipment_id,
            admin.id,
            before.status.to_str(),
            updated.status.to_str()
        );
        if updated.status != before.status {
            self.notifications.shipment_status_changed(&updated, admin.id);
        }

        Ok(updated)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn user(id: i64, role: UserRole) -> User {
        User {
            id,
            name: format!("user {}", id),
            company: None,
            email: None,
            phone: None,
            password: None,
            role,
            is_approved: true,
            is_email_verified: true,
            is_phone_verified: true,
            otp_code: None,
            otp_expires: None,
            verification_token: None,
            token_expires_at: None,
            broker_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn shipment(status: ShipmentStatus) -> Shipment {
        Shipment {
            id: 10,
            customer_id: 1,
            trucker_id: Some(2),
            driver_id: Some(3),
            vehicle_id: None,
            pickup_location: "Karachi".to_string(),
            pickup_lat: None,
            pickup_lng: None,
            drop_location: "Lahore".to_string(),
            drop_lat: None,
            drop_lng: None,
            cargo_type: "textiles".to_string(),
            cargo_weight: 12.5,
            cargo_description: None,
            pickup_date: None,
            budget: 10000.0,
            total_amount: 10000.0,
            status,
            cancel_reason: None,
            cancelled_by: None,
            platform: Platform::Web,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn transition_errors_name_both_states() {
        let err = check_transition(ShipmentStatus::Pending, ShipmentStatus::Delivered).unwrap_err();
        assert_eq!(err.to_string(), "Cannot move shipment from pending to delivered");
        assert!(check_transition(ShipmentStatus::PickedUp, ShipmentStatus::InTransit).is_ok());
    }

    #[test]
    fn parties_and_staff_can_view() {
        let s = shipment(ShipmentStatus::InTransit);
        assert!(can_view(&user(1, UserRole::Customer), &s));
        assert!(can_view(&user(2, UserRole::Trucker), &s));
        assert!(can_view(&user(3, UserRole::Driver), &s));
        assert!(can_view(&user(99, UserRole::Moderator), &s));
        assert!(!can_view(&user(4, UserRole::Customer), &s));
        assert!(!can_view(&user(5, UserRole::Trucker), &s));
    }

    #[test]
    fn cancel_rights_follow_roles() {
        let s = shipment(ShipmentStatus::Accepted);
        assert!(can_cancel(&user(1, UserRole::Customer), &s));
        assert!(can_cancel(&user(2, UserRole::Trucker), &s));
        assert!(can_cancel(&user(50, UserRole::Admin), &s));
        assert!(!can_cancel(&user(3, UserRole::Driver), &s));
        assert!(!can_cancel(&user(7, UserRole::Customer), &s));
        assert!(!can_cancel(&user(8, UserRole::Trucker), &s));
    }

    #[test]
    fn terminal_shipments_cannot_be_cancelled() {
        assert!(check_transition(ShipmentStatus::Delivered, ShipmentStatus::Cancelled).is_err());
        assert!(check_transition(ShipmentStatus::Cancelled, ShipmentStatus::Cancelled).is_err());
    }

    #[test]
    fn driver_must_belong_to_the_broker() {
        let mut driver = user(3, UserRole::Driver);
        driver.broker_id = Some(2);
        assert!(ensure_driver_owned(&driver, 2).is_ok());
        assert!(matches!(
            ensure_driver_owned(&driver, 9),
            Err(ServiceError::DriverNotOwned(3))
        ));

        let not_a_driver = user(4, UserRole::Customer);
        assert!(ensure_driver_owned(&not_a_driver, 2).is_err());
    }

    mod with_database {
        use super::*;
        use crate::{
            db::{
                testing::{fresh_phone, notifications, phone_user, posted_shipment, test_db},
                userdb::UserDeletion,
            },
            error::{ErrorCode, HttpError},
        };
        use axum::http::StatusCode;

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_accepts_have_one_winner() {
            let Some(db) = test_db().await else { return };
            let service = ShipmentService::new(db.clone(), notifications(db.clone()));

            let customer = phone_user(&db, UserRole::Customer, &fresh_phone()).await;
            let shipment = posted_shipment(&db, customer.id, 10000.0).await;

            let mut attempts = Vec::new();
            for _ in 0..16 {
                let trucker = phone_user(&db, UserRole::Trucker, &fresh_phone()).await;
                let service = service.clone();
                attempts.push(tokio::spawn(async move {
                    let result = service.accept(&trucker, shipment.id).await;
                    (trucker.id, result)
                }));
            }

            let mut winners = Vec::new();
            let mut conflicts = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    (trucker_id, Ok(accepted)) => {
                        assert_eq!(accepted.trucker_id, Some(trucker_id));
                        winners.push(trucker_id);
                    }
                    (_, Err(ServiceError::ShipmentAlreadyAccepted)) => conflicts += 1,
                    (_, Err(other)) => panic!("unexpected error: {}", other),
                }
            }

            assert_eq!(winners.len(), 1);
            assert_eq!(conflicts, 15);

            let stored = db.get_shipment(shipment.id).await.unwrap().unwrap();
            assert_eq!(stored.status, ShipmentStatus::Accepted);
            assert_eq!(stored.trucker_id, Some(winners[0]));

            let accepted_logs = db
                .get_shipment_logs(shipment.id)
                .await
                .unwrap()
                .into_iter()
                .filter(|log| log.to_status == ShipmentStatus::Accepted)
                .count();
            assert_eq!(accepted_logs, 1);
        }

        #[tokio::test]
        async fn accepting_a_taken_shipment_is_a_409() {
            let Some(db) = test_db().await else { return };
            let service = ShipmentService::new(db.clone(), notifications(db.clone()));

            let customer = phone_user(&db, UserRole::Customer, &fresh_phone()).await;
            let shipment = posted_shipment(&db, customer.id, 5000.0).await;
            let first = phone_user(&db, UserRole::Trucker, &fresh_phone()).await;
            let second = phone_user(&db, UserRole::Trucker, &fresh_phone()).await;

            service.accept(&first, shipment.id).await.unwrap();
            let err: HttpError = service.accept(&second, shipment.id).await.unwrap_err().into();
            assert_eq!(err.status, StatusCode::CONFLICT);
            assert_eq!(err.code, ErrorCode::ShipmentAlreadyAccepted);
        }

        #[tokio::test]
        async fn customer_on_a_live_shipment_cannot_be_deleted() {
            let Some(db) = test_db().await else { return };
            let service = ShipmentService::new(db.clone(), notifications(db.clone()));

            let customer = phone_user(&db, UserRole::Customer, &fresh_phone()).await;
            let trucker = phone_user(&db, UserRole::Trucker, &fresh_phone()).await;
            let shipment = posted_shipment(&db, customer.id, 7000.0).await;
            service.accept(&trucker, shipment.id).await.unwrap();

            assert_eq!(
                db.delete_user(customer.id).await.unwrap(),
                UserDeletion::OpenShipments(1)
            );
            assert_eq!(
                db.delete_user(trucker.id).await.unwrap(),
                UserDeletion::OpenShipments(1)
            );
            assert!(db.get_shipment(shipment.id).await.unwrap().is_some());

            // once the load is settled the trucker may leave, but the
            // customer's shipment history still pins their account
            service
                .cancel(&customer, shipment.id, Some("no longer needed".to_string()))
                .await
                .unwrap();
            assert_eq!(db.delete_user(trucker.id).await.unwrap(), UserDeletion::Deleted);

            let err: HttpError = db.delete_user(customer.id).await.unwrap_err().into();
            assert_eq!(err.status, StatusCode::CONFLICT);
            assert_eq!(err.code, ErrorCode::ForeignKeyViolation);

            let kept = db.get_shipment(shipment.id).await.unwrap().unwrap();
            assert_eq!(kept.status, ShipmentStatus::Cancelled);
            assert_eq!(kept.customer_id, customer.id);
            assert_eq!(kept.trucker_id, None);
        }
    }
}
