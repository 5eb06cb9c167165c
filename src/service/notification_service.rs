// service/notification_service.rs
//
// Every event is written to the notifications table, pushed to open sockets
// and to registered devices, and optionally mailed. Callers fire and forget.
use std::sync::Arc;

use serde_json::json;

use crate::{
    db::{notificationdb::NotificationExt, userdb::UserExt, DBClient},
    mail::{mails, queue::MailQueue},
    models::{
        clearancemodel::ClearanceRequest,
        discountmodel::DiscountRequest,
        shipmentmodel::{Shipment, ShipmentLocation},
    },
    service::{
        push::{PushClient, PushOutcome},
        socket_hub::SocketHub,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ShipmentCreated,
    ShipmentAccepted,
    ShipmentStatusChanged,
    ShipmentCancelled,
    ShipmentAssigned,
    DriverAssigned,
    DiscountDecided,
    ClearanceStatusChanged,
    AccountApproved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ShipmentCreated => "shipment_created",
            NotificationKind::ShipmentAccepted => "shipment_accepted",
            NotificationKind::ShipmentStatusChanged => "shipment_status_changed",
            NotificationKind::ShipmentCancelled => "shipment_cancelled",
            NotificationKind::ShipmentAssigned => "shipment_assigned",
            NotificationKind::DriverAssigned => "driver_assigned",
            NotificationKind::DiscountDecided => "discount_decided",
            NotificationKind::ClearanceStatusChanged => "clearance_status_changed",
            NotificationKind::AccountApproved => "account_approved",
        }
    }

    /// Events important enough to also land in the user's inbox.
    pub fn sends_email(&self) -> bool {
        matches!(
            self,
            NotificationKind::ShipmentAccepted
                | NotificationKind::ShipmentCancelled
                | NotificationKind::DiscountDecided
                | NotificationKind::AccountApproved
        )
    }
}

#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Clone)]
pub struct NotificationService {
    db_client: Arc<DBClient>,
    push: PushClient,
    sockets: SocketHub,
    mail: MailQueue,
    app_url: String,
}

impl NotificationService {
    pub fn new(
        db_client: Arc<DBClient>,
        push: PushClient,
        sockets: SocketHub,
        mail: MailQueue,
        app_url: String,
    ) -> Self {
        Self {
            db_client,
            push,
            sockets,
            mail,
            app_url,
        }
    }

    pub fn sockets(&self) -> &SocketHub {
        &self.sockets
    }

    /// Hands the event to a background task and returns immediately.
    pub fn dispatch(&self, event: NotificationEvent) {
        let service = self.clone();
        tokio::spawn(async move {
            service.deliver(event).await;
        });
    }

    async fn deliver(&self, event: NotificationEvent) {
        let kind = event.kind.as_str();

        let stored = match self
            .db_client
            .save_notification(event.user_id, kind, &event.title, &event.body, event.data.clone())
            .await
        {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!("notification: could not store {} for user {}: {}", kind, event.user_id, e);
                None
            }
        };

        let socket_payload = match &stored {
            Some(notification) => json!({ "notification": notification }),
            None => json!({ "title": event.title, "body": event.body, "data": event.data }),
        };
        self.sockets.emit(event.user_id, kind, socket_payload);

        self.push_to_devices(&event).await;

        if event.kind.sends_email() {
            self.email(&event).await;
        }
    }

    async fn push_to_devices(&self, event: &NotificationEvent) {
        let devices = match self.db_client.get_device_tokens(event.user_id).await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("notification: could not load devices for user {}: {}", event.user_id, e);
                return;
            }
        };

        for device in devices {
            match self
                .push
                .send(&device.token, &event.title, &event.body, &event.data)
                .await
            {
                PushOutcome::Delivered | PushOutcome::Skipped => {}
                PushOutcome::Unregistered => {
                    tracing::info!("notification: dropping unregistered device {}", device.id);
                    if let Err(e) = self.db_client.purge_device_token(&device.token).await {
                        tracing::warn!("notification: could not drop device {}: {}", device.id, e);
                    }
                }
                PushOutcome::Failed(reason) => {
                    tracing::warn!("notification: push to device {} failed: {}", device.id, reason);
                }
            }
        }
    }

    async fn email(&self, event: &NotificationEvent) {
        let user = match self.db_client.get_user(Some(event.user_id), None, None).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("notification: could not load user {}: {}", event.user_id, e);
                return;
            }
        };

        let Some(email) = user.email.as_deref() else {
            return;
        };

        let shipment_id = event.data["shipmentId"].as_i64().unwrap_or_default();
        mails::send_shipment_update_email(
            &self.mail,
            &self.app_url,
            email,
            &user.name,
            shipment_id,
            &event.title,
            &event.body,
        )
        .await;
    }

    fn event(
        user_id: i64,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        data: serde_json::Value,
    ) -> NotificationEvent {
        NotificationEvent {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            data,
        }
    }

    pub fn shipment_created(&self, shipment: &Shipment) {
        self.dispatch(Self::event(
            shipment.customer_id,
            NotificationKind::ShipmentCreated,
            "Shipment posted",
            format!(
                "Your shipment from {} to {} is now visible to truckers.",
                shipment.pickup_location, shipment.drop_location
            ),
            json!({ "shipmentId": shipment.id }),
        ));
    }

    pub fn shipment_accepted(&self, shipment: &Shipment) {
        self.dispatch(Self::event(
            shipment.customer_id,
            NotificationKind::ShipmentAccepted,
            "Shipment accepted",
            format!("A trucker accepted shipment #{}.", shipment.id),
            json!({ "shipmentId": shipment.id, "truckerId": shipment.trucker_id }),
        ));
    }

    /// Tells every party except the one who made the change.
    pub fn shipment_status_changed(&self, shipment: &Shipment, actor_id: i64) {
        let body = format!(
            "Shipment #{} is now {}.",
            shipment.id,
            shipment.status.to_str().replace('_', " ")
        );
        let kind = if shipment.status == crate::models::shipmentmodel::ShipmentStatus::Cancelled {
            NotificationKind::ShipmentCancelled
        } else {
            NotificationKind::ShipmentStatusChanged
        };

        for user_id in parties(shipment).into_iter().filter(|id| *id != actor_id) {
            self.dispatch(Self::event(
                user_id,
                kind,
                "Shipment update",
                body.clone(),
                json!({ "shipmentId": shipment.id, "status": shipment.status }),
            ));
        }
    }

    pub fn shipment_assigned(&self, shipment: &Shipment) {
        if let Some(trucker_id) = shipment.trucker_id {
            self.dispatch(Self::event(
                trucker_id,
                NotificationKind::ShipmentAssigned,
                "New shipment assigned",
                format!("Shipment #{} has been assigned to you.", shipment.id),
                json!({ "shipmentId": shipment.id }),
            ));
        }
        self.dispatch(Self::event(
            shipment.customer_id,
            NotificationKind::ShipmentAccepted,
            "Carrier assigned",
            format!("A carrier has been assigned to shipment #{}.", shipment.id),
            json!({ "shipmentId": shipment.id, "truckerId": shipment.trucker_id }),
        ));
        self.driver_assigned(shipment);
    }

    pub fn driver_assigned(&self, shipment: &Shipment) {
        if let Some(driver_id) = shipment.driver_id {
            self.dispatch(Self::event(
                driver_id,
                NotificationKind::DriverAssigned,
                "New trip",
                format!(
                    "You are driving shipment #{} from {} to {}.",
                    shipment.id, shipment.pickup_location, shipment.drop_location
                ),
                json!({ "shipmentId": shipment.id, "vehicleId": shipment.vehicle_id }),
            ));
        }
    }

    pub fn discount_decided(&self, discount: &DiscountRequest, shipment: &Shipment) {
        self.dispatch(Self::event(
            discount.customer_id,
            NotificationKind::DiscountDecided,
            "Discount request update",
            format!(
                "Your discount request for shipment #{} was {}. Amount due: {:.2}.",
                shipment.id,
                discount.status.to_str(),
                shipment.total_amount
            ),
            json!({
                "shipmentId": shipment.id,
                "discountRequestId": discount.id,
                "status": discount.status,
                "totalAmount": shipment.total_amount,
            }),
        ));
    }

    pub fn clearance_status_changed(&self, request: &ClearanceRequest) {
        self.dispatch(Self::event(
            request.user_id,
            NotificationKind::ClearanceStatusChanged,
            "Clearance request update",
            format!(
                "Clearance request #{} is now {}.",
                request.id,
                request.status.to_str().replace('_', " ")
            ),
            json!({ "clearanceRequestId": request.id, "status": request.status }),
        ));
    }

    pub fn account_approved(&self, user_id: i64) {
        self.dispatch(Self::event(
            user_id,
            NotificationKind::AccountApproved,
            "Account approved",
            "Your trucker account has been approved. You can now accept shipments.",
            json!({}),
        ));
    }

    /// Live position for the customer's map; socket only.
    pub fn location_update(&self, shipment: &Shipment, location: &ShipmentLocation) {
        let payload = json!({ "shipmentId": shipment.id, "location": location });
        self.sockets.emit(shipment.customer_id, "location_update", payload.clone());
        if let Some(trucker_id) = shipment.trucker_id {
            self.sockets.emit(trucker_id, "location_update", payload);
        }
    }
}

fn parties(shipment: &Shipment) -> Vec<i64> {
    let mut ids = vec![shipment.customer_id];
    ids.extend(shipment.trucker_id);
    ids.extend(shipment.driver_id);
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn important_events_are_mailed() {
        assert!(NotificationKind::ShipmentAccepted.sends_email());
        assert!(NotificationKind::DiscountDecided.sends_email());
        assert!(!NotificationKind::ShipmentStatusChanged.sends_email());
        assert!(!NotificationKind::DriverAssigned.sends_email());
    }

    #[test]
    fn kinds_have_stable_names() {
        assert_eq!(NotificationKind::ShipmentCancelled.as_str(), "shipment_cancelled");
        assert_eq!(NotificationKind::ClearanceStatusChanged.as_str(), "clearance_status_changed");
    }
}
