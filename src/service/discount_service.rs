// service/discount_service.rs
//
// An accepted discount rewrites shipments.total_amount and nothing else.
// The budget is re-read inside the same transaction and compared, and any
// drift aborts the decision.
use std::sync::Arc;

use crate::{
    db::{discountdb::DiscountExt, shipmentdb::ShipmentExt, DBClient},
    models::{
        discountmodel::{DiscountDecision, DiscountRequest, DiscountStatus},
        shipmentmodel::Shipment,
        usermodel::User,
    },
    service::{error::ServiceError, notification_service::NotificationService},
};

/// `0 < amount <= budget`, on a shipment that has a budget at all.
pub fn validate_discount_amount(budget: f64, amount: f64) -> Result<(), ServiceError> {
    if !budget.is_finite() || budget <= 0.0 {
        return Err(ServiceError::InvalidAmount(
            "Shipment has no budget to discount".to_string(),
        ));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServiceError::InvalidAmount(
            "Requested amount must be greater than zero".to_string(),
        ));
    }
    if amount > budget {
        return Err(ServiceError::InvalidAmount(format!(
            "Requested amount {:.2} exceeds the shipment budget {:.2}",
            amount, budget
        )));
    }
    Ok(())
}

pub fn ensure_budget_unchanged(before: f64, after: f64) -> Result<(), ServiceError> {
    if (after - before).abs() < f64::EPSILON {
        Ok(())
    } else {
        Err(ServiceError::BudgetChanged { before, after })
    }
}

#[derive(Clone)]
pub struct DiscountService {
    db_client: Arc<DBClient>,
    notifications: NotificationService,
}

impl DiscountService {
    pub fn new(db_client: Arc<DBClient>, notifications: NotificationService) -> Self {
        Self {
            db_client,
            notifications,
        }
    }

    pub async fn request(
        &self,
        customer: &User,
        shipment_id: i64,
        amount: f64,
    ) -> Result<DiscountRequest, ServiceError> {
        let shipment = self
            .db_client
            .get_shipment(shipment_id)
            .await?
            .ok_or(ServiceError::ShipmentNotFound(shipment_id))?;

        if shipment.customer_id != customer.id {
            return Err(ServiceError::NotShipmentParty(shipment_id));
        }
        if shipment.status.is_terminal() {
            return Err(ServiceError::Validation(format!(
                "Shipment {} is already {}",
                shipment_id,
                shipment.status.to_str()
            )));
        }
        if shipment.budget <= 0.0 {
            return Err(ServiceError::InvalidAmount(
                "Shipment has no budget to discount".to_string(),
            ));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ServiceError::InvalidAmount(
                "Requested amount must be greater than zero".to_string(),
            ));
        }

        if self
            .db_client
            .get_discount_request_for_shipment(shipment_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::DiscountExists(shipment_id));
        }

        // the unique index settles two requests racing past the check above
        let request = self
            .db_client
            .create_discount_request(shipment_id, customer.id, amount)
            .await
            .map_err(|e| {
                let unique = e
                    .as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation());
                if unique {
                    ServiceError::DiscountExists(shipment_id)
                } else {
                    ServiceError::Database(e)
                }
            })?;

        tracing::info!(
            "discount request {} for shipment {} ({:.2} of {:.2})",
            request.id,
            shipment_id,
            amount,
            shipment.budget
        );

        Ok(request)
    }

    pub async fn list(
        &self,
        status: Option<DiscountStatus>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<DiscountRequest>, ServiceError> {
        Ok(self.db_client.get_discount_requests(status, page, limit).await?)
    }

    /// Decides a pending request once. The whole decision is one transaction;
    /// dropping `tx` on an early return rolls it back.
    pub async fn decide(
        &self,
        admin: &User,
        discount_id: i64,
        decision: DiscountDecision,
    ) -> Result<(DiscountRequest, Shipment), ServiceError> {
        let mut tx = self.db_client.pool.begin().await?;

        let request = self
            .db_client
            .lock_discount_request_tx(discount_id, &mut tx)
            .await?
            .ok_or(ServiceError::DiscountNotFound(discount_id))?;

        if request.status != DiscountStatus::Pending {
            return Err(ServiceError::DiscountAlreadyDecided(discount_id, request.status));
        }

        let before = self
            .db_client
            .get_shipment_tx(request.shipment_id, &mut tx)
            .await?
            .ok_or(ServiceError::ShipmentNotFound(request.shipment_id))?;

        let shipment = match decision {
            DiscountDecision::Accept => {
                validate_discount_amount(before.budget, request.request_amount)?;

                let updated = self
                    .db_client
                    .set_shipment_total_amount_tx(before.id, request.request_amount, &mut tx)
                    .await?;
                if updated != 1 {
                    return Err(ServiceError::ShipmentNotFound(before.id));
                }

                let after = self
                    .db_client
                    .get_shipment_tx(before.id, &mut tx)
                    .await?
                    .ok_or(ServiceError::ShipmentNotFound(before.id))?;

                ensure_budget_unchanged(before.budget, after.budget)?;
                after
            }
            DiscountDecision::Reject => before,
        };

        let decided = self
            .db_client
            .mark_discount_decided_tx(discount_id, decision.resulting_status(), admin.id, &mut tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "discount request {} {} by admin {}, shipment {} total {:.2}",
            discount_id,
            decided.status.to_str(),
            admin.id,
            shipment.id,
            shipment.total_amount
        );
        self.notifications.discount_decided(&decided, &shipment);

        Ok((decided, shipment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_must_sit_inside_the_budget() {
        assert!(validate_discount_amount(10000.0, 8000.0).is_ok());
        assert!(validate_discount_amount(10000.0, 10000.0).is_ok());
        assert!(validate_discount_amount(10000.0, 10000.01).is_err());
        assert!(validate_discount_amount(10000.0, 0.0).is_err());
        assert!(validate_discount_amount(10000.0, -5.0).is_err());
        assert!(validate_discount_amount(10000.0, f64::NAN).is_err());
    }

    #[test]
    fn zero_budget_cannot_be_discounted() {
        let err = validate_discount_amount(0.0, 10.0).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAmount(_)));
        assert_eq!(err.to_string(), "Shipment has no budget to discount");
    }

    #[test]
    fn identical_budget_passes() {
        assert!(ensure_budget_unchanged(10000.0, 10000.0).is_ok());
        assert!(ensure_budget_unchanged(0.1 + 0.2, 0.1 + 0.2).is_ok());
    }

    #[test]
    fn drifted_budget_is_a_consistency_error() {
        let err = ensure_budget_unchanged(10000.0, 8000.0).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::BudgetChanged { before, after } if before == 10000.0 && after == 8000.0
        ));
    }

    mod with_database {
        use super::*;
        use crate::{
            db::testing::{fresh_phone, notifications, phone_user, posted_shipment, test_db},
            models::usermodel::UserRole,
        };

        #[tokio::test]
        async fn accepted_discount_rewrites_total_and_keeps_budget() {
            let Some(db) = test_db().await else { return };
            let service = DiscountService::new(db.clone(), notifications(db.clone()));

            let customer = phone_user(&db, UserRole::Customer, &fresh_phone()).await;
            let admin = phone_user(&db, UserRole::Admin, &fresh_phone()).await;
            let shipment = posted_shipment(&db, customer.id, 10000.0).await;

            let request = service.request(&customer, shipment.id, 8000.0).await.unwrap();
            assert_eq!(request.status, DiscountStatus::Pending);

            let (decided, updated) = service
                .decide(&admin, request.id, DiscountDecision::Accept)
                .await
                .unwrap();
            assert_eq!(decided.status, DiscountStatus::Accepted);
            assert_eq!(decided.decided_by, Some(admin.id));
            assert_eq!(updated.total_amount, 8000.0);

            let stored = db.get_shipment(shipment.id).await.unwrap().unwrap();
            assert_eq!(stored.budget.to_bits(), 10000.0_f64.to_bits());
            assert_eq!(stored.total_amount, 8000.0);
            assert_eq!(stored.status, shipment.status);

            let again = service.decide(&admin, request.id, DiscountDecision::Reject).await;
            assert!(matches!(
                again,
                Err(ServiceError::DiscountAlreadyDecided(id, DiscountStatus::Accepted)) if id == request.id
            ));

            let untouched = db.get_shipment(shipment.id).await.unwrap().unwrap();
            assert_eq!(untouched.total_amount, 8000.0);
        }

        #[tokio::test]
        async fn rejected_discount_leaves_the_shipment_alone() {
            let Some(db) = test_db().await else { return };
            let service = DiscountService::new(db.clone(), notifications(db.clone()));

            let customer = phone_user(&db, UserRole::Customer, &fresh_phone()).await;
            let admin = phone_user(&db, UserRole::Admin, &fresh_phone()).await;
            let shipment = posted_shipment(&db, customer.id, 6000.0).await;

            let request = service.request(&customer, shipment.id, 5000.0).await.unwrap();
            assert!(matches!(
                service.request(&customer, shipment.id, 4000.0).await,
                Err(ServiceError::DiscountExists(_))
            ));

            let (decided, _) = service
                .decide(&admin, request.id, DiscountDecision::Reject)
                .await
                .unwrap();
            assert_eq!(decided.status, DiscountStatus::Rejected);

            let stored = db.get_shipment(shipment.id).await.unwrap().unwrap();
            assert_eq!(stored.budget, 6000.0);
            assert_eq!(stored.total_amount, 6000.0);

            assert!(matches!(
                service.decide(&admin, request.id, DiscountDecision::Accept).await,
                Err(ServiceError::DiscountAlreadyDecided(_, DiscountStatus::Rejected))
            ));
        }
    }
}
