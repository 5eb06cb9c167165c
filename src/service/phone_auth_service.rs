// service/phone_auth_service.rs
//
// Per (phone, role) an account moves unregistered -> otp_pending ->
// pin_not_set -> pin_set. Every entry point looks the account up by all
// three spellings of the number.
use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::Config,
    db::{
        userdb::{NewPhoneUser, UserExt},
        DBClient,
    },
    dtos::phonedtos::PhoneAuthStep,
    error::ErrorMessage,
    models::usermodel::{User, UserRole},
    service::{error::ServiceError, sms::SmsClient},
    utils::{
        otp_generator::{check_otp, generate_otp, otp_expiry_from, OtpCheck},
        password, phone,
        token::{issue_session, TokenPair},
    },
};

/// Where an existing (or missing) account stands in the flow.
pub fn next_step(user: Option<&User>) -> PhoneAuthStep {
    match user {
        None => PhoneAuthStep::SignupRequired,
        Some(user) if !user.is_phone_verified => PhoneAuthStep::VerifyOtp,
        Some(user) if user.has_pin() => PhoneAuthStep::EnterPin,
        Some(_) => PhoneAuthStep::SetPin,
    }
}

pub fn step_message(step: PhoneAuthStep) -> &'static str {
    match step {
        PhoneAuthStep::SignupRequired => "No account found for this number, please sign up",
        PhoneAuthStep::VerifyOtp => "A verification code has been sent to your phone",
        PhoneAuthStep::SetPin => "Phone verified, please set your PIN",
        PhoneAuthStep::EnterPin => "Please enter your PIN",
    }
}

/// Two signups racing past the lookups in `signup` are settled by the
/// unique index and the driver/trucker exclusion constraint; report them the
/// same way the lookups would have.
fn signup_conflict(error: sqlx::Error, role: UserRole) -> ServiceError {
    let conflict = error
        .as_database_error()
        .and_then(|db_error| db_error.constraint())
        .and_then(|constraint| phone_constraint_conflict(constraint, role));

    conflict.unwrap_or(ServiceError::Database(error))
}

fn phone_constraint_conflict(constraint: &str, role: UserRole) -> Option<ServiceError> {
    match constraint {
        "users_phone_role_unique" => Some(ServiceError::PhoneExists(role.to_str().to_string())),
        // the other side of the exclusion holds the number
        "users_driver_trucker_phone_excl" => role
            .conflicting_phone_role()
            .map(|holder| ServiceError::PhoneUsedByOtherRole(holder.to_str().to_string())),
        _ => None,
    }
}

fn variants(raw: &str) -> Result<[String; 3], ServiceError> {
    phone::lookup_variants(raw).ok_or(ServiceError::Auth(ErrorMessage::InvalidPhone))
}

#[derive(Clone)]
pub struct PhoneAuthService {
    db_client: Arc<DBClient>,
    sms: SmsClient,
    config: Arc<Config>,
}

impl PhoneAuthService {
    pub fn new(db_client: Arc<DBClient>, sms: SmsClient, config: Arc<Config>) -> Self {
        Self {
            db_client,
            sms,
            config,
        }
    }

    async fn find(&self, raw_phone: &str, role: UserRole) -> Result<Option<User>, ServiceError> {
        let variants = variants(raw_phone)?;
        Ok(self.db_client.get_user_by_phone(&variants, role).await?)
    }

    async fn require(&self, raw_phone: &str, role: UserRole) -> Result<User, ServiceError> {
        self.find(raw_phone, role).await?.ok_or_else(|| {
            ServiceError::Validation(step_message(PhoneAuthStep::SignupRequired).to_string())
        })
    }

    /// Overwrites any previous code; there is no resend cooldown.
    async fn issue_otp(&self, user: &User) -> Result<(), ServiceError> {
        let phone = user
            .phone
            .as_deref()
            .ok_or(ServiceError::Auth(ErrorMessage::InvalidPhone))?;

        let otp = generate_otp();
        self.db_client
            .set_user_otp(user.id, &otp, otp_expiry_from(Utc::now()))
            .await?;
        self.sms.send_otp(phone, &otp).await
    }

    fn issue_tokens(&self, user: &User) -> Result<TokenPair, ServiceError> {
        issue_session(&self.config, user.id, user.role)
            .map_err(|e| ServiceError::Other(format!("could not sign tokens: {}", e)))
    }

    pub async fn check(&self, raw_phone: &str, role: UserRole) -> Result<PhoneAuthStep, ServiceError> {
        let user = self.find(raw_phone, role).await?;
        let step = next_step(user.as_ref());

        if let (PhoneAuthStep::VerifyOtp, Some(user)) = (step, user.as_ref()) {
            self.issue_otp(user).await?;
        }

        Ok(step)
    }

    /// Creates an unverified phone account and texts it a code. Brokers use
    /// this with `broker_id` set to onboard their drivers.
    pub async fn signup(
        &self,
        raw_phone: &str,
        role: UserRole,
        name: &str,
        company: Option<&str>,
        broker_id: Option<i64>,
    ) -> Result<User, ServiceError> {
        let variants = variants(raw_phone)?;

        if self.db_client.get_user_by_phone(&variants, role).await?.is_some() {
            return Err(ServiceError::PhoneExists(role.to_str().to_string()));
        }

        if let Some(other) = role.conflicting_phone_role() {
            if self.db_client.get_user_by_phone(&variants, other).await?.is_some() {
                return Err(ServiceError::PhoneUsedByOtherRole(other.to_str().to_string()));
            }
        }

        let stored_phone =
            phone::to_e164(raw_phone).ok_or(ServiceError::Auth(ErrorMessage::InvalidPhone))?;
        let otp = generate_otp();
        let user = self
            .db_client
            .save_phone_user(NewPhoneUser {
                name,
                company,
                phone: &stored_phone,
                role,
                broker_id,
                otp_code: &otp,
                otp_expires: otp_expiry_from(Utc::now()),
            })
            .await
            .map_err(|e| signup_conflict(e, role))?;

        tracing::info!("phone signup: {} {} created", role.to_str(), user.id);
        self.sms.send_otp(&stored_phone, &otp).await?;

        Ok(user)
    }

    pub async fn verify_otp(
        &self,
        raw_phone: &str,
        role: UserRole,
        otp: &str,
    ) -> Result<PhoneAuthStep, ServiceError> {
        let user = self.require(raw_phone, role).await?;

        match check_otp(user.otp_code.as_deref(), user.otp_expires, otp, Utc::now()) {
            OtpCheck::Valid => {}
            OtpCheck::Mismatch => return Err(ServiceError::Auth(ErrorMessage::InvalidOtp)),
            OtpCheck::Expired => return Err(ServiceError::Auth(ErrorMessage::OtpExpired)),
        }

        // a concurrent verify may have redeemed the same code first
        let verified = self
            .db_client
            .consume_user_otp(user.id, otp)
            .await?
            .ok_or(ServiceError::Auth(ErrorMessage::InvalidOtp))?;

        tracing::info!("phone verified for user {}", verified.id);
        Ok(next_step(Some(&verified)))
    }

    /// Stores the PIN, then signs the user in. Unapproved truckers keep the
    /// PIN but get no tokens until an admin approves them.
    pub async fn set_pin(
        &self,
        raw_phone: &str,
        role: UserRole,
        pin: &str,
    ) -> Result<(User, TokenPair), ServiceError> {
        let user = self.require(raw_phone, role).await?;

        if !user.is_phone_verified {
            return Err(ServiceError::Auth(ErrorMessage::PhoneNotVerified));
        }
        if user.has_pin() {
            return Err(ServiceError::Auth(ErrorMessage::PinAlreadySet));
        }

        let pin_hash = password::hash(pin).map_err(ServiceError::Auth)?;
        let user = self
            .db_client
            .set_user_pin(user.id, pin_hash)
            .await?
            .ok_or(ServiceError::Auth(ErrorMessage::PinAlreadySet))?;

        tracing::info!("PIN set for user {}", user.id);

        if !user.is_cleared_to_work() {
            return Err(ServiceError::NotApproved);
        }

        let tokens = self.issue_tokens(&user)?;
        Ok((user, tokens))
    }

    pub async fn login(
        &self,
        raw_phone: &str,
        role: UserRole,
        pin: &str,
    ) -> Result<(User, TokenPair), ServiceError> {
        let user = self
            .find(raw_phone, role)
            .await?
            .ok_or(ServiceError::Auth(ErrorMessage::WrongPin))?;

        if !user.is_phone_verified {
            return Err(ServiceError::Auth(ErrorMessage::PhoneNotVerified));
        }
        let Some(pin_hash) = user.password.as_deref() else {
            return Err(ServiceError::Auth(ErrorMessage::PinNotSet));
        };

        let matches = password::compare(pin, pin_hash).map_err(ServiceError::Auth)?;
        if !matches {
            return Err(ServiceError::Auth(ErrorMessage::WrongPin));
        }
        if !user.is_cleared_to_work() {
            return Err(ServiceError::NotApproved);
        }

        let tokens = self.issue_tokens(&user)?;
        Ok((user, tokens))
    }

    pub async fn resend_otp(&self, raw_phone: &str, role: UserRole) -> Result<PhoneAuthStep, ServiceError> {
        let user = self.require(raw_phone, role).await?;
        self.issue_otp(&user).await?;
        Ok(PhoneAuthStep::VerifyOtp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ErrorCode, HttpError},
        service::shipment_service::tests::user,
    };

    #[test]
    fn unknown_number_must_sign_up() {
        assert_eq!(next_step(None), PhoneAuthStep::SignupRequired);
    }

    #[test]
    fn unverified_number_gets_an_otp() {
        let mut u = user(1, UserRole::Driver);
        u.is_phone_verified = false;
        assert_eq!(next_step(Some(&u)), PhoneAuthStep::VerifyOtp);

        // a PIN without verification still needs the OTP first
        u.password = Some("hash".to_string());
        assert_eq!(next_step(Some(&u)), PhoneAuthStep::VerifyOtp);
    }

    #[test]
    fn verified_number_sets_or_enters_pin() {
        let mut u = user(1, UserRole::Trucker);
        assert_eq!(next_step(Some(&u)), PhoneAuthStep::SetPin);

        u.password = Some("hash".to_string());
        assert_eq!(next_step(Some(&u)), PhoneAuthStep::EnterPin);
    }

    #[test]
    fn malformed_numbers_are_rejected_before_lookup() {
        assert!(matches!(
            variants("12345"),
            Err(ServiceError::Auth(ErrorMessage::InvalidPhone))
        ));
        let v = variants("0300-1234567").unwrap();
        assert_eq!(v[2], "+923001234567");
    }

    #[test]
    fn constraint_races_match_the_lookup_errors() {
        let err: HttpError =
            phone_constraint_conflict("users_driver_trucker_phone_excl", UserRole::Trucker)
                .unwrap()
                .into();
        assert_eq!(err.code, ErrorCode::PhoneUsedByDriver);
        assert!(err.message.contains("used by a driver"));

        let err: HttpError =
            phone_constraint_conflict("users_driver_trucker_phone_excl", UserRole::Driver)
                .unwrap()
                .into();
        assert_eq!(err.code, ErrorCode::PhoneUsedByTrucker);

        let err: HttpError = phone_constraint_conflict("users_phone_role_unique", UserRole::Customer)
            .unwrap()
            .into();
        assert_eq!(err.code, ErrorCode::PhoneExists);

        assert!(phone_constraint_conflict("vehicles_registration_number_key", UserRole::Trucker).is_none());
    }

    #[test]
    fn every_step_has_a_message() {
        for step in [
            PhoneAuthStep::SignupRequired,
            PhoneAuthStep::VerifyOtp,
            PhoneAuthStep::SetPin,
            PhoneAuthStep::EnterPin,
        ] {
            assert!(!step_message(step).is_empty());
        }
    }

    mod with_database {
        use super::*;
        use crate::db::testing::{fresh_phone, phone_user, test_db};

        fn service(db: Arc<DBClient>) -> PhoneAuthService {
            let config = Config::for_tests();
            PhoneAuthService::new(db, SmsClient::new(&config), Arc::new(config))
        }

        #[tokio::test]
        async fn every_spelling_finds_the_stored_row() {
            let Some(db) = test_db().await else { return };
            let auth = service(db.clone());

            // historical rows kept whatever spelling the client sent
            let local = fresh_phone();
            let core = &local[1..];
            let stored = phone_user(&db, UserRole::Trucker, &local).await;

            for spelling in [local.clone(), format!("92{}", core), format!("+92{}", core)] {
                let found = auth.find(&spelling, UserRole::Trucker).await.unwrap();
                assert_eq!(found.map(|u| u.id), Some(stored.id), "{}", spelling);
            }

            assert!(auth.find(&local, UserRole::Driver).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn signup_stores_e164_and_refuses_duplicates() {
            let Some(db) = test_db().await else { return };
            let auth = service(db.clone());

            let local = fresh_phone();
            let user = auth
                .signup(&local, UserRole::Driver, "Asif", None, None)
                .await
                .unwrap();
            assert_eq!(user.phone, Some(format!("+92{}", &local[1..])));

            let again = auth
                .signup(&format!("+92{}", &local[1..]), UserRole::Driver, "Asif", None, None)
                .await;
            assert!(matches!(again, Err(ServiceError::PhoneExists(_))));
        }

        #[tokio::test]
        async fn trucker_cannot_take_a_drivers_number() {
            let Some(db) = test_db().await else { return };
            let auth = service(db.clone());

            let local = fresh_phone();
            auth.signup(&local, UserRole::Driver, "Bilal", None, None)
                .await
                .unwrap();

            let err: HttpError = auth
                .signup(&local, UserRole::Trucker, "Bilal Goods", Some("Bilal Goods"), None)
                .await
                .unwrap_err()
                .into();
            assert_eq!(err.code, ErrorCode::PhoneUsedByDriver);
            assert!(err.message.contains("used by a driver"));
        }

        #[tokio::test]
        async fn otp_works_once() {
            let Some(db) = test_db().await else { return };
            let auth = service(db.clone());

            let local = fresh_phone();
            let user = auth
                .signup(&local, UserRole::Trucker, "Kamran", None, None)
                .await
                .unwrap();
            let otp = user.otp_code.clone().unwrap();

            let step = auth.verify_otp(&local, UserRole::Trucker, &otp).await.unwrap();
            assert_eq!(step, PhoneAuthStep::SetPin);

            let replay = auth.verify_otp(&local, UserRole::Trucker, &otp).await;
            assert!(matches!(replay, Err(ServiceError::Auth(ErrorMessage::InvalidOtp))));
            assert!(db.consume_user_otp(user.id, &otp).await.unwrap().is_none());
        }
    }
}
