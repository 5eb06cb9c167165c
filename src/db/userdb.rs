// db/userdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::db::DBClient;
use crate::models::usermodel::{User, UserRole};

const USER_COLUMNS: &str = r#"
    id, name, company, email, phone, password, role,
    is_approved, is_email_verified, is_phone_verified,
    otp_code, otp_expires, verification_token, token_expires_at,
    broker_id, created_at, updated_at
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDeletion {
    Deleted,
    NotFound,
    /// Shipments the user is on that are neither delivered nor cancelled.
    OpenShipments(i64),
}

pub struct NewPhoneUser<'a> {
    pub name: &'a str,
    pub company: Option<&'a str>,
    pub phone: &'a str,
    pub role: UserRole,
    pub broker_id: Option<i64>,
    pub otp_code: &'a str,
    pub otp_expires: DateTime<Utc>,
}

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<i64>,
        email: Option<&str>,
        token: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Finds the `role` account whose phone matches any of `variants`.
    async fn get_user_by_phone(
        &self,
        variants: &[String],
        role: UserRole,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn get_users(
        &self,
        role: Option<UserRole>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self, role: Option<UserRole>) -> Result<i64, sqlx::Error>;

    async fn save_user<T: Into<String> + Send>(
        &self,
        name: T,
        company: Option<String>,
        email: T,
        password: T,
        role: UserRole,
        verification_token: T,
        token_expires_at: DateTime<Utc>,
    ) -> Result<User, sqlx::Error>;

    async fn save_phone_user(&self, new_user: NewPhoneUser<'_>) -> Result<User, sqlx::Error>;

    async fn update_user_profile(
        &self,
        user_id: i64,
        name: Option<String>,
        company: Option<String>,
    ) -> Result<User, sqlx::Error>;

    async fn update_user_password(
        &self,
        user_id: i64,
        password: String,
    ) -> Result<User, sqlx::Error>;

    /// Stores the PIN hash only while none exists and the phone is verified.
    async fn set_user_pin(
        &self,
        user_id: i64,
        pin_hash: String,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn set_user_otp(
        &self,
        user_id: i64,
        otp_code: &str,
        otp_expires: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Marks the phone verified and clears the code in one statement, so a
    /// code can be redeemed at most once.
    async fn consume_user_otp(
        &self,
        user_id: i64,
        otp_code: &str,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn verify_email_token(&self, token: &str) -> Result<(), sqlx::Error>;

    async fn clear_verification_token(&self, token: &str) -> Result<(), sqlx::Error>;

    async fn add_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    async fn approve_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error>;

    /// Removes the account unless it is still a party to live shipments.
    async fn delete_user(&self, user_id: i64) -> Result<UserDeletion, sqlx::Error>;

    async fn get_broker_drivers(&self, broker_id: i64) -> Result<Vec<User>, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<i64>,
        email: Option<&str>,
        token: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE id = $1",
                USER_COLUMNS
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE lower(email) = lower($1)",
                USER_COLUMNS
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(token) = token {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE verification_token = $1",
                USER_COLUMNS
            ))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_user_by_phone(
        &self,
        variants: &[String],
        role: UserRole,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE phone = ANY($1) AND role = $2
            ORDER BY id
            LIMIT 1
            "#,
            USER_COLUMNS
        ))
        .bind(variants)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_users(
        &self,
        role: Option<UserRole>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<User>, sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            USER_COLUMNS
        ))
        .bind(role)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_user_count(&self, role: Option<UserRole>) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM users WHERE ($1::user_role IS NULL OR role = $1)"#,
        )
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_user<T: Into<String> + Send>(
        &self,
        name: T,
        company: Option<String>,
        email: T,
        password: T,
        role: UserRole,
        verification_token: T,
        token_expires_at: DateTime<Utc>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, company, email, password, role, verification_token, token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(name.into())
        .bind(company)
        .bind(email.into())
        .bind(password.into())
        .bind(role)
        .bind(verification_token.into())
        .bind(token_expires_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn save_phone_user(&self, new_user: NewPhoneUser<'_>) -> Result<User, sqlx::Error> {
        // drivers created by a broker are approved through their broker
        let is_approved = new_user.role == UserRole::Driver;

        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, company, phone, role, broker_id, otp_code, otp_expires, is_approved)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new_user.name)
        .bind(new_user.company)
        .bind(new_user.phone)
        .bind(new_user.role)
        .bind(new_user.broker_id)
        .bind(new_user.otp_code)
        .bind(new_user.otp_expires)
        .bind(is_approved)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_profile(
        &self,
        user_id: i64,
        name: Option<String>,
        company: Option<String>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                company = COALESCE($2, company),
                updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(name)
        .bind(company)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_password(
        &self,
        user_id: i64,
        new_password: String,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new_password)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_user_pin(
        &self,
        user_id: i64,
        pin_hash: String,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password = $1, updated_at = NOW()
            WHERE id = $2 AND password IS NULL AND is_phone_verified = TRUE
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(pin_hash)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_user_otp(
        &self,
        user_id: i64,
        otp_code: &str,
        otp_expires: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET otp_code = $1, otp_expires = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(otp_code)
        .bind(otp_expires)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_user_otp(
        &self,
        user_id: i64,
        otp_code: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_phone_verified = TRUE, otp_code = NULL, otp_expires = NULL, updated_at = NOW()
            WHERE id = $1 AND otp_code = $2 AND otp_expires > NOW()
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(otp_code)
        .fetch_optional(&self.pool)
        .await
    }

    async fn verify_email_token(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_email_verified = TRUE,
                updated_at = NOW(),
                verification_token = NULL,
                token_expires_at = NULL
            WHERE verification_token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_verification_token(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET verification_token = NULL, token_expires_at = NULL, updated_at = NOW()
            WHERE verification_token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_verification_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET verification_token = $1, token_expires_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn approve_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_approved = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_user(&self, user_id: i64) -> Result<UserDeletion, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // New shipments, accepts and driver assignments key-share lock the
        // user row, so no work can be picked up between the count and the delete.
        let locked = sqlx::query_scalar::<_, i64>(r#"SELECT id FROM users WHERE id = $1 FOR UPDATE"#)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Ok(UserDeletion::NotFound);
        }

        let open = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM shipments
            WHERE (customer_id = $1 OR trucker_id = $1 OR driver_id = $1)
              AND status NOT IN ('delivered', 'cancelled')
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if open > 0 {
            tx.rollback().await?;
            return Ok(UserDeletion::OpenShipments(open));
        }

        // shipments_customer_id_fkey is RESTRICT: a customer's shipment
        // history is never removed with the account
        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(UserDeletion::Deleted)
    }

    async fn get_broker_drivers(&self, broker_id: i64) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE broker_id = $1 AND role = 'driver'
            ORDER BY name
            "#,
            USER_COLUMNS
        ))
        .bind(broker_id)
        .fetch_all(&self.pool)
        .await
    }
}
