// db/notificationdb.rs
use async_trait::async_trait;

use super::db::DBClient;
use crate::models::notificationmodel::{DevicePlatform, DeviceToken, MobileAppConfig, Notification};

#[async_trait]
pub trait NotificationExt {
    async fn save_notification(
        &self,
        user_id: i64,
        kind: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<Notification, sqlx::Error>;

    async fn get_notifications(
        &self,
        user_id: i64,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Notification>, sqlx::Error>;

    async fn get_unread_count(&self, user_id: i64) -> Result<i64, sqlx::Error>;

    async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<u64, sqlx::Error>;

    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64, sqlx::Error>;

    /// A token follows the account that registered it last.
    async fn register_device_token(
        &self,
        user_id: i64,
        token: &str,
        platform: DevicePlatform,
    ) -> Result<DeviceToken, sqlx::Error>;

    async fn remove_device_token(&self, user_id: i64, token: &str) -> Result<u64, sqlx::Error>;

    /// Drops a token the push provider reported as unregistered.
    async fn purge_device_token(&self, token: &str) -> Result<(), sqlx::Error>;

    async fn get_device_tokens(&self, user_id: i64) -> Result<Vec<DeviceToken>, sqlx::Error>;

    async fn get_app_config(
        &self,
        platform: DevicePlatform,
    ) -> Result<Option<MobileAppConfig>, sqlx::Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn save_notification(
        &self,
        user_id: i64,
        kind: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, body, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, kind, title, body, data, is_read, created_at
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(data)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_notifications(
        &self,
        user_id: i64,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, title, body, data, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_unread_count(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn register_device_token(
        &self,
        user_id: i64,
        token: &str,
        platform: DevicePlatform,
    ) -> Result<DeviceToken, sqlx::Error> {
        sqlx::query_as::<_, DeviceToken>(
            r#"
            INSERT INTO device_tokens (user_id, token, platform)
            VALUES ($1, $2, $3)
            ON CONFLICT (token)
            DO UPDATE SET user_id = EXCLUDED.user_id, platform = EXCLUDED.platform
            RETURNING id, user_id, token, platform, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(platform)
        .fetch_one(&self.pool)
        .await
    }

    async fn remove_device_token(&self, user_id: i64, token: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM device_tokens WHERE user_id = $1 AND token = $2"#)
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn purge_device_token(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(r#"DELETE FROM device_tokens WHERE token = $1"#)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_device_tokens(&self, user_id: i64) -> Result<Vec<DeviceToken>, sqlx::Error> {
        sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT id, user_id, token, platform, created_at
            FROM device_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_app_config(
        &self,
        platform: DevicePlatform,
    ) -> Result<Option<MobileAppConfig>, sqlx::Error> {
        sqlx::query_as::<_, MobileAppConfig>(
            r#"
            SELECT platform, latest_version, min_supported_version, store_url, updated_at
            FROM mobile_app_config
            WHERE platform = $1
            "#,
        )
        .bind(platform)
        .fetch_optional(&self.pool)
        .await
    }
}
