use uuid::Uuid;

use crate::{
    api::error,
    modules::notification::{
        model::NewNotification,
        repository::{NotificationRepository, SettingsRepository},
        schema::{NotificationEntity, NotificationSettingsEntity},
    },
};

#[derive(Clone)]
pub struct NotificationRepositoryPg {
    pool: sqlx::PgPool,
}

impl NotificationRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationRepository for NotificationRepositoryPg {
    async fn create(
        &self,
        notification: &NewNotification,
    ) -> Result<NotificationEntity, error::SystemError> {
        let notification = sqlx::query_as::<_, NotificationEntity>(
            r#"
            INSERT INTO notifications
                (id, recipient_id, sender_id, type, title, body, conversation_id, message_id, extra_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(notification.recipient_id)
        .bind(notification.sender_id)
        .bind(&notification._type)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.conversation_id)
        .bind(notification.message_id)
        .bind(&notification.extra_data)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn unread_count(&self, recipient_id: &Uuid) -> Result<i64, error::SystemError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = false",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(
        &self,
        notification_id: &Uuid,
        recipient_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        // recipient_id trong WHERE: user khác không mark read hộ được
        let rows = sqlx::query(
            r#"
            UPDATE notifications SET is_read = true, read_at = now()
            WHERE id = $1 AND recipient_id = $2 AND is_read = false
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    async fn recent(
        &self,
        recipient_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<NotificationEntity>, error::SystemError> {
        let notifications = sqlx::query_as::<_, NotificationEntity>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }
}

#[derive(Clone)]
pub struct SettingsRepositoryPg {
    pool: sqlx::PgPool,
}

impl SettingsRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for SettingsRepositoryPg {
    async fn get_or_create(
        &self,
        user_id: &Uuid,
    ) -> Result<NotificationSettingsEntity, error::SystemError> {
        // INSERT trước rồi SELECT: race giữa 2 connections thì một bên
        // thành no-op, cả hai đọc được cùng một row
        sqlx::query(
            r#"
            INSERT INTO notification_settings (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let settings = sqlx::query_as::<_, NotificationSettingsEntity>(
            "SELECT * FROM notification_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn update(
        &self,
        settings: &NotificationSettingsEntity,
    ) -> Result<NotificationSettingsEntity, error::SystemError> {
        let settings = sqlx::query_as::<_, NotificationSettingsEntity>(
            r#"
            UPDATE notification_settings SET
                enable_messages = $2,
                enable_mentions = $3,
                enable_group_notifications = $4,
                enable_push = $5,
                do_not_disturb = $6,
                dnd_start = $7,
                dnd_end = $8,
                updated_at = now()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(settings.user_id)
        .bind(settings.enable_messages)
        .bind(settings.enable_mentions)
        .bind(settings.enable_group_notifications)
        .bind(settings.enable_push)
        .bind(settings.do_not_disturb)
        .bind(settings.dnd_start)
        .bind(settings.dnd_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }
}
