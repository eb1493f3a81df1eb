use uuid::Uuid;

use crate::{
    api::error,
    modules::notification::{
        model::NewNotification,
        schema::{NotificationEntity, NotificationSettingsEntity},
    },
};

#[async_trait::async_trait]
pub trait NotificationRepository {
    async fn create(
        &self,
        notification: &NewNotification,
    ) -> Result<NotificationEntity, error::SystemError>;

    /// Tổng notification chưa đọc của user (mọi loại)
    async fn unread_count(&self, recipient_id: &Uuid) -> Result<i64, error::SystemError>;

    /// Mark read, chỉ khi notification thuộc về recipient.
    /// Trả về false nếu không tồn tại hoặc không phải của recipient.
    async fn mark_read(
        &self,
        notification_id: &Uuid,
        recipient_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    /// Notifications mới nhất trước (created_at DESC, id DESC)
    async fn recent(
        &self,
        recipient_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<NotificationEntity>, error::SystemError>;
}

#[async_trait::async_trait]
pub trait SettingsRepository {
    /// Lazy init: user chưa có row settings thì tạo với defaults
    async fn get_or_create(
        &self,
        user_id: &Uuid,
    ) -> Result<NotificationSettingsEntity, error::SystemError>;

    async fn update(
        &self,
        settings: &NotificationSettingsEntity,
    ) -> Result<NotificationSettingsEntity, error::SystemError>;
}
