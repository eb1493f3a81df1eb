use chrono::NaiveTime;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::modules::notification::schema::{
    NotificationEntity, NotificationSettingsEntity, NotificationType,
};

/// Input cho repository khi persist notification mới
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub _type: NotificationType,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub extra_data: serde_json::Value,
}

/// Lý do một notification bị suppress (silent skip, không phải lỗi)
#[derive(Debug, Clone, PartialEq)]
pub enum SuppressReason {
    MessagesDisabled,
    GroupDisabled,
    DoNotDisturb,
    RecipientOnline,
}

/// Kết quả evaluate cho một recipient
#[derive(Debug)]
pub enum NotificationDecision {
    Suppress(SuppressReason),
    Emit {
        notification: NotificationEntity,
        /// Tổng số notification chưa đọc SAU khi tạo row mới
        unread_total: i64,
        push_enabled: bool,
    },
}

/// PUT settings: thay toàn bộ settings của user. Window bỏ trống
/// với do_not_disturb bật nghĩa là DND always-on.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    pub enable_messages: bool,
    pub enable_mentions: bool,
    pub enable_group_notifications: bool,
    pub enable_push: bool,
    pub do_not_disturb: bool,
    pub dnd_start: Option<NaiveTime>,
    pub dnd_end: Option<NaiveTime>,
}

impl UpdateSettingsRequest {
    pub fn apply(self, mut settings: NotificationSettingsEntity) -> NotificationSettingsEntity {
        settings.enable_messages = self.enable_messages;
        settings.enable_mentions = self.enable_mentions;
        settings.enable_group_notifications = self.enable_group_notifications;
        settings.enable_push = self.enable_push;
        settings.do_not_disturb = self.do_not_disturb;
        settings.dnd_start = self.dnd_start;
        settings.dnd_end = self.dnd_end;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_settings_apply_replaces_all_fields() {
        let current = NotificationSettingsEntity {
            user_id: Uuid::now_v7(),
            enable_messages: true,
            enable_mentions: true,
            enable_group_notifications: true,
            enable_push: true,
            do_not_disturb: false,
            dnd_start: None,
            dnd_end: None,
            updated_at: chrono::Utc::now(),
        };
        let user_id = current.user_id;

        let request = UpdateSettingsRequest {
            enable_messages: false,
            enable_mentions: true,
            enable_group_notifications: false,
            enable_push: false,
            do_not_disturb: true,
            dnd_start: NaiveTime::from_hms_opt(22, 0, 0),
            dnd_end: NaiveTime::from_hms_opt(8, 0, 0),
        };

        let updated = request.apply(current);
        assert_eq!(updated.user_id, user_id);
        assert!(!updated.enable_messages);
        assert!(!updated.enable_group_notifications);
        assert!(updated.do_not_disturb);
        assert_eq!(updated.dnd_start, NaiveTime::from_hms_opt(22, 0, 0));
        assert_eq!(updated.dnd_end, NaiveTime::from_hms_opt(8, 0, 0));
    }

    #[test]
    fn test_update_settings_clears_window_when_omitted() {
        let current = NotificationSettingsEntity {
            user_id: Uuid::now_v7(),
            enable_messages: true,
            enable_mentions: true,
            enable_group_notifications: true,
            enable_push: true,
            do_not_disturb: true,
            dnd_start: NaiveTime::from_hms_opt(22, 0, 0),
            dnd_end: NaiveTime::from_hms_opt(8, 0, 0),
            updated_at: chrono::Utc::now(),
        };

        let request = UpdateSettingsRequest {
            enable_messages: true,
            enable_mentions: true,
            enable_group_notifications: true,
            enable_push: true,
            do_not_disturb: true,
            dnd_start: None,
            dnd_end: None,
        };

        let updated = request.apply(current);
        assert!(updated.dnd_start.is_none());
        assert!(updated.dnd_end.is_none());
    }
}
