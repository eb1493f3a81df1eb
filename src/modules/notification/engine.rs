/// Notification Engine
///
/// Quyết định emit hay suppress notification cho từng recipient:
/// settings toggles → DND window → (tùy policy) recipient đang online.
/// Suppress là silent skip, không phải lỗi. Emit persist đúng một row
/// rồi trả kèm unread_total mới và cờ push.
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::schema::ConversationEntity;
use crate::modules::message::schema::MessageEntity;
use crate::modules::notification::model::{NewNotification, NotificationDecision, SuppressReason};
use crate::modules::notification::repository::{NotificationRepository, SettingsRepository};
use crate::modules::notification::schema::{
    dnd_active, NotificationEntity, NotificationType,
};
use crate::modules::presence::registry::PresenceProbe;

/// Preview trong body bị cắt sau chừng này ký tự
const BODY_PREVIEW_CHARS: usize = 100;

/// Suppress khi recipient đang online là tùy chọn: client realtime đã
/// thấy message rồi, nhưng mặc định vẫn emit để notification list đầy đủ.
#[derive(Debug, Clone, Copy)]
pub struct SuppressionPolicy {
    pub suppress_when_online: bool,
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self { suppress_when_online: false }
    }
}

pub struct NotificationEngine<N, S, P>
where
    N: NotificationRepository + Send + Sync,
    S: SettingsRepository + Send + Sync,
    P: PresenceProbe,
{
    notification_repo: Arc<N>,
    settings_repo: Arc<S>,
    presence: Arc<P>,
    policy: SuppressionPolicy,
}

impl<N, S, P> NotificationEngine<N, S, P>
where
    N: NotificationRepository + Send + Sync,
    S: SettingsRepository + Send + Sync,
    P: PresenceProbe,
{
    pub fn new(
        notification_repo: Arc<N>,
        settings_repo: Arc<S>,
        presence: Arc<P>,
        policy: SuppressionPolicy,
    ) -> Self {
        Self { notification_repo, settings_repo, presence, policy }
    }

    /// Evaluate cho một recipient của một message mới (recipient đã được
    /// resolver xác nhận là member và khác sender).
    pub async fn evaluate_for(
        &self,
        message: &MessageEntity,
        conversation: &ConversationEntity,
        recipient_id: &Uuid,
    ) -> Result<NotificationDecision, error::SystemError> {
        let settings = self.settings_repo.get_or_create(recipient_id).await?;

        if !settings.enable_messages {
            return Ok(NotificationDecision::Suppress(SuppressReason::MessagesDisabled));
        }

        if dnd_active(&settings, chrono::Utc::now().time()) {
            return Ok(NotificationDecision::Suppress(SuppressReason::DoNotDisturb));
        }

        if self.policy.suppress_when_online && self.presence.is_online(recipient_id).await? {
            return Ok(NotificationDecision::Suppress(SuppressReason::RecipientOnline));
        }

        let title = if conversation.is_group {
            let name = conversation.name.as_deref().unwrap_or("Group Chat");
            format!("New message in {name}")
        } else {
            "New message".to_string()
        };

        let notification = self
            .notification_repo
            .create(&NewNotification {
                recipient_id: *recipient_id,
                sender_id: Some(message.sender_id),
                _type: NotificationType::Message,
                title,
                body: body_preview(message),
                conversation_id: Some(message.conversation_id),
                message_id: Some(message.id),
                extra_data: serde_json::json!({
                    "message_type": message._type,
                    "conversation_type": if conversation.is_group { "group" } else { "direct" },
                }),
            })
            .await?;

        let unread_total = self.notification_repo.unread_count(recipient_id).await?;

        Ok(NotificationDecision::Emit {
            notification,
            unread_total,
            push_enabled: settings.enable_push,
        })
    }

    /// Notification cho group event (được thêm vào / bị xóa khỏi nhóm).
    /// Gate riêng: enable_group_notifications, vẫn tôn trọng DND.
    pub async fn group_event_for(
        &self,
        conversation: &ConversationEntity,
        actor_id: Uuid,
        recipient_id: &Uuid,
        _type: NotificationType,
        body: String,
    ) -> Result<NotificationDecision, error::SystemError> {
        let settings = self.settings_repo.get_or_create(recipient_id).await?;

        if !settings.enable_group_notifications {
            return Ok(NotificationDecision::Suppress(SuppressReason::GroupDisabled));
        }

        if dnd_active(&settings, chrono::Utc::now().time()) {
            return Ok(NotificationDecision::Suppress(SuppressReason::DoNotDisturb));
        }

        let name = conversation.name.as_deref().unwrap_or("Group Chat");
        let notification = self
            .notification_repo
            .create(&NewNotification {
                recipient_id: *recipient_id,
                sender_id: Some(actor_id),
                _type,
                title: name.to_string(),
                body,
                conversation_id: Some(conversation.id),
                message_id: None,
                extra_data: serde_json::json!({ "conversation_type": "group" }),
            })
            .await?;

        let unread_total = self.notification_repo.unread_count(recipient_id).await?;

        Ok(NotificationDecision::Emit {
            notification,
            unread_total,
            push_enabled: settings.enable_push,
        })
    }

    pub async fn unread_total(&self, recipient_id: &Uuid) -> Result<i64, error::SystemError> {
        self.notification_repo.unread_count(recipient_id).await
    }

    pub async fn recent(
        &self,
        recipient_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<NotificationEntity>, error::SystemError> {
        self.notification_repo.recent(recipient_id, limit).await
    }

    pub async fn mark_read(
        &self,
        notification_id: &Uuid,
        recipient_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        self.notification_repo.mark_read(notification_id, recipient_id).await
    }
}

fn body_preview(message: &MessageEntity) -> String {
    use crate::modules::message::schema::MessageType;

    let content = match message._type {
        MessageType::Image => return "Sent an image".to_string(),
        MessageType::File => return "Sent a file".to_string(),
        _ => message.content.as_deref().unwrap_or(""),
    };

    // cắt theo char, không theo byte
    if content.chars().count() > BODY_PREVIEW_CHARS {
        let preview: String = content.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{preview}...")
    } else {
        content.to_string()
    }
}
