/// WebSocket Wire Protocol
///
/// Event types trao đổi giữa client và server qua WebSocket.
/// Hai channel dùng chung protocol này:
/// - chat channel (/ws/chat/{conversation_id}): send/get messages, mark read
/// - notification channel (/ws/notifications): unread count, notification list
///
/// Event gửi nhầm channel nhận lại `error`, connection vẫn mở.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::conversation::model::ConversationSummary;
use crate::modules::message::schema::{MessageEntity, MessageType};
use crate::modules::notification::schema::NotificationEntity;

/// Events từ client đến server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Gửi tin nhắn vào conversation của chat channel
    SendMessage {
        content: Option<String>,
        #[serde(default)]
        message_type: MessageType,
        file_url: Option<String>,
        reply_to: Option<Uuid>,
    },

    /// Danh sách conversations của user
    GetConversations,

    /// Messages của conversation hiện tại
    GetMessages,

    /// Mark read: message_id trên chat channel, notification_id trên
    /// notification channel
    MarkRead {
        message_id: Option<Uuid>,
        notification_id: Option<Uuid>,
    },

    /// Tổng notification chưa đọc
    GetUnreadCount,

    /// Notifications mới nhất
    GetNotifications { limit: Option<i64> },
}

/// Events từ server đến client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ConversationsList { conversations: Vec<ConversationSummary> },

    ConversationMessages { messages: Vec<MessageEntity> },

    /// Message mới broadcast tới conversation topic
    Message { message: MessageEntity },

    Error { message: String },

    UnreadCount { count: i64 },

    /// Notification mới broadcast tới personal topic của recipient
    NewNotification { notification: NotificationEntity },

    /// Kết quả mark read notification
    NotificationRead { id: Uuid, success: bool },

    NotificationsList { notifications: Vec<NotificationEntity> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::notification::schema::NotificationType;

    // === ClientEvent deserialization ===

    #[test]
    fn test_client_send_message_deserialize() {
        let json = r#"{"type":"send_message","content":"Xin chào!"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage { content, message_type, file_url, reply_to } => {
                assert_eq!(content.as_deref(), Some("Xin chào!"));
                assert_eq!(message_type, MessageType::Text);
                assert!(file_url.is_none());
                assert!(reply_to.is_none());
            }
            _ => panic!("Expected SendMessage variant"),
        }
    }

    #[test]
    fn test_client_send_message_with_reply_deserialize() {
        let reply_id = Uuid::now_v7();
        let json = format!(
            r#"{{"type":"send_message","content":"ok","message_type":"text","reply_to":"{reply_id}"}}"#
        );
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(event, ClientEvent::SendMessage { reply_to: Some(id), .. } if id == reply_id)
        );
    }

    #[test]
    fn test_client_send_file_deserialize() {
        let json = r#"{"type":"send_message","message_type":"file","file_url":"/files/a.pdf","content":null}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage { message_type, file_url, .. } => {
                assert_eq!(message_type, MessageType::File);
                assert_eq!(file_url.as_deref(), Some("/files/a.pdf"));
            }
            _ => panic!("Expected SendMessage variant"),
        }
    }

    #[test]
    fn test_client_get_conversations_deserialize() {
        let json = r#"{"type":"get_conversations"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::GetConversations));
    }

    #[test]
    fn test_client_get_messages_deserialize() {
        let json = r#"{"type":"get_messages"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::GetMessages));
    }

    #[test]
    fn test_client_mark_read_message_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"mark_read","message_id":"{id}"}}"#);
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        match event {
            ClientEvent::MarkRead { message_id, notification_id } => {
                assert_eq!(message_id, Some(id));
                assert!(notification_id.is_none());
            }
            _ => panic!("Expected MarkRead variant"),
        }
    }

    #[test]
    fn test_client_mark_read_notification_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"mark_read","notification_id":"{id}"}}"#);
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(event, ClientEvent::MarkRead { notification_id: Some(n), .. } if n == id)
        );
    }

    #[test]
    fn test_client_get_notifications_deserialize() {
        let json = r#"{"type":"get_notifications","limit":20}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::GetNotifications { limit: Some(20) }));

        // limit là optional
        let json = r#"{"type":"get_notifications"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ClientEvent::GetNotifications { limit: None }));
    }

    #[test]
    fn test_unknown_event_type_returns_error() {
        let json = r#"{"type":"subscribe_all"}"#;
        assert!(serde_json::from_str::<ClientEvent>(json).is_err());
    }

    // === ServerEvent serialization ===

    #[test]
    fn test_server_error_serialize() {
        let event = ServerEvent::Error { message: "Không thể gửi tin nhắn".to_string() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("Không thể gửi tin nhắn"));
    }

    #[test]
    fn test_server_unread_count_serialize() {
        let event = ServerEvent::UnreadCount { count: 7 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"unread_count","count":7}"#);
    }

    #[test]
    fn test_server_message_serialize() {
        let message = MessageEntity {
            id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            reply_to_id: None,
            _type: MessageType::Text,
            content: Some("Hello".to_string()),
            file_url: None,
            is_edited: false,
            edited_at: None,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&ServerEvent::Message { message: message.clone() }).unwrap();
        assert!(json.contains(r#""type":"message""#));
        assert!(json.contains(&message.id.to_string()));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn test_server_new_notification_serialize() {
        let notification = NotificationEntity {
            id: Uuid::now_v7(),
            recipient_id: Uuid::now_v7(),
            sender_id: Some(Uuid::now_v7()),
            _type: NotificationType::Message,
            title: "New message".to_string(),
            body: "hi".to_string(),
            conversation_id: Some(Uuid::now_v7()),
            message_id: Some(Uuid::now_v7()),
            is_read: false,
            read_at: None,
            extra_data: serde_json::json!({}),
            created_at: chrono::Utc::now(),
        };
        let json =
            serde_json::to_string(&ServerEvent::NewNotification { notification }).unwrap();
        assert!(json.contains(r#""type":"new_notification""#));
        assert!(json.contains(r#""title":"New message""#));
    }

    #[test]
    fn test_server_notification_read_serialize() {
        let id = Uuid::now_v7();
        let json =
            serde_json::to_string(&ServerEvent::NotificationRead { id, success: true }).unwrap();
        assert!(json.contains(r#""type":"notification_read""#));
        assert!(json.contains(r#""success":true"#));
        assert!(json.contains(&id.to_string()));
    }

    #[test]
    fn test_server_conversations_list_serialize() {
        let event = ServerEvent::ConversationsList { conversations: vec![] };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"conversations_list","conversations":[]}"#);
    }
}
