use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
    System,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

/// Message bất biến sau khi gửi, trừ content + edited flags qua edit
/// tường minh của chính sender. Thứ tự trong conversation: (created_at, id),
/// id là UUIDv7 nên tie-break theo thứ tự insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageEntity {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub _type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub is_edited: bool,
    pub edited_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageReadReceiptEntity {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub read_at: chrono::DateTime<chrono::Utc>,
}
