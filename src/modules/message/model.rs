use serde::Deserialize;
use uuid::Uuid;

use crate::modules::message::schema::MessageType;

/// Input cho Message Store khi persist message mới
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub _type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub reply_to_id: Option<Uuid>,
}

/// Yêu cầu gửi message từ client (qua WebSocket event send_message)
#[derive(Debug, Clone, Deserialize)]
pub struct AppendMessage {
    pub conversation_id: Uuid,
    #[serde(default)]
    pub message_type: MessageType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub reply_to: Option<Uuid>,
}
