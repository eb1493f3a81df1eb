use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Row tổng hợp cho danh sách conversation của một user
/// (kèm last message, dùng cho event conversations_list)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_content: Option<String>,
    pub last_sender_id: Option<Uuid>,
    pub last_created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDirectRequest {
    pub recipient_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RenameGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}
