use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

/// Vai trò trong group conversation
#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationEntity {
    pub id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Participant row - danh sách legacy, authoritative cho direct chat,
/// chỉ giữ để backward compatibility cho group chat
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParticipantEntity {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// Membership row cho group chat. Rời nhóm set is_active=false + left_at,
/// không bao giờ xóa row (audit trail).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupMembershipEntity {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub is_active: bool,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub left_at: Option<chrono::DateTime<chrono::Utc>>,
    pub added_by: Option<Uuid>,
}

impl GroupMembershipEntity {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin && self.is_active
    }
}

/// Default group (Kindergarten, 1st Grade...) - user join qua membership riêng,
/// conversation của nó vẫn là group conversation bình thường
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DefaultGroupEntity {
    pub id: Uuid,
    pub name: String,
    pub conversation_id: Option<Uuid>,
    pub is_active: bool,
}
