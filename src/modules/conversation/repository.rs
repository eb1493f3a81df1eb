use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{
        model::ConversationSummary,
        schema::{ConversationEntity, GroupMembershipEntity, MemberRole},
    },
};

#[async_trait::async_trait]
pub trait ConversationRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    async fn find_direct_between(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    /// Tạo direct conversation với đúng 2 participants (invariant §3)
    async fn create_direct(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError>;

    /// Tạo group conversation: creator là admin, các member còn lại role member.
    /// Membership rows + participants list được ghi trong cùng một transaction.
    async fn create_group(
        &self,
        name: &str,
        creator: &Uuid,
        member_ids: &[Uuid],
    ) -> Result<ConversationEntity, error::SystemError>;

    async fn list_for_user(
        &self,
        user_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>, error::SystemError>;

    async fn rename(&self, conversation_id: &Uuid, name: &str)
        -> Result<(), error::SystemError>;

    async fn touch_updated_at(&self, conversation_id: &Uuid) -> Result<(), error::SystemError>;
}

/// Repository ghi membership (phía admin). Phía đọc - resolve recipient set -
/// nằm ở modules::membership với các MembershipSource.
#[async_trait::async_trait]
pub trait MembershipRepository {
    async fn find_active(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<GroupMembershipEntity>, error::SystemError>;

    /// Thêm member: tạo row mới hoặc reactivate row cũ (unique theo
    /// (conversation, user)), đồng bộ participants list
    async fn upsert_active(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MemberRole,
        added_by: Option<&Uuid>,
    ) -> Result<GroupMembershipEntity, error::SystemError>;

    /// Soft-close membership: is_active=false, left_at=now. Xử lý cả
    /// GroupMembership lẫn DefaultGroupMembership, và luôn gỡ khỏi
    /// participants list cho nhất quán. Trả về true nếu có row nào bị đóng.
    async fn deactivate(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    async fn set_role(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MemberRole,
    ) -> Result<bool, error::SystemError>;
}
