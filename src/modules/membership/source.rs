/// Membership Source
///
/// Một conversation có thể cấp quyền truy cập qua 3 nguồn khác nhau
/// (schema cũ để lại): participants list, GroupMembership, và
/// DefaultGroupMembership. Thay vì hardcode 3 lookup ở mọi call site,
/// mỗi nguồn là một implementation của trait này và resolver compose lại.
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::schema::ConversationEntity;

/// Lookup tối thiểu mà resolver cần từ conversation repository.
/// Tách riêng để mock được trong tests mà không phải mock cả repository.
#[async_trait::async_trait]
pub trait ConversationLookup: Send + Sync {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;
}

#[async_trait::async_trait]
pub trait MembershipSource: Send + Sync {
    /// Tên nguồn, chỉ dùng cho logging
    fn name(&self) -> &'static str;

    /// Tập user đang active theo nguồn này - chỉ trả về user khi nguồn
    /// là authoritative cho loại conversation đó (participants list chỉ
    /// authoritative cho direct chat, membership rows chỉ cho group)
    async fn active_members(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<Vec<Uuid>, error::SystemError>;

    /// User có quyền truy cập theo nguồn này không. Khác với active_members,
    /// check này áp dụng cho mọi loại conversation: một user còn sót lại
    /// trong participants list của group (legacy record) vẫn là member
    /// nếu bất kỳ nguồn nào nói vậy.
    async fn grants_access(
        &self,
        conversation: &ConversationEntity,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;
}
