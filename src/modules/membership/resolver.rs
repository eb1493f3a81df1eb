/// Membership Resolver
///
/// Trả lời 2 câu hỏi cho phần còn lại của hệ thống:
/// - `active_recipients`: ai phải nhận message của conversation này?
/// - `is_active_member`: user này có quyền truy cập conversation không?
///
/// Không cache: mọi call đọc state mới nhất từ store, vì membership
/// có thể thay đổi giữa 2 lần broadcast.
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::membership::source::{ConversationLookup, MembershipSource};

pub struct MembershipResolver<C>
where
    C: ConversationLookup,
{
    conversation_lookup: Arc<C>,
    sources: Vec<Arc<dyn MembershipSource>>,
}

impl<C> MembershipResolver<C>
where
    C: ConversationLookup,
{
    pub fn new(conversation_lookup: Arc<C>, sources: Vec<Arc<dyn MembershipSource>>) -> Self {
        Self { conversation_lookup, sources }
    }

    /// Union các active member từ tất cả nguồn, dedup theo user id.
    /// Direct chat: participants list (đúng 2 user). Group chat: union của
    /// GroupMembership + DefaultGroupMembership (participants list của group
    /// chỉ là legacy, không đóng góp vào đây).
    pub async fn active_recipients(
        &self,
        conversation_id: &Uuid,
    ) -> Result<HashSet<Uuid>, error::SystemError> {
        let conversation = self
            .conversation_lookup
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        let mut recipients = HashSet::new();
        for source in &self.sources {
            let members = source.active_members(&conversation).await?;
            tracing::trace!(
                "Source {} trả về {} members cho conversation {}",
                source.name(),
                members.len(),
                conversation_id
            );
            recipients.extend(members);
        }

        Ok(recipients)
    }

    /// OR bất đối xứng trên tất cả nguồn: user là member nếu *bất kỳ*
    /// nguồn nào công nhận. Cần thiết vì user rời nhóm qua một nguồn
    /// vẫn có thể sót lại trong participants list của record cũ.
    pub async fn is_active_member(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let Some(conversation) = self.conversation_lookup.find_by_id(conversation_id).await?
        else {
            return Ok(false);
        };

        for source in &self.sources {
            if source.grants_access(&conversation, user_id).await? {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
