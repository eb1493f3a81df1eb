use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{model::NewMessage, schema::MessageEntity},
};

#[async_trait::async_trait]
pub trait MessageRepository {
    async fn create(&self, message: &NewMessage) -> Result<MessageEntity, error::SystemError>;

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Messages của conversation theo thứ tự gửi (created_at ASC, id ASC)
    async fn list_for_conversation(
        &self,
        conversation_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError>;

    /// Upsert read receipt, idempotent (ON CONFLICT DO NOTHING).
    /// Trả về true nếu receipt mới được tạo, false nếu đã tồn tại.
    async fn mark_read(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    /// Message chưa đọc = chưa có receipt của user và user không phải sender
    async fn unread_message_ids(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<Uuid>, error::SystemError>;

    async fn unread_count(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<i64, error::SystemError>;

    async fn edit(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError>;
}
