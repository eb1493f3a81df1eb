/// Message Store
///
/// Service layer cho append/read-state của messages:
/// - append có re-check membership của sender (qua Membership Resolver)
/// - mark_read idempotent, no-op với chính sender
/// - unread count loại trừ message của chính user
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::membership::resolver::MembershipResolver;
use crate::modules::membership::source::ConversationLookup;
use crate::modules::message::model::{AppendMessage, NewMessage};
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::schema::{MessageEntity, MessageType};

/// Giới hạn số message load/mark-read trong một lần (giống behavior gốc)
const MESSAGE_PAGE_LIMIT: i64 = 100;
const MARK_READ_BATCH_LIMIT: i64 = 50;

pub struct MessageStore<M, C>
where
    M: MessageRepository + Send + Sync,
    C: ConversationLookup,
{
    message_repo: Arc<M>,
    resolver: Arc<MembershipResolver<C>>,
}

impl<M, C> MessageStore<M, C>
where
    M: MessageRepository + Send + Sync,
    C: ConversationLookup,
{
    pub fn new(message_repo: Arc<M>, resolver: Arc<MembershipResolver<C>>) -> Self {
        Self { message_repo, resolver }
    }

    /// Persist message mới. Hard fail nếu sender không còn là active member
    /// tại thời điểm append, hoặc nếu payload không hợp lệ.
    pub async fn append(
        &self,
        sender_id: Uuid,
        request: &AppendMessage,
    ) -> Result<MessageEntity, error::SystemError> {
        match request.message_type {
            MessageType::Text => {
                let empty =
                    request.content.as_deref().map(|c| c.trim().is_empty()).unwrap_or(true);
                if empty {
                    return Err(error::SystemError::bad_request("Message content is empty"));
                }
            }
            MessageType::Image | MessageType::File => {
                if request.file_url.is_none() {
                    return Err(error::SystemError::bad_request("Attachment is required"));
                }
            }
            MessageType::System => {
                return Err(error::SystemError::bad_request(
                    "System messages cannot be sent by clients",
                ));
            }
        }

        if !self.resolver.is_active_member(&request.conversation_id, &sender_id).await? {
            return Err(error::SystemError::not_member(
                "You are no longer a member of this conversation",
            ));
        }

        self.message_repo
            .create(&NewMessage {
                conversation_id: request.conversation_id,
                sender_id,
                _type: request.message_type.clone(),
                content: request.content.clone(),
                file_url: request.file_url.clone(),
                reply_to_id: request.reply_to,
            })
            .await
    }

    /// System message (join/leave/rename...) - sender là actor gây ra event.
    /// Không check membership: người vừa rời nhóm vẫn là sender của
    /// system message "đã rời nhóm".
    pub async fn append_system(
        &self,
        conversation_id: Uuid,
        actor_id: Uuid,
        content: String,
    ) -> Result<MessageEntity, error::SystemError> {
        self.message_repo
            .create(&NewMessage {
                conversation_id,
                sender_id: actor_id,
                _type: MessageType::System,
                content: Some(content),
                file_url: None,
                reply_to_id: None,
            })
            .await
    }

    pub async fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        self.message_repo.list_for_conversation(conversation_id, MESSAGE_PAGE_LIMIT).await
    }

    /// Idempotent: gọi lần 2 cho cùng (message, user) là no-op, không phải lỗi.
    /// No-op với chính sender. Trả về true nếu receipt mới được tạo.
    pub async fn mark_read(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.sender_id == *user_id {
            return Ok(false);
        }

        self.message_repo.mark_read(message_id, user_id).await
    }

    /// Mark tất cả message chưa đọc trong conversation (dùng khi mở chat)
    pub async fn mark_conversation_read(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<usize, error::SystemError> {
        let unread = self
            .message_repo
            .unread_message_ids(conversation_id, user_id, MARK_READ_BATCH_LIMIT)
            .await?;

        let mut marked = 0;
        for message_id in &unread {
            if self.message_repo.mark_read(message_id, user_id).await? {
                marked += 1;
            }
        }

        Ok(marked)
    }

    pub async fn unread_count_for(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<i64, error::SystemError> {
        self.message_repo.unread_count(conversation_id, user_id).await
    }

    /// Chỉ sender được edit message của mình
    pub async fn edit_message(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        new_content: &str,
    ) -> Result<MessageEntity, error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.sender_id != *user_id {
            return Err(error::SystemError::forbidden("You can only edit your own messages"));
        }

        if new_content.trim().is_empty() {
            return Err(error::SystemError::bad_request("Message content is empty"));
        }

        self.message_repo
            .edit(message_id, new_content)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))
    }

    /// Chỉ sender được xóa message của mình
    pub async fn delete_message(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(), error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.sender_id != *user_id {
            return Err(error::SystemError::forbidden("You can only delete your own messages"));
        }

        if !self.message_repo.delete(message_id).await? {
            return Err(error::SystemError::not_found("Message not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::modules::conversation::schema::ConversationEntity;
    use crate::modules::membership::resolver::tests::{FixedLookup, StaticSource};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Repo in-memory: messages + receipts, đủ cho store logic
    pub(crate) struct InMemoryMessageRepo {
        pub messages: Mutex<Vec<MessageEntity>>,
        pub receipts: Mutex<HashSet<(Uuid, Uuid)>>,
    }

    impl InMemoryMessageRepo {
        pub(crate) fn new() -> Self {
            Self { messages: Mutex::new(vec![]), receipts: Mutex::new(HashSet::new()) }
        }
    }

    #[async_trait::async_trait]
    impl MessageRepository for InMemoryMessageRepo {
        async fn create(
            &self,
            message: &NewMessage,
        ) -> Result<MessageEntity, error::SystemError> {
            let entity = MessageEntity {
                id: Uuid::now_v7(),
                conversation_id: message.conversation_id,
                sender_id: message.sender_id,
                reply_to_id: message.reply_to_id,
                _type: message._type.clone(),
                content: message.content.clone(),
                file_url: message.file_url.clone(),
                is_edited: false,
                edited_at: None,
                created_at: chrono::Utc::now(),
            };
            self.messages.lock().unwrap().push(entity.clone());
            Ok(entity)
        }

        async fn find_by_id(
            &self,
            message_id: &Uuid,
        ) -> Result<Option<MessageEntity>, error::SystemError> {
            Ok(self.messages.lock().unwrap().iter().find(|m| m.id == *message_id).cloned())
        }

        async fn list_for_conversation(
            &self,
            conversation_id: &Uuid,
            limit: i64,
        ) -> Result<Vec<MessageEntity>, error::SystemError> {
            let mut messages: Vec<_> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.conversation_id == *conversation_id)
                .cloned()
                .collect();
            messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            messages.truncate(limit as usize);
            Ok(messages)
        }

        async fn mark_read(
            &self,
            message_id: &Uuid,
            user_id: &Uuid,
        ) -> Result<bool, error::SystemError> {
            Ok(self.receipts.lock().unwrap().insert((*message_id, *user_id)))
        }

        async fn unread_message_ids(
            &self,
            conversation_id: &Uuid,
            user_id: &Uuid,
            limit: i64,
        ) -> Result<Vec<Uuid>, error::SystemError> {
            let receipts = self.receipts.lock().unwrap();
            let ids: Vec<Uuid> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| {
                    m.conversation_id == *conversation_id
                        && m.sender_id != *user_id
                        && !receipts.contains(&(m.id, *user_id))
                })
                .map(|m| m.id)
                .take(limit as usize)
                .collect();
            Ok(ids)
        }

        async fn unread_count(
            &self,
            conversation_id: &Uuid,
            user_id: &Uuid,
        ) -> Result<i64, error::SystemError> {
            Ok(self.unread_message_ids(conversation_id, user_id, i64::MAX).await?.len() as i64)
        }

        async fn edit(
            &self,
            message_id: &Uuid,
            content: &str,
        ) -> Result<Option<MessageEntity>, error::SystemError> {
            let mut messages = self.messages.lock().unwrap();
            let Some(message) = messages.iter_mut().find(|m| m.id == *message_id) else {
                return Ok(None);
            };
            message.content = Some(content.to_string());
            message.is_edited = true;
            message.edited_at = Some(chrono::Utc::now());
            Ok(Some(message.clone()))
        }

        async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
            let mut messages = self.messages.lock().unwrap();
            let before = messages.len();
            messages.retain(|m| m.id != *message_id);
            Ok(messages.len() < before)
        }
    }

    pub(crate) fn store_for(
        conversation: ConversationEntity,
        members: Vec<Uuid>,
    ) -> (Arc<InMemoryMessageRepo>, MessageStore<InMemoryMessageRepo, FixedLookup>) {
        let repo = Arc::new(InMemoryMessageRepo::new());
        let resolver = Arc::new(MembershipResolver::new(
            Arc::new(FixedLookup { conversation: Some(conversation) }),
            vec![Arc::new(StaticSource {
                label: "participants",
                members: members.clone(),
                access: members,
            })],
        ));
        (repo.clone(), MessageStore::new(repo, resolver))
    }

    fn direct_conversation() -> ConversationEntity {
        crate::modules::membership::resolver::tests::conversation(false)
    }

    fn text_message(conversation_id: Uuid, content: &str) -> AppendMessage {
        AppendMessage {
            conversation_id,
            message_type: MessageType::Text,
            content: Some(content.to_string()),
            file_url: None,
            reply_to: None,
        }
    }

    #[actix_web::test]
    async fn test_append_rejects_empty_text() {
        let conv = direct_conversation();
        let sender = Uuid::now_v7();
        let (_, store) = store_for(conv.clone(), vec![sender]);

        let err = store.append(sender, &text_message(conv.id, "   ")).await.unwrap_err();
        assert!(matches!(err, error::SystemError::BadRequest(_)));
    }

    #[actix_web::test]
    async fn test_append_rejects_file_without_attachment() {
        let conv = direct_conversation();
        let sender = Uuid::now_v7();
        let (_, store) = store_for(conv.clone(), vec![sender]);

        let request = AppendMessage {
            conversation_id: conv.id,
            message_type: MessageType::File,
            content: None,
            file_url: None,
            reply_to: None,
        };
        let err = store.append(sender, &request).await.unwrap_err();
        assert!(matches!(err, error::SystemError::BadRequest(_)));
    }

    #[actix_web::test]
    async fn test_append_rejects_non_member() {
        let conv = direct_conversation();
        let member = Uuid::now_v7();
        let outsider = Uuid::now_v7();
        let (_, store) = store_for(conv.clone(), vec![member]);

        let err = store.append(outsider, &text_message(conv.id, "hi")).await.unwrap_err();
        assert!(matches!(err, error::SystemError::NotMember(_)));
    }

    #[actix_web::test]
    async fn test_mark_read_idempotent() {
        let conv = direct_conversation();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (repo, store) = store_for(conv.clone(), vec![a, b]);

        let message = store.append(a, &text_message(conv.id, "hi")).await.unwrap();

        assert!(store.mark_read(&message.id, &b).await.unwrap());
        // lần 2 là no-op, không lỗi, không duplicate receipt
        assert!(!store.mark_read(&message.id, &b).await.unwrap());
        assert_eq!(repo.receipts.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_mark_read_noop_for_sender() {
        let conv = direct_conversation();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (repo, store) = store_for(conv.clone(), vec![a, b]);

        let message = store.append(a, &text_message(conv.id, "hi")).await.unwrap();

        assert!(!store.mark_read(&message.id, &a).await.unwrap());
        assert!(repo.receipts.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_unread_count_round_trip() {
        let conv = direct_conversation();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (_, store) = store_for(conv.clone(), vec![a, b]);

        store.append(a, &text_message(conv.id, "một")).await.unwrap();
        store.append(a, &text_message(conv.id, "hai")).await.unwrap();
        assert_eq!(store.unread_count_for(&conv.id, &b).await.unwrap(), 2);
        // message của chính mình không tính là unread
        assert_eq!(store.unread_count_for(&conv.id, &a).await.unwrap(), 0);

        store.mark_conversation_read(&conv.id, &b).await.unwrap();
        assert_eq!(store.unread_count_for(&conv.id, &b).await.unwrap(), 0);

        store.append(a, &text_message(conv.id, "ba")).await.unwrap();
        assert_eq!(store.unread_count_for(&conv.id, &b).await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn test_edit_only_by_sender() {
        let conv = direct_conversation();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (_, store) = store_for(conv.clone(), vec![a, b]);

        let message = store.append(a, &text_message(conv.id, "hi")).await.unwrap();

        let err = store.edit_message(&message.id, &b, "sửa").await.unwrap_err();
        assert!(matches!(err, error::SystemError::Forbidden(_)));

        let edited = store.edit_message(&message.id, &a, "sửa").await.unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.content.as_deref(), Some("sửa"));
    }

    #[actix_web::test]
    async fn test_messages_ordered_by_append() {
        let conv = direct_conversation();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (_, store) = store_for(conv.clone(), vec![a, b]);

        let m1 = store.append(a, &text_message(conv.id, "m1")).await.unwrap();
        let m2 = store.append(b, &text_message(conv.id, "m2")).await.unwrap();
        let m3 = store.append(a, &text_message(conv.id, "m3")).await.unwrap();

        let listed = store.list_messages(&conv.id).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m1.id, m2.id, m3.id]);
    }
}
