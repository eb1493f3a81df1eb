/// Conversation Service
///
/// Group admin operations: tạo direct/group, thêm/xóa member, leave,
/// promote admin, rename. Permission rules:
/// - admin: add/remove member, rename
/// - chỉ creator: promote admin, remove một admin khác
/// - leave: tự mình
///
/// Mỗi mutation phát sinh system message (sender-attributed cho actor gây
/// ra event) broadcast vào conversation topic, và group notification cho
/// user bị ảnh hưởng. Cả hai là soft side effects - mutation đã commit là
/// thành công, fan-out lỗi chỉ được log.
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::model::ConversationSummary;
use crate::modules::conversation::repository::{ConversationRepository, MembershipRepository};
use crate::modules::conversation::schema::{ConversationEntity, MemberRole};
use crate::modules::delivery::isolate::for_each_isolated;
use crate::modules::membership::source::ConversationLookup;
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::store::MessageStore;
use crate::modules::notification::engine::NotificationEngine;
use crate::modules::notification::model::NotificationDecision;
use crate::modules::notification::repository::{NotificationRepository, SettingsRepository};
use crate::modules::notification::schema::NotificationType;
use crate::modules::presence::registry::PresenceProbe;
use crate::modules::websocket::events::Topic;
use crate::modules::websocket::message::ServerEvent;
use crate::modules::websocket::server::EventSink;

const CONVERSATIONS_LIMIT: i64 = 50;

pub struct ConversationService<R, B, M, N, S, P>
where
    R: ConversationRepository + ConversationLookup + Send + Sync,
    B: MembershipRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
    N: NotificationRepository + Send + Sync,
    S: SettingsRepository + Send + Sync,
    P: PresenceProbe,
{
    conversation_repo: Arc<R>,
    membership_repo: Arc<B>,
    store: Arc<MessageStore<M, R>>,
    engine: Arc<NotificationEngine<N, S, P>>,
    sink: Arc<dyn EventSink>,
}

impl<R, B, M, N, S, P> ConversationService<R, B, M, N, S, P>
where
    R: ConversationRepository + ConversationLookup + Send + Sync,
    B: MembershipRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
    N: NotificationRepository + Send + Sync,
    S: SettingsRepository + Send + Sync,
    P: PresenceProbe,
{
    pub fn with_dependencies(
        conversation_repo: Arc<R>,
        membership_repo: Arc<B>,
        store: Arc<MessageStore<M, R>>,
        engine: Arc<NotificationEngine<N, S, P>>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self { conversation_repo, membership_repo, store, engine, sink }
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, error::SystemError> {
        ConversationRepository::list_for_user(&*self.conversation_repo, &user_id, CONVERSATIONS_LIMIT)
            .await
    }

    /// Direct chat: tái sử dụng conversation có sẵn giữa 2 user nếu có
    pub async fn get_or_create_direct(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        if user_id == recipient_id {
            return Err(error::SystemError::bad_request(
                "Cannot create a conversation with yourself",
            ));
        }

        if let Some(existing) =
            self.conversation_repo.find_direct_between(&user_id, &recipient_id).await?
        {
            return Ok(existing);
        }

        self.conversation_repo.create_direct(&user_id, &recipient_id).await
    }

    pub async fn create_group(
        &self,
        creator: Uuid,
        name: &str,
        member_ids: &[Uuid],
    ) -> Result<ConversationEntity, error::SystemError> {
        let conversation = self.conversation_repo.create_group(name, &creator, member_ids).await?;

        self.announce(conversation.id, creator, "Group created".to_string()).await;

        // group_add notification cho từng member (trừ creator), isolated
        let mut recipients: Vec<Uuid> =
            member_ids.iter().filter(|id| **id != creator).copied().collect();
        recipients.dedup();

        for_each_isolated(recipients, "group-create fan-out", |recipient| {
            self.notify_group_event(
                &conversation,
                creator,
                recipient,
                NotificationType::GroupAdd,
                "You were added to the group".to_string(),
            )
        })
        .await;

        Ok(conversation)
    }

    pub async fn add_member(
        &self,
        actor: Uuid,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let conversation = self.require_group(&conversation_id).await?;
        self.ensure_admin(&conversation, &actor).await?;

        self.membership_repo
            .upsert_active(&conversation_id, &user_id, MemberRole::Member, Some(&actor))
            .await?;
        self.conversation_repo.touch_updated_at(&conversation_id).await?;

        self.announce(conversation_id, actor, "A new member joined the group".to_string()).await;

        if let Err(e) = self
            .notify_group_event(
                &conversation,
                actor,
                user_id,
                NotificationType::GroupAdd,
                "You were added to the group".to_string(),
            )
            .await
        {
            tracing::warn!("Không thể gửi group_add notification cho {user_id}: {e}");
        }

        Ok(())
    }

    pub async fn remove_member(
        &self,
        actor: Uuid,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        if actor == user_id {
            return Err(error::SystemError::bad_request("Use leave to exit the group"));
        }

        let conversation = self.require_group(&conversation_id).await?;
        self.ensure_admin(&conversation, &actor).await?;

        // remove một admin khác: chỉ creator được phép
        let target = self.membership_repo.find_active(&conversation_id, &user_id).await?;
        if target.as_ref().is_some_and(|m| m.is_admin())
            && conversation.created_by != Some(actor)
        {
            return Err(error::SystemError::forbidden(
                "Only the group creator can remove an admin",
            ));
        }

        if !self.membership_repo.deactivate(&conversation_id, &user_id).await? {
            return Err(error::SystemError::not_found("User is not a member of this group"));
        }
        self.conversation_repo.touch_updated_at(&conversation_id).await?;

        // user bị remove không được tiếp tục observe topic
        self.sink.evict(Topic::Conversation(conversation_id), user_id);

        self.announce(conversation_id, actor, "A member was removed from the group".to_string())
            .await;

        if let Err(e) = self
            .notify_group_event(
                &conversation,
                actor,
                user_id,
                NotificationType::GroupRemove,
                "You were removed from the group".to_string(),
            )
            .await
        {
            tracing::warn!("Không thể gửi group_remove notification cho {user_id}: {e}");
        }

        Ok(())
    }

    pub async fn leave_group(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let _conversation = self.require_group(&conversation_id).await?;

        if !self.membership_repo.deactivate(&conversation_id, &user_id).await? {
            return Err(error::SystemError::not_member(
                "You are not a member of this group",
            ));
        }
        self.conversation_repo.touch_updated_at(&conversation_id).await?;

        self.sink.evict(Topic::Conversation(conversation_id), user_id);

        // system message sender-attributed cho chính người rời nhóm
        self.announce(conversation_id, user_id, "A member left the group".to_string()).await;

        Ok(())
    }

    pub async fn promote_to_admin(
        &self,
        actor: Uuid,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let conversation = self.require_group(&conversation_id).await?;

        if conversation.created_by != Some(actor) {
            return Err(error::SystemError::forbidden(
                "Only the group creator can promote members to admin",
            ));
        }

        if !self.membership_repo.set_role(&conversation_id, &user_id, MemberRole::Admin).await? {
            return Err(error::SystemError::not_found("User is not a member of this group"));
        }

        Ok(())
    }

    pub async fn rename_group(
        &self,
        actor: Uuid,
        conversation_id: Uuid,
        name: &str,
    ) -> Result<(), error::SystemError> {
        let conversation = self.require_group(&conversation_id).await?;
        self.ensure_admin(&conversation, &actor).await?;

        self.conversation_repo.rename(&conversation_id, name).await?;

        self.announce(conversation_id, actor, format!("Group renamed to {name}")).await;

        Ok(())
    }

    async fn require_group(
        &self,
        conversation_id: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        let conversation = ConversationRepository::find_by_id(&*self.conversation_repo, conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        if !conversation.is_group {
            return Err(error::SystemError::bad_request(
                "This operation is only available for group conversations",
            ));
        }

        Ok(conversation)
    }

    /// Creator luôn có quyền admin, kể cả khi membership row không còn
    async fn ensure_admin(
        &self,
        conversation: &ConversationEntity,
        actor: &Uuid,
    ) -> Result<(), error::SystemError> {
        if conversation.created_by == Some(*actor) {
            return Ok(());
        }

        let membership = self.membership_repo.find_active(&conversation.id, actor).await?;
        if membership.is_some_and(|m| m.is_admin()) {
            return Ok(());
        }

        Err(error::SystemError::forbidden("Admin permission required"))
    }

    /// System message + broadcast, soft fail
    async fn announce(&self, conversation_id: Uuid, actor: Uuid, content: String) {
        match self.store.append_system(conversation_id, actor, content).await {
            Ok(message) => {
                self.sink
                    .deliver(Topic::Conversation(conversation_id), ServerEvent::Message { message });
            }
            Err(e) => {
                tracing::warn!("Không thể tạo system message cho {conversation_id}: {e}");
            }
        }
    }

    async fn notify_group_event(
        &self,
        conversation: &ConversationEntity,
        actor: Uuid,
        recipient: Uuid,
        _type: NotificationType,
        body: String,
    ) -> Result<(), error::SystemError> {
        match self.engine.group_event_for(conversation, actor, &recipient, _type, body).await? {
            NotificationDecision::Suppress(reason) => {
                tracing::debug!("Group notification cho {recipient} bị suppress: {reason:?}");
            }
            NotificationDecision::Emit { notification, unread_total, .. } => {
                let topic = Topic::User(recipient);
                self.sink.deliver(topic, ServerEvent::UnreadCount { count: unread_total });
                self.sink.deliver(topic, ServerEvent::NewNotification { notification });
            }
        }

        Ok(())
    }
}
