/// Delivery Orchestrator
///
/// Pipeline cho mỗi message gửi đến:
/// 1. membership check + validate + persist (hard fail - sender nhận error)
/// 2. broadcast message tới conversation topic (soft fail)
/// 3. resolve recipients (soft fail - message đã persist là đã "sent")
/// 4. evaluate notification policy + emit per-recipient, mỗi recipient
///    được isolate: một recipient lỗi không chặn các recipient sau
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::delivery::isolate::for_each_isolated;
use crate::modules::membership::resolver::MembershipResolver;
use crate::modules::membership::source::ConversationLookup;
use crate::modules::message::model::AppendMessage;
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::schema::MessageEntity;
use crate::modules::message::store::MessageStore;
use crate::modules::conversation::schema::ConversationEntity;
use crate::modules::notification::engine::NotificationEngine;
use crate::modules::notification::model::NotificationDecision;
use crate::modules::notification::push::{PushPayload, PushSink};
use crate::modules::notification::repository::{NotificationRepository, SettingsRepository};
use crate::modules::presence::registry::PresenceProbe;
use crate::modules::websocket::events::Topic;
use crate::modules::websocket::message::ServerEvent;
use crate::modules::websocket::server::EventSink;

pub struct DeliveryOrchestrator<C, M, N, S, P>
where
    C: ConversationLookup,
    M: MessageRepository + Send + Sync,
    N: NotificationRepository + Send + Sync,
    S: SettingsRepository + Send + Sync,
    P: PresenceProbe,
{
    conversations: Arc<C>,
    resolver: Arc<MembershipResolver<C>>,
    store: Arc<MessageStore<M, C>>,
    engine: Arc<NotificationEngine<N, S, P>>,
    sink: Arc<dyn EventSink>,
    push: Arc<dyn PushSink>,
}

impl<C, M, N, S, P> DeliveryOrchestrator<C, M, N, S, P>
where
    C: ConversationLookup,
    M: MessageRepository + Send + Sync,
    N: NotificationRepository + Send + Sync,
    S: SettingsRepository + Send + Sync,
    P: PresenceProbe,
{
    pub fn new(
        conversations: Arc<C>,
        resolver: Arc<MembershipResolver<C>>,
        store: Arc<MessageStore<M, C>>,
        engine: Arc<NotificationEngine<N, S, P>>,
        sink: Arc<dyn EventSink>,
        push: Arc<dyn PushSink>,
    ) -> Self {
        Self { conversations, resolver, store, engine, sink, push }
    }

    pub fn resolver(&self) -> Arc<MembershipResolver<C>> {
        self.resolver.clone()
    }

    pub fn store(&self) -> Arc<MessageStore<M, C>> {
        self.store.clone()
    }

    pub fn engine(&self) -> Arc<NotificationEngine<N, S, P>> {
        self.engine.clone()
    }

    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }

    /// Entry point cho mỗi message từ client. Lỗi trả về chỉ đến từ
    /// stage persist; từ lúc message persist thành công, mọi lỗi downstream
    /// đều được log và nuốt - contract với sender là "đã gửi".
    pub async fn dispatch(
        &self,
        sender_id: Uuid,
        request: &AppendMessage,
    ) -> Result<MessageEntity, error::SystemError> {
        // Stage 1+2: membership + validate + persist. Hard fail.
        let message = self.store.append(sender_id, request).await?;

        // Stage 3: broadcast tới conversation topic. do_send không fail;
        // session lỗi bị hub isolate từng connection.
        self.sink.deliver(
            Topic::Conversation(message.conversation_id),
            ServerEvent::Message { message: message.clone() },
        );

        // Stage 4+5: notification fan-out. Mọi lỗi từ đây là soft.
        if let Err(e) = self.fan_out_notifications(&message, sender_id).await {
            tracing::warn!(
                "Notification fan-out cho message {} thất bại: {e} (message vẫn đã gửi)",
                message.id
            );
        }

        Ok(message)
    }

    async fn fan_out_notifications(
        &self,
        message: &MessageEntity,
        sender_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let conversation = self
            .conversations
            .find_by_id(&message.conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        let mut recipients: Vec<Uuid> = self
            .resolver
            .active_recipients(&message.conversation_id)
            .await?
            .into_iter()
            .filter(|r| *r != sender_id)
            .collect();
        recipients.sort();

        let notified = for_each_isolated(recipients.clone(), "notification fan-out", |r| {
            self.notify_recipient(message, &conversation, r)
        })
        .await;

        tracing::debug!(
            "Message {}: notified {notified}/{} recipients",
            message.id,
            recipients.len()
        );

        Ok(())
    }

    async fn notify_recipient(
        &self,
        message: &MessageEntity,
        conversation: &ConversationEntity,
        recipient_id: Uuid,
    ) -> Result<(), error::SystemError> {
        match self.engine.evaluate_for(message, conversation, &recipient_id).await? {
            NotificationDecision::Suppress(reason) => {
                tracing::debug!(
                    "Notification cho {recipient_id} bị suppress: {reason:?}"
                );
            }
            NotificationDecision::Emit { notification, unread_total, push_enabled } => {
                let topic = Topic::User(recipient_id);
                self.sink.deliver(topic, ServerEvent::UnreadCount { count: unread_total });
                self.sink.deliver(
                    topic,
                    ServerEvent::NewNotification { notification: notification.clone() },
                );

                if push_enabled {
                    self.push.deliver(PushPayload {
                        recipient_id,
                        title: notification.title.clone(),
                        body: notification.body.clone(),
                        conversation_id: notification.conversation_id,
                        notification_id: notification.id,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::membership::resolver::tests::{conversation, FixedLookup, StaticSource};
    use crate::modules::message::model::AppendMessage;
    use crate::modules::message::schema::MessageType;
    use crate::modules::message::store::tests::InMemoryMessageRepo;
    use crate::modules::notification::engine::tests::{
        InMemoryNotificationRepo, InMemorySettingsRepo, StaticPresence,
    };
    use crate::modules::notification::engine::SuppressionPolicy;
    use std::sync::Mutex;

    struct RecordingSink {
        delivered: Mutex<Vec<(Topic, ServerEvent)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { delivered: Mutex::new(vec![]) }
        }

        fn events_for(&self, topic: Topic) -> Vec<ServerEvent> {
            self.delivered
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| *t == topic)
                .map(|(_, e)| e.clone())
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn deliver(&self, topic: Topic, event: ServerEvent) {
            self.delivered.lock().unwrap().push((topic, event));
        }

        fn evict(&self, _topic: Topic, _user_id: Uuid) {}
    }

    struct RecordingPush {
        payloads: Mutex<Vec<PushPayload>>,
    }

    impl PushSink for RecordingPush {
        fn deliver(&self, payload: PushPayload) {
            self.payloads.lock().unwrap().push(payload);
        }
    }

    struct Fixture {
        orchestrator: DeliveryOrchestrator<
            FixedLookup,
            InMemoryMessageRepo,
            InMemoryNotificationRepo,
            InMemorySettingsRepo,
            StaticPresence,
        >,
        sink: Arc<RecordingSink>,
        push: Arc<RecordingPush>,
        notifications: Arc<InMemoryNotificationRepo>,
        settings: Arc<InMemorySettingsRepo>,
    }

    fn fixture(conv: crate::modules::conversation::schema::ConversationEntity, members: Vec<Uuid>) -> Fixture {
        let lookup = Arc::new(FixedLookup { conversation: Some(conv) });
        let resolver = Arc::new(MembershipResolver::new(
            lookup.clone(),
            vec![Arc::new(StaticSource {
                label: "group_memberships",
                members: members.clone(),
                access: members,
            })],
        ));
        let message_repo = Arc::new(InMemoryMessageRepo::new());
        let store = Arc::new(MessageStore::new(message_repo, resolver.clone()));
        let notifications = Arc::new(InMemoryNotificationRepo::new());
        let settings = Arc::new(InMemorySettingsRepo::new());
        let engine = Arc::new(NotificationEngine::new(
            notifications.clone(),
            settings.clone(),
            Arc::new(StaticPresence(false)),
            SuppressionPolicy::default(),
        ));
        let sink = Arc::new(RecordingSink::new());
        let push = Arc::new(RecordingPush { payloads: Mutex::new(vec![]) });

        Fixture {
            orchestrator: DeliveryOrchestrator::new(
                lookup,
                resolver,
                store,
                engine,
                sink.clone(),
                push.clone(),
            ),
            sink,
            push,
            notifications,
            settings,
        }
    }

    fn text_request(conversation_id: Uuid, content: &str) -> AppendMessage {
        AppendMessage {
            conversation_id,
            message_type: MessageType::Text,
            content: Some(content.to_string()),
            file_url: None,
            reply_to: None,
        }
    }

    #[actix_web::test]
    async fn test_direct_send_notifies_offline_recipient() {
        let conv = conversation(false);
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let f = fixture(conv.clone(), vec![a, b]);

        let message =
            f.orchestrator.dispatch(a, &text_request(conv.id, "hi")).await.unwrap();

        // message broadcast tới conversation topic
        let conv_events = f.sink.events_for(Topic::Conversation(conv.id));
        assert_eq!(conv_events.len(), 1);
        assert!(matches!(&conv_events[0], ServerEvent::Message { message: m } if m.id == message.id));

        // B nhận unread_count=1 + new_notification trên personal topic
        let b_events = f.sink.events_for(Topic::User(b));
        assert_eq!(b_events.len(), 2);
        assert!(matches!(b_events[0], ServerEvent::UnreadCount { count: 1 }));
        assert!(matches!(&b_events[1], ServerEvent::NewNotification { .. }));

        // sender không nhận notification
        assert!(f.sink.events_for(Topic::User(a)).is_empty());
        assert_eq!(f.notifications.rows.lock().unwrap().len(), 1);

        // push đi kèm (defaults: enable_push=true)
        assert_eq!(f.push.payloads.lock().unwrap().len(), 1);
        assert_eq!(f.push.payloads.lock().unwrap()[0].recipient_id, b);
    }

    #[actix_web::test]
    async fn test_dnd_recipient_gets_message_but_no_notification() {
        let conv = conversation(false);
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let f = fixture(conv.clone(), vec![a, b]);

        let mut settings = InMemorySettingsRepo::defaults(b);
        settings.do_not_disturb = true;
        f.settings.overrides.lock().unwrap().insert(b, settings);

        f.orchestrator.dispatch(a, &text_request(conv.id, "hi")).await.unwrap();

        // broadcast vẫn chạy, notification bị suppress
        assert_eq!(f.sink.events_for(Topic::Conversation(conv.id)).len(), 1);
        assert!(f.sink.events_for(Topic::User(b)).is_empty());
        assert!(f.notifications.rows.lock().unwrap().is_empty());
        assert!(f.push.payloads.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_one_failing_recipient_does_not_block_others() {
        let conv = conversation(true);
        let sender = Uuid::now_v7();
        let others: Vec<Uuid> = (0..4).map(|_| Uuid::now_v7()).collect();
        let mut members = vec![sender];
        members.extend(&others);
        let f = fixture(conv.clone(), members);

        // settings lookup của một recipient ném lỗi
        f.settings.failing.lock().unwrap().push(others[1]);

        f.orchestrator.dispatch(sender, &text_request(conv.id, "chào cả nhà")).await.unwrap();

        // 3 recipient còn lại vẫn nhận notification
        assert_eq!(f.notifications.rows.lock().unwrap().len(), 3);
        for (i, recipient) in others.iter().enumerate() {
            let events = f.sink.events_for(Topic::User(*recipient));
            if i == 1 {
                assert!(events.is_empty());
            } else {
                assert_eq!(events.len(), 2);
            }
        }
    }

    #[actix_web::test]
    async fn test_non_member_sender_is_hard_rejected() {
        let conv = conversation(true);
        let member = Uuid::now_v7();
        let outsider = Uuid::now_v7();
        let f = fixture(conv.clone(), vec![member]);

        let err =
            f.orchestrator.dispatch(outsider, &text_request(conv.id, "hi")).await.unwrap_err();

        assert!(matches!(err, error::SystemError::NotMember(_)));
        // không có gì được broadcast hay persist
        assert!(f.sink.delivered.lock().unwrap().is_empty());
        assert!(f.notifications.rows.lock().unwrap().is_empty());
    }
}
