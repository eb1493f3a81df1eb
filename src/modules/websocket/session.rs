/// WebSocket Session Actor
///
/// Mỗi WebSocket connection có một Session actor riêng, đã authenticated
/// từ lúc upgrade (identity do JWT trong query string cung cấp).
/// Session subscribe đúng một topic theo channel:
///
/// - Chat channel: topic của conversation, phục vụ send/get messages
/// - Notification channel: personal topic của user, phục vụ unread/notifications
///
/// Async operations dùng `ctx.wait()` thay vì `ctx.spawn()`: mailbox của
/// session xử lý tuần tự, nên events của một topic đến client theo đúng
/// thứ tự broadcast.
use actix::prelude::*;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::conversation::repository_pg::ConversationRepositoryPg;
use crate::modules::delivery::orchestrator::DeliveryOrchestrator;
use crate::modules::membership::resolver::MembershipResolver;
use crate::modules::message::model::AppendMessage;
use crate::modules::message::repository_pg::MessageRepositoryPg;
use crate::modules::message::store::MessageStore;
use crate::modules::notification::engine::NotificationEngine;
use crate::modules::notification::repository_pg::{NotificationRepositoryPg, SettingsRepositoryPg};
use crate::modules::presence::registry::PresenceRegistry;
use crate::api::error;

use super::events::*;
use super::message::{ClientEvent, ServerEvent};
use super::server::ConnectionHub;

/// Type aliases với concrete Pg types cho dependency injection qua web::Data
pub type Resolver = MembershipResolver<ConversationRepositoryPg>;
pub type ChatStore = MessageStore<MessageRepositoryPg, ConversationRepositoryPg>;
pub type Engine =
    NotificationEngine<NotificationRepositoryPg, SettingsRepositoryPg, PresenceRegistry>;
pub type Dispatcher = DeliveryOrchestrator<
    ConversationRepositoryPg,
    MessageRepositoryPg,
    NotificationRepositoryPg,
    SettingsRepositoryPg,
    PresenceRegistry,
>;

/// Giới hạn mặc định/tối đa cho get_notifications
const NOTIFICATIONS_DEFAULT_LIMIT: i64 = 50;
const NOTIFICATIONS_MAX_LIMIT: i64 = 100;
const CONVERSATIONS_LIMIT: i64 = 50;

/// Channel mà connection này phục vụ
#[derive(Debug, Clone, Copy)]
pub enum ChannelKind {
    Chat { conversation_id: Uuid },
    Notifications,
}

pub struct WsSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: ChannelKind,
    pub hub: Addr<ConnectionHub>,

    /// Channel gửi JSON tới client (bridge qua handler.rs)
    pub tx: mpsc::UnboundedSender<String>,

    pub orchestrator: actix_web::web::Data<Dispatcher>,
    pub presence: actix_web::web::Data<PresenceRegistry>,
    pub conversations: actix_web::web::Data<ConversationRepositoryPg>,
}

impl WsSession {
    pub fn new(
        user_id: Uuid,
        channel: ChannelKind,
        hub: Addr<ConnectionHub>,
        tx: mpsc::UnboundedSender<String>,
        orchestrator: actix_web::web::Data<Dispatcher>,
        presence: actix_web::web::Data<PresenceRegistry>,
        conversations: actix_web::web::Data<ConversationRepositoryPg>,
    ) -> Self {
        Self { id: Uuid::now_v7(), user_id, channel, hub, tx, orchestrator, presence, conversations }
    }

    fn topic(&self) -> Topic {
        match self.channel {
            ChannelKind::Chat { conversation_id } => Topic::Conversation(conversation_id),
            ChannelKind::Notifications => Topic::User(self.user_id),
        }
    }

    fn send_to_client(&self, event: &ServerEvent) {
        send_event(&self.tx, self.id, event);
    }

    /// Initial load cho chat channel: đánh dấu activity, đẩy danh sách
    /// conversations + messages của conversation, mark read các message cũ
    fn load_chat_state(&self, conversation_id: Uuid, ctx: &mut Context<Self>) {
        let orchestrator = self.orchestrator.clone();
        let presence = self.presence.clone();
        let conversations = self.conversations.clone();
        let tx = self.tx.clone();
        let (session_id, user_id) = (self.id, self.user_id);

        ctx.wait(
            async move {
                if let Err(e) = presence.connect(&user_id).await {
                    tracing::warn!("Không thể ghi presence cho user {user_id}: {e}");
                }

                match conversations.list_for_user(&user_id, CONVERSATIONS_LIMIT).await {
                    Ok(list) => send_event(
                        &tx,
                        session_id,
                        &ServerEvent::ConversationsList { conversations: list },
                    ),
                    Err(e) => {
                        tracing::error!("Không thể load conversations cho {user_id}: {e}")
                    }
                }

                let store = orchestrator.store();
                match store.list_messages(&conversation_id).await {
                    Ok(messages) => send_event(
                        &tx,
                        session_id,
                        &ServerEvent::ConversationMessages { messages },
                    ),
                    Err(e) => {
                        tracing::error!("Không thể load messages của {conversation_id}: {e}")
                    }
                }

                if let Err(e) = store.mark_conversation_read(&conversation_id, &user_id).await {
                    tracing::warn!("Không thể mark read khi mở {conversation_id}: {e}");
                }
            }
            .into_actor(self),
        );
    }

    /// Initial load cho notification channel: tổng unread hiện tại
    fn load_notification_state(&self, ctx: &mut Context<Self>) {
        let orchestrator = self.orchestrator.clone();
        let tx = self.tx.clone();
        let (session_id, user_id) = (self.id, self.user_id);

        ctx.wait(
            async move {
                match orchestrator.engine().unread_total(&user_id).await {
                    Ok(count) => {
                        send_event(&tx, session_id, &ServerEvent::UnreadCount { count })
                    }
                    Err(e) => tracing::error!("Không thể load unread count cho {user_id}: {e}"),
                }
            }
            .into_actor(self),
        );
    }

    fn handle_chat_event(
        &mut self,
        conversation_id: Uuid,
        event: ClientEvent,
        ctx: &mut Context<Self>,
    ) {
        let orchestrator = self.orchestrator.clone();
        let presence = self.presence.clone();
        let conversations = self.conversations.clone();
        let tx = self.tx.clone();
        let (session_id, user_id) = (self.id, self.user_id);

        // ctx.wait: events được xử lý tuần tự theo thứ tự mailbox
        ctx.wait(
            async move {
                // membership re-check trước mọi inbound action; lapse = đóng
                // connection, không chỉ drop event
                match orchestrator.resolver().is_active_member(&conversation_id, &user_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        send_event(
                            &tx,
                            session_id,
                            &ServerEvent::Error {
                                message: "You are no longer a member of this conversation"
                                    .to_string(),
                            },
                        );
                        return true;
                    }
                    Err(e) => {
                        tracing::error!("Membership check thất bại (session {session_id}): {e}");
                        return false;
                    }
                }

                if let Err(e) = presence.touch(&user_id).await {
                    tracing::warn!("Không thể touch presence cho user {user_id}: {e}");
                }

                match event {
                    ClientEvent::SendMessage { content, message_type, file_url, reply_to } => {
                        let request = AppendMessage {
                            conversation_id,
                            message_type,
                            content,
                            file_url,
                            reply_to,
                        };

                        match orchestrator.dispatch(user_id, &request).await {
                            Ok(message) => {
                                tracing::info!(
                                    "Message {} gửi vào conversation {conversation_id}",
                                    message.id
                                );
                            }
                            Err(error::SystemError::NotMember(_)) => {
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::Error {
                                        message: "You are no longer a member of this conversation"
                                            .to_string(),
                                    },
                                );
                                return true;
                            }
                            Err(error::SystemError::BadRequest(msg)) => {
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::Error { message: msg.into_owned() },
                                );
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Không thể gửi message (session {session_id}): {e}"
                                );
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::Error {
                                        message: "Could not send message. Please try again."
                                            .to_string(),
                                    },
                                );
                            }
                        }
                    }

                    ClientEvent::GetConversations => {
                        match conversations.list_for_user(&user_id, CONVERSATIONS_LIMIT).await {
                            Ok(list) => send_event(
                                &tx,
                                session_id,
                                &ServerEvent::ConversationsList { conversations: list },
                            ),
                            Err(e) => {
                                tracing::error!("Không thể load conversations: {e}");
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::Error {
                                        message: "Could not load conversations".to_string(),
                                    },
                                );
                            }
                        }
                    }

                    ClientEvent::GetMessages => {
                        let store = orchestrator.store();
                        match store.list_messages(&conversation_id).await {
                            Ok(messages) => {
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::ConversationMessages { messages },
                                );
                                if let Err(e) =
                                    store.mark_conversation_read(&conversation_id, &user_id).await
                                {
                                    tracing::warn!("Không thể mark read: {e}");
                                }
                            }
                            Err(e) => {
                                tracing::error!("Không thể load messages: {e}");
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::Error {
                                        message: "Could not load messages".to_string(),
                                    },
                                );
                            }
                        }
                    }

                    ClientEvent::MarkRead { message_id: Some(message_id), .. } => {
                        if let Err(e) =
                            orchestrator.store().mark_read(&message_id, &user_id).await
                        {
                            tracing::warn!("Không thể mark read message {message_id}: {e}");
                        }
                    }

                    // các event của notification channel
                    ClientEvent::MarkRead { message_id: None, .. }
                    | ClientEvent::GetUnreadCount
                    | ClientEvent::GetNotifications { .. } => {
                        send_event(
                            &tx,
                            session_id,
                            &ServerEvent::Error {
                                message: "Event not available on this channel".to_string(),
                            },
                        );
                    }
                }

                false
            }
            .into_actor(self)
            .map(|close, _act, ctx| {
                if close {
                    ctx.stop();
                }
            }),
        );
    }

    fn handle_notification_event(&mut self, event: ClientEvent, ctx: &mut Context<Self>) {
        let orchestrator = self.orchestrator.clone();
        let tx = self.tx.clone();
        let (session_id, user_id) = (self.id, self.user_id);

        ctx.wait(
            async move {
                let engine = orchestrator.engine();

                match event {
                    ClientEvent::MarkRead { notification_id: Some(id), .. } => {
                        match engine.mark_read(&id, &user_id).await {
                            Ok(success) => {
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::NotificationRead { id, success },
                                );
                                if success {
                                    if let Ok(count) = engine.unread_total(&user_id).await {
                                        send_event(
                                            &tx,
                                            session_id,
                                            &ServerEvent::UnreadCount { count },
                                        );
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Không thể mark read notification {id}: {e}");
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::NotificationRead { id, success: false },
                                );
                            }
                        }
                    }

                    ClientEvent::GetUnreadCount => match engine.unread_total(&user_id).await {
                        Ok(count) => {
                            send_event(&tx, session_id, &ServerEvent::UnreadCount { count })
                        }
                        Err(e) => {
                            tracing::error!("Không thể load unread count: {e}");
                            send_event(
                                &tx,
                                session_id,
                                &ServerEvent::Error {
                                    message: "Could not load unread count".to_string(),
                                },
                            );
                        }
                    },

                    ClientEvent::GetNotifications { limit } => {
                        let limit = limit
                            .unwrap_or(NOTIFICATIONS_DEFAULT_LIMIT)
                            .clamp(1, NOTIFICATIONS_MAX_LIMIT);
                        match engine.recent(&user_id, limit).await {
                            Ok(notifications) => send_event(
                                &tx,
                                session_id,
                                &ServerEvent::NotificationsList { notifications },
                            ),
                            Err(e) => {
                                tracing::error!("Không thể load notifications: {e}");
                                send_event(
                                    &tx,
                                    session_id,
                                    &ServerEvent::Error {
                                        message: "Could not load notifications".to_string(),
                                    },
                                );
                            }
                        }
                    }

                    // các event của chat channel
                    _ => {
                        send_event(
                            &tx,
                            session_id,
                            &ServerEvent::Error {
                                message: "Event not available on this channel".to_string(),
                            },
                        );
                    }
                }
            }
            .into_actor(self),
        );
    }
}

/// Serialize event và đẩy qua outbound channel
fn send_event(tx: &mpsc::UnboundedSender<String>, session_id: Uuid, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            if let Err(e) = tx.send(json) {
                tracing::error!("Không thể gửi event tới client (session {session_id}): {e}");
            }
        }
        Err(e) => {
            tracing::error!("Không thể serialize ServerEvent (session {session_id}): {e}");
        }
    }
}

impl Actor for WsSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("Session {} started (user {}, {:?})", self.id, self.user_id, self.channel);

        self.hub.do_send(Connect {
            id: self.id,
            user_id: self.user_id,
            handle: SessionHandle {
                events: ctx.address().recipient(),
                control: ctx.address().recipient(),
            },
        });
        self.hub.do_send(Subscribe { session_id: self.id, topic: self.topic() });

        match self.channel {
            ChannelKind::Chat { conversation_id } => self.load_chat_state(conversation_id, ctx),
            ChannelKind::Notifications => self.load_notification_state(ctx),
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("Session {} stopped", self.id);
        // hub gỡ session khỏi mọi topic nó từng subscribe
        self.hub.do_send(Disconnect { id: self.id });
    }
}

impl Message for ClientEvent {
    type Result = ();
}

/// Handler: event từ client (qua handler.rs)
impl Handler<ClientEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: ClientEvent, ctx: &mut Context<Self>) {
        match self.channel {
            ChannelKind::Chat { conversation_id } => {
                self.handle_chat_event(conversation_id, msg, ctx)
            }
            ChannelKind::Notifications => self.handle_notification_event(msg, ctx),
        }
    }
}

/// Handler: event từ topic mà session subscribe (từ hub)
impl Handler<TopicEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: TopicEvent, ctx: &mut Context<Self>) {
        match msg.topic {
            // re-check membership trước mỗi broadcast delivery: membership
            // lapse giữa chừng thì đóng connection, không deliver
            Topic::Conversation(conversation_id) => {
                let resolver = self.orchestrator.resolver();
                let tx = self.tx.clone();
                let (session_id, user_id) = (self.id, self.user_id);

                ctx.wait(
                    async move {
                        match resolver.is_active_member(&conversation_id, &user_id).await {
                            Ok(true) => {
                                send_event(&tx, session_id, &msg.event);
                                false
                            }
                            Ok(false) => true,
                            Err(e) => {
                                // transient: drop event này, giữ connection
                                tracing::warn!(
                                    "Membership check cho broadcast thất bại: {e}, drop event"
                                );
                                false
                            }
                        }
                    }
                    .into_actor(self)
                    .map(|close, _act, ctx| {
                        if close {
                            ctx.stop();
                        }
                    }),
                );
            }

            Topic::User(_) => self.send_to_client(&msg.event),
        }
    }
}

/// Handler: hub yêu cầu đóng connection (eviction)
impl Handler<CloseSession> for WsSession {
    type Result = ();

    fn handle(&mut self, _msg: CloseSession, ctx: &mut Context<Self>) {
        tracing::debug!("Session {} closed by hub", self.id);
        ctx.stop();
    }
}
