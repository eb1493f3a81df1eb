/// Connection Hub Actor
///
/// Hub actor sở hữu toàn bộ state của hệ thống real-time: active sessions,
/// topic subscriptions, và reverse index session → topics. State chỉ được
/// mutate trong actor context nên subscribe/unsubscribe là atomic đối với
/// broadcast đang chạy: một broadcast luôn thấy snapshot nhất quán.
use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::events::*;
use super::message::ServerEvent;

pub struct ConnectionHub {
    /// Map: session_id -> mailboxes của session (events + control)
    sessions: HashMap<Uuid, SessionHandle>,

    /// Map: session_id -> user_id (một user có thể có nhiều sessions)
    session_users: HashMap<Uuid, Uuid>,

    /// Map: topic -> set of session_ids đang subscribe
    topics: HashMap<Topic, HashSet<Uuid>>,

    /// Reverse index: session_id -> topics. Disconnect dùng index này
    /// để gỡ session khỏi mọi topic trong một lần, không quét toàn bộ map.
    session_topics: HashMap<Uuid, HashSet<Topic>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            session_users: HashMap::new(),
            topics: HashMap::new(),
            session_topics: HashMap::new(),
        }
    }

    /// Gửi event tới một session. do_send không block, mailbox đầy hay
    /// session chết không ảnh hưởng các session khác trong cùng fan-out.
    fn send_to_session(&self, session_id: &Uuid, event: TopicEvent) {
        if let Some(handle) = self.sessions.get(session_id) {
            handle.events.do_send(event);
        }
    }

    fn unsubscribe_session(&mut self, session_id: &Uuid, topic: &Topic) {
        if let Some(subscribers) = self.topics.get_mut(topic) {
            subscribers.remove(session_id);
            if subscribers.is_empty() {
                self.topics.remove(topic);
            }
        }
        if let Some(topics) = self.session_topics.get_mut(session_id) {
            topics.remove(topic);
        }
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for ConnectionHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Connection hub started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Connection hub stopped");
    }
}

impl Handler<Connect> for ConnectionHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        tracing::debug!("Session {} connected (user {})", msg.id, msg.user_id);
        self.sessions.insert(msg.id, msg.handle);
        self.session_users.insert(msg.id, msg.user_id);
    }
}

impl Handler<Disconnect> for ConnectionHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        tracing::debug!("Session {} disconnected", msg.id);

        self.sessions.remove(&msg.id);
        self.session_users.remove(&msg.id);

        // Gỡ khỏi mọi topic session từng subscribe
        if let Some(topics) = self.session_topics.remove(&msg.id) {
            for topic in topics {
                if let Some(subscribers) = self.topics.get_mut(&topic) {
                    subscribers.remove(&msg.id);
                    if subscribers.is_empty() {
                        self.topics.remove(&topic);
                    }
                }
            }
        }
    }
}

impl Handler<Subscribe> for ConnectionHub {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        self.topics.entry(msg.topic).or_default().insert(msg.session_id);
        self.session_topics.entry(msg.session_id).or_default().insert(msg.topic);

        tracing::debug!(
            "Session {} subscribed to {:?} ({} subscribers)",
            msg.session_id,
            msg.topic,
            self.topics.get(&msg.topic).map_or(0, HashSet::len)
        );
    }
}

impl Handler<Unsubscribe> for ConnectionHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        self.unsubscribe_session(&msg.session_id, &msg.topic);
        tracing::debug!("Session {} unsubscribed from {:?}", msg.session_id, msg.topic);
    }
}

impl Handler<BroadcastToTopic> for ConnectionHub {
    type Result = ();

    fn handle(&mut self, msg: BroadcastToTopic, _: &mut Context<Self>) {
        let Some(subscribers) = self.topics.get(&msg.topic) else {
            tracing::debug!("Broadcast to {:?}: no subscribers", msg.topic);
            return;
        };

        for session_id in subscribers {
            self.send_to_session(
                session_id,
                TopicEvent { topic: msg.topic, event: msg.event.clone() },
            );
        }

        tracing::debug!("Broadcast to {:?}: {} sessions", msg.topic, subscribers.len());
    }
}

impl Handler<EvictUserFromTopic> for ConnectionHub {
    type Result = ();

    fn handle(&mut self, msg: EvictUserFromTopic, _: &mut Context<Self>) {
        let Some(subscribers) = self.topics.get(&msg.topic) else {
            return;
        };

        let evicted: Vec<Uuid> = subscribers
            .iter()
            .filter(|sid| self.session_users.get(sid) == Some(&msg.user_id))
            .copied()
            .collect();

        for session_id in &evicted {
            self.unsubscribe_session(session_id, &msg.topic);
            // đóng hẳn connection, không chỉ unsubscribe
            if let Some(handle) = self.sessions.get(session_id) {
                handle.control.do_send(CloseSession);
            }
        }

        tracing::info!(
            "Evicted user {} from {:?} ({} sessions closed)",
            msg.user_id,
            msg.topic,
            evicted.len()
        );
    }
}

/// Seam cho Delivery Orchestrator và Conversation service: fan-out qua hub
/// mà không phụ thuộc trực tiếp actor address (test dùng sink giả).
pub trait EventSink: Send + Sync {
    fn deliver(&self, topic: Topic, event: ServerEvent);
    fn evict(&self, topic: Topic, user_id: Uuid);
}

impl EventSink for Addr<ConnectionHub> {
    fn deliver(&self, topic: Topic, event: ServerEvent) {
        self.do_send(BroadcastToTopic { topic, event });
    }

    fn evict(&self, topic: Topic, user_id: Uuid) {
        self.do_send(EvictUserFromTopic { topic, user_id });
    }
}
