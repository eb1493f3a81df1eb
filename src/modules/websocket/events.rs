/// WebSocket Actor Events
///
/// Messages trao đổi giữa Session actors và Connection Hub actor,
/// và khái niệm Topic: broadcast channel theo conversation hoặc theo user.
use actix::prelude::*;
use uuid::Uuid;

use super::message::ServerEvent;

/// Broadcast channel. Một connection subscribe đúng một topic:
/// chat channel → Conversation, notification channel → User.
/// User có nhiều devices thì mỗi device một connection, cùng topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Conversation(Uuid),
    User(Uuid),
}

/// Hai mailbox của một session dưới góc nhìn của hub: event từ topic
/// và lệnh đóng connection. Hub chỉ biết recipients, không biết session
/// actor cụ thể.
pub struct SessionHandle {
    pub events: Recipient<TopicEvent>,
    pub control: Recipient<CloseSession>,
}

/// Event: session mới connected (đã authenticated trước khi upgrade)
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: Uuid,
    pub user_id: Uuid,
    pub handle: SessionHandle,
}

/// Event: session disconnected - hub phải gỡ session khỏi MỌI topic
/// nó từng subscribe (stale subscription = ghost delivery)
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: Uuid,
}

/// Event: session subscribe vào topic
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub session_id: Uuid,
    pub topic: Topic,
}

/// Event: session rời topic
#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub session_id: Uuid,
    pub topic: Topic,
}

/// Event: broadcast một ServerEvent tới mọi session đang subscribe topic
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct BroadcastToTopic {
    pub topic: Topic,
    pub event: ServerEvent,
}

/// Event: đóng mọi connection của user trên topic (membership lapsed -
/// user bị remove/leave không được tiếp tục observe topic)
#[derive(Message)]
#[rtype(result = "()")]
pub struct EvictUserFromTopic {
    pub topic: Topic,
    pub user_id: Uuid,
}

/// Hub → Session: event đến từ topic mà session subscribe.
/// Session còn re-check membership trước khi đẩy xuống client.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct TopicEvent {
    pub topic: Topic,
    pub event: ServerEvent,
}

/// Hub → Session: yêu cầu đóng connection
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseSession;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_equality_by_id() {
        let id = Uuid::now_v7();
        assert_eq!(Topic::Conversation(id), Topic::Conversation(id));
        assert_ne!(Topic::Conversation(id), Topic::User(id));
        assert_ne!(Topic::User(id), Topic::User(Uuid::now_v7()));
    }
}
