/// WebSocket Module
///
/// Real-time delivery core:
///
/// - Wire protocol (ClientEvent & ServerEvent)
/// - Connection Hub actor (sessions + topic subscriptions + fan-out)
/// - Session actor (một actor cho mỗi connection, theo channel)
/// - HTTP handlers (upgrade + JWT auth qua query string)
use actix_web::web;

pub mod events;
pub mod handler;
pub mod message;
pub mod server;
pub mod session;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat/{conversation_id}", web::get().to(handler::chat_handler))
        .route("/notifications", web::get().to(handler::notification_handler));
}
