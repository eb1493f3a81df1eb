/// WebSocket HTTP Handlers
///
/// Hai upgrade endpoints, đều yêu cầu JWT trong query string (`?token=`):
/// - GET /ws/chat/{conversation_id} - chat channel của một conversation
/// - GET /ws/notifications          - notification channel của user
///
/// Identity được verify TRƯỚC khi upgrade; token sai là terminal close
/// (HTTP 401, không có retry trong connection). Chat channel còn check
/// membership trước khi upgrade (403 nếu không phải member).
///
/// Message flow sau upgrade:
/// - Inbound:  Client → WebSocket → parse ClientEvent → Session actor
/// - Outbound: Hub/Session actor → mpsc channel → WebSocket → Client
use actix::{Actor, Addr};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::message::ClientEvent;
use super::server::ConnectionHub;
use super::session::{ChannelKind, Dispatcher, WsSession};
use crate::api::error;
use crate::modules::conversation::repository_pg::ConversationRepositoryPg;
use crate::modules::presence::registry::PresenceRegistry;
use crate::utils::{Claims, TypeClaims};
use crate::ENV;

#[derive(serde::Deserialize)]
pub struct AuthQuery {
    pub token: String,
}

fn authenticate(query: &AuthQuery) -> Result<Uuid, error::Error> {
    let claims = Claims::decode(&query.token, ENV.jwt_secret.as_ref())
        .map_err(|_| error::Error::unauthorized("Invalid or expired token"))?;

    if claims._type.as_ref() != Some(&TypeClaims::AccessToken) {
        return Err(error::Error::unauthorized("Access token required"));
    }

    Ok(claims.sub)
}

/// GET /ws/chat/{conversation_id}?token=...
pub async fn chat_handler(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    query: web::Query<AuthQuery>,
    hub: web::Data<Addr<ConnectionHub>>,
    orchestrator: web::Data<Dispatcher>,
    presence: web::Data<PresenceRegistry>,
    conversations: web::Data<ConversationRepositoryPg>,
) -> Result<HttpResponse, actix_web::Error> {
    let conversation_id = path.into_inner();
    let user_id = authenticate(&query)?;

    // membership check trước khi upgrade; re-check tiếp tục trong session
    let is_member = orchestrator
        .resolver()
        .is_active_member(&conversation_id, &user_id)
        .await
        .map_err(error::Error::from)?;
    if !is_member {
        return Err(error::Error::forbidden("You are not a member of this conversation").into());
    }

    start_session(
        req,
        stream,
        user_id,
        ChannelKind::Chat { conversation_id },
        hub,
        orchestrator,
        presence,
        conversations,
    )
}

/// GET /ws/notifications?token=...
pub async fn notification_handler(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<AuthQuery>,
    hub: web::Data<Addr<ConnectionHub>>,
    orchestrator: web::Data<Dispatcher>,
    presence: web::Data<PresenceRegistry>,
    conversations: web::Data<ConversationRepositoryPg>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = authenticate(&query)?;

    start_session(
        req,
        stream,
        user_id,
        ChannelKind::Notifications,
        hub,
        orchestrator,
        presence,
        conversations,
    )
}

/// Preview của frame không parse được, cắt trên char boundary
/// (frame từ client có thể chứa multibyte UTF-8 ở vị trí bất kỳ)
fn event_preview(raw: &str) -> &str {
    let mut end = raw.len().min(100);
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

#[allow(clippy::too_many_arguments)]
fn start_session(
    req: HttpRequest,
    stream: web::Payload,
    user_id: Uuid,
    channel: ChannelKind,
    hub: web::Data<Addr<ConnectionHub>>,
    orchestrator: web::Data<Dispatcher>,
    presence: web::Data<PresenceRegistry>,
    conversations: web::Data<ConversationRepositoryPg>,
) -> Result<HttpResponse, actix_web::Error> {
    tracing::debug!("WebSocket upgrade ({channel:?}) từ {:?}", req.peer_addr());

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    // mpsc channel: session actor gửi JSON → task dưới → WebSocket → client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let addr = WsSession::new(
        user_id,
        channel,
        hub.get_ref().clone(),
        tx,
        orchestrator,
        presence,
        conversations,
    )
    .start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                // === INBOUND: Client → Server ===
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let text_str = text.to_string();

                            match serde_json::from_str::<ClientEvent>(&text_str) {
                                Ok(event) => {
                                    addr.do_send(event);
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        "Không thể parse client event: {} - raw: {}",
                                        e,
                                        event_preview(&text_str)
                                    );
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Không thể gửi pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => {}

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary messages không được hỗ trợ");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        // Stream kết thúc (client disconnect)
                        None => break,
                    }
                }

                // === OUTBOUND: Server → Client ===
                outbound = rx.recv() => {
                    match outbound {
                        Some(json) => {
                            if ws_session.text(json).await.is_err() {
                                tracing::error!("Không thể gửi event tới WebSocket client");
                                break;
                            }
                        }
                        // Session actor dừng (eviction hoặc membership lapse)
                        None => break,
                    }
                }
            }
        }

        let _ = ws_session.close(None).await;
        tracing::debug!("WebSocket message loop kết thúc");
    });

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_preview_truncates_long_frames() {
        let raw = "x".repeat(300);
        assert_eq!(event_preview(&raw).len(), 100);
    }

    #[test]
    fn test_event_preview_multibyte_at_cut_point() {
        // byte 100 rơi vào giữa một ký tự 2-byte
        let raw = format!("{}àààà", "a".repeat(99));
        let preview = event_preview(&raw);
        assert!(preview.len() <= 100);
        assert!(raw.starts_with(preview));
    }

    #[test]
    fn test_event_preview_short_frame_unchanged() {
        assert_eq!(event_preview("xin chào"), "xin chào");
    }
}
