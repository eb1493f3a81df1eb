/// Push channel - hiện tại chỉ log payload, chưa nối provider thật.
/// Fire-and-forget: deliver lỗi không được chặn pipeline realtime.
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<Uuid>,
    pub notification_id: Uuid,
}

pub trait PushSink: Send + Sync {
    fn deliver(&self, payload: PushPayload);
}

pub struct LogPushSink;

impl PushSink for LogPushSink {
    fn deliver(&self, payload: PushPayload) {
        tracing::info!(
            recipient_id = %payload.recipient_id,
            notification_id = %payload.notification_id,
            title = %payload.title,
            "push notification queued"
        );
    }
}
