/// Presence Registry
///
/// Trạng thái online/offline của users trong Redis, ephemeral, không ghi DB:
///
/// - `presence:status:{user_id}` → "online" | "away" | "offline" (explicit status)
/// - `presence:last_activity:{user_id}` → RFC 3339 timestamp của activity cuối
///
/// "Online" là trạng thái suy ra tại thời điểm query, không phải field lưu sẵn:
/// activity trong vòng ONLINE_WINDOW và không có explicit away/offline.
/// Mọi key có TTL để registry tự dọn khi user biến mất.
use chrono::{DateTime, Utc};
use deadpool_redis::redis::{self, AsyncCommands};
use uuid::Uuid;

use crate::api::error;

/// User được coi là online nếu có activity trong vòng 5 phút
pub const ONLINE_WINDOW_SECS: i64 = 300;

/// TTL cho presence keys. Dài hơn ONLINE_WINDOW để last_activity cũ
/// vẫn đọc được (phục vụ "last seen") trước khi expire.
const PRESENCE_TTL: u64 = 24 * 60 * 60;

const STATUS_PREFIX: &str = "presence:status:";
const LAST_ACTIVITY_PREFIX: &str = "presence:last_activity:";

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

impl PresenceStatus {
    fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Offline => "offline",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(PresenceStatus::Online),
            "away" => Some(PresenceStatus::Away),
            "offline" => Some(PresenceStatus::Offline),
            _ => None,
        }
    }
}

/// Explicit away/offline là authoritative; chỉ khi status là online (hoặc
/// không có status) thì mới xét recency của last_activity.
pub fn effective_online(
    status: Option<PresenceStatus>,
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match status {
        Some(PresenceStatus::Away) | Some(PresenceStatus::Offline) => false,
        Some(PresenceStatus::Online) | None => match last_activity {
            Some(at) => (now - at).num_seconds() < ONLINE_WINDOW_SECS,
            None => false,
        },
    }
}

/// Probe hẹp cho Notification Engine: chỉ cần biết online hay không
#[async_trait::async_trait]
pub trait PresenceProbe: Send + Sync {
    async fn is_online(&self, user_id: &Uuid) -> Result<bool, error::SystemError>;
}

#[derive(Clone)]
pub struct PresenceRegistry {
    pool: deadpool_redis::Pool,
}

/// Snapshot presence của 1 user tại thời điểm query
#[derive(Debug, Clone, serde::Serialize)]
pub struct PresenceSnapshot {
    pub user_id: Uuid,
    pub is_online: bool,
    pub status: Option<PresenceStatus>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl PresenceRegistry {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }

    /// Connection mới mở: status về online, last_activity = now.
    /// Đây là chỗ duy nhất status được ghi ngầm - sau đó chỉ user
    /// đổi được qua `set_status`.
    pub async fn connect(&self, user_id: &Uuid) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();

        redis::pipe()
            .set_ex(
                format!("{STATUS_PREFIX}{user_id}"),
                PresenceStatus::Online.as_str(),
                PRESENCE_TTL,
            )
            .set_ex(format!("{LAST_ACTIVITY_PREFIX}{user_id}"), &now, PRESENCE_TTL)
            .query_async::<()>(&mut *conn)
            .await?;

        Ok(())
    }

    /// Ghi nhận activity từ một client event: chỉ bump last_activity.
    /// Không đụng status key - user đã set away/offline thì status đó
    /// giữ nguyên dù họ vẫn đang gõ.
    pub async fn touch(&self, user_id: &Uuid) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(
            format!("{LAST_ACTIVITY_PREFIX}{user_id}"),
            Utc::now().to_rfc3339(),
            PRESENCE_TTL,
        )
        .await?;
        Ok(())
    }

    /// Đặt explicit status (away/offline do user chọn, hoặc offline khi
    /// mọi connection của user đã đóng). Không đụng last_activity.
    pub async fn set_status(
        &self,
        user_id: &Uuid,
        status: PresenceStatus,
    ) -> Result<(), error::SystemError> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(
            format!("{STATUS_PREFIX}{user_id}"),
            status.as_str(),
            PRESENCE_TTL,
        )
        .await?;
        Ok(())
    }

    pub async fn snapshot(&self, user_id: &Uuid) -> Result<PresenceSnapshot, error::SystemError> {
        let mut conn = self.pool.get().await?;

        let (status, last_activity): (Option<String>, Option<String>) = redis::pipe()
            .get(format!("{STATUS_PREFIX}{user_id}"))
            .get(format!("{LAST_ACTIVITY_PREFIX}{user_id}"))
            .query_async(&mut *conn)
            .await?;

        let status = status.as_deref().and_then(PresenceStatus::parse);
        let last_activity = last_activity
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc));

        Ok(PresenceSnapshot {
            user_id: *user_id,
            is_online: effective_online(status, last_activity, Utc::now()),
            status,
            last_activity,
        })
    }
}

#[async_trait::async_trait]
impl PresenceProbe for PresenceRegistry {
    async fn is_online(&self, user_id: &Uuid) -> Result<bool, error::SystemError> {
        Ok(self.snapshot(user_id).await?.is_online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_online_within_window() {
        let now = Utc::now();
        let recent = Some(now - Duration::seconds(60));
        assert!(effective_online(Some(PresenceStatus::Online), recent, now));
        // không có explicit status nhưng có activity gần đây vẫn là online
        assert!(effective_online(None, recent, now));
    }

    #[test]
    fn test_offline_after_window() {
        let now = Utc::now();
        let stale = Some(now - Duration::seconds(ONLINE_WINDOW_SECS + 1));
        assert!(!effective_online(Some(PresenceStatus::Online), stale, now));
    }

    #[test]
    fn test_explicit_away_overrides_recent_activity() {
        let now = Utc::now();
        let recent = Some(now - Duration::seconds(5));
        assert!(!effective_online(Some(PresenceStatus::Away), recent, now));
        assert!(!effective_online(Some(PresenceStatus::Offline), recent, now));
    }

    #[test]
    fn test_away_persists_while_activity_keeps_bumping() {
        // user set away rồi tiếp tục gõ: mỗi event chỉ bump last_activity,
        // status key không bị ghi đè nên vẫn away
        let now = Utc::now();
        for secs in [200, 60, 10, 1] {
            let bumped = Some(now - Duration::seconds(secs));
            assert!(!effective_online(Some(PresenceStatus::Away), bumped, now));
        }
    }

    #[test]
    fn test_no_activity_is_offline() {
        let now = Utc::now();
        assert!(!effective_online(None, None, now));
        assert!(!effective_online(Some(PresenceStatus::Online), None, now));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [PresenceStatus::Online, PresenceStatus::Away, PresenceStatus::Offline] {
            assert_eq!(PresenceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PresenceStatus::parse("busy"), None);
    }
}
