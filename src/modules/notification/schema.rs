use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, PartialEq, Clone, Type, Serialize, Deserialize)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Message,
    Mention,
    GroupAdd,
    GroupRemove,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationEntity {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub _type: NotificationType,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub is_read: bool,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub extra_data: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Settings per-user, lazy get_or_create với defaults (mọi toggle bật, DND tắt)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationSettingsEntity {
    pub user_id: Uuid,
    pub enable_messages: bool,
    pub enable_mentions: bool,
    pub enable_group_notifications: bool,
    pub enable_push: bool,
    pub do_not_disturb: bool,
    pub dnd_start: Option<NaiveTime>,
    pub dnd_end: Option<NaiveTime>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DND window theo giờ trong ngày. start > end nghĩa là window qua đêm
/// (vd 22:00 -> 08:00): active khi now >= start HOẶC now < end.
pub fn dnd_active(settings: &NotificationSettingsEntity, now: NaiveTime) -> bool {
    if !settings.do_not_disturb {
        return false;
    }

    let (Some(start), Some(end)) = (settings.dnd_start, settings.dnd_end) else {
        // DND bật nhưng không có window thì coi như always-on
        return true;
    };

    if start <= end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dnd: bool, start: Option<(u32, u32)>, end: Option<(u32, u32)>) -> NotificationSettingsEntity {
        NotificationSettingsEntity {
            user_id: Uuid::now_v7(),
            enable_messages: true,
            enable_mentions: true,
            enable_group_notifications: true,
            enable_push: true,
            do_not_disturb: dnd,
            dnd_start: start.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            dnd_end: end.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            updated_at: chrono::Utc::now(),
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_dnd_disabled() {
        let s = settings(false, Some((22, 0)), Some((8, 0)));
        assert!(!dnd_active(&s, at(23, 0)));
    }

    #[test]
    fn test_dnd_same_day_window() {
        let s = settings(true, Some((12, 0)), Some((14, 0)));
        assert!(dnd_active(&s, at(13, 0)));
        assert!(!dnd_active(&s, at(15, 0)));
        // end là exclusive
        assert!(!dnd_active(&s, at(14, 0)));
    }

    #[test]
    fn test_dnd_overnight_wraparound() {
        let s = settings(true, Some((22, 0)), Some((8, 0)));
        assert!(dnd_active(&s, at(23, 0)));
        assert!(dnd_active(&s, at(3, 0)));
        assert!(!dnd_active(&s, at(12, 0)));
        assert!(dnd_active(&s, at(22, 0)));
        assert!(!dnd_active(&s, at(8, 0)));
    }

    #[test]
    fn test_dnd_without_window_is_always_on() {
        let s = settings(true, None, None);
        assert!(dnd_active(&s, at(12, 0)));
    }
}
