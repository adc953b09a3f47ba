//! In-app notifications. Other services call [`notify`] and
//! [`notify_role`] from inside their own transactions.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{HostelError, Result};
use crate::roles::Role;
use crate::sql::sql_text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    General,
    Payment,
    PaymentVerified,
    PaymentRejected,
    RegistrationSuccess,
    RoomAssigned,
    RoomDeallocated,
    Attendance,
    Penalty,
    Complaint,
    Extension,
    Meal,
    FoodShortage,
    FoodShortageAcknowledged,
    StudentAction,
}

sql_text_enum!(NotificationKind);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, recipient_id, notification_type, title, message, is_read, created_at";

impl Notification {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recipient_id: row.get(1)?,
            kind: row.get(2)?,
            title: row.get(3)?,
            message: row.get(4)?,
            is_read: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Queue a notification for one user.
pub fn notify(
    conn: &Connection,
    recipient_id: i64,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (recipient_id, notification_type, title, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![recipient_id, kind, title, message, Utc::now()],
    )?;
    tracing::debug!(recipient_id, kind = %kind, title, "notification queued");
    Ok(conn.last_insert_rowid())
}

/// Queue the same notification for every active user holding `role`.
/// Returns how many were queued.
pub fn notify_role(
    conn: &Connection,
    role: Role,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> Result<usize> {
    let queued = conn.execute(
        "INSERT INTO notifications (recipient_id, notification_type, title, message, created_at)
         SELECT id, ?2, ?3, ?4, ?5 FROM users WHERE role = ?1 AND is_active = 1",
        params![role, kind, title, message, Utc::now()],
    )?;
    tracing::debug!(role = %role, kind = %kind, queued, "role notification queued");
    Ok(queued)
}

/// A user's notifications, newest first.
pub fn list_for(
    conn: &Connection,
    user_id: i64,
    limit: Option<usize>,
) -> Result<Vec<Notification>> {
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM notifications WHERE recipient_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![user_id, limit], Notification::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn unread_count(conn: &Connection, user_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
        [user_id],
        |row| row.get(0),
    )?)
}

/// Mark one of the user's own notifications read. Someone else's
/// notification is reported as not found.
pub fn mark_read(conn: &Connection, user_id: i64, notification_id: i64) -> Result<Notification> {
    conn.query_row(
        &format!(
            "UPDATE notifications SET is_read = 1
             WHERE id = ?1 AND recipient_id = ?2
             RETURNING {COLUMNS}"
        ),
        params![notification_id, user_id],
        Notification::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("notification", notification_id))
}

pub fn mark_all_read(conn: &Connection, user_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
        [user_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn newest_first_and_read_tracking() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "nadia", Role::Warden);

        notify(&conn, user, NotificationKind::General, "first", "a").unwrap();
        let second = notify(&conn, user, NotificationKind::Complaint, "second", "b").unwrap();

        let list = list_for(&conn, user, None).unwrap();
        assert_eq!(
            list.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(),
            vec!["second", "first"]
        );
        assert_eq!(unread_count(&conn, user).unwrap(), 2);

        let read = mark_read(&conn, user, second).unwrap();
        assert!(read.is_read);
        assert_eq!(unread_count(&conn, user).unwrap(), 1);

        assert_eq!(mark_all_read(&conn, user).unwrap(), 1);
        assert_eq!(unread_count(&conn, user).unwrap(), 0);
        assert_eq!(list_for(&conn, user, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn cannot_mark_someone_elses_notification() {
        let conn = test_support::conn();
        let owner = test_support::user(&conn, "owner", Role::Admin);
        let other = test_support::user(&conn, "other", Role::Admin);
        let id = notify(&conn, owner, NotificationKind::General, "t", "m").unwrap();

        let err = mark_read(&conn, other, id).unwrap_err();
        assert!(matches!(err, HostelError::NotFound { .. }));
        assert_eq!(unread_count(&conn, owner).unwrap(), 1);
    }

    #[test]
    fn role_broadcast_skips_inactive_users() {
        let conn = test_support::conn();
        let a = test_support::user(&conn, "deputy-a", Role::DeputyRt);
        let b = test_support::user(&conn, "deputy-b", Role::DeputyRt);
        test_support::user(&conn, "warden", Role::Warden);
        conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [b])
            .unwrap();

        let queued = notify_role(
            &conn,
            Role::DeputyRt,
            NotificationKind::StudentAction,
            "Student Removed",
            "bye",
        )
        .unwrap();
        assert_eq!(queued, 1);
        assert_eq!(unread_count(&conn, a).unwrap(), 1);
        assert_eq!(unread_count(&conn, b).unwrap(), 0);
    }
}
