//! Penalties. Manual kinds are issued by staff; the night-shift kind is
//! owned by attendance marking through [`apply_night_shift`].

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::config::{NightPenaltyPolicy, PenaltyConfig};
use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::notifications::{self, NotificationKind};
use crate::shift::Shift;
use crate::sql::{self, sql_text_enum};

pub const NIGHT_SHIFT_REASON: &str = "Present during night shift (after 8 PM)";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PenaltyKind {
    Warning,
    Fine,
    Suspension,
    Expulsion,
    NightShift,
}

sql_text_enum!(PenaltyKind);

impl PenaltyKind {
    fn title(self) -> &'static str {
        match self {
            Self::Warning => "Warning",
            Self::Fine => "Fine",
            Self::Suspension => "Suspension",
            Self::Expulsion => "Expulsion",
            Self::NightShift => "Night Shift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Penalty {
    pub id: i64,
    pub student_id: i64,
    pub student_code: String,
    pub kind: PenaltyKind,
    pub amount: i64,
    pub reason: String,
    pub issued_by: Option<i64>,
    pub issued_date: NaiveDate,
    pub is_paid: bool,
    pub paid_date: Option<NaiveDate>,
}

impl Penalty {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_code: row.get(2)?,
            kind: row.get(3)?,
            amount: row.get(4)?,
            reason: row.get(5)?,
            issued_by: row.get(6)?,
            issued_date: row.get(7)?,
            is_paid: row.get(8)?,
            paid_date: row.get(9)?,
        })
    }
}

const SELECT: &str = "SELECT p.id, p.student_id, s.student_code, p.penalty_type, p.amount,
        p.reason, p.issued_by, p.issued_date, p.is_paid, p.paid_date
    FROM penalties p
    JOIN students s ON s.id = p.student_id";

/// What a night-shift observation did to the student's penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyEffect {
    Created,
    AlreadyPresent,
    Cleared,
    NothingToClear,
    Untouched,
}

/// Keep the single night-shift penalty in line with the latest night
/// observation. Runs inside the marking transaction.
pub fn apply_night_shift(
    conn: &Connection,
    student_id: i64,
    night: Shift,
    issued_by: i64,
    config: &PenaltyConfig,
) -> Result<PenaltyEffect> {
    let clear = match night {
        Shift::Present => {
            let inserted = conn.execute(
                "INSERT INTO penalties (student_id, penalty_type, amount, reason, issued_by, issued_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT DO NOTHING",
                params![
                    student_id,
                    PenaltyKind::NightShift,
                    config.night_shift_amount,
                    NIGHT_SHIFT_REASON,
                    issued_by,
                    sql::today(),
                ],
            )?;
            return Ok(if inserted == 1 {
                PenaltyEffect::Created
            } else {
                PenaltyEffect::AlreadyPresent
            });
        }
        Shift::Null => true,
        Shift::Absent | Shift::Holiday | Shift::Leave => {
            tracing::debug!(
                student_id,
                night = %night,
                policy = ?config.night_policy,
                "night shift neither Present nor Null"
            );
            config.night_policy == NightPenaltyPolicy::Clear
        }
    };

    if !clear {
        return Ok(PenaltyEffect::Untouched);
    }
    let removed = conn.execute(
        "DELETE FROM penalties WHERE student_id = ?1 AND penalty_type = ?2",
        params![student_id, PenaltyKind::NightShift],
    )?;
    Ok(if removed > 0 {
        PenaltyEffect::Cleared
    } else {
        PenaltyEffect::NothingToClear
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPenalty {
    pub student_id: i64,
    #[serde(rename = "penalty_type")]
    pub kind: PenaltyKind,
    #[serde(default)]
    pub amount: i64,
    pub reason: String,
}

/// Issue a manual penalty and tell the student.
pub fn issue_penalty(conn: &mut Connection, issued_by: i64, new: &NewPenalty) -> Result<Penalty> {
    if new.kind == PenaltyKind::NightShift {
        return Err(HostelError::validation(
            "penalty_type",
            "night_shift penalties are managed by attendance marking",
        ));
    }
    if new.amount < 0 {
        return Err(HostelError::validation("amount", "must not be negative"));
    }
    let reason = new.reason.trim();
    if reason.is_empty() {
        return Err(HostelError::validation("reason", "must not be empty"));
    }

    let id = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let user_id: i64 = tx
            .query_row(
                "SELECT user_id FROM students WHERE id = ?1",
                [new.student_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| HostelError::not_found("student", new.student_id))?;

        tx.execute(
            "INSERT INTO penalties (student_id, penalty_type, amount, reason, issued_by, issued_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.student_id,
                new.kind,
                new.amount,
                reason,
                issued_by,
                sql::today()
            ],
        )?;
        let id = tx.last_insert_rowid();

        notifications::notify(
            tx,
            user_id,
            NotificationKind::Penalty,
            &format!("{} Issued", new.kind.title()),
            &format!(
                "You have been issued a {} penalty. Reason: {reason}",
                new.kind
            ),
        )?;
        Ok::<_, HostelError>(id)
    })?;

    tracing::info!(
        penalty_id = id,
        student_id = new.student_id,
        kind = %new.kind,
        "penalty issued"
    );
    get_penalty(conn, id)
}

pub fn get_penalty(conn: &Connection, id: i64) -> Result<Penalty> {
    conn.query_row(
        &format!("{SELECT} WHERE p.id = ?1"),
        [id],
        Penalty::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("penalty", id))
}

pub fn list_penalties(conn: &Connection, student_id: Option<i64>) -> Result<Vec<Penalty>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE (?1 IS NULL OR p.student_id = ?1)
         ORDER BY p.issued_date DESC, p.id DESC"
    ))?;
    let penalties = stmt
        .query_map([student_id], Penalty::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(penalties)
}

pub fn mark_paid(conn: &Connection, id: i64) -> Result<Penalty> {
    let penalty = get_penalty(conn, id)?;
    if penalty.is_paid {
        return Err(HostelError::precondition(format!("Penalty {id} is already paid")));
    }
    conn.execute(
        "UPDATE penalties SET is_paid = 1, paid_date = ?2 WHERE id = ?1",
        params![id, sql::today()],
    )?;
    tracing::info!(penalty_id = id, "penalty paid");
    get_penalty(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    fn night_penalties(conn: &Connection, student_id: i64) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM penalties WHERE student_id = ?1 AND penalty_type = 'night_shift'",
            [student_id],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn present_twice_keeps_one_penalty() {
        let mut conn = test_support::conn();
        let deputy = test_support::user(&conn, "deputy", Role::DeputyRt);
        let s = test_support::student(&mut conn, "S-1");
        let cfg = PenaltyConfig::default();

        let first = apply_night_shift(&conn, s.id, Shift::Present, deputy, &cfg).unwrap();
        let second = apply_night_shift(&conn, s.id, Shift::Present, deputy, &cfg).unwrap();
        assert_eq!(first, PenaltyEffect::Created);
        assert_eq!(second, PenaltyEffect::AlreadyPresent);
        assert_eq!(night_penalties(&conn, s.id), 1);

        let p = &list_penalties(&conn, Some(s.id)).unwrap()[0];
        assert_eq!(p.amount, 500);
        assert_eq!(p.reason, NIGHT_SHIFT_REASON);
        assert_eq!(p.issued_by, Some(deputy));
    }

    #[test]
    fn null_clears_and_other_values_follow_policy() {
        let mut conn = test_support::conn();
        let deputy = test_support::user(&conn, "deputy", Role::DeputyRt);
        let s = test_support::student(&mut conn, "S-1");
        let keep = PenaltyConfig::default();
        let clear = PenaltyConfig {
            night_policy: NightPenaltyPolicy::Clear,
            ..PenaltyConfig::default()
        };

        apply_night_shift(&conn, s.id, Shift::Present, deputy, &keep).unwrap();
        assert_eq!(
            apply_night_shift(&conn, s.id, Shift::Absent, deputy, &keep).unwrap(),
            PenaltyEffect::Untouched
        );
        assert_eq!(night_penalties(&conn, s.id), 1);

        assert_eq!(
            apply_night_shift(&conn, s.id, Shift::Leave, deputy, &clear).unwrap(),
            PenaltyEffect::Cleared
        );
        assert_eq!(night_penalties(&conn, s.id), 0);
        assert_eq!(
            apply_night_shift(&conn, s.id, Shift::Null, deputy, &keep).unwrap(),
            PenaltyEffect::NothingToClear
        );
    }

    #[test]
    fn manual_issue_notifies_and_rejects_night_shift() {
        let mut conn = test_support::conn();
        let warden = test_support::user(&conn, "warden", Role::Warden);
        let s = test_support::student(&mut conn, "S-1");

        let fine = issue_penalty(
            &mut conn,
            warden,
            &NewPenalty {
                student_id: s.id,
                kind: PenaltyKind::Fine,
                amount: 1000,
                reason: "noise after hours".to_string(),
            },
        )
        .unwrap();
        assert_eq!(fine.kind, PenaltyKind::Fine);
        let notes = notifications::list_for(&conn, s.user_id, None).unwrap();
        assert_eq!(notes[0].title, "Fine Issued");

        let err = issue_penalty(
            &mut conn,
            warden,
            &NewPenalty {
                student_id: s.id,
                kind: PenaltyKind::NightShift,
                amount: 500,
                reason: "x".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("penalty_type"));

        let err = issue_penalty(
            &mut conn,
            warden,
            &NewPenalty {
                student_id: 999,
                kind: PenaltyKind::Warning,
                amount: 0,
                reason: "x".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, HostelError::NotFound { .. }));
    }

    #[test]
    fn paying_twice_is_refused() {
        let mut conn = test_support::conn();
        let warden = test_support::user(&conn, "warden", Role::Warden);
        let s = test_support::student(&mut conn, "S-1");
        let p = issue_penalty(
            &mut conn,
            warden,
            &NewPenalty {
                student_id: s.id,
                kind: PenaltyKind::Warning,
                amount: 0,
                reason: "late return".to_string(),
            },
        )
        .unwrap();

        let paid = mark_paid(&conn, p.id).unwrap();
        assert!(paid.is_paid);
        assert_eq!(paid.paid_date, Some(sql::today()));
        assert!(matches!(mark_paid(&conn, p.id), Err(HostelError::Precondition(_))));
    }
}
