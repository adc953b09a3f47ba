//! Stay-extension requests.
//!
//! Only final-year students (year 4 or later) can have an extension
//! approved; approval moves the student's checkout date.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::notifications::{self, NotificationKind};
use crate::sql::{self, sql_text_enum};
use crate::students;

/// Minimum year of study for an approved extension
pub const MIN_EXTENSION_YEAR: i64 = 4;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

sql_text_enum!(RequestStatus);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionRequest {
    pub id: i64,
    pub student_id: i64,
    pub student_code: String,
    pub current_checkout: Option<NaiveDate>,
    pub requested_checkout: NaiveDate,
    pub reason: String,
    pub status: RequestStatus,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExtensionRequest {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_code: row.get(2)?,
            current_checkout: row.get(3)?,
            requested_checkout: row.get(4)?,
            reason: row.get(5)?,
            status: row.get(6)?,
            approved_by: row.get(7)?,
            approved_at: row.get(8)?,
            rejection_reason: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

const SELECT: &str = "SELECT e.id, e.student_id, s.student_code, e.current_checkout,
        e.requested_checkout, e.reason, e.status, e.approved_by, e.approved_at,
        e.rejection_reason, e.created_at
    FROM stay_extensions e
    JOIN students s ON s.id = e.student_id";

#[derive(Debug, Clone, Deserialize)]
pub struct NewExtension {
    pub requested_checkout: NaiveDate,
    pub reason: String,
}

pub fn submit_extension(
    conn: &Connection,
    student_user_id: i64,
    new: &NewExtension,
) -> Result<ExtensionRequest> {
    let reason = new.reason.trim();
    if reason.is_empty() {
        return Err(HostelError::validation("reason", "must not be empty"));
    }
    let student = students::student_for_user(conn, student_user_id)?;
    let floor = student.check_out_date.unwrap_or_else(sql::today);
    if new.requested_checkout <= floor {
        return Err(HostelError::validation("requested_checkout", format!("must be after {floor}")));
    }

    conn.execute(
        "INSERT INTO stay_extensions (student_id, current_checkout, requested_checkout, reason, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            student.id,
            student.check_out_date,
            new.requested_checkout,
            reason,
            RequestStatus::Pending,
            Utc::now()
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(
        request_id = id,
        student_id = student.id,
        "stay extension requested"
    );
    get_extension(conn, id)
}

pub fn get_extension(conn: &Connection, id: i64) -> Result<ExtensionRequest> {
    conn.query_row(
        &format!("{SELECT} WHERE e.id = ?1"),
        [id],
        ExtensionRequest::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("stay extension request", id))
}

pub fn list_extensions(
    conn: &Connection,
    status: Option<RequestStatus>,
    student_id: Option<i64>,
) -> Result<Vec<ExtensionRequest>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR e.status = ?1)
           AND (?2 IS NULL OR e.student_id = ?2)
         ORDER BY e.created_at DESC, e.id DESC"
    ))?;
    let rows = stmt
        .query_map(params![status, student_id], ExtensionRequest::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn approve_extension(
    conn: &mut Connection,
    id: i64,
    reviewer: i64,
) -> Result<ExtensionRequest> {
    execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let request = pending_request(tx, id)?;
        let student = students::get_student(tx, request.student_id)?;
        if student.year_of_study < MIN_EXTENSION_YEAR {
            return Err(HostelError::precondition(format!(
                "Only students in year {MIN_EXTENSION_YEAR} or later can extend their stay"
            )));
        }

        tx.execute(
            "UPDATE stay_extensions SET status = ?2, approved_by = ?3, approved_at = ?4 WHERE id = ?1",
            params![id, RequestStatus::Approved, reviewer, Utc::now()],
        )?;
        tx.execute(
            "UPDATE students SET check_out_date = ?2 WHERE id = ?1",
            params![student.id, request.requested_checkout],
        )?;
        notifications::notify(
            tx,
            student.user_id,
            NotificationKind::Extension,
            "Stay Extension Approved",
            &format!(
                "Your stay extension request has been approved until {}",
                request.requested_checkout
            ),
        )?;
        Ok::<_, HostelError>(())
    })?;

    tracing::info!(request_id = id, reviewer, "stay extension approved");
    get_extension(conn, id)
}

pub fn reject_extension(
    conn: &mut Connection,
    id: i64,
    reviewer: i64,
    reason: &str,
) -> Result<ExtensionRequest> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(HostelError::validation(
            "rejection_reason",
            "is required when rejecting a request",
        ));
    }

    execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let request = pending_request(tx, id)?;
        let student = students::get_student(tx, request.student_id)?;
        tx.execute(
            "UPDATE stay_extensions SET status = ?2, approved_by = ?3, approved_at = ?4, rejection_reason = ?5
             WHERE id = ?1",
            params![id, RequestStatus::Rejected, reviewer, Utc::now(), reason],
        )?;
        notifications::notify(
            tx,
            student.user_id,
            NotificationKind::Extension,
            "Stay Extension Rejected",
            &format!("Your stay extension request has been rejected. Reason: {reason}"),
        )?;
        Ok::<_, HostelError>(())
    })?;

    tracing::info!(request_id = id, reviewer, "stay extension rejected");
    get_extension(conn, id)
}

fn pending_request(conn: &Connection, id: i64) -> Result<ExtensionRequest> {
    let request = get_extension(conn, id)?;
    if request.status != RequestStatus::Pending {
        return Err(HostelError::precondition(format!(
            "Request {id} is already {}",
            request.status
        )));
    }
    Ok(request)
}
